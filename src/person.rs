use diesel::prelude::*;
use diesel::SqliteConnection;
use serde::{Deserialize, Serialize};

use crate::db;
use crate::schema::people;
use crate::types::Id;

/// Someone who lends or borrows
#[derive(Queryable, Selectable, Identifiable, Insertable, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[diesel(table_name = people)]
pub struct Person {
	pub id: Id,
	pub name: String,
}

#[derive(Insertable)]
#[diesel(table_name = people)]
pub struct NewPerson<'a> {
	pub name: &'a str,
}

/// Data store implementation for operating on people in the database
pub struct Repo<'a> {
	conn: &'a mut SqliteConnection,
}

impl<'a> Repo<'a> {
	pub fn new(conn: &'a mut SqliteConnection) -> Self {
		Repo { conn }
	}

	pub fn create(&mut self, new_person: NewPerson) -> db::Result<Id> {
		diesel::insert_into(people::table)
			.values(&new_person)
			.returning(people::id)
			.get_result(self.conn)
			.map_err(Into::into)
	}

	pub fn find_by_id(&mut self, id: Id) -> db::Result<Person> {
		people::table
			.find(id)
			.select(Person::as_select())
			.first(self.conn)
			.map_err(Into::into)
	}

	pub fn all(&mut self) -> db::Result<Vec<Person>> {
		people::table
			.order(people::id)
			.select(Person::as_select())
			.load(self.conn)
			.map_err(Into::into)
	}

	pub fn rename(&mut self, id: Id, name: &str) -> db::Result<()> {
		let updated = diesel::update(people::table.find(id))
			.set(people::name.eq(name))
			.execute(self.conn)?;
		if updated == 0 {
			return Err(db::Error::RecordNotFound);
		}
		Ok(())
	}

	/// Returns the number of deleted rows, 0 when the person did not exist
	pub fn delete(&mut self, id: Id) -> db::Result<usize> {
		diesel::delete(people::table.find(id))
			.execute(self.conn)
			.map_err(Into::into)
	}

	pub fn clear(&mut self) -> db::Result<usize> {
		diesel::delete(people::table)
			.execute(self.conn)
			.map_err(Into::into)
	}

	/// Insert people keeping their ids
	pub fn insert_all(&mut self, records: &[Person]) -> db::Result<()> {
		for person in records {
			diesel::insert_into(people::table)
				.values(person)
				.execute(self.conn)?;
		}
		Ok(())
	}
}
