use std::str::FromStr;

use diesel::{
	backend::Backend,
	deserialize::{self, FromSql, FromSqlRow},
	expression::AsExpression,
	prelude::*,
	serialize::{self, IsNull, Output, ToSql},
	sql_types::Text,
	sqlite::Sqlite,
	SqliteConnection,
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::db;
use crate::schema::{loans, payments};
use crate::types::{Date, Id, Money};

#[derive(Queryable, Selectable, Identifiable, Insertable, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[diesel(table_name = loans)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
	pub id: Id,
	pub lender_id: Id,
	pub borrower_id: Id,
	pub principal: Money,
	// flat amount on top of the principal, never compounded
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub interest_rate: Option<Money>,
	pub start_date: Date,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub due_date: Option<Date>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
	/// Cached status, only refreshed when payments change or the loan is edited
	pub status: LoanStatus,
}

impl Loan {
	/// Principal plus the flat interest
	pub fn total_due(&self) -> Money {
		match &self.interest_rate {
			Some(interest) => &self.principal + interest,
			None => self.principal.clone(),
		}
	}

	pub fn involves(&self, person_id: Id) -> bool {
		self.lender_id == person_id || self.borrower_id == person_id
	}
}

#[derive(Insertable, Clone, Debug, PartialEq)]
#[diesel(table_name = loans)]
pub struct NewLoan {
	pub lender_id: Id,
	pub borrower_id: Id,
	pub principal: Money,
	pub interest_rate: Option<Money>,
	pub start_date: Date,
	pub due_date: Option<Date>,
	pub notes: Option<String>,
	pub status: LoanStatus,
}

impl NewLoan {
	pub fn validate(&self) -> Result<(), String> {
		validate_terms(self.lender_id, self.borrower_id, &self.principal, self.interest_rate.as_ref())
	}
}

/// The editable fields of a loan
///
/// Every field is written on update, so `None` clears an optional field.
#[derive(AsChangeset, Clone, Debug, PartialEq)]
#[diesel(table_name = loans, treat_none_as_null = true)]
pub struct LoanChanges {
	pub lender_id: Id,
	pub borrower_id: Id,
	pub principal: Money,
	pub interest_rate: Option<Money>,
	pub start_date: Date,
	pub due_date: Option<Date>,
	pub notes: Option<String>,
}

impl LoanChanges {
	pub fn validate(&self) -> Result<(), String> {
		validate_terms(self.lender_id, self.borrower_id, &self.principal, self.interest_rate.as_ref())
	}
}

impl From<&Loan> for LoanChanges {
	fn from(loan: &Loan) -> Self {
		LoanChanges {
			lender_id: loan.lender_id,
			borrower_id: loan.borrower_id,
			principal: loan.principal.clone(),
			interest_rate: loan.interest_rate.clone(),
			start_date: loan.start_date,
			due_date: loan.due_date,
			notes: loan.notes.clone(),
		}
	}
}

fn validate_terms(lender_id: Id, borrower_id: Id, principal: &Money, interest: Option<&Money>) -> Result<(), String> {
	if lender_id == borrower_id {
		return Err("Lender and borrower must be different".to_string());
	}
	if !principal.is_positive() {
		return Err("Principal must be greater than 0".to_string());
	}
	if interest.map_or(false, Money::is_negative) {
		return Err("Interest cannot be negative".to_string());
	}
	if !principal.fits_backup() || !interest.map_or(true, Money::fits_backup) {
		return Err("Amount has too many digits".to_string());
	}
	Ok(())
}

#[derive(Debug, Clone, Copy, AsExpression, FromSqlRow, Eq, PartialEq, Hash, EnumString, Display, Serialize, Deserialize)]
#[diesel(sql_type = Text)]
pub enum LoanStatus {
	Active,
	Paid,
	Overdue,
}

impl Default for LoanStatus {
	fn default() -> Self { LoanStatus::Active }
}

impl ToSql<Text, Sqlite> for LoanStatus {
	fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
		out.set_value(self.to_string());
		Ok(IsNull::No)
	}
}

impl FromSql<Text, Sqlite> for LoanStatus {
	fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
		let s = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
		Ok(LoanStatus::from_str(&s)?)
	}
}

/// A repayment made against a loan
#[derive(Queryable, Selectable, Identifiable, Associations, Insertable, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[diesel(table_name = payments, belongs_to(Loan))]
#[serde(rename_all = "camelCase")]
pub struct Payment {
	pub id: Id,
	pub loan_id: Id,
	pub amount: Money,
	pub date: Date,
}

#[derive(Insertable, Clone, Debug, PartialEq)]
#[diesel(table_name = payments)]
pub struct NewPayment {
	pub loan_id: Id,
	pub amount: Money,
	pub date: Date,
}

/// Data store implementation for operating on loans in the database
pub struct Repo<'a> {
	conn: &'a mut SqliteConnection,
}

impl<'a> Repo<'a> {
	pub fn new(conn: &'a mut SqliteConnection) -> Self {
		Repo { conn }
	}

	pub fn create(&mut self, new_loan: &NewLoan) -> db::Result<Id> {
		diesel::insert_into(loans::table)
			.values(new_loan)
			.returning(loans::id)
			.get_result(self.conn)
			.map_err(Into::into)
	}

	pub fn find_by_id(&mut self, id: Id) -> db::Result<Loan> {
		loans::table
			.find(id)
			.select(Loan::as_select())
			.first(self.conn)
			.map_err(Into::into)
	}

	pub fn all(&mut self) -> db::Result<Vec<Loan>> {
		loans::table
			.order(loans::id)
			.select(Loan::as_select())
			.load(self.conn)
			.map_err(Into::into)
	}

	pub fn find_by_lender(&mut self, person_id: Id) -> db::Result<Vec<Loan>> {
		loans::table
			.filter(loans::lender_id.eq(person_id))
			.order(loans::id)
			.select(Loan::as_select())
			.load(self.conn)
			.map_err(Into::into)
	}

	pub fn find_by_borrower(&mut self, person_id: Id) -> db::Result<Vec<Loan>> {
		loans::table
			.filter(loans::borrower_id.eq(person_id))
			.order(loans::id)
			.select(Loan::as_select())
			.load(self.conn)
			.map_err(Into::into)
	}

	/// Loans where the person is either the lender or the borrower
	pub fn find_by_person(&mut self, person_id: Id) -> db::Result<Vec<Loan>> {
		loans::table
			.filter(loans::lender_id.eq(person_id).or(loans::borrower_id.eq(person_id)))
			.order(loans::id)
			.select(Loan::as_select())
			.load(self.conn)
			.map_err(Into::into)
	}

	pub fn update(&mut self, id: Id, changes: &LoanChanges) -> db::Result<()> {
		let updated = diesel::update(loans::table.find(id))
			.set(changes)
			.execute(self.conn)?;
		if updated == 0 {
			return Err(db::Error::RecordNotFound);
		}
		Ok(())
	}

	pub fn set_status(&mut self, id: Id, status: LoanStatus) -> db::Result<()> {
		let updated = diesel::update(loans::table.find(id))
			.set(loans::status.eq(status))
			.execute(self.conn)?;
		if updated == 0 {
			return Err(db::Error::RecordNotFound);
		}
		Ok(())
	}

	pub fn delete(&mut self, id: Id) -> db::Result<usize> {
		diesel::delete(loans::table.find(id))
			.execute(self.conn)
			.map_err(Into::into)
	}

	pub fn clear(&mut self) -> db::Result<usize> {
		diesel::delete(loans::table)
			.execute(self.conn)
			.map_err(Into::into)
	}

	/// Insert loans keeping their ids and stored status
	pub fn insert_all(&mut self, records: &[Loan]) -> db::Result<()> {
		for loan in records {
			diesel::insert_into(loans::table)
				.values(loan)
				.execute(self.conn)?;
		}
		Ok(())
	}
}

/// Data store implementation for operating on payments in the database
pub struct PaymentRepo<'a> {
	conn: &'a mut SqliteConnection,
}

impl<'a> PaymentRepo<'a> {
	pub fn new(conn: &'a mut SqliteConnection) -> Self {
		PaymentRepo { conn }
	}

	pub fn create(&mut self, new_payment: &NewPayment) -> db::Result<Id> {
		diesel::insert_into(payments::table)
			.values(new_payment)
			.returning(payments::id)
			.get_result(self.conn)
			.map_err(Into::into)
	}

	pub fn find_by_id(&mut self, id: Id) -> db::Result<Payment> {
		payments::table
			.find(id)
			.select(Payment::as_select())
			.first(self.conn)
			.map_err(Into::into)
	}

	/// Payments on a loan, oldest first
	pub fn find_by_loan(&mut self, loan_id: Id) -> db::Result<Vec<Payment>> {
		payments::table
			.filter(payments::loan_id.eq(loan_id))
			.order((payments::date, payments::id))
			.select(Payment::as_select())
			.load(self.conn)
			.map_err(Into::into)
	}

	/// Payments on each of `loans`, grouped in the same order as `loans`
	pub fn find_by_loans(&mut self, loans: &[Loan]) -> db::Result<Vec<Vec<Payment>>> {
		let payments = Payment::belonging_to(loans)
			.order((payments::date, payments::id))
			.select(Payment::as_select())
			.load(self.conn)?;
		Ok(payments.grouped_by(loans))
	}

	pub fn all(&mut self) -> db::Result<Vec<Payment>> {
		payments::table
			.order(payments::id)
			.select(Payment::as_select())
			.load(self.conn)
			.map_err(Into::into)
	}

	pub fn delete(&mut self, id: Id) -> db::Result<usize> {
		diesel::delete(payments::table.find(id))
			.execute(self.conn)
			.map_err(Into::into)
	}

	pub fn delete_by_loan(&mut self, loan_id: Id) -> db::Result<usize> {
		diesel::delete(payments::table.filter(payments::loan_id.eq(loan_id)))
			.execute(self.conn)
			.map_err(Into::into)
	}

	pub fn clear(&mut self) -> db::Result<usize> {
		diesel::delete(payments::table)
			.execute(self.conn)
			.map_err(Into::into)
	}

	/// Insert payments keeping their ids, whether or not their loan exists
	pub fn insert_all(&mut self, records: &[Payment]) -> db::Result<()> {
		for payment in records {
			diesel::insert_into(payments::table)
				.values(payment)
				.execute(self.conn)?;
		}
		Ok(())
	}
}
