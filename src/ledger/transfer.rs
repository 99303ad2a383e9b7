use diesel::{Connection, SqliteConnection};
use log::*;

use crate::backup::Snapshot;
use crate::loan;
use crate::person;

use super::error::{Error, Result};
use super::service::Service;

impl<'a> Service<'a> {
	/// Every stored record, stamped with the current time
	///
	/// Statuses are exported as stored, not recomputed.
	pub fn export_snapshot(&self) -> Result<Snapshot> {
		let mut pooled = self.conn()?;
		let conn: &mut SqliteConnection = &mut pooled;
		let people = person::Repo::new(conn).all()?;
		let loans = loan::Repo::new(conn).all()?;
		let payments = loan::PaymentRepo::new(conn).all()?;

		info!(target: "ledger::transfer", "exporting {} people, {} loans, {} payments",
			people.len(), loans.len(), payments.len());
		Ok(Snapshot::new(self.calendar.timestamp(), people, loans, payments))
	}

	pub fn export_json(&self) -> Result<String> {
		let snapshot = self.export_snapshot()?;
		snapshot.to_json().map_err(Into::into)
	}

	/// Replace everything in the store with the snapshot's records
	///
	/// Records keep their ids. If anything fails the store is left as it was.
	pub fn import_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
		if let Err(e) = snapshot.validate() {
			warn!(target: "ledger::transfer", "import rejected: {}", e);
			return Err(e.into());
		}

		let mut pooled = self.conn()?;
		let conn: &mut SqliteConnection = &mut pooled;
		conn.transaction::<(), Error, _>(|conn| {
			let payments = loan::PaymentRepo::new(conn).clear()?;
			let loans = loan::Repo::new(conn).clear()?;
			let people = person::Repo::new(conn).clear()?;
			debug!(target: "ledger::transfer", "cleared {} people, {} loans, {} payments", people, loans, payments);

			person::Repo::new(conn).insert_all(&snapshot.people)?;
			loan::Repo::new(conn).insert_all(&snapshot.loans)?;
			loan::PaymentRepo::new(conn).insert_all(&snapshot.payments)?;
			Ok(())
		})?;

		info!(target: "ledger::transfer", "imported {} people, {} loans, {} payments",
			snapshot.people.len(), snapshot.loans.len(), snapshot.payments.len());
		Ok(())
	}

	/// Parse a backup file and import it, see [`Service::import_snapshot`]
	pub fn import_json(&self, text: &str) -> Result<()> {
		let snapshot = match Snapshot::from_json(text) {
			Ok(snapshot) => snapshot,
			Err(e) => {
				warn!(target: "ledger::transfer", "import rejected: {}", e);
				return Err(e.into());
			}
		};
		self.import_snapshot(&snapshot)
	}
}
