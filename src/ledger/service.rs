use diesel::{Connection, SqliteConnection};
use log::*;

use crate::balance;
use crate::db::{self, OptionalRecord};
use crate::loan::{self, Loan, LoanChanges, LoanStatus, NewLoan, NewPayment, Payment};
use crate::person::{self, NewPerson, Person};
use crate::types::{Id, LocalTime, Money, Time};

use super::error::{Error, ErrorKind, Result};

/// Service keeping people, loans and payments consistent with each other
pub struct Service<'a> {
	pub(super) db: db::Pool,
	pub(super) calendar: &'a dyn Calendar,
}

/// Parameter object for creating a new Service
pub struct NewService<'a> {
	pub db: db::Pool,
	pub calendar: &'a dyn Calendar,
}

impl<'a> Service<'a> {
	pub fn new(v: NewService<'a>) -> Self {
		Service {
			db: v.db,
			calendar: v.calendar,
		}
	}

	pub(super) fn conn(&self) -> Result<db::PooledConn> {
		self.db.get().map_err(Into::into)
	}

	/// Add a person
	///
	/// # Arguments
	/// * `name` - display name, surrounding whitespace is dropped
	pub fn add_person(&self, name: &str) -> Result<Id> {
		let name = validate_name(name)?;

		let mut conn = self.conn()?;
		let id = person::Repo::new(&mut conn).create(NewPerson { name })?;
		debug!(target: "ledger::service", "added person {}", id);
		Ok(id)
	}

	pub fn rename_person(&self, id: Id, name: &str) -> Result<()> {
		let name = validate_name(name)?;

		let mut conn = self.conn()?;
		person::Repo::new(&mut conn).rename(id, name).map_err(|e| not_found(e, ErrorKind::PersonNotFound(id)))?;
		debug!(target: "ledger::service", "renamed person {}", id);
		Ok(())
	}

	/// Delete a person
	///
	/// Loans naming the person as lender or borrower are kept and show the
	/// person as unknown from now on.
	pub fn delete_person(&self, id: Id) -> Result<()> {
		let mut conn = self.conn()?;
		let deleted = person::Repo::new(&mut conn).delete(id)?;
		if deleted > 0 {
			info!(target: "ledger::service", "deleted person {}", id);
		}
		Ok(())
	}

	pub fn person(&self, id: Id) -> Result<Option<Person>> {
		let mut conn = self.conn()?;
		person::Repo::new(&mut conn).find_by_id(id).optional().map_err(Into::into)
	}

	pub fn people(&self) -> Result<Vec<Person>> {
		let mut conn = self.conn()?;
		person::Repo::new(&mut conn).all().map_err(Into::into)
	}

	/// Record a new loan
	///
	/// The loan is stored as given, its status defaults to `Active`.
	pub fn add_loan(&self, new_loan: &NewLoan) -> Result<Id> {
		new_loan.validate().map_err(|msg| rejected("add loan", msg))?;

		let mut conn = self.conn()?;
		let id = loan::Repo::new(&mut conn).create(new_loan)?;
		debug!(target: "ledger::service", "added loan {} from {} to {}", id, new_loan.lender_id, new_loan.borrower_id);
		Ok(id)
	}

	/// Replace the editable fields of a loan and refresh its status
	///
	/// # Arguments
	/// * `id` - loan to edit
	/// * `changes` - new terms, `None` clears an optional field
	pub fn update_loan(&self, id: Id, changes: &LoanChanges) -> Result<LoanStatus> {
		changes.validate().map_err(|msg| rejected("update loan", msg))?;

		let mut pooled = self.conn()?;
		let conn: &mut SqliteConnection = &mut pooled;
		conn.transaction::<LoanStatus, Error, _>(|conn| {
			loan::Repo::new(conn).update(id, changes).map_err(|e| not_found(e, ErrorKind::LoanNotFound(id)))?;
			debug!(target: "ledger::service", "updated loan {}", id);
			self.sync_status(conn, id)
		})
	}

	/// Delete a loan together with its payments
	///
	/// Does nothing if the loan does not exist.
	pub fn delete_loan(&self, id: Id) -> Result<()> {
		let mut pooled = self.conn()?;
		let conn: &mut SqliteConnection = &mut pooled;
		conn.transaction::<(), Error, _>(|conn| {
			// payments go first so no payment is ever left without its loan
			let payments = loan::PaymentRepo::new(conn).delete_by_loan(id)?;
			let loans = loan::Repo::new(conn).delete(id)?;
			if loans > 0 {
				info!(target: "ledger::service", "deleted loan {} and {} payments", id, payments);
			}
			Ok(())
		})
	}

	pub fn loan(&self, id: Id) -> Result<Option<Loan>> {
		let mut conn = self.conn()?;
		loan::Repo::new(&mut conn).find_by_id(id).optional().map_err(Into::into)
	}

	pub fn loans(&self) -> Result<Vec<Loan>> {
		let mut conn = self.conn()?;
		loan::Repo::new(&mut conn).all().map_err(Into::into)
	}

	/// Loans where the person is the lender or the borrower
	pub fn loans_for_person(&self, person_id: Id) -> Result<Vec<Loan>> {
		let mut conn = self.conn()?;
		loan::Repo::new(&mut conn).find_by_person(person_id).map_err(Into::into)
	}

	/// Payments on a loan, oldest first
	pub fn payments_for_loan(&self, loan_id: Id) -> Result<Vec<Payment>> {
		let mut conn = self.conn()?;
		loan::PaymentRepo::new(&mut conn).find_by_loan(loan_id).map_err(Into::into)
	}

	/// Pay towards a loan
	///
	/// The payment must be positive and may not exceed what is left on the loan.
	/// The loan's status is brought up to date in the same transaction.
	///
	/// # Arguments
	/// * `new_payment` - loan id, amount and date of the payment
	pub fn add_payment(&self, new_payment: &NewPayment) -> Result<Id> {
		if !new_payment.amount.is_positive() {
			return Err(rejected("add payment", "Amount must be greater than 0".to_string()));
		}
		if !new_payment.amount.fits_backup() {
			return Err(rejected("add payment", "Amount has too many digits".to_string()));
		}

		let mut pooled = self.conn()?;
		let conn: &mut SqliteConnection = &mut pooled;
		conn.transaction::<Id, Error, _>(|conn| {
			let loan_id = new_payment.loan_id;
			let loan = loan::Repo::new(conn).find_by_id(loan_id)
				.map_err(|e| not_found(e, ErrorKind::LoanNotFound(loan_id)))?;
			let payments = loan::PaymentRepo::new(conn).find_by_loan(loan_id)?;

			let balance = balance::remaining_balance(&loan, &payments);
			if new_payment.amount > balance {
				warn!(target: "ledger::service", "rejected payment of {} on loan {} with balance {}",
					new_payment.amount, loan_id, balance);
				return Err(Error::new(ErrorKind::PaymentExceedsBalance {
					amount: new_payment.amount.clone(),
					balance,
				}));
			}

			let id = loan::PaymentRepo::new(conn).create(new_payment)?;
			debug!(target: "ledger::service", "added payment {} of {} on loan {}", id, new_payment.amount, loan_id);

			self.sync_status(conn, loan_id)?;
			Ok(id)
		})
	}

	/// Delete a payment and refresh its loan's status
	///
	/// Does nothing if the payment does not exist.
	pub fn delete_payment(&self, id: Id) -> Result<()> {
		let mut pooled = self.conn()?;
		let conn: &mut SqliteConnection = &mut pooled;
		conn.transaction::<(), Error, _>(|conn| {
			let payment = match loan::PaymentRepo::new(conn).find_by_id(id).optional()? {
				Some(payment) => payment,
				None => return Ok(()),
			};

			loan::PaymentRepo::new(conn).delete(id)?;
			debug!(target: "ledger::service", "deleted payment {} on loan {}", id, payment.loan_id);

			// an imported payment may point at a loan that is gone
			match self.sync_status(conn, payment.loan_id) {
				Err(e) if e.is_not_found() => Ok(()),
				other => other.map(|_| ()),
			}
		})
	}

	/// Recompute a loan's status and store it if it changed
	pub fn refresh_status(&self, loan_id: Id) -> Result<LoanStatus> {
		let mut pooled = self.conn()?;
		let conn: &mut SqliteConnection = &mut pooled;
		conn.transaction::<LoanStatus, Error, _>(|conn| self.sync_status(conn, loan_id))
	}

	/// Status the loan should have right now according to its payments
	pub(super) fn derive_status(&self, loan: &Loan, payments: &[Payment]) -> (Money, LoanStatus) {
		let balance = balance::remaining_balance(loan, payments);
		let status = balance::loan_status(loan, &balance, self.calendar.now());
		(balance, status)
	}

	fn sync_status(&self, conn: &mut SqliteConnection, loan_id: Id) -> Result<LoanStatus> {
		let loan = loan::Repo::new(conn).find_by_id(loan_id)
			.map_err(|e| not_found(e, ErrorKind::LoanNotFound(loan_id)))?;
		let payments = loan::PaymentRepo::new(conn).find_by_loan(loan_id)?;

		let (_, status) = self.derive_status(&loan, &payments);
		if status != loan.status {
			loan::Repo::new(conn).set_status(loan_id, status)?;
			debug!(target: "ledger::service", "loan {} is now {} (was {})", loan_id, status, loan.status);
		}
		Ok(status)
	}
}

/// Source of the current time
pub trait Calendar {
	/// Gets the current local date and time
	fn now(&self) -> LocalTime {
		chrono::Local::now().naive_local()
	}

	/// Gets the current instant, used to stamp exports
	fn timestamp(&self) -> Time {
		chrono::Utc::now()
	}
}

/// Calendar reading the system clock
pub struct SystemCalendar;

impl Calendar for SystemCalendar {}

fn validate_name(name: &str) -> Result<&str> {
	let name = name.trim();
	if name.is_empty() {
		return Err(rejected("save person", "Name is required".to_string()));
	}
	Ok(name)
}

fn rejected(operation: &str, msg: String) -> Error {
	warn!(target: "ledger::service", "{} rejected: {}", operation, msg);
	Error::invalid_input(msg)
}

fn not_found(e: db::Error, kind: ErrorKind) -> Error {
	match e {
		db::Error::RecordNotFound => Error::new(kind),
		e => Error::from(e),
	}
}

#[cfg(test)]
mod tests {
	use crate::testutil::*;

	use super::*;

	#[test]
	fn add_person_trims_name() {
		let f = Fixture::new();
		let s = f.service();

		let id = s.add_person("  Bob  ").unwrap();
		assert_eq!(s.person(id).unwrap(), Some(Person { id, name: "Bob".to_string() }));
	}

	#[test]
	fn blank_names_are_rejected() {
		let f = Fixture::new();
		let s = f.service();

		let err = s.add_person("   ").unwrap_err();
		assert_eq!(err.kind(), &ErrorKind::InvalidInput("Name is required".to_string()));
		assert!(s.people().unwrap().is_empty());

		let id = s.add_person("Bob").unwrap();
		assert!(s.rename_person(id, "").unwrap_err().is_validation());
		assert_eq!(s.person(id).unwrap().unwrap().name, "Bob");
	}

	#[test]
	fn rename_missing_person() {
		let f = Fixture::new();
		let err = f.service().rename_person(42, "Ghost").unwrap_err();
		assert_eq!(err.kind(), &ErrorKind::PersonNotFound(42));
	}

	#[test]
	fn lookups_of_missing_records_are_none() {
		let f = Fixture::new();
		let s = f.service();

		assert_eq!(s.person(1).unwrap(), None);
		assert_eq!(s.loan(1).unwrap(), None);
		assert!(s.payments_for_loan(1).unwrap().is_empty());
	}

	#[test]
	fn add_loan_validates_before_writing() {
		let f = Fixture::new();
		let bob = f.person_factory.bob();
		let s = f.service();

		let err = s.add_loan(&LoanFactory::defaults(bob.id, bob.id, 100)).unwrap_err();
		assert_eq!(err.kind(), &ErrorKind::InvalidInput("Lender and borrower must be different".to_string()));

		let err = s.add_loan(&LoanFactory::defaults(bob.id, bob.id + 1, 0)).unwrap_err();
		assert!(err.is_validation());

		assert!(s.loans().unwrap().is_empty());
	}

	#[test]
	fn add_loan_keeps_given_status() {
		let f = Fixture::new();
		let bob = f.person_factory.bob();
		let lucy = f.person_factory.lucy();
		let s = f.service();

		let id = s.add_loan(&LoanFactory::defaults(bob.id, lucy.id, 100)).unwrap();
		assert_eq!(s.loan(id).unwrap().unwrap().status, LoanStatus::Active);

		let id = s.add_loan(&NewLoan {
			status: LoanStatus::Overdue,
			..LoanFactory::defaults(bob.id, lucy.id, 100)
		}).unwrap();
		assert_eq!(s.loan(id).unwrap().unwrap().status, LoanStatus::Overdue);
	}

	#[test]
	fn payment_must_be_positive() {
		let f = Fixture::new();
		let bob = f.person_factory.bob();
		let lucy = f.person_factory.lucy();
		let loan = f.loan_factory.loan(bob.id, lucy.id, 100);
		let s = f.service();

		for amount in ["0", "-5"] {
			let err = s.add_payment(&NewPayment { loan_id: loan.id, amount: money(amount), date: date(2024, 2, 1) }).unwrap_err();
			assert_eq!(err.kind(), &ErrorKind::InvalidInput("Amount must be greater than 0".to_string()));
		}
		assert!(s.payments_for_loan(loan.id).unwrap().is_empty());
	}

	#[test]
	fn payment_amount_must_fit_a_backup() {
		let f = Fixture::new();
		let bob = f.person_factory.bob();
		let lucy = f.person_factory.lucy();
		let loan = f.loan_factory.loan(bob.id, lucy.id, 100);
		let s = f.service();

		let err = s.add_payment(&NewPayment {
			loan_id: loan.id,
			amount: money("10.123456789012345678"),
			date: date(2024, 2, 1),
		}).unwrap_err();
		assert_eq!(err.kind(), &ErrorKind::InvalidInput("Amount has too many digits".to_string()));
		assert!(s.payments_for_loan(loan.id).unwrap().is_empty());
	}

	#[test]
	fn payment_on_missing_loan() {
		let f = Fixture::new();
		let err = f.service()
			.add_payment(&NewPayment { loan_id: 77, amount: money("10"), date: date(2024, 2, 1) })
			.unwrap_err();
		assert_eq!(err.kind(), &ErrorKind::LoanNotFound(77));
	}

	#[test]
	fn refresh_status_is_idempotent() {
		let f = Fixture::at(date(2024, 6, 1));
		let bob = f.person_factory.bob();
		let lucy = f.person_factory.lucy();
		let loan = f.loan_factory.create(NewLoan {
			due_date: Some(date(2024, 5, 1)),
			..LoanFactory::defaults(bob.id, lucy.id, 100)
		});
		let s = f.service();

		assert_eq!(s.refresh_status(loan.id).unwrap(), LoanStatus::Overdue);
		let first = s.loan(loan.id).unwrap().unwrap();
		assert_eq!(s.refresh_status(loan.id).unwrap(), LoanStatus::Overdue);
		let second = s.loan(loan.id).unwrap().unwrap();

		assert_eq!(first, second);
		assert_eq!(second.status, LoanStatus::Overdue);
	}

	#[test]
	fn refresh_status_of_missing_loan() {
		let f = Fixture::new();
		let err = f.service().refresh_status(5).unwrap_err();
		assert_eq!(err.kind(), &ErrorKind::LoanNotFound(5));
	}

	#[test]
	fn delete_missing_records_is_a_no_op() {
		let f = Fixture::new();
		let s = f.service();

		s.delete_person(1).unwrap();
		s.delete_loan(1).unwrap();
		s.delete_payment(1).unwrap();
	}
}
