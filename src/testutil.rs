use std::str::FromStr;

use chrono::{TimeZone, Utc};

use crate::db;
use crate::ledger::{Calendar, NewService, Service};
use crate::loan::{self, Loan, LoanStatus, NewLoan};
use crate::person::{self, NewPerson, Person};
use crate::types::{Date, Id, LocalTime, Money, Time};

pub struct Fixture {
	pub pool: db::Pool,
	pub person_factory: PersonFactory,
	pub loan_factory: LoanFactory,
	pub calendar: FixedCalendar,
}

impl Fixture {
	pub fn new() -> Self {
		Fixture::at(date(2024, 3, 15))
	}

	/// A fixture whose calendar reads noon on `today`
	pub fn at(today: Date) -> Self {
		let _ = pretty_env_logger::try_init();

		let pool = db::in_memory().expect("open in-memory database");
		Fixture {
			person_factory: PersonFactory::new(pool.clone()),
			loan_factory: LoanFactory::new(pool.clone()),
			calendar: FixedCalendar::noon(today),
			pool,
		}
	}

	pub fn conn(&self) -> db::PooledConn {
		self.pool.get().expect("get a db connection")
	}

	pub fn service(&self) -> Service<'_> {
		Service::new(NewService {
			db: self.pool.clone(),
			calendar: &self.calendar,
		})
	}
}

/// Calendar frozen at a single moment
pub struct FixedCalendar {
	now: LocalTime,
}

impl FixedCalendar {
	pub fn noon(today: Date) -> Self {
		FixedCalendar { now: today.and_hms_opt(12, 0, 0).unwrap() }
	}
}

impl Calendar for FixedCalendar {
	fn now(&self) -> LocalTime {
		self.now
	}

	fn timestamp(&self) -> Time {
		Utc.from_utc_datetime(&self.now)
	}
}

pub fn money(s: &str) -> Money {
	Money::from_str(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> Date {
	Date::from_ymd_opt(y, m, d).unwrap()
}

pub struct PersonFactory {
	pool: db::Pool,
}

impl PersonFactory {
	fn new(pool: db::Pool) -> Self {
		PersonFactory { pool }
	}

	pub fn person(&self, name: &str) -> Person {
		let mut conn = self.pool.get().unwrap();
		let mut repo = person::Repo::new(&mut conn);
		let id = repo.create(NewPerson { name }).unwrap();
		repo.find_by_id(id).unwrap()
	}

	pub fn bob(&self) -> Person {
		self.person("Bob")
	}

	pub fn lucy(&self) -> Person {
		self.person("Lucy")
	}

	pub fn jack(&self) -> Person {
		self.person("Jack")
	}
}

pub struct LoanFactory {
	pool: db::Pool,
}

impl LoanFactory {
	fn new(pool: db::Pool) -> Self {
		LoanFactory { pool }
	}

	pub fn defaults(lender_id: Id, borrower_id: Id, principal: i64) -> NewLoan {
		NewLoan {
			lender_id,
			borrower_id,
			principal: Money::from(principal),
			interest_rate: None,
			start_date: date(2024, 1, 1),
			due_date: None,
			notes: None,
			status: LoanStatus::Active,
		}
	}

	/// Stores the loan as given, without deriving its status
	pub fn create(&self, new_loan: NewLoan) -> Loan {
		let mut conn = self.pool.get().unwrap();
		let mut repo = loan::Repo::new(&mut conn);
		let id = repo.create(&new_loan).unwrap();
		repo.find_by_id(id).unwrap()
	}

	pub fn loan(&self, lender_id: Id, borrower_id: Id, principal: i64) -> Loan {
		self.create(LoanFactory::defaults(lender_id, borrower_id, principal))
	}
}

#[test]
fn fixture_setup() {
	let f = Fixture::new();
	let bob = f.person_factory.bob();
	let lucy = f.person_factory.lucy();
	let loan = f.loan_factory.loan(bob.id, lucy.id, 10);
	assert_eq!(loan.lender_id, bob.id);
	assert_eq!(f.calendar.now(), date(2024, 3, 15).and_hms_opt(12, 0, 0).unwrap());
}
