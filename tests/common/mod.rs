#![allow(dead_code)]

use std::str::FromStr;

use chrono::{Duration, NaiveDateTime, TimeZone, Utc};

use debt_tracker::*;

pub struct Fixture {
	pub pool: db::Pool,
	pub calendar: FixedCalendar,
}

impl Fixture {
	pub fn new() -> Self {
		Fixture::at(date(2024, 3, 15))
	}

	pub fn at(today: Date) -> Self {
		let _ = pretty_env_logger::try_init();
		Fixture {
			pool: db::in_memory().expect("open in-memory database"),
			calendar: FixedCalendar { now: today.and_hms_opt(9, 30, 0).unwrap() },
		}
	}

	pub fn service(&self) -> Service<'_> {
		Service::new(NewService {
			db: self.pool.clone(),
			calendar: &self.calendar,
		})
	}

	pub fn today(&self) -> Date {
		self.calendar.now.date()
	}

	pub fn yesterday(&self) -> Date {
		self.today() - Duration::days(1)
	}
}

pub struct FixedCalendar {
	pub now: NaiveDateTime,
}

impl Calendar for FixedCalendar {
	fn now(&self) -> NaiveDateTime {
		self.now
	}

	fn timestamp(&self) -> chrono::DateTime<Utc> {
		Utc.from_utc_datetime(&self.now)
	}
}

pub fn money(s: &str) -> Money {
	Money::from_str(s).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> Date {
	Date::from_ymd_opt(y, m, d).unwrap()
}

pub fn new_loan(lender_id: Id, borrower_id: Id, principal: &str) -> NewLoan {
	NewLoan {
		lender_id,
		borrower_id,
		principal: money(principal),
		interest_rate: None,
		start_date: date(2024, 1, 1),
		due_date: None,
		notes: None,
		status: LoanStatus::Active,
	}
}

pub fn payment(loan_id: Id, amount: &str) -> NewPayment {
	NewPayment { loan_id, amount: money(amount), date: date(2024, 2, 1) }
}
