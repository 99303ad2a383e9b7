use std::collections::HashMap;

use serde::Serialize;

use crate::loan::{self, Loan, LoanStatus, Payment};
use crate::person::{self, Person};
use crate::types::{Id, Money};

use super::error::Result;
use super::service::Service;

/// Name shown for a lender or borrower that no longer exists
pub const UNKNOWN_PERSON: &str = "Unknown";

/// A loan with everything needed to show it on its own page
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoanDetails {
	pub loan: Loan,
	pub payments: Vec<Payment>,
	pub lender: Option<Person>,
	pub borrower: Option<Person>,
	pub balance: Money,
	pub status: LoanStatus,
}

impl LoanDetails {
	pub fn lender_name(&self) -> &str {
		self.lender.as_ref().map_or(UNKNOWN_PERSON, |p| p.name.as_str())
	}

	pub fn borrower_name(&self) -> &str {
		self.borrower.as_ref().map_or(UNKNOWN_PERSON, |p| p.name.as_str())
	}
}

/// One row of the loans list
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
	pub loan: Loan,
	pub lender_name: String,
	pub borrower_name: String,
	pub balance: Money,
	pub status: LoanStatus,
	pub payment_count: usize,
}

/// Totals for the home page
#[derive(Serialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
	/// Loans that are active or overdue
	pub open_loans: usize,
	pub overdue_loans: usize,
	pub total_outstanding: Money,
}

impl<'a> Service<'a> {
	/// A loan with its payments and parties, balance and status computed now
	pub fn loan_details(&self, loan_id: Id) -> Result<Option<LoanDetails>> {
		use crate::db::OptionalRecord;

		let mut conn = self.conn()?;
		let loan = match loan::Repo::new(&mut conn).find_by_id(loan_id).optional()? {
			Some(loan) => loan,
			None => return Ok(None),
		};
		let payments = loan::PaymentRepo::new(&mut conn).find_by_loan(loan_id)?;
		let lender = person::Repo::new(&mut conn).find_by_id(loan.lender_id).optional()?;
		let borrower = person::Repo::new(&mut conn).find_by_id(loan.borrower_id).optional()?;

		let (balance, status) = self.derive_status(&loan, &payments);
		Ok(Some(LoanDetails { loan, payments, lender, borrower, balance, status }))
	}

	/// Every loan, with names resolved and balance and status computed now
	pub fn loans_with_details(&self) -> Result<Vec<LoanSummary>> {
		let mut conn = self.conn()?;
		let names: HashMap<Id, String> = person::Repo::new(&mut conn).all()?
			.into_iter()
			.map(|p| (p.id, p.name))
			.collect();
		let loans = loan::Repo::new(&mut conn).all()?;
		let payments = loan::PaymentRepo::new(&mut conn).find_by_loans(&loans)?;

		let name_of = |id: Id| names.get(&id).cloned().unwrap_or_else(|| UNKNOWN_PERSON.to_string());

		let summaries = loans.into_iter()
			.zip(payments)
			.map(|(loan, payments)| {
				let (balance, status) = self.derive_status(&loan, &payments);
				LoanSummary {
					lender_name: name_of(loan.lender_id),
					borrower_name: name_of(loan.borrower_id),
					balance,
					status,
					payment_count: payments.len(),
					loan,
				}
			})
			.collect();
		Ok(summaries)
	}

	/// The loans list narrowed to one computed status
	pub fn loans_with_status(&self, status: LoanStatus) -> Result<Vec<LoanSummary>> {
		let mut summaries = self.loans_with_details()?;
		summaries.retain(|s| s.status == status);
		Ok(summaries)
	}

	pub fn overview(&self) -> Result<Overview> {
		let summaries = self.loans_with_details()?;
		let overview = summaries.iter().fold(Overview::default(), |mut acc, s| {
			match s.status {
				LoanStatus::Active => acc.open_loans += 1,
				LoanStatus::Overdue => {
					acc.open_loans += 1;
					acc.overdue_loans += 1;
				}
				LoanStatus::Paid => {}
			}
			acc.total_outstanding = &acc.total_outstanding + &s.balance;
			acc
		});
		Ok(overview)
	}

	/// What others still owe the person, summed over the loans they lent
	pub fn total_owed(&self, person_id: Id) -> Result<Money> {
		self.sum_balances(|loan| loan.lender_id == person_id)
	}

	/// What the person still owes, summed over the loans they borrowed
	pub fn total_owing(&self, person_id: Id) -> Result<Money> {
		self.sum_balances(|loan| loan.borrower_id == person_id)
	}

	fn sum_balances(&self, include: impl Fn(&Loan) -> bool) -> Result<Money> {
		let mut conn = self.conn()?;
		let loans: Vec<Loan> = loan::Repo::new(&mut conn).all()?
			.into_iter()
			.filter(|l| include(l))
			.collect();
		let payments = loan::PaymentRepo::new(&mut conn).find_by_loans(&loans)?;

		Ok(loans.iter()
			.zip(payments.iter())
			.map(|(loan, payments)| self.derive_status(loan, payments).0)
			.sum())
	}
}
