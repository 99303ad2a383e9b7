//! Balance and status of a loan, derived from the loan and its payments.
//!
//! These are the single source of truth for a loan's status: the `status`
//! column on a stored loan is only a cache of [`loan_status`].

use chrono::NaiveTime;

use crate::loan::{Loan, LoanStatus, Payment};
use crate::types::{LocalTime, Money};

/// What is left to pay: principal plus flat interest, minus every payment
///
/// Never negative, overpayment leaves a balance of zero.
pub fn remaining_balance(loan: &Loan, payments: &[Payment]) -> Money {
	let paid: Money = payments.iter().map(|p| &p.amount).sum();
	(loan.total_due() - paid).floor_zero()
}

/// Status of a loan with the given balance at the moment `now`
///
/// A loan with nothing left to pay is `Paid` even after its due date. A loan
/// is `Overdue` once its due date has started, and never without a due date.
pub fn loan_status(loan: &Loan, balance: &Money, now: LocalTime) -> LoanStatus {
	if balance.is_zero() {
		return LoanStatus::Paid;
	}

	match loan.due_date {
		Some(due) if due.and_time(NaiveTime::MIN) < now => LoanStatus::Overdue,
		_ => LoanStatus::Active,
	}
}
