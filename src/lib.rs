//! Personal loan and debt tracking.
//!
//! People lend to and borrow from each other, loans are paid back in
//! instalments, and each loan's balance and status are derived from its
//! payments. Records live in a SQLite database reached through an r2d2 pool,
//! and the whole ledger can be exported to and restored from a JSON backup.

pub mod schema;
pub mod types;
pub mod db;
pub mod person;
pub mod loan;
pub mod balance;
pub mod backup;
pub mod ledger;

#[cfg(test)]
mod testutil;

pub use backup::{Snapshot, SnapshotError};
pub use balance::{loan_status, remaining_balance};
pub use ledger::{Calendar, Error, ErrorKind, LoanDetails, LoanSummary, NewService, Overview, Service, SystemCalendar};
pub use loan::{Loan, LoanChanges, LoanStatus, NewLoan, NewPayment, Payment};
pub use person::Person;
pub use types::{Date, Id, Money};
