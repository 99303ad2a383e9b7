use std::fmt;

use crate::backup::SnapshotError;
use crate::db;
use crate::types::{Id, Money};

pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur when operating on the ledger
#[derive(Debug, PartialEq)]
pub struct Error {
	kind: ErrorKind,
}

impl Error {
	pub fn new(kind: ErrorKind) -> Error {
		Error { kind }
	}

	pub fn invalid_input(msg: impl Into<String>) -> Error {
		Error::new(ErrorKind::InvalidInput(msg.into()))
	}

	pub fn kind(&self) -> &ErrorKind {
		&self.kind
	}

	/// The input was rejected before anything was written
	pub fn is_validation(&self) -> bool {
		matches!(self.kind, ErrorKind::InvalidInput(_) | ErrorKind::PaymentExceedsBalance { .. })
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self.kind, ErrorKind::LoanNotFound(_) | ErrorKind::PersonNotFound(_))
	}
}

/// The kind of an error that can occur.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
	Database(db::Error),
	InvalidInput(String),
	PaymentExceedsBalance { amount: Money, balance: Money },
	LoanNotFound(Id),
	PersonNotFound(Id),
	InvalidSnapshot(SnapshotError),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match &self.kind {
			ErrorKind::Database(e) => write!(f, "db error: {}", e),
			ErrorKind::InvalidInput(msg) => write!(f, "{}", msg),
			ErrorKind::PaymentExceedsBalance { balance, .. } =>
				write!(f, "Amount cannot exceed remaining balance ({})", balance),
			ErrorKind::LoanNotFound(id) => write!(f, "loan {} does not exist", id),
			ErrorKind::PersonNotFound(id) => write!(f, "person {} does not exist", id),
			ErrorKind::InvalidSnapshot(e) => write!(f, "{}", e),
		}
	}
}

impl std::error::Error for Error {}

impl From<db::Error> for Error {
	fn from(e: db::Error) -> Self {
		Error::new(ErrorKind::Database(e))
	}
}

impl From<r2d2::Error> for Error {
	fn from(e: r2d2::Error) -> Self {
		Error::new(ErrorKind::Database(db::Error::from(e)))
	}
}

impl From<diesel::result::Error> for Error {
	fn from(e: diesel::result::Error) -> Self {
		Error::new(ErrorKind::Database(db::Error::from(e)))
	}
}

impl From<SnapshotError> for Error {
	fn from(e: SnapshotError) -> Self {
		Error::new(ErrorKind::InvalidSnapshot(e))
	}
}
