//! Versioned snapshot of the whole ledger, used for backup and restore.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::loan::{Loan, Payment};
use crate::person::Person;
use crate::types::{Date, Time};

/// The only snapshot format version this crate reads and writes
pub const VERSION: u32 = 1;

const COLLECTIONS: [&str; 3] = ["people", "loans", "payments"];

/// Every stored record, as stored
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
	pub version: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub export_date: Option<Time>,
	pub people: Vec<Person>,
	pub loans: Vec<Loan>,
	pub payments: Vec<Payment>,
}

impl Snapshot {
	pub fn new(export_date: Time, people: Vec<Person>, loans: Vec<Loan>, payments: Vec<Payment>) -> Self {
		Snapshot { version: VERSION, export_date: Some(export_date), people, loans, payments }
	}

	/// Parse and validate a snapshot written by [`Snapshot::to_json`]
	pub fn from_json(text: &str) -> Result<Snapshot, SnapshotError> {
		let value: Value = serde_json::from_str(text).map_err(|_| SnapshotError::InvalidJson)?;
		Snapshot::from_value(value)
	}

	pub fn from_value(mut value: Value) -> Result<Snapshot, SnapshotError> {
		let object = value.as_object_mut().ok_or(SnapshotError::InvalidFormat(None))?;

		// any JSON number equal to the version is accepted, 1.0 included
		match object.get("version").and_then(Value::as_f64) {
			Some(v) if v == f64::from(VERSION) => {}
			_ => return Err(SnapshotError::UnsupportedVersion),
		}
		object.insert("version".to_string(), Value::from(VERSION));

		if !COLLECTIONS.iter().all(|key| object.get(*key).map_or(false, Value::is_array)) {
			return Err(SnapshotError::MissingCollections);
		}

		serde_json::from_value(value).map_err(|e| SnapshotError::InvalidFormat(Some(e.to_string())))
	}

	/// Checks a snapshot built in code before it replaces the store
	pub fn validate(&self) -> Result<(), SnapshotError> {
		if self.version != VERSION {
			return Err(SnapshotError::UnsupportedVersion);
		}
		Ok(())
	}

	pub fn to_json(&self) -> Result<String, SnapshotError> {
		serde_json::to_string_pretty(self).map_err(|e| SnapshotError::Encode(e.to_string()))
	}

	/// Name offered for a backup file written on `date`
	pub fn file_name(date: Date) -> String {
		format!("debt-tracker-backup-{}.json", date.format("%Y-%m-%d"))
	}
}

/// Why a snapshot was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotError {
	InvalidJson,
	InvalidFormat(Option<String>),
	UnsupportedVersion,
	MissingCollections,
	Encode(String),
}

impl fmt::Display for SnapshotError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			SnapshotError::InvalidJson => write!(f, "Invalid JSON format"),
			SnapshotError::InvalidFormat(None) => write!(f, "Invalid data format"),
			SnapshotError::InvalidFormat(Some(detail)) => write!(f, "Invalid data format: {}", detail),
			SnapshotError::UnsupportedVersion => write!(f, "Unsupported data version"),
			SnapshotError::MissingCollections => write!(f, "Missing or invalid data arrays"),
			SnapshotError::Encode(e) => write!(f, "Failed to export data: {}", e),
		}
	}
}

impl std::error::Error for SnapshotError {}
