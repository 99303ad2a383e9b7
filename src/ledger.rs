//! Operations on the ledger that keep stored records consistent, and the views
//! computed from them.

pub use error::{Error, ErrorKind, Result};
pub use service::{Calendar, NewService, Service, SystemCalendar};
pub use views::{LoanDetails, LoanSummary, Overview, UNKNOWN_PERSON};

mod error;
mod service;
mod transfer;
mod views;
