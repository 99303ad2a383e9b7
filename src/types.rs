use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

use bigdecimal::{BigDecimal, ParseBigDecimalError, Signed, ToPrimitive, Zero};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::{
	backend::Backend,
	deserialize::{self, FromSql, FromSqlRow},
	expression::AsExpression,
	serialize::{self, IsNull, Output, ToSql},
	sql_types::Text,
	sqlite::Sqlite,
};
use serde::{Deserialize, Serialize};

pub type Id = i64;
pub type Time = DateTime<Utc>;
pub type Date = NaiveDate;
pub type LocalTime = NaiveDateTime;

/// An exact decimal amount of money.
///
/// Stored as text so no precision is lost in SQLite, and written to backups as a
/// plain JSON number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[derive(Serialize, Deserialize)]
#[serde(try_from = "MoneyRepr", into = "MoneyRepr")]
pub struct Money(BigDecimal);

impl Money {
	pub fn new(value: BigDecimal) -> Self {
		Money(value)
	}

	pub fn zero() -> Self {
		Money(BigDecimal::zero())
	}

	pub fn is_zero(&self) -> bool {
		self.0.is_zero()
	}

	pub fn is_positive(&self) -> bool {
		self.0.is_positive()
	}

	pub fn is_negative(&self) -> bool {
		self.0.is_negative()
	}

	/// Clamps negative amounts to zero.
	pub fn floor_zero(self) -> Self {
		if self.is_negative() { Money::zero() } else { self }
	}

	pub fn as_decimal(&self) -> &BigDecimal {
		&self.0
	}

	/// Whether the amount is written to a backup as a JSON number and read back unchanged
	pub fn fits_backup(&self) -> bool {
		match MoneyRepr::from(self.clone()) {
			MoneyRepr::Int(_) => true,
			MoneyRepr::Float(v) => Money::from_str(&v.to_string()).map_or(false, |m| &m == self),
			MoneyRepr::Text(_) => false,
		}
	}
}

impl fmt::Display for Money {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for Money {
	type Err = ParseBigDecimalError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		BigDecimal::from_str(s.trim()).map(Money)
	}
}

impl From<i64> for Money {
	fn from(v: i64) -> Self {
		Money(BigDecimal::from(v))
	}
}

impl From<BigDecimal> for Money {
	fn from(v: BigDecimal) -> Self {
		Money(v)
	}
}

impl<'a> Add<&'a Money> for &'a Money {
	type Output = Money;

	fn add(self, rhs: &'a Money) -> Money {
		Money(&self.0 + &rhs.0)
	}
}

impl Add for Money {
	type Output = Money;

	fn add(self, rhs: Money) -> Money {
		Money(self.0 + rhs.0)
	}
}

impl<'a> Sub<&'a Money> for &'a Money {
	type Output = Money;

	fn sub(self, rhs: &'a Money) -> Money {
		Money(&self.0 - &rhs.0)
	}
}

impl Sub for Money {
	type Output = Money;

	fn sub(self, rhs: Money) -> Money {
		Money(self.0 - rhs.0)
	}
}

impl Sum for Money {
	fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
		iter.fold(Money::zero(), |acc, m| acc + m)
	}
}

impl<'a> Sum<&'a Money> for Money {
	fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
		iter.fold(Money::zero(), |acc, m| Money(acc.0 + &m.0))
	}
}

impl ToSql<Text, Sqlite> for Money {
	fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
		out.set_value(self.0.to_string());
		Ok(IsNull::No)
	}
}

impl FromSql<Text, Sqlite> for Money {
	fn from_sql(bytes: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
		let s = <String as FromSql<Text, Sqlite>>::from_sql(bytes)?;
		Ok(Money::from_str(&s)?)
	}
}

// JSON shape of an amount: integral values as integers, everything else as a float.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MoneyRepr {
	Int(i64),
	Float(f64),
	Text(String),
}

impl TryFrom<MoneyRepr> for Money {
	type Error = String;

	fn try_from(repr: MoneyRepr) -> Result<Self, Self::Error> {
		match repr {
			MoneyRepr::Int(v) => Ok(Money::from(v)),
			// f64's Display is the shortest string that round-trips, so 0.1 stays 0.1
			MoneyRepr::Float(v) if v.is_finite() => Money::from_str(&v.to_string()).map_err(|e| e.to_string()),
			MoneyRepr::Float(v) => Err(format!("invalid amount: {}", v)),
			MoneyRepr::Text(s) => Money::from_str(&s).map_err(|e| format!("invalid amount {:?}: {}", s, e)),
		}
	}
}

impl From<Money> for MoneyRepr {
	fn from(m: Money) -> Self {
		if m.0.is_integer() {
			if let Some(v) = m.0.to_i64() {
				return MoneyRepr::Int(v);
			}
		}
		// nearest f64 to the decimal text
		let text = m.0.to_string();
		match text.parse::<f64>() {
			Ok(v) if v.is_finite() => MoneyRepr::Float(v),
			_ => MoneyRepr::Text(text),
		}
	}
}
