use std::sync::atomic::{AtomicU64, Ordering};
use std::{env, fmt};

use diesel::r2d2::{ConnectionManager, PooledConnection};
use diesel::result::DatabaseErrorKind::UniqueViolation;
use diesel::result::Error::{DatabaseError, NotFound};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use dotenv::dotenv;
use log::*;

pub type Result<T> = std::result::Result<T, Error>;
pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const DEFAULT_POOL_SIZE: u32 = 4;

static MEMORY_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Where the record store lives and how many connections to keep open
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
	pub database_url: String,
	pub pool_size: u32,
}

impl Config {
	/// Read the configuration from the environment
	///
	/// `DATABASE_URL` must be set, `DATABASE_POOL_SIZE` is optional.
	/// Loads `.env` file in the environment's directory
	pub fn from_env() -> Result<Config> {
		dotenv().ok();
		Config::from_lookup(|key| env::var(key).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
		let database_url = lookup("DATABASE_URL")
			.filter(|url| !url.trim().is_empty())
			.ok_or_else(|| Error::Configuration("DATABASE_URL must be set".to_string()))?;

		let pool_size = match lookup("DATABASE_POOL_SIZE") {
			None => DEFAULT_POOL_SIZE,
			Some(raw) => match raw.trim().parse::<u32>() {
				Ok(n) if n > 0 => n,
				_ => return Err(Error::Configuration(
					format!("DATABASE_POOL_SIZE must be a positive integer, got {:?}", raw))),
			},
		};

		Ok(Config { database_url, pool_size })
	}
}

/// Open a pooled connection to the SQLite database and bring its schema up to date
pub fn connect(config: &Config) -> Result<Pool> {
	let manager = ConnectionManager::<SqliteConnection>::new(&config.database_url);
	let pool = r2d2::Pool::builder()
		.max_size(config.pool_size)
		.build(manager)?;

	migrate(&pool)?;
	info!(target: "db", "opened {} ({} connections)", config.database_url, config.pool_size);
	Ok(pool)
}

/// Open a fresh in-memory database, isolated from every other one in the process
///
/// The database only exists while its single connection is open, so the pool
/// never retires it.
pub fn in_memory() -> Result<Pool> {
	let db_id = MEMORY_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
	let url = format!("file:debt_tracker_{}?mode=memory&cache=shared", db_id);

	let manager = ConnectionManager::<SqliteConnection>::new(url);
	let pool = r2d2::Pool::builder()
		.max_size(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.build(manager)?;

	migrate(&pool)?;
	Ok(pool)
}

fn migrate(pool: &Pool) -> Result<()> {
	let mut pooled = pool.get()?;
	let conn: &mut SqliteConnection = &mut pooled;
	let applied = conn
		.run_pending_migrations(MIGRATIONS)
		.map_err(|e| Error::Migration(e.to_string()))?;
	for version in applied {
		debug!(target: "db", "applied migration {}", version);
	}
	Ok(())
}

/// Error that can occur when querying against the database
#[derive(Debug, PartialEq)]
pub enum Error {
	RecordAlreadyExists,
	RecordNotFound,
	Connection(String),
	Configuration(String),
	Migration(String),
	/// Used as a catch-all for other diesel errors
	Query(String),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Error::RecordAlreadyExists => write!(f, "record violates a unique constraint"),
			Error::RecordNotFound => write!(f, "record does not exist"),
			Error::Connection(e) => write!(f, "opening database connection: {}", e),
			Error::Configuration(e) => write!(f, "database configuration: {}", e),
			Error::Migration(e) => write!(f, "running migrations: {}", e),
			Error::Query(e) => write!(f, "database error: {}", e),
		}
	}
}

impl std::error::Error for Error {}

impl From<diesel::result::Error> for Error {
	fn from(e: diesel::result::Error) -> Self {
		match e {
			DatabaseError(UniqueViolation, _) => Error::RecordAlreadyExists,
			NotFound => Error::RecordNotFound,

			_ => Error::Query(e.to_string()),
		}
	}
}

impl From<r2d2::Error> for Error {
	fn from(e: r2d2::Error) -> Self {
		Error::Connection(e.to_string())
	}
}

/// Turns `RecordNotFound` into `None` for lookups where absence is not an error
pub trait OptionalRecord<T> {
	fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalRecord<T> for Result<T> {
	fn optional(self) -> Result<Option<T>> {
		match self {
			Ok(v) => Ok(Some(v)),
			Err(Error::RecordNotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use diesel::prelude::*;

	use crate::schema::{loans, payments, people};

	use super::*;

	fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let vars: HashMap<String, String> = vars.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |key| vars.get(key).cloned()
	}

	#[test]
	fn connection() {
		let pool = in_memory().unwrap();
		let conn: &mut SqliteConnection = &mut pool.get().expect("get a db connection");

		let count: i64 = people::table.count().get_result(conn).unwrap();
		assert_eq!(count, 0);
		let count: i64 = loans::table.count().get_result(conn).unwrap();
		assert_eq!(count, 0);
		let count: i64 = payments::table.count().get_result(conn).unwrap();
		assert_eq!(count, 0);
	}

	#[test]
	fn in_memory_databases_are_isolated() {
		let first = in_memory().unwrap();
		let second = in_memory().unwrap();

		diesel::insert_into(people::table)
			.values(people::name.eq("Bob"))
			.execute(&mut *first.get().unwrap())
			.unwrap();

		let count: i64 = people::table.count().get_result(&mut *second.get().unwrap()).unwrap();
		assert_eq!(count, 0);
	}

	#[test]
	fn config_defaults_pool_size() {
		let config = Config::from_lookup(lookup(&[("DATABASE_URL", "ledger.sqlite")])).unwrap();
		assert_eq!(config, Config { database_url: "ledger.sqlite".to_string(), pool_size: 4 });
	}

	#[test]
	fn config_requires_database_url() {
		let err = Config::from_lookup(lookup(&[])).unwrap_err();
		assert_eq!(err, Error::Configuration("DATABASE_URL must be set".to_string()));
	}

	#[test]
	fn config_rejects_bad_pool_size() {
		for raw in ["0", "-1", "many"] {
			let err = Config::from_lookup(lookup(&[
				("DATABASE_URL", "ledger.sqlite"),
				("DATABASE_POOL_SIZE", raw),
			])).unwrap_err();
			assert!(matches!(err, Error::Configuration(_)), "{:?}", err);
		}
	}

	#[test]
	fn missing_record_is_none() {
		let found: Result<i32> = Err(Error::RecordNotFound);
		assert_eq!(found.optional(), Ok(None));

		let failed: Result<i32> = Err(Error::Query("boom".to_string()));
		assert_eq!(failed.optional(), Err(Error::Query("boom".to_string())));
	}
}
