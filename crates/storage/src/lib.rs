#![forbid(unsafe_code)]

//! SQLite-backed store for contract records and their relationship graph.
//!
//! Every mutation runs in one `BEGIN IMMEDIATE` transaction: uniqueness,
//! foreign-key and precision checks are evaluated inside it, and any error
//! rolls the whole write back. Open one `SqliteStore` per thread; several stores
//! may share a storage directory.

mod cancel;
mod children;
mod codec;
mod config;
mod contracts;
mod error;
mod events;
mod mappings;
mod references;
mod schema;

pub use cancel::CancelToken;
pub use children::{ChildCursor, ChildRow};
pub use config::{
    BUSY_TIMEOUT_ENV, CHILD_PAGE_SIZE_ENV, DELETE_POLICY_ENV, DeletePolicy, STORAGE_DIR_ENV,
    StoreConfig,
};
pub use contracts::{DeleteOutcome, IndexKey, MAX_EXPLICIT_CONTRACT_ID};
pub use error::{StoreError, Violation};
pub use events::EventRow;
pub use mappings::SubcontractMapping;
pub use references::{Contact, ContractType, Currency};
pub use schema::SCHEMA_VERSION;

use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DB_FILE_NAME: &str = "leasebook.db";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    config: StoreConfig,
}

impl SqliteStore {
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        std::fs::create_dir_all(&config.storage_dir)?;

        let db_path = config.storage_dir.join(DB_FILE_NAME);
        let mut conn = Connection::open(&db_path)?;
        conn.busy_timeout(config.busy_timeout)?;
        schema::apply_pragmas(&conn)?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        schema::preflight_gate(&tx)?;
        schema::install_schema(&tx)?;
        tx.commit()?;

        info!(
            path = %db_path.display(),
            schema_version = SCHEMA_VERSION,
            delete_policy = config.delete_policy.as_str(),
            "contract store opened"
        );
        Ok(Self { conn, config })
    }

    /// Opens with [`StoreConfig::from_env`], using `default_storage_dir` when
    /// `LEASEBOOK_STORAGE_DIR` is unset.
    pub fn open_default(default_storage_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open(StoreConfig::from_env(default_storage_dir)?)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn storage_dir(&self) -> &Path {
        &self.config.storage_dir
    }

    pub fn delete_policy(&self) -> DeletePolicy {
        self.config.delete_policy
    }

    fn write_tx(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

/// Logs refused writes. Constraint violations are expected outcomes, not faults,
/// so they are reported once here and returned unchanged.
fn traced<T>(op: &'static str, result: Result<T, StoreError>) -> Result<T, StoreError> {
    if let Err(StoreError::ConstraintViolation(violation)) = &result {
        warn!(op, %violation, "write refused");
    }
    result
}

fn next_counter_tx(tx: &Transaction<'_>, name: &str) -> Result<i64, StoreError> {
    let current: i64 = tx
        .query_row(
            "SELECT value FROM counters WHERE name=?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    let next = current + 1;
    tx.execute(
        "INSERT INTO counters(name, value) VALUES (?1, ?2) \
         ON CONFLICT(name) DO UPDATE SET value=excluded.value",
        params![name, next],
    )?;
    Ok(next)
}

/// Message of a SQLite constraint failure, if `err` is one.
fn constraint_message(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(code, message)
            if code.code == ErrorCode::ConstraintViolation =>
        {
            Some(message.as_deref().unwrap_or(""))
        }
        _ => None,
    }
}

/// Row counts for `LIMIT`/`OFFSET`. Values past `i64::MAX` saturate, so
/// `usize::MAX` reads as "no limit".
fn sqlite_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn count_to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration,
        Err(_) => return 0,
    };

    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
