#![forbid(unsafe_code)]

use crate::{StoreError, now_ms};
use lb_core::{ChildKind, TEXT_COLUMNS};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;

pub const SCHEMA_VERSION: i64 = 1;

// Must run outside a transaction: SQLite ignores `foreign_keys` inside one.
const PRAGMAS: &str = r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;
"#;

const CORE: &str = r#"
        CREATE TABLE IF NOT EXISTS store_state (
          singleton INTEGER PRIMARY KEY CHECK(singleton = 1),
          schema_version INTEGER NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          name TEXT PRIMARY KEY,
          value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS contract_types (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL CHECK(length(name) BETWEEN 1 AND 100)
        );

        CREATE TABLE IF NOT EXISTS contacts (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL CHECK(length(name) BETWEEN 1 AND 200)
        );

        CREATE TABLE IF NOT EXISTS currencies (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          code TEXT NOT NULL UNIQUE CHECK(length(code) BETWEEN 1 AND 16),
          name TEXT
        );

        CREATE TABLE IF NOT EXISTS retired_contract_ids (
          id INTEGER PRIMARY KEY,
          retired_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS contract_events (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          ts_ms INTEGER NOT NULL,
          contract_id INTEGER NOT NULL,
          type TEXT NOT NULL,
          payload_json TEXT NOT NULL
        );
"#;

const MAPPINGS: &str = r#"
        CREATE TABLE IF NOT EXISTS contract_subcontract_mappings (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          parent_contract_id INTEGER NOT NULL REFERENCES contracts(id),
          sub_contract_id INTEGER NOT NULL UNIQUE REFERENCES contracts(id),
          created_at_ms INTEGER NOT NULL,
          CHECK(parent_contract_id <> sub_contract_id)
        );
"#;

// Only the primary key, the entity id, and the four relationship columns below are
// indexed. Lookups by any other column scan the table.
const INDEXES: &str = r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_contracts_entity_id ON contracts(entity_id);
        CREATE INDEX IF NOT EXISTS idx_contracts_contracted_party ON contracts(contracted_party_id, insert_seq);
        CREATE INDEX IF NOT EXISTS idx_contracts_currency ON contracts(currency_id, insert_seq);
        CREATE INDEX IF NOT EXISTS idx_contracts_contract_type ON contracts(contract_type_id, insert_seq);
        CREATE INDEX IF NOT EXISTS idx_contracts_vendor ON contracts(vendor_id, insert_seq);
        CREATE INDEX IF NOT EXISTS idx_subcontract_mappings_parent
          ON contract_subcontract_mappings(parent_contract_id, id);
        CREATE INDEX IF NOT EXISTS idx_contract_events_contract ON contract_events(contract_id, seq);
"#;

fn contracts_sql() -> String {
    let mut text_columns = String::new();
    for column in TEXT_COLUMNS {
        text_columns.push_str(&format!(
            "          {name} TEXT CHECK({name} IS NULL OR length({name}) <= {max}),\n",
            name = column.name,
            max = column.max_chars
        ));
    }

    // Decimals are canonical TEXT: a NUMERIC column would coerce them to REAL.
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS contracts (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          insert_seq INTEGER NOT NULL,
          entity_id BLOB CHECK(entity_id IS NULL OR length(entity_id) = 16),
          contract_type_id INTEGER REFERENCES contract_types(id),
          vendor_id INTEGER REFERENCES contacts(id),
          contracted_party_id INTEGER REFERENCES contacts(id),
          currency_id INTEGER REFERENCES currencies(id),
          cloned_from_contract_id INTEGER REFERENCES contracts(id),
          treasury_approver_id INTEGER,
{text_columns}          notes TEXT,
          is_receivable INTEGER CHECK(is_receivable IN (0, 1)),
          is_archived INTEGER CHECK(is_archived IN (0, 1)),
          is_in_holdover INTEGER CHECK(is_in_holdover IN (0, 1)),
          is_broken INTEGER CHECK(is_broken IN (0, 1)),
          is_partial_building INTEGER CHECK(is_partial_building IN (0, 1)),
          eol_take_ownership INTEGER CHECK(eol_take_ownership IN (0, 1)),
          force_review INTEGER CHECK(force_review IN (0, 1)),
          net_equivalent_factor TEXT,
          original_purchase_price TEXT,
          initial_prepayment TEXT,
          calculated_restoring_rate TEXT,
          termination_cost TEXT,
          make_good_date_of_obligation TEXT,
          lease_accounting_start_date TEXT,
          archived_date TEXT,
          holdover_start_date TEXT,
          termination_date TEXT,
          manual_override INTEGER,
          useful_life INTEGER CHECK(useful_life IS NULL OR useful_life >= 0),
          CHECK(cloned_from_contract_id IS NULL OR cloned_from_contract_id <> id)
        );
"#
    )
}

fn child_table_sql(kind: ChildKind) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          contract_id INTEGER NOT NULL REFERENCES contracts(id),
          payload_json TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_{table}_contract ON {table}(contract_id, id);
"#,
        table = kind.table()
    )
}

pub(crate) fn full_schema_sql() -> String {
    let mut sql = String::new();
    sql.push_str(CORE);
    sql.push_str(&contracts_sql());
    for kind in ChildKind::ALL {
        sql.push_str(&child_table_sql(kind));
    }
    sql.push_str(MAPPINGS);
    sql.push_str(INDEXES);
    sql
}

fn required_tables() -> BTreeSet<&'static str> {
    let mut tables: BTreeSet<&'static str> = [
        "store_state",
        "counters",
        "contract_types",
        "contacts",
        "currencies",
        "retired_contract_ids",
        "contract_events",
        "contracts",
        "contract_subcontract_mappings",
    ]
    .into_iter()
    .collect();
    tables.extend(ChildKind::ALL.map(ChildKind::table));
    tables
}

/// Refuses databases that were not created by this schema version. An empty
/// database passes and gets the schema installed.
pub(crate) fn preflight_gate(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let mut rows = stmt.query([])?;
    let mut tables = BTreeSet::new();
    while let Some(row) = rows.next()? {
        tables.insert(row.get::<_, String>(0)?);
    }

    if tables.is_empty() {
        return Ok(());
    }

    let required = required_tables();
    if tables
        .iter()
        .any(|table| !required.contains(table.as_str()))
    {
        return Err(StoreError::invalid(
            "RESET_REQUIRED: unsupported tables detected",
        ));
    }
    if required.iter().any(|table| !tables.contains(*table)) {
        return Err(StoreError::invalid(
            "RESET_REQUIRED: required table is missing",
        ));
    }

    let version = conn
        .query_row(
            "SELECT schema_version FROM store_state WHERE singleton=1",
            [],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    match version {
        Some(v) if v == SCHEMA_VERSION => Ok(()),
        Some(_) => Err(StoreError::invalid(
            "RESET_REQUIRED: schema version mismatch",
        )),
        None => Err(StoreError::invalid(
            "RESET_REQUIRED: schema state row is missing",
        )),
    }
}

pub(crate) fn apply_pragmas(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(PRAGMAS)?;
    Ok(())
}

pub(crate) fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(&full_schema_sql())?;
    let now_ms = now_ms();
    conn.execute(
        "INSERT INTO store_state(singleton, schema_version, created_at_ms, updated_at_ms) \
         VALUES (1, ?1, ?2, ?2) \
         ON CONFLICT(singleton) DO UPDATE SET updated_at_ms=excluded.updated_at_ms",
        params![SCHEMA_VERSION, now_ms],
    )?;
    Ok(())
}
