#![forbid(unsafe_code)]

use crate::{SqliteStore, StoreError, sqlite_count};
use lb_core::ids::ContractId;
use rusqlite::{Connection, Transaction, params};

/// One committed mutation in the change log. Rows are kept after the contract
/// they describe is deleted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRow {
    pub seq: i64,
    pub ts_ms: i64,
    pub contract_id: ContractId,
    pub event_type: String,
    pub payload_json: String,
}

impl EventRow {
    pub fn event_id(&self) -> String {
        format!("evt_{:016}", self.seq)
    }

    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.payload_json)
    }
}

pub(crate) fn insert_event_tx(
    tx: &Transaction<'_>,
    ts_ms: i64,
    contract_id: ContractId,
    event_type: &str,
    payload: serde_json::Value,
) -> Result<i64, StoreError> {
    tx.execute(
        "INSERT INTO contract_events(ts_ms, contract_id, type, payload_json) VALUES (?1, ?2, ?3, ?4)",
        params![ts_ms, contract_id.get(), event_type, payload.to_string()],
    )?;
    Ok(tx.last_insert_rowid())
}

fn query_events(
    conn: &Connection,
    sql: &str,
    key: i64,
    limit: usize,
) -> Result<Vec<EventRow>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params![key, sqlite_count(limit)])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let contract_id = ContractId::try_new(row.get::<_, i64>(2)?)
            .map_err(|_| StoreError::invalid("invalid contract id in event row"))?;
        out.push(EventRow {
            seq: row.get(0)?,
            ts_ms: row.get(1)?,
            contract_id,
            event_type: row.get(3)?,
            payload_json: row.get(4)?,
        });
    }
    Ok(out)
}

impl SqliteStore {
    /// Events with `seq > since_seq`, oldest first.
    pub fn list_events(&self, since_seq: i64, limit: usize) -> Result<Vec<EventRow>, StoreError> {
        query_events(
            &self.conn,
            "SELECT seq, ts_ms, contract_id, type, payload_json \
             FROM contract_events WHERE seq > ?1 ORDER BY seq ASC LIMIT ?2",
            since_seq,
            limit,
        )
    }

    pub fn list_contract_events(
        &self,
        contract_id: ContractId,
        limit: usize,
    ) -> Result<Vec<EventRow>, StoreError> {
        query_events(
            &self.conn,
            "SELECT seq, ts_ms, contract_id, type, payload_json \
             FROM contract_events WHERE contract_id = ?1 ORDER BY seq ASC LIMIT ?2",
            contract_id.get(),
            limit,
        )
    }
}
