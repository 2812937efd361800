#![forbid(unsafe_code)]

use crate::contracts::contract_exists;
use crate::events::insert_event_tx;
use crate::{SqliteStore, StoreError, Violation, count_to_u64, now_ms, sqlite_count, traced};
use lb_core::ChildKind;
use lb_core::ids::{ChildId, ContractId};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::json;
use std::collections::VecDeque;
use tracing::debug;

/// A row of one of the contract's owned collections. The column layout of
/// each kind belongs to the services that author it; the store keeps it as a
/// JSON object.
#[derive(Clone, Debug, PartialEq)]
pub struct ChildRow {
    pub id: ChildId,
    pub kind: ChildKind,
    pub contract_id: ContractId,
    pub payload: serde_json::Value,
    pub created_at_ms: i64,
}

fn child_from_row(kind: ChildKind, row: &Row<'_>) -> Result<ChildRow, StoreError> {
    let id = ChildId::try_new(row.get(0)?)
        .map_err(|_| StoreError::invalid("invalid child id in storage"))?;
    let contract_id = ContractId::try_new(row.get(1)?)
        .map_err(|_| StoreError::invalid("invalid contract id in storage"))?;
    let payload_json: String = row.get(2)?;
    let payload = serde_json::from_str(&payload_json)
        .map_err(|_| StoreError::invalid("child payload is not valid JSON"))?;
    Ok(ChildRow {
        id,
        kind,
        contract_id,
        payload,
        created_at_ms: row.get(3)?,
    })
}

/// Lazy, finite walk over one contract's rows of one kind, ordered by child id.
///
/// Pages are fetched on demand with `id > last_seen`, so no statement stays
/// open between calls to `next`. `rewind` restarts from the first row.
pub struct ChildCursor<'a> {
    conn: &'a Connection,
    kind: ChildKind,
    contract_id: ContractId,
    page_size: usize,
    after_id: i64,
    buffer: VecDeque<ChildRow>,
    exhausted: bool,
}

impl<'a> ChildCursor<'a> {
    fn new(
        conn: &'a Connection,
        kind: ChildKind,
        contract_id: ContractId,
        page_size: usize,
    ) -> Self {
        Self {
            conn,
            kind,
            contract_id,
            page_size,
            after_id: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn kind(&self) -> ChildKind {
        self.kind
    }

    pub fn contract_id(&self) -> ContractId {
        self.contract_id
    }

    pub fn rewind(&mut self) {
        self.after_id = 0;
        self.buffer.clear();
        self.exhausted = false;
    }

    fn fill(&mut self) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, contract_id, payload_json, created_at_ms FROM {} \
             WHERE contract_id = ?1 AND id > ?2 ORDER BY id ASC LIMIT ?3",
            self.kind.table()
        ))?;
        let mut rows = stmt.query(params![
            self.contract_id.get(),
            self.after_id,
            sqlite_count(self.page_size)
        ])?;
        let mut fetched = 0usize;
        while let Some(row) = rows.next()? {
            let child = child_from_row(self.kind, row)?;
            self.after_id = child.id.get();
            self.buffer.push_back(child);
            fetched += 1;
        }
        if fetched < self.page_size {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl Iterator for ChildCursor<'_> {
    type Item = Result<ChildRow, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

impl SqliteStore {
    /// Appends a row to one of the contract's owned collections. `payload` must
    /// be a JSON object.
    pub fn add_child(
        &mut self,
        kind: ChildKind,
        contract_id: ContractId,
        payload: serde_json::Value,
    ) -> Result<ChildRow, StoreError> {
        traced("add_child", self.add_child_inner(kind, contract_id, payload))
    }

    fn add_child_inner(
        &mut self,
        kind: ChildKind,
        contract_id: ContractId,
        payload: serde_json::Value,
    ) -> Result<ChildRow, StoreError> {
        if !payload.is_object() {
            return Err(StoreError::invalid("child payload must be a JSON object"));
        }
        let now_ms = now_ms();

        let tx = self.write_tx()?;
        if !contract_exists(&tx, contract_id)? {
            return Err(StoreError::ConstraintViolation(
                Violation::UnresolvedReference {
                    field: "contract_id",
                    id: contract_id.get(),
                },
            ));
        }
        tx.execute(
            &format!(
                "INSERT INTO {}(contract_id, payload_json, created_at_ms) VALUES (?1, ?2, ?3)",
                kind.table()
            ),
            params![contract_id.get(), payload.to_string(), now_ms],
        )?;
        let id = ChildId::try_new(tx.last_insert_rowid())
            .map_err(|_| StoreError::invalid("store assigned a non-positive child id"))?;
        insert_event_tx(
            &tx,
            now_ms,
            contract_id,
            "contract.child_added",
            json!({ "kind": kind.as_str(), "child_id": id.get() }),
        )?;
        tx.commit()?;

        debug!(%contract_id, kind = kind.as_str(), child_id = %id, "child row added");
        Ok(ChildRow {
            id,
            kind,
            contract_id,
            payload,
            created_at_ms: now_ms,
        })
    }

    pub fn get_child(&self, kind: ChildKind, id: ChildId) -> Result<ChildRow, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, contract_id, payload_json, created_at_ms FROM {} WHERE id = ?1",
            kind.table()
        ))?;
        let mut rows = stmt.query(params![id.get()])?;
        match rows.next()? {
            Some(row) => child_from_row(kind, row),
            None => Err(StoreError::NotFound),
        }
    }

    pub fn remove_child(&mut self, kind: ChildKind, id: ChildId) -> Result<(), StoreError> {
        let now_ms = now_ms();
        let tx = self.write_tx()?;
        let contract_id = tx
            .query_row(
                &format!("SELECT contract_id FROM {} WHERE id = ?1", kind.table()),
                params![id.get()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound)?;
        let contract_id = ContractId::try_new(contract_id)
            .map_err(|_| StoreError::invalid("invalid contract id in storage"))?;
        tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
            params![id.get()],
        )?;
        insert_event_tx(
            &tx,
            now_ms,
            contract_id,
            "contract.child_removed",
            json!({ "kind": kind.as_str(), "child_id": id.get() }),
        )?;
        tx.commit()?;
        debug!(%contract_id, kind = kind.as_str(), child_id = %id, "child row removed");
        Ok(())
    }

    pub fn child_count(&self, contract_id: ContractId, kind: ChildKind) -> Result<u64, StoreError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE contract_id = ?1", kind.table()),
            params![contract_id.get()],
            |row| row.get(0),
        )?;
        Ok(count_to_u64(count))
    }

    /// Owned rows of `kind`, fetched lazily in pages of
    /// [`StoreConfig::child_page_size`](crate::StoreConfig::child_page_size).
    pub fn children(
        &self,
        contract_id: ContractId,
        kind: ChildKind,
    ) -> Result<ChildCursor<'_>, StoreError> {
        if !contract_exists(&self.conn, contract_id)? {
            return Err(StoreError::NotFound);
        }
        Ok(ChildCursor::new(
            &self.conn,
            kind,
            contract_id,
            self.config.child_page_size,
        ))
    }
}
