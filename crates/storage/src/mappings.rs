#![forbid(unsafe_code)]

use crate::codec::{CONTRACT_COLUMNS, contract_from_row};
use crate::contracts::{contract_exists, get_contract};
use crate::events::insert_event_tx;
use crate::{SqliteStore, StoreError, Violation, constraint_message, now_ms, traced};
use lb_core::ContractRecord;
use lb_core::ids::ContractId;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::json;
use std::collections::HashSet;
use tracing::debug;

/// Parent/sub-contract link. The hierarchy lives only in this table; contract
/// rows carry no parent column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubcontractMapping {
    pub id: i64,
    pub parent_contract_id: ContractId,
    pub sub_contract_id: ContractId,
    pub created_at_ms: i64,
}

fn parent_id(conn: &Connection, sub: ContractId) -> Result<Option<ContractId>, StoreError> {
    let raw = conn
        .query_row(
            "SELECT parent_contract_id FROM contract_subcontract_mappings WHERE sub_contract_id = ?1",
            params![sub.get()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    raw.map(|raw| {
        ContractId::try_new(raw).map_err(|_| StoreError::invalid("invalid parent id in storage"))
    })
    .transpose()
}

/// True when `sub` already sits above `parent`, i.e. linking them would loop.
fn closes_cycle(
    conn: &Connection,
    parent: ContractId,
    sub: ContractId,
) -> Result<bool, StoreError> {
    let mut seen = HashSet::new();
    let mut cursor = Some(parent);
    while let Some(current) = cursor {
        if current == sub {
            return Ok(true);
        }
        if !seen.insert(current) {
            return Ok(true);
        }
        cursor = parent_id(conn, current)?;
    }
    Ok(false)
}

impl SqliteStore {
    pub fn map_subcontract(
        &mut self,
        parent: ContractId,
        sub: ContractId,
    ) -> Result<SubcontractMapping, StoreError> {
        traced("map_subcontract", self.map_subcontract_inner(parent, sub))
    }

    fn map_subcontract_inner(
        &mut self,
        parent: ContractId,
        sub: ContractId,
    ) -> Result<SubcontractMapping, StoreError> {
        if parent == sub {
            return Err(StoreError::ConstraintViolation(Violation::SelfReference {
                field: "sub_contract_id",
            }));
        }
        let now_ms = now_ms();

        let tx = self.write_tx()?;
        for (field, id) in [("parent_contract_id", parent), ("sub_contract_id", sub)] {
            if !contract_exists(&tx, id)? {
                return Err(StoreError::ConstraintViolation(
                    Violation::UnresolvedReference { field, id: id.get() },
                ));
            }
        }
        if parent_id(&tx, sub)?.is_some() {
            return Err(StoreError::ConstraintViolation(Violation::AlreadyMapped));
        }
        if closes_cycle(&tx, parent, sub)? {
            return Err(StoreError::ConstraintViolation(Violation::MappingCycle));
        }

        tx.execute(
            "INSERT INTO contract_subcontract_mappings(parent_contract_id, sub_contract_id, created_at_ms) \
             VALUES (?1, ?2, ?3)",
            params![parent.get(), sub.get(), now_ms],
        )
        .map_err(|err| match constraint_message(&err) {
            Some(message) if message.contains("sub_contract_id") => {
                StoreError::ConstraintViolation(Violation::AlreadyMapped)
            }
            _ => StoreError::Sql(err),
        })?;
        let id = tx.last_insert_rowid();
        insert_event_tx(
            &tx,
            now_ms,
            parent,
            "contract.subcontract_mapped",
            json!({ "sub_contract_id": sub.get() }),
        )?;
        tx.commit()?;

        debug!(parent_contract_id = %parent, sub_contract_id = %sub, "sub-contract mapped");
        Ok(SubcontractMapping {
            id,
            parent_contract_id: parent,
            sub_contract_id: sub,
            created_at_ms: now_ms,
        })
    }

    /// Detaches `sub` from its parent. `NotFound` when it has none.
    pub fn unmap_subcontract(&mut self, sub: ContractId) -> Result<(), StoreError> {
        let now_ms = now_ms();
        let tx = self.write_tx()?;
        let parent = parent_id(&tx, sub)?.ok_or(StoreError::NotFound)?;
        tx.execute(
            "DELETE FROM contract_subcontract_mappings WHERE sub_contract_id = ?1",
            params![sub.get()],
        )?;
        insert_event_tx(
            &tx,
            now_ms,
            parent,
            "contract.subcontract_unmapped",
            json!({ "sub_contract_id": sub.get() }),
        )?;
        tx.commit()?;
        debug!(parent_contract_id = %parent, sub_contract_id = %sub, "sub-contract unmapped");
        Ok(())
    }

    /// Direct sub-contracts of `id`, in mapping order.
    pub fn subcontracts_of(&self, id: ContractId) -> Result<Vec<ContractRecord>, StoreError> {
        if !contract_exists(&self.conn, id)? {
            return Err(StoreError::NotFound);
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts \
             JOIN (SELECT id AS mapping_id, sub_contract_id FROM contract_subcontract_mappings \
                   WHERE parent_contract_id = ?1) m ON m.sub_contract_id = contracts.id \
             ORDER BY m.mapping_id ASC"
        ))?;
        let mut rows = stmt.query(params![id.get()])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(contract_from_row(row)?);
        }
        Ok(out)
    }

    pub fn parent_of(&self, id: ContractId) -> Result<Option<ContractRecord>, StoreError> {
        if !contract_exists(&self.conn, id)? {
            return Err(StoreError::NotFound);
        }
        match parent_id(&self.conn, id)? {
            Some(parent) => get_contract(&self.conn, parent),
            None => Ok(None),
        }
    }
}
