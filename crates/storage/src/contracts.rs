#![forbid(unsafe_code)]

use crate::codec::{
    CONTRACT_COLUMNS, EncodedFields, contract_from_row, insert_contract_sql, update_contract_sql,
};
use crate::events::insert_event_tx;
use crate::{
    CancelToken, DeletePolicy, SqliteStore, StoreError, Violation, constraint_message,
    count_to_u64, next_counter_tx, now_ms, sqlite_count, traced,
};
use lb_core::ids::{ContactId, ContractId, ContractTypeId, CurrencyId, EntityId};
use lb_core::{ChildKind, ContractFields, ContractPatch, ContractRecord, NewContract};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde_json::json;
use time::Date;
use tracing::debug;

const INSERT_SEQ_COUNTER: &str = "contract_insert_seq";

/// Largest id a caller may choose. Ids above it stay free for auto-assignment,
/// which can never go past the highest id ever stored.
pub const MAX_EXPLICIT_CONTRACT_ID: i64 = i64::MAX / 2;

/// The four indexed relationship columns. Each lookup returns matches in
/// insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexKey {
    Vendor(ContactId),
    ContractedParty(ContactId),
    Currency(CurrencyId),
    ContractType(ContractTypeId),
}

impl IndexKey {
    fn column(self) -> &'static str {
        match self {
            Self::Vendor(_) => "vendor_id",
            Self::ContractedParty(_) => "contracted_party_id",
            Self::Currency(_) => "currency_id",
            Self::ContractType(_) => "contract_type_id",
        }
    }

    fn value(self) -> i64 {
        match self {
            Self::Vendor(id) | Self::ContractedParty(id) => id.get(),
            Self::Currency(id) => id.get(),
            Self::ContractType(id) => id.get(),
        }
    }
}

/// What a cascading delete removed besides the contract row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub children_removed: u64,
    pub mappings_removed: u64,
    pub clones_detached: u64,
}

impl SqliteStore {
    /// Persists a new contract. The id is assigned when `contract.id` is `None`.
    pub fn create(&mut self, contract: NewContract) -> Result<ContractRecord, StoreError> {
        traced("create", self.create_inner(contract))
    }

    fn create_inner(&mut self, contract: NewContract) -> Result<ContractRecord, StoreError> {
        let NewContract { id, fields } = contract.validated()?;
        if let Some(id) = id
            && id.get() > MAX_EXPLICIT_CONTRACT_ID
        {
            return Err(StoreError::invalid(format!(
                "explicit id {id} exceeds {MAX_EXPLICIT_CONTRACT_ID}"
            )));
        }
        let encoded = EncodedFields::encode(&fields)?;
        let now_ms = now_ms();

        let tx = self.write_tx()?;
        if let Some(id) = id {
            if id_retired_tx(&tx, id)? {
                return Err(StoreError::ConstraintViolation(Violation::RetiredId));
            }
            if contract_exists(&tx, id)? {
                return Err(StoreError::ConstraintViolation(Violation::DuplicateId));
            }
        }
        if let Some(entity_id) = fields.entity_id {
            ensure_entity_id_free_tx(&tx, entity_id, None)?;
        }
        ensure_references_tx(&tx, &fields)?;

        let insert_seq = next_counter_tx(&tx, INSERT_SEQ_COUNTER)?;
        let raw_id = id.map(ContractId::get);
        let mut named = encoded.named();
        let sql = insert_contract_sql(&named);
        named.push((":id", &raw_id as &dyn ToSql));
        named.push((":insert_seq", &insert_seq as &dyn ToSql));
        tx.execute(&sql, named.as_slice())
            .map_err(map_write_conflict)?;

        let id = ContractId::try_new(tx.last_insert_rowid())
            .map_err(|_| StoreError::invalid("store assigned a non-positive id"))?;
        insert_event_tx(
            &tx,
            now_ms,
            id,
            "contract.created",
            json!({
                "entity_id": fields.entity_id.map(|value| value.to_string()),
                "insert_seq": insert_seq,
            }),
        )?;
        tx.commit()?;

        debug!(contract_id = %id, "contract created");
        Ok(ContractRecord { id, fields })
    }

    /// Applies `patch` to an existing contract. Only touched fields change;
    /// the result is validated as a whole before it is written.
    pub fn update(
        &mut self,
        id: ContractId,
        patch: &ContractPatch,
    ) -> Result<ContractRecord, StoreError> {
        traced("update", self.update_inner(id, patch))
    }

    fn update_inner(
        &mut self,
        id: ContractId,
        patch: &ContractPatch,
    ) -> Result<ContractRecord, StoreError> {
        if patch.is_empty() {
            return Err(StoreError::invalid("no fields to update"));
        }
        let now_ms = now_ms();

        let tx = self.write_tx()?;
        let Some(current) = get_contract(&tx, id)? else {
            return Err(StoreError::NotFound);
        };
        let updated = patch.apply(&current)?;

        if let Some(entity_id) = updated.fields.entity_id
            && current.fields.entity_id != Some(entity_id)
        {
            ensure_entity_id_free_tx(&tx, entity_id, Some(id))?;
        }
        ensure_references_tx(&tx, &updated.fields)?;

        let encoded = EncodedFields::encode(&updated.fields)?;
        let raw_id = id.get();
        let mut named = encoded.named();
        let sql = update_contract_sql(&named);
        named.push((":id", &raw_id as &dyn ToSql));
        tx.execute(&sql, named.as_slice())
            .map_err(map_write_conflict)?;

        let touched = patch.touched_fields();
        insert_event_tx(
            &tx,
            now_ms,
            id,
            "contract.updated",
            json!({ "fields": touched }),
        )?;
        tx.commit()?;

        debug!(contract_id = %id, fields = ?touched, "contract updated");
        Ok(updated)
    }

    /// Soft delete. Sets `is_archived` and `archived_date` through `update`.
    pub fn archive(&mut self, id: ContractId, date: Date) -> Result<ContractRecord, StoreError> {
        self.update(id, &ContractPatch::archive(date))
    }

    pub fn get(&self, id: ContractId) -> Result<ContractRecord, StoreError> {
        get_contract(&self.conn, id)?.ok_or(StoreError::NotFound)
    }

    /// Exact match through the unique `entity_id` index.
    pub fn find_by_entity_id(&self, entity_id: EntityId) -> Result<ContractRecord, StoreError> {
        let sql = format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE entity_id = ?1");
        self.conn
            .query_row(&sql, params![entity_id.as_bytes().as_slice()], contract_from_row)
            .optional()?
            .ok_or(StoreError::NotFound)
    }

    /// Indexed lookup, in insertion order. Checks `cancel` before every row and
    /// holds only a shared read snapshot while it runs.
    pub fn list_by(
        &self,
        key: IndexKey,
        cancel: &CancelToken,
    ) -> Result<Vec<ContractRecord>, StoreError> {
        let sql = format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE {} = ?1 ORDER BY insert_seq ASC",
            key.column()
        );
        scan(&self.conn, &sql, &[&key.value()], cancel)
    }

    pub fn list_by_vendor(&self, vendor_id: ContactId) -> Result<Vec<ContractRecord>, StoreError> {
        self.list_by(IndexKey::Vendor(vendor_id), &CancelToken::new())
    }

    pub fn list_by_contracted_party(
        &self,
        party_id: ContactId,
    ) -> Result<Vec<ContractRecord>, StoreError> {
        self.list_by(IndexKey::ContractedParty(party_id), &CancelToken::new())
    }

    pub fn list_by_currency(
        &self,
        currency_id: CurrencyId,
    ) -> Result<Vec<ContractRecord>, StoreError> {
        self.list_by(IndexKey::Currency(currency_id), &CancelToken::new())
    }

    pub fn list_by_type(
        &self,
        type_id: ContractTypeId,
    ) -> Result<Vec<ContractRecord>, StoreError> {
        self.list_by(IndexKey::ContractType(type_id), &CancelToken::new())
    }

    /// Page through all contracts by id.
    pub fn list_contracts(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ContractRecord>, StoreError> {
        let sql = format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts ORDER BY id ASC LIMIT ?1 OFFSET ?2"
        );
        scan(
            &self.conn,
            &sql,
            &[&sqlite_count(limit), &sqlite_count(offset)],
            &CancelToken::new(),
        )
    }

    /// Full table scan: `reference_no` is not indexed.
    pub fn find_by_reference_no(
        &self,
        reference_no: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<ContractRecord>, StoreError> {
        let sql = format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE reference_no = ?1 ORDER BY insert_seq ASC"
        );
        scan(&self.conn, &sql, &[&reference_no], cancel)
    }

    /// Contracts cloned from `id`. Full table scan: `cloned_from_contract_id` is
    /// not indexed.
    pub fn clones_of(
        &self,
        id: ContractId,
        cancel: &CancelToken,
    ) -> Result<Vec<ContractRecord>, StoreError> {
        let sql = format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts \
             WHERE cloned_from_contract_id = ?1 ORDER BY insert_seq ASC"
        );
        scan(&self.conn, &sql, &[&id.get()], cancel)
    }

    /// Deletes a contract under the configured [`DeletePolicy`]. The id is
    /// retired and never handed out again.
    pub fn delete(&mut self, id: ContractId) -> Result<DeleteOutcome, StoreError> {
        traced("delete", self.delete_inner(id))
    }

    fn delete_inner(&mut self, id: ContractId) -> Result<DeleteOutcome, StoreError> {
        let policy = self.config.delete_policy;
        let now_ms = now_ms();

        let tx = self.write_tx()?;
        if !contract_exists(&tx, id)? {
            return Err(StoreError::NotFound);
        }

        let children = count_children_tx(&tx, id)?;
        let child_rows: u64 = children.iter().map(|(_, count)| count).sum();
        let mappings = count_mappings_tx(&tx, id)?;
        let clones = count_clones_tx(&tx, id)?;

        if policy == DeletePolicy::Restrict && (child_rows > 0 || mappings > 0 || clones > 0) {
            return Err(StoreError::ConstraintViolation(Violation::DependentRows {
                children,
                mappings,
                clones,
            }));
        }

        for (kind, _) in &children {
            tx.execute(
                &format!("DELETE FROM {} WHERE contract_id = ?1", kind.table()),
                params![id.get()],
            )?;
        }
        let mappings_removed = tx.execute(
            "DELETE FROM contract_subcontract_mappings \
             WHERE parent_contract_id = ?1 OR sub_contract_id = ?1",
            params![id.get()],
        )?;
        let clones_detached = tx.execute(
            "UPDATE contracts SET cloned_from_contract_id = NULL WHERE cloned_from_contract_id = ?1",
            params![id.get()],
        )?;
        tx.execute("DELETE FROM contracts WHERE id = ?1", params![id.get()])?;
        tx.execute(
            "INSERT INTO retired_contract_ids(id, retired_at_ms) VALUES (?1, ?2)",
            params![id.get(), now_ms],
        )?;

        let outcome = DeleteOutcome {
            children_removed: child_rows,
            mappings_removed: mappings_removed as u64,
            clones_detached: clones_detached as u64,
        };
        insert_event_tx(
            &tx,
            now_ms,
            id,
            "contract.deleted",
            json!({
                "policy": policy.as_str(),
                "children_removed": outcome.children_removed,
                "mappings_removed": outcome.mappings_removed,
                "clones_detached": outcome.clones_detached,
            }),
        )?;
        tx.commit()?;

        debug!(contract_id = %id, ?outcome, "contract deleted");
        Ok(outcome)
    }
}

fn scan(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
    cancel: &CancelToken,
) -> Result<Vec<ContractRecord>, StoreError> {
    cancel.check()?;
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        cancel.check()?;
        out.push(contract_from_row(row)?);
    }
    Ok(out)
}

pub(crate) fn get_contract(
    conn: &Connection,
    id: ContractId,
) -> Result<Option<ContractRecord>, StoreError> {
    let sql = format!("SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id.get()], contract_from_row)
        .optional()?)
}

pub(crate) fn contract_exists(conn: &Connection, id: ContractId) -> Result<bool, StoreError> {
    row_exists(conn, "contracts", id.get())
}

fn row_exists(conn: &Connection, table: &'static str, id: i64) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE id = ?1"),
            params![id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

fn id_retired_tx(tx: &Transaction<'_>, id: ContractId) -> Result<bool, StoreError> {
    row_exists(tx, "retired_contract_ids", id.get())
}

fn ensure_entity_id_free_tx(
    tx: &Transaction<'_>,
    entity_id: EntityId,
    except: Option<ContractId>,
) -> Result<(), StoreError> {
    let holder = tx
        .query_row(
            "SELECT id FROM contracts WHERE entity_id = ?1",
            params![entity_id.as_bytes().as_slice()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    match holder {
        Some(holder) if Some(holder) != except.map(ContractId::get) => Err(
            StoreError::ConstraintViolation(Violation::DuplicateEntityId),
        ),
        _ => Ok(()),
    }
}

/// Every enforced foreign key must resolve. `treasury_approver_id` is a weak
/// reference and is not checked.
fn ensure_references_tx(tx: &Transaction<'_>, fields: &ContractFields) -> Result<(), StoreError> {
    let references: [(&'static str, &'static str, Option<i64>); 5] = [
        (
            "contract_type_id",
            "contract_types",
            fields.contract_type_id.map(ContractTypeId::get),
        ),
        ("vendor_id", "contacts", fields.vendor_id.map(ContactId::get)),
        (
            "contracted_party_id",
            "contacts",
            fields.contracted_party_id.map(ContactId::get),
        ),
        ("currency_id", "currencies", fields.currency_id.map(CurrencyId::get)),
        (
            "cloned_from_contract_id",
            "contracts",
            fields.cloned_from_contract_id.map(ContractId::get),
        ),
    ];
    for (field, table, id) in references {
        if let Some(id) = id
            && !row_exists(tx, table, id)?
        {
            return Err(StoreError::ConstraintViolation(
                Violation::UnresolvedReference { field, id },
            ));
        }
    }
    Ok(())
}

fn count_children_tx(
    tx: &Transaction<'_>,
    id: ContractId,
) -> Result<Vec<(ChildKind, u64)>, StoreError> {
    let mut out = Vec::new();
    for kind in ChildKind::ALL {
        let count: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE contract_id = ?1", kind.table()),
            params![id.get()],
            |row| row.get(0),
        )?;
        if count > 0 {
            out.push((kind, count_to_u64(count)));
        }
    }
    Ok(out)
}

fn count_mappings_tx(tx: &Transaction<'_>, id: ContractId) -> Result<u64, StoreError> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM contract_subcontract_mappings \
         WHERE parent_contract_id = ?1 OR sub_contract_id = ?1",
        params![id.get()],
        |row| row.get(0),
    )?;
    Ok(count_to_u64(count))
}

fn count_clones_tx(tx: &Transaction<'_>, id: ContractId) -> Result<u64, StoreError> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM contracts WHERE cloned_from_contract_id = ?1",
        params![id.get()],
        |row| row.get(0),
    )?;
    Ok(count_to_u64(count))
}

/// Maps engine-level constraint failures that got past the explicit checks.
fn map_write_conflict(err: rusqlite::Error) -> StoreError {
    let Some(message) = constraint_message(&err) else {
        return StoreError::Sql(err);
    };
    let violation = if message.contains("contracts.entity_id") {
        Violation::DuplicateEntityId
    } else if message.contains("contracts.id") {
        Violation::DuplicateId
    } else if message.contains("FOREIGN KEY") {
        Violation::ForeignKey
    } else if message.contains("CHECK") && message.contains("cloned_from_contract_id") {
        Violation::SelfReference {
            field: "cloned_from_contract_id",
        }
    } else {
        return StoreError::Sql(err);
    };
    StoreError::ConstraintViolation(violation)
}
