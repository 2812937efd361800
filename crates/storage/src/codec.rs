#![forbid(unsafe_code)]

use crate::StoreError;
use lb_core::ids::{ApproverId, ContactId, ContractId, ContractTypeId, CurrencyId, EntityId};
use lb_core::{ContractFields, ContractRecord};
use rusqlite::types::{ToSql, Type};
use rusqlite::Row;
use rust_decimal::Decimal;
use std::str::FromStr;
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

pub(crate) const CONTRACT_COLUMNS: &str = "id, entity_id, contract_type_id, vendor_id, \
     contracted_party_id, currency_id, cloned_from_contract_id, treasury_approver_id, \
     description, reference_no, status, lifecycle_state, discriminator, notes, \
     is_receivable, is_archived, is_in_holdover, is_broken, is_partial_building, \
     eol_take_ownership, force_review, net_equivalent_factor, original_purchase_price, \
     initial_prepayment, calculated_restoring_rate, termination_cost, \
     make_good_date_of_obligation, lease_accounting_start_date, archived_date, \
     holdover_start_date, termination_date, lease_type, asset_category_type, ledger_system, \
     accounting_code, manual_override, useful_life";

/// Column values of a contract in their SQLite representation.
pub(crate) struct EncodedFields {
    entity_id: Option<Vec<u8>>,
    contract_type_id: Option<i64>,
    vendor_id: Option<i64>,
    contracted_party_id: Option<i64>,
    currency_id: Option<i64>,
    cloned_from_contract_id: Option<i64>,
    treasury_approver_id: Option<i64>,
    description: Option<String>,
    reference_no: Option<String>,
    status: Option<String>,
    lifecycle_state: Option<String>,
    discriminator: Option<String>,
    notes: Option<String>,
    is_receivable: Option<bool>,
    is_archived: Option<bool>,
    is_in_holdover: Option<bool>,
    is_broken: Option<bool>,
    is_partial_building: Option<bool>,
    eol_take_ownership: Option<bool>,
    force_review: Option<bool>,
    net_equivalent_factor: Option<String>,
    original_purchase_price: Option<String>,
    initial_prepayment: Option<String>,
    calculated_restoring_rate: Option<String>,
    termination_cost: Option<String>,
    make_good_date_of_obligation: Option<String>,
    lease_accounting_start_date: Option<String>,
    archived_date: Option<String>,
    holdover_start_date: Option<String>,
    termination_date: Option<String>,
    lease_type: Option<String>,
    asset_category_type: Option<String>,
    ledger_system: Option<String>,
    accounting_code: Option<String>,
    manual_override: Option<i32>,
    useful_life: Option<i32>,
}

impl EncodedFields {
    pub(crate) fn encode(fields: &ContractFields) -> Result<Self, StoreError> {
        Ok(Self {
            entity_id: fields.entity_id.map(|id| id.as_bytes().to_vec()),
            contract_type_id: fields.contract_type_id.map(ContractTypeId::get),
            vendor_id: fields.vendor_id.map(ContactId::get),
            contracted_party_id: fields.contracted_party_id.map(ContactId::get),
            currency_id: fields.currency_id.map(CurrencyId::get),
            cloned_from_contract_id: fields.cloned_from_contract_id.map(ContractId::get),
            treasury_approver_id: fields.treasury_approver_id.map(ApproverId::get),
            description: fields.description.clone(),
            reference_no: fields.reference_no.clone(),
            status: fields.status.clone(),
            lifecycle_state: fields.lifecycle_state.clone(),
            discriminator: fields.discriminator.clone(),
            notes: fields.notes.clone(),
            is_receivable: fields.is_receivable,
            is_archived: fields.is_archived,
            is_in_holdover: fields.is_in_holdover,
            is_broken: fields.is_broken,
            is_partial_building: fields.is_partial_building,
            eol_take_ownership: fields.eol_take_ownership,
            force_review: fields.force_review,
            net_equivalent_factor: fields.net_equivalent_factor.map(|d| d.to_string()),
            original_purchase_price: fields.original_purchase_price.map(|d| d.to_string()),
            initial_prepayment: fields.initial_prepayment.map(|d| d.to_string()),
            calculated_restoring_rate: fields.calculated_restoring_rate.map(|d| d.to_string()),
            termination_cost: fields.termination_cost.map(|d| d.to_string()),
            make_good_date_of_obligation: format_date(
                "make_good_date_of_obligation",
                fields.make_good_date_of_obligation,
            )?,
            lease_accounting_start_date: format_date(
                "lease_accounting_start_date",
                fields.lease_accounting_start_date,
            )?,
            archived_date: format_date("archived_date", fields.archived_date)?,
            holdover_start_date: format_date("holdover_start_date", fields.holdover_start_date)?,
            termination_date: format_date("termination_date", fields.termination_date)?,
            lease_type: fields.lease_type.clone(),
            asset_category_type: fields.asset_category_type.clone(),
            ledger_system: fields.ledger_system.clone(),
            accounting_code: fields.accounting_code.clone(),
            manual_override: fields.manual_override,
            useful_life: fields.useful_life,
        })
    }

    /// Named parameters, one per field column. Column names are the parameter
    /// names without the leading ':'.
    pub(crate) fn named(&self) -> Vec<(&'static str, &dyn ToSql)> {
        vec![
            (":entity_id", &self.entity_id as &dyn ToSql),
            (":contract_type_id", &self.contract_type_id as &dyn ToSql),
            (":vendor_id", &self.vendor_id as &dyn ToSql),
            (":contracted_party_id", &self.contracted_party_id as &dyn ToSql),
            (":currency_id", &self.currency_id as &dyn ToSql),
            (":cloned_from_contract_id", &self.cloned_from_contract_id as &dyn ToSql),
            (":treasury_approver_id", &self.treasury_approver_id as &dyn ToSql),
            (":description", &self.description as &dyn ToSql),
            (":reference_no", &self.reference_no as &dyn ToSql),
            (":status", &self.status as &dyn ToSql),
            (":lifecycle_state", &self.lifecycle_state as &dyn ToSql),
            (":discriminator", &self.discriminator as &dyn ToSql),
            (":notes", &self.notes as &dyn ToSql),
            (":is_receivable", &self.is_receivable as &dyn ToSql),
            (":is_archived", &self.is_archived as &dyn ToSql),
            (":is_in_holdover", &self.is_in_holdover as &dyn ToSql),
            (":is_broken", &self.is_broken as &dyn ToSql),
            (":is_partial_building", &self.is_partial_building as &dyn ToSql),
            (":eol_take_ownership", &self.eol_take_ownership as &dyn ToSql),
            (":force_review", &self.force_review as &dyn ToSql),
            (":net_equivalent_factor", &self.net_equivalent_factor as &dyn ToSql),
            (":original_purchase_price", &self.original_purchase_price as &dyn ToSql),
            (":initial_prepayment", &self.initial_prepayment as &dyn ToSql),
            (":calculated_restoring_rate", &self.calculated_restoring_rate as &dyn ToSql),
            (":termination_cost", &self.termination_cost as &dyn ToSql),
            (":make_good_date_of_obligation", &self.make_good_date_of_obligation as &dyn ToSql),
            (":lease_accounting_start_date", &self.lease_accounting_start_date as &dyn ToSql),
            (":archived_date", &self.archived_date as &dyn ToSql),
            (":holdover_start_date", &self.holdover_start_date as &dyn ToSql),
            (":termination_date", &self.termination_date as &dyn ToSql),
            (":lease_type", &self.lease_type as &dyn ToSql),
            (":asset_category_type", &self.asset_category_type as &dyn ToSql),
            (":ledger_system", &self.ledger_system as &dyn ToSql),
            (":accounting_code", &self.accounting_code as &dyn ToSql),
            (":manual_override", &self.manual_override as &dyn ToSql),
            (":useful_life", &self.useful_life as &dyn ToSql),
        ]
    }
}

pub(crate) fn insert_contract_sql(named: &[(&'static str, &dyn ToSql)]) -> String {
    let columns = named
        .iter()
        .map(|(name, _)| name.trim_start_matches(':'))
        .collect::<Vec<_>>()
        .join(", ");
    let values = named
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO contracts(id, insert_seq, {columns}) VALUES (:id, :insert_seq, {values})")
}

pub(crate) fn update_contract_sql(named: &[(&'static str, &dyn ToSql)]) -> String {
    let assignments = named
        .iter()
        .map(|(name, _)| format!("{} = {name}", name.trim_start_matches(':')))
        .collect::<Vec<_>>()
        .join(", ");
    format!("UPDATE contracts SET {assignments} WHERE id = :id")
}

fn format_date(field: &'static str, value: Option<Date>) -> Result<Option<String>, StoreError> {
    value
        .map(|date| {
            date.format(DATE_FORMAT)
                .map_err(|err| StoreError::invalid(format!("{field}: {err}")))
        })
        .transpose()
}

fn conversion_error<E>(row: &Row<'_>, column: &str, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    let index = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(index, ty, Box::new(err))
}

fn read_id<T, E>(
    row: &Row<'_>,
    column: &str,
    ctor: fn(i64) -> Result<T, E>,
) -> rusqlite::Result<Option<T>>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let Some(raw) = row.get::<_, Option<i64>>(column)? else {
        return Ok(None);
    };
    ctor(raw)
        .map(Some)
        .map_err(|err| conversion_error(row, column, Type::Integer, err))
}

fn read_decimal(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Decimal>> {
    let Some(raw) = row.get::<_, Option<String>>(column)? else {
        return Ok(None);
    };
    Decimal::from_str(&raw)
        .map(Some)
        .map_err(|err| conversion_error(row, column, Type::Text, err))
}

fn read_date(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Date>> {
    let Some(raw) = row.get::<_, Option<String>>(column)? else {
        return Ok(None);
    };
    Date::parse(&raw, DATE_FORMAT)
        .map(Some)
        .map_err(|err| conversion_error(row, column, Type::Text, err))
}

fn read_entity_id(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<EntityId>> {
    let Some(raw) = row.get::<_, Option<Vec<u8>>>(column)? else {
        return Ok(None);
    };
    EntityId::from_slice(&raw)
        .map(Some)
        .map_err(|err| conversion_error(row, column, Type::Blob, err))
}

/// Maps a row selected with `CONTRACT_COLUMNS`.
pub(crate) fn contract_from_row(row: &Row<'_>) -> rusqlite::Result<ContractRecord> {
    let id = ContractId::try_new(row.get("id")?)
        .map_err(|err| conversion_error(row, "id", Type::Integer, err))?;
    Ok(ContractRecord {
        id,
        fields: ContractFields {
            entity_id: read_entity_id(row, "entity_id")?,
            contract_type_id: read_id(row, "contract_type_id", ContractTypeId::try_new)?,
            vendor_id: read_id(row, "vendor_id", ContactId::try_new)?,
            contracted_party_id: read_id(row, "contracted_party_id", ContactId::try_new)?,
            currency_id: read_id(row, "currency_id", CurrencyId::try_new)?,
            cloned_from_contract_id: read_id(row, "cloned_from_contract_id", ContractId::try_new)?,
            treasury_approver_id: read_id(row, "treasury_approver_id", ApproverId::try_new)?,
            description: row.get("description")?,
            reference_no: row.get("reference_no")?,
            status: row.get("status")?,
            lifecycle_state: row.get("lifecycle_state")?,
            discriminator: row.get("discriminator")?,
            notes: row.get("notes")?,
            is_receivable: row.get("is_receivable")?,
            is_archived: row.get("is_archived")?,
            is_in_holdover: row.get("is_in_holdover")?,
            is_broken: row.get("is_broken")?,
            is_partial_building: row.get("is_partial_building")?,
            eol_take_ownership: row.get("eol_take_ownership")?,
            force_review: row.get("force_review")?,
            net_equivalent_factor: read_decimal(row, "net_equivalent_factor")?,
            original_purchase_price: read_decimal(row, "original_purchase_price")?,
            initial_prepayment: read_decimal(row, "initial_prepayment")?,
            calculated_restoring_rate: read_decimal(row, "calculated_restoring_rate")?,
            termination_cost: read_decimal(row, "termination_cost")?,
            make_good_date_of_obligation: read_date(row, "make_good_date_of_obligation")?,
            lease_accounting_start_date: read_date(row, "lease_accounting_start_date")?,
            archived_date: read_date(row, "archived_date")?,
            holdover_start_date: read_date(row, "holdover_start_date")?,
            termination_date: read_date(row, "termination_date")?,
            lease_type: row.get("lease_type")?,
            asset_category_type: row.get("asset_category_type")?,
            ledger_system: row.get("ledger_system")?,
            accounting_code: row.get("accounting_code")?,
            manual_override: row.get("manual_override")?,
            useful_life: row.get("useful_life")?,
        },
    })
}
