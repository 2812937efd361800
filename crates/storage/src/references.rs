#![forbid(unsafe_code)]

use crate::{SqliteStore, StoreError, Violation, constraint_message};
use lb_core::ids::{ContactId, ContractTypeId, CurrencyId};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

// Targets of the enforced contract foreign keys. Only what the contract graph
// needs is modelled here.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractType {
    pub id: ContractTypeId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Currency {
    pub id: CurrencyId,
    pub code: String,
    pub name: Option<String>,
}

fn bounded_name(field: &str, value: &str, max_chars: usize) -> Result<String, StoreError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StoreError::invalid(format!("{field} must not be empty")));
    }
    if value.chars().count() > max_chars {
        return Err(StoreError::invalid(format!(
            "{field} exceeds {max_chars} characters"
        )));
    }
    Ok(value.to_string())
}

fn stored_id<T>(
    raw: i64,
    ctor: fn(i64) -> Result<T, lb_core::ids::IdError>,
) -> Result<T, StoreError> {
    ctor(raw).map_err(|err| StoreError::invalid(err.to_string()))
}

impl SqliteStore {
    pub fn create_contract_type(&mut self, name: &str) -> Result<ContractType, StoreError> {
        let name = bounded_name("contract type name", name, 100)?;
        let tx = self.write_tx()?;
        tx.execute("INSERT INTO contract_types(name) VALUES (?1)", params![name])?;
        let id = stored_id(tx.last_insert_rowid(), ContractTypeId::try_new)?;
        tx.commit()?;
        debug!(contract_type_id = %id, "contract type created");
        Ok(ContractType { id, name })
    }

    pub fn get_contract_type(&self, id: ContractTypeId) -> Result<ContractType, StoreError> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM contract_types WHERE id = ?1",
                params![id.get()],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound)?;
        Ok(ContractType { id, name })
    }

    pub fn create_contact(&mut self, name: &str) -> Result<Contact, StoreError> {
        let name = bounded_name("contact name", name, 200)?;
        let tx = self.write_tx()?;
        tx.execute("INSERT INTO contacts(name) VALUES (?1)", params![name])?;
        let id = stored_id(tx.last_insert_rowid(), ContactId::try_new)?;
        tx.commit()?;
        debug!(contact_id = %id, "contact created");
        Ok(Contact { id, name })
    }

    pub fn get_contact(&self, id: ContactId) -> Result<Contact, StoreError> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM contacts WHERE id = ?1",
                params![id.get()],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound)?;
        Ok(Contact { id, name })
    }

    /// Codes are stored upper-case and are unique.
    pub fn create_currency(
        &mut self,
        code: &str,
        name: Option<&str>,
    ) -> Result<Currency, StoreError> {
        let code = bounded_name("currency code", code, 16)?.to_ascii_uppercase();
        let name = name
            .map(|value| bounded_name("currency name", value, 100))
            .transpose()?;
        let tx = self.write_tx()?;
        tx.execute(
            "INSERT INTO currencies(code, name) VALUES (?1, ?2)",
            params![code, name],
        )
        .map_err(|err| {
            if constraint_message(&err).is_some_and(|message| message.contains("currencies.code")) {
                StoreError::ConstraintViolation(Violation::DuplicateCurrencyCode)
            } else {
                StoreError::Sql(err)
            }
        })?;
        let id = stored_id(tx.last_insert_rowid(), CurrencyId::try_new)?;
        tx.commit()?;
        debug!(currency_id = %id, %code, "currency created");
        Ok(Currency { id, code, name })
    }

    pub fn get_currency(&self, id: CurrencyId) -> Result<Currency, StoreError> {
        let (code, name) = self
            .conn
            .query_row(
                "SELECT code, name FROM currencies WHERE id = ?1",
                params![id.get()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?
            .ok_or(StoreError::NotFound)?;
        Ok(Currency { id, code, name })
    }
}
