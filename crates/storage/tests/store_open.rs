#![forbid(unsafe_code)]

use lb_core::ids::{ContactId, ContractTypeId, CurrencyId};
use lb_core::{ContractFields, NewContract};
use lb_storage::{
    DB_FILE_NAME, DELETE_POLICY_ENV, DeletePolicy, SCHEMA_VERSION, SqliteStore, StoreConfig,
    StoreError, Violation,
};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("lb_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[test]
fn reopen_keeps_data() {
    let storage_dir = temp_dir("reopen_keeps_data");
    let config = StoreConfig::new(&storage_dir, DeletePolicy::Restrict);
    let id = {
        let mut store = SqliteStore::open(config.clone()).expect("open store");
        store
            .create(NewContract::new(ContractFields {
                notes: Some("kept".to_string()),
                ..ContractFields::default()
            }))
            .expect("create")
            .id
    };

    let store = SqliteStore::open(config).expect("reopen");
    assert_eq!(
        store.get(id).expect("get").fields.notes.as_deref(),
        Some("kept")
    );
}

#[test]
fn foreign_databases_require_a_reset() {
    let storage_dir = temp_dir("foreign_databases_require_a_reset");
    {
        let conn = rusqlite::Connection::open(storage_dir.join(DB_FILE_NAME)).expect("open sqlite");
        conn.execute_batch("CREATE TABLE legacy_contracts (id INTEGER PRIMARY KEY);")
            .expect("legacy table");
    }

    let err = SqliteStore::open(StoreConfig::new(&storage_dir, DeletePolicy::Restrict))
        .expect_err("unknown schema");
    assert_eq!(err.code(), "RESET_REQUIRED");
}

#[test]
fn schema_version_mismatch_requires_a_reset() {
    let storage_dir = temp_dir("schema_version_mismatch_requires_a_reset");
    let config = StoreConfig::new(&storage_dir, DeletePolicy::Restrict);
    drop(SqliteStore::open(config.clone()).expect("open store"));
    {
        let conn = rusqlite::Connection::open(storage_dir.join(DB_FILE_NAME)).expect("open sqlite");
        conn.execute(
            "UPDATE store_state SET schema_version = ?1",
            [SCHEMA_VERSION + 1],
        )
        .expect("bump version");
    }

    let err = SqliteStore::open(config).expect_err("newer schema");
    assert_eq!(err.code(), "RESET_REQUIRED");
}

#[test]
fn configuration_requires_a_known_policy() {
    let storage_dir = temp_dir("configuration_requires_a_known_policy");
    let config = StoreConfig::from_lookup(&storage_dir, |key| {
        (key == DELETE_POLICY_ENV).then(|| " Cascade ".to_string())
    })
    .expect("config");
    assert_eq!(config.delete_policy, DeletePolicy::Cascade);
    assert_eq!(config.storage_dir, storage_dir);

    let err = StoreConfig::from_lookup(&storage_dir, |key| {
        (key == DELETE_POLICY_ENV).then(|| "soft".to_string())
    })
    .expect_err("unknown policy");
    assert_eq!(err.code(), "INVALID_ARGUMENT");

    let err = SqliteStore::open(
        StoreConfig::new(&storage_dir, DeletePolicy::Restrict).with_child_page_size(0),
    )
    .expect_err("zero page size");
    assert_eq!(err.code(), "INVALID_ARGUMENT");
}

#[test]
fn reference_rows_validate_and_resolve() {
    let storage_dir = temp_dir("reference_rows_validate_and_resolve");
    let mut store = SqliteStore::open(StoreConfig::new(&storage_dir, DeletePolicy::Restrict))
        .expect("open store");

    let contract_type = store.create_contract_type("  Vehicle  ").expect("type");
    assert_eq!(contract_type.name, "Vehicle");
    assert_eq!(
        store.get_contract_type(contract_type.id).expect("get type"),
        contract_type
    );
    assert_eq!(
        store.create_contract_type("   ").expect_err("blank").code(),
        "INVALID_ARGUMENT"
    );

    let contact = store.create_contact("Landlord Ltd").expect("contact");
    assert_eq!(store.get_contact(contact.id).expect("get contact"), contact);
    assert!(matches!(
        store.get_contact(ContactId::try_new(99).expect("id")),
        Err(StoreError::NotFound)
    ));

    let usd = store.create_currency("usd", None).expect("usd");
    assert_eq!(store.get_currency(usd.id).expect("get currency"), usd);
    let err = store.create_currency("USD", Some("again")).expect_err("duplicate");
    assert_eq!(err.violation(), Some(&Violation::DuplicateCurrencyCode));
    assert!(matches!(
        store.get_currency(CurrencyId::try_new(50).expect("id")),
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store.get_contract_type(ContractTypeId::try_new(50).expect("id")),
        Err(StoreError::NotFound)
    ));
}
