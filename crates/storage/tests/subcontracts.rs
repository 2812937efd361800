#![forbid(unsafe_code)]

use lb_core::ids::ContractId;
use lb_core::{ContractFields, ContractRecord, NewContract};
use lb_storage::{DeletePolicy, SqliteStore, StoreConfig, StoreError, Violation};
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

fn contract(store: &mut SqliteStore, reference_no: &str) -> ContractRecord {
    store
        .create(NewContract::new(ContractFields {
            reference_no: Some(reference_no.to_string()),
            ..ContractFields::default()
        }))
        .expect("create contract")
}

fn ids(records: Vec<ContractRecord>) -> Vec<ContractId> {
    records.into_iter().map(|record| record.id).collect()
}

#[test]
fn hierarchy_is_traversed_through_the_mapping_table() {
    let storage_dir = temp_dir("hierarchy_is_traversed_through_the_mapping_table");
    let mut store = SqliteStore::open(StoreConfig::new(&storage_dir, DeletePolicy::Restrict))
        .expect("open store");
    let head = contract(&mut store, "HEAD");
    let first = contract(&mut store, "SUB-1");
    let second = contract(&mut store, "SUB-2");

    let mapping = store.map_subcontract(head.id, second.id).expect("map second");
    assert_eq!(mapping.parent_contract_id, head.id);
    assert_eq!(mapping.sub_contract_id, second.id);
    store.map_subcontract(head.id, first.id).expect("map first");

    // Mapping order, not id order.
    assert_eq!(
        ids(store.subcontracts_of(head.id).expect("subs")),
        vec![second.id, first.id]
    );
    assert_eq!(
        store.parent_of(first.id).expect("parent").map(|record| record.id),
        Some(head.id)
    );
    assert_eq!(store.parent_of(head.id).expect("no parent"), None);
    assert!(store.subcontracts_of(first.id).expect("leaf").is_empty());

    // Reassigning a sub-contract is unmap then map.
    let other_head = contract(&mut store, "HEAD-2");
    let err = store
        .map_subcontract(other_head.id, first.id)
        .expect_err("already has a parent");
    assert_eq!(err.violation(), Some(&Violation::AlreadyMapped));

    store.unmap_subcontract(first.id).expect("unmap");
    store.map_subcontract(other_head.id, first.id).expect("remap");
    assert_eq!(ids(store.subcontracts_of(head.id).expect("subs")), vec![second.id]);
    assert!(matches!(
        store.unmap_subcontract(head.id),
        Err(StoreError::NotFound)
    ));

    let events: Vec<_> = store
        .list_contract_events(head.id, 20)
        .expect("events")
        .into_iter()
        .map(|event| event.event_type)
        .collect();
    assert_eq!(
        events,
        vec![
            "contract.created",
            "contract.subcontract_mapped",
            "contract.subcontract_mapped",
            "contract.subcontract_unmapped",
        ]
    );
}

#[test]
fn mapping_rejects_self_missing_and_cyclic_links() {
    let storage_dir = temp_dir("mapping_rejects_self_missing_and_cyclic_links");
    let mut store = SqliteStore::open(StoreConfig::new(&storage_dir, DeletePolicy::Restrict))
        .expect("open store");
    let a = contract(&mut store, "A");
    let b = contract(&mut store, "B");
    let c = contract(&mut store, "C");
    let missing = ContractId::try_new(777).expect("id");

    let err = store.map_subcontract(a.id, a.id).expect_err("self");
    assert!(matches!(err.violation(), Some(Violation::SelfReference { .. })));

    let err = store.map_subcontract(a.id, missing).expect_err("missing sub");
    assert_eq!(
        err.violation(),
        Some(&Violation::UnresolvedReference {
            field: "sub_contract_id",
            id: 777,
        })
    );
    let err = store.map_subcontract(missing, a.id).expect_err("missing parent");
    assert!(matches!(
        err.violation(),
        Some(Violation::UnresolvedReference {
            field: "parent_contract_id",
            ..
        })
    ));

    store.map_subcontract(a.id, b.id).expect("a > b");
    store.map_subcontract(b.id, c.id).expect("b > c");
    let err = store.map_subcontract(c.id, a.id).expect_err("c > a closes a loop");
    assert_eq!(err.violation(), Some(&Violation::MappingCycle));
    assert_eq!(store.parent_of(a.id).expect("root"), None);

    assert!(matches!(store.parent_of(missing), Err(StoreError::NotFound)));
    assert!(matches!(store.subcontracts_of(missing), Err(StoreError::NotFound)));
}
