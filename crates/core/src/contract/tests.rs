use super::*;
use crate::ids::{ContactId, ContractId};
use rust_decimal::Decimal;
use std::str::FromStr;
use time::macros::date;

fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

#[test]
fn decimal_within_declared_shape_is_rescaled_not_rounded() {
    let stored = NET_EQUIVALENT_FACTOR
        .fit(Decimal::new(123456789012345678, 8))
        .unwrap();
    assert_eq!(stored.to_string(), "1234567890.12345678");

    let price = ORIGINAL_PURCHASE_PRICE.fit(dec("1.5")).unwrap();
    assert_eq!(price.to_string(), "1.50");
    assert_eq!(price, dec("1.5"));

    // trailing zeros beyond the scale are not significant
    assert_eq!(TERMINATION_COST.fit(dec("10.2500")).unwrap().to_string(), "10.25");
}

#[test]
fn decimal_overflow_is_reported_per_column() {
    assert_eq!(
        NET_EQUIVALENT_FACTOR.fit(dec("0.123456789")).unwrap_err(),
        FieldError::PrecisionOverflow {
            field: "net_equivalent_factor",
            precision: 18,
            scale: 8
        }
    );
    // 11 integer digits do not fit (18,8)
    assert!(NET_EQUIVALENT_FACTOR.fit(dec("12345678901")).is_err());
    assert!(NET_EQUIVALENT_FACTOR.fit(dec("-9999999999.99999999")).is_ok());

    // (16,2) allows 14 integer digits
    assert!(TERMINATION_COST.fit(dec("99999999999999.99")).is_ok());
    assert!(TERMINATION_COST.fit(dec("100000000000000")).is_err());
    assert!(TERMINATION_COST.fit(dec("0.001")).is_err());

    assert!(INITIAL_PREPAYMENT.fit(Decimal::ZERO).is_ok());
}

#[test]
fn text_limits_count_characters() {
    assert!(STATUS.check(&"é".repeat(100)).is_ok());
    assert_eq!(
        STATUS.check(&"x".repeat(101)).unwrap_err(),
        FieldError::TextTooLong {
            field: "status",
            max_chars: 100,
            actual_chars: 101
        }
    );
    assert!(DESCRIPTION.check(&"d".repeat(200)).is_ok());
}

#[test]
fn validated_fields_reject_oversized_text_and_negative_life() {
    let fields = ContractFields {
        reference_no: Some("r".repeat(101)),
        ..ContractFields::default()
    };
    assert_eq!(fields.validated().unwrap_err().field(), Some("reference_no"));

    let fields = ContractFields {
        useful_life: Some(-1),
        ..ContractFields::default()
    };
    assert_eq!(
        fields.validated().unwrap_err(),
        FieldError::Negative {
            field: "useful_life"
        }
    );

    let fields = ContractFields {
        notes: Some("n".repeat(10_000)),
        useful_life: Some(0),
        ..ContractFields::default()
    };
    assert!(fields.validated().is_ok());
}

#[test]
fn new_contract_rejects_direct_self_clone() {
    let id = ContractId::try_new(5).unwrap();
    let draft = NewContract::with_id(
        id,
        ContractFields {
            cloned_from_contract_id: Some(id),
            ..ContractFields::default()
        },
    );
    assert_eq!(
        draft.validated().unwrap_err(),
        FieldError::SelfReference {
            field: "cloned_from_contract_id"
        }
    );
}

#[test]
fn patch_sets_clears_and_leaves_fields() {
    let record = ContractRecord {
        id: ContractId::try_new(1).unwrap(),
        fields: ContractFields {
            status: Some("draft".to_string()),
            vendor_id: Some(ContactId::try_new(3).unwrap()),
            notes: Some("keep".to_string()),
            ..ContractFields::default()
        },
    };
    let patch = ContractPatch {
        status: Some(Some("active".to_string())),
        vendor_id: Some(None),
        ..ContractPatch::default()
    };
    assert_eq!(patch.touched_fields(), vec!["vendor_id", "status"]);

    let patched = patch.apply(&record).unwrap();
    assert_eq!(patched.id, record.id);
    assert_eq!(patched.fields.status.as_deref(), Some("active"));
    assert_eq!(patched.fields.vendor_id, None);
    assert_eq!(patched.fields.notes.as_deref(), Some("keep"));
}

#[test]
fn empty_patch_and_self_clone_patch_are_rejected() {
    let record = ContractRecord {
        id: ContractId::try_new(9).unwrap(),
        fields: ContractFields::default(),
    };
    assert_eq!(
        ContractPatch::default().apply(&record).unwrap_err(),
        FieldError::EmptyPatch
    );

    let patch = ContractPatch {
        cloned_from_contract_id: Some(Some(record.id)),
        ..ContractPatch::default()
    };
    assert!(matches!(
        patch.apply(&record),
        Err(FieldError::SelfReference { .. })
    ));
}

#[test]
fn archive_patch_marks_soft_delete() {
    let patch = ContractPatch::archive(date!(2026 - 03 - 31));
    assert_eq!(patch.touched_fields(), vec!["is_archived", "archived_date"]);
    let mut fields = ContractFields::default();
    patch.apply_to(&mut fields);
    assert_eq!(fields.is_archived, Some(true));
    assert_eq!(fields.archived_date, Some(date!(2026 - 03 - 31)));
}

#[test]
fn child_kinds_have_distinct_tables_and_parse_back() {
    let mut tables = ChildKind::ALL.map(ChildKind::table).to_vec();
    tables.sort_unstable();
    tables.dedup();
    assert_eq!(tables.len(), ChildKind::ALL.len());

    for kind in ChildKind::ALL {
        assert_eq!(kind.as_str().parse::<ChildKind>(), Ok(kind));
    }
    assert_eq!("nope".parse::<ChildKind>(), Err(FieldError::UnknownChildKind));
}

#[test]
fn record_serializes_flat_with_string_decimals() {
    let record = ContractRecord {
        id: ContractId::try_new(2).unwrap(),
        fields: ContractFields {
            termination_cost: Some(dec("12.50")),
            archived_date: Some(date!(2026 - 03 - 31)),
            ..ContractFields::default()
        },
    };
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["id"], 2);
    assert_eq!(value["termination_cost"], "12.50");
    assert_eq!(value["archived_date"], "2026-03-31");
    let back: ContractRecord = serde_json::from_value(value).unwrap();
    assert_eq!(back, record);
}
