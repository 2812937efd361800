#![forbid(unsafe_code)]

use super::{
    ACCOUNTING_CODE, ASSET_CATEGORY_TYPE, CALCULATED_RESTORING_RATE, DESCRIPTION, DISCRIMINATOR,
    FieldError, INITIAL_PREPAYMENT, LEASE_TYPE, LEDGER_SYSTEM, LIFECYCLE_STATE,
    NET_EQUIVALENT_FACTOR, ORIGINAL_PURCHASE_PRICE, REFERENCE_NO, STATUS, TERMINATION_COST,
};
use crate::ids::{ApproverId, ContactId, ContractId, ContractTypeId, CurrencyId, EntityId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

// Every field is optional. `ContractPatch` mirrors each one as `Option<Option<T>>`:
// outer `None` leaves the field alone, `Some(None)` clears it.
macro_rules! contract_fields {
    ($($(#[$meta:meta])* $field:ident: $ty:ty,)+) => {
        #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
        pub struct ContractFields {
            $($(#[$meta])* pub $field: Option<$ty>,)+
        }

        #[derive(Clone, Debug, Default, PartialEq)]
        pub struct ContractPatch {
            $(pub $field: Option<Option<$ty>>,)+
        }

        impl ContractPatch {
            pub fn is_empty(&self) -> bool {
                true $(&& self.$field.is_none())+
            }

            pub fn touched_fields(&self) -> Vec<&'static str> {
                let mut out = Vec::new();
                $(
                    if self.$field.is_some() {
                        out.push(stringify!($field));
                    }
                )+
                out
            }

            pub fn apply_to(&self, fields: &mut ContractFields) {
                $(
                    if let Some(value) = &self.$field {
                        fields.$field = value.clone();
                    }
                )+
            }
        }
    };
}

contract_fields! {
    /// Unique when present; enforced by the store, not just indexed.
    entity_id: EntityId,
    contract_type_id: ContractTypeId,
    vendor_id: ContactId,
    /// Same target table as `vendor_id`, but an independent association.
    contracted_party_id: ContactId,
    currency_id: CurrencyId,
    cloned_from_contract_id: ContractId,
    /// Stored as-is. Never checked against an approver table.
    treasury_approver_id: ApproverId,

    description: String,
    reference_no: String,
    status: String,
    lifecycle_state: String,
    discriminator: String,
    notes: String,

    is_receivable: bool,
    is_archived: bool,
    is_in_holdover: bool,
    is_broken: bool,
    is_partial_building: bool,
    eol_take_ownership: bool,
    force_review: bool,

    net_equivalent_factor: Decimal,
    original_purchase_price: Decimal,
    initial_prepayment: Decimal,
    calculated_restoring_rate: Decimal,
    termination_cost: Decimal,

    make_good_date_of_obligation: Date,
    lease_accounting_start_date: Date,
    archived_date: Date,
    holdover_start_date: Date,
    termination_date: Date,

    lease_type: String,
    asset_category_type: String,
    ledger_system: String,
    accounting_code: String,
    manual_override: i32,
    /// Years.
    useful_life: i32,
}

impl ContractFields {
    /// Checks text bounds and numeric ranges, and rescales every decimal to its
    /// column scale.
    pub fn validated(mut self) -> Result<Self, FieldError> {
        let texts = [
            (DESCRIPTION, self.description.as_deref()),
            (REFERENCE_NO, self.reference_no.as_deref()),
            (STATUS, self.status.as_deref()),
            (LIFECYCLE_STATE, self.lifecycle_state.as_deref()),
            (DISCRIMINATOR, self.discriminator.as_deref()),
            (LEASE_TYPE, self.lease_type.as_deref()),
            (ASSET_CATEGORY_TYPE, self.asset_category_type.as_deref()),
            (LEDGER_SYSTEM, self.ledger_system.as_deref()),
            (ACCOUNTING_CODE, self.accounting_code.as_deref()),
        ];
        for (column, value) in texts {
            column.check_opt(value)?;
        }

        if self.useful_life.is_some_and(|years| years < 0) {
            return Err(FieldError::Negative {
                field: "useful_life",
            });
        }

        self.net_equivalent_factor = NET_EQUIVALENT_FACTOR.fit_opt(self.net_equivalent_factor)?;
        self.original_purchase_price =
            ORIGINAL_PURCHASE_PRICE.fit_opt(self.original_purchase_price)?;
        self.initial_prepayment = INITIAL_PREPAYMENT.fit_opt(self.initial_prepayment)?;
        self.calculated_restoring_rate =
            CALCULATED_RESTORING_RATE.fit_opt(self.calculated_restoring_rate)?;
        self.termination_cost = TERMINATION_COST.fit_opt(self.termination_cost)?;

        Ok(self)
    }
}

/// Input to `create`. The store assigns `id` when it is absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewContract {
    pub id: Option<ContractId>,
    pub fields: ContractFields,
}

impl NewContract {
    pub fn new(fields: ContractFields) -> Self {
        Self { id: None, fields }
    }

    pub fn with_id(id: ContractId, fields: ContractFields) -> Self {
        Self {
            id: Some(id),
            fields,
        }
    }

    pub fn validated(self) -> Result<Self, FieldError> {
        if let Some(id) = self.id
            && self.fields.cloned_from_contract_id == Some(id)
        {
            return Err(FieldError::SelfReference {
                field: "cloned_from_contract_id",
            });
        }
        Ok(Self {
            id: self.id,
            fields: self.fields.validated()?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: ContractId,
    #[serde(flatten)]
    pub fields: ContractFields,
}

impl ContractPatch {
    /// Soft delete: mark archived as of `date`.
    pub fn archive(date: Date) -> Self {
        Self {
            is_archived: Some(Some(true)),
            archived_date: Some(Some(date)),
            ..Self::default()
        }
    }

    /// Applies the patch to `record` and validates the result. The record id is
    /// not patchable.
    pub fn apply(&self, record: &ContractRecord) -> Result<ContractRecord, FieldError> {
        if self.is_empty() {
            return Err(FieldError::EmptyPatch);
        }
        let mut fields = record.fields.clone();
        self.apply_to(&mut fields);
        if fields.cloned_from_contract_id == Some(record.id) {
            return Err(FieldError::SelfReference {
                field: "cloned_from_contract_id",
            });
        }
        Ok(ContractRecord {
            id: record.id,
            fields: fields.validated()?,
        })
    }
}
