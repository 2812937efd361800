#![forbid(unsafe_code)]

use super::FieldError;
use serde::{Deserialize, Serialize};

/// Owned collections of a contract. Each kind lives in its own table and its rows
/// never outlive the parent contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildKind {
    AssetSchedule,
    BreakClause,
    Clause,
    AgreedValueReview,
    Guarantee,
    ContractTerm,
    ExitCost,
    Incentive,
    InitialCost,
    MakeGoodCost,
    RateReview,
    SynchronisationEvent,
    VendorHistory,
    Invoice,
    InvoiceTemplate,
    ManualOverrideHistory,
    LeaseAccountingReview,
    LifecycleHistory,
}

impl ChildKind {
    pub const ALL: [ChildKind; 18] = [
        ChildKind::AssetSchedule,
        ChildKind::BreakClause,
        ChildKind::Clause,
        ChildKind::AgreedValueReview,
        ChildKind::Guarantee,
        ChildKind::ContractTerm,
        ChildKind::ExitCost,
        ChildKind::Incentive,
        ChildKind::InitialCost,
        ChildKind::MakeGoodCost,
        ChildKind::RateReview,
        ChildKind::SynchronisationEvent,
        ChildKind::VendorHistory,
        ChildKind::Invoice,
        ChildKind::InvoiceTemplate,
        ChildKind::ManualOverrideHistory,
        ChildKind::LeaseAccountingReview,
        ChildKind::LifecycleHistory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AssetSchedule => "asset_schedule",
            Self::BreakClause => "break_clause",
            Self::Clause => "clause",
            Self::AgreedValueReview => "agreed_value_review",
            Self::Guarantee => "guarantee",
            Self::ContractTerm => "contract_term",
            Self::ExitCost => "exit_cost",
            Self::Incentive => "incentive",
            Self::InitialCost => "initial_cost",
            Self::MakeGoodCost => "make_good_cost",
            Self::RateReview => "rate_review",
            Self::SynchronisationEvent => "synchronisation_event",
            Self::VendorHistory => "vendor_history",
            Self::Invoice => "invoice",
            Self::InvoiceTemplate => "invoice_template",
            Self::ManualOverrideHistory => "manual_override_history",
            Self::LeaseAccountingReview => "lease_accounting_review",
            Self::LifecycleHistory => "lifecycle_history",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::AssetSchedule => "contract_asset_schedules",
            Self::BreakClause => "contract_break_clauses",
            Self::Clause => "contract_clauses",
            Self::AgreedValueReview => "contract_agreed_value_reviews",
            Self::Guarantee => "contract_guarantees",
            Self::ContractTerm => "contract_terms",
            Self::ExitCost => "contract_exit_costs",
            Self::Incentive => "contract_incentives",
            Self::InitialCost => "contract_initial_costs",
            Self::MakeGoodCost => "contract_make_good_costs",
            Self::RateReview => "contract_rate_reviews",
            Self::SynchronisationEvent => "contract_synchronisation_events",
            Self::VendorHistory => "contract_vendor_history",
            Self::Invoice => "contract_invoices",
            Self::InvoiceTemplate => "contract_invoice_templates",
            Self::ManualOverrideHistory => "contract_manual_override_history",
            Self::LeaseAccountingReview => "contract_lease_accounting_reviews",
            Self::LifecycleHistory => "contract_lifecycle_history",
        }
    }

}

impl std::str::FromStr for ChildKind {
    type Err = FieldError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or(FieldError::UnknownChildKind)
    }
}

impl std::fmt::Display for ChildKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
