#![forbid(unsafe_code)]

pub mod contract;

pub use contract::*;

pub mod ids {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum IdError {
        NotPositive { kind: &'static str, value: i64 },
    }

    impl std::fmt::Display for IdError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::NotPositive { kind, value } => {
                    write!(f, "{kind} must be a positive integer (got {value})")
                }
            }
        }
    }

    impl std::error::Error for IdError {}

    macro_rules! positive_id {
        ($(#[$meta:meta])* $name:ident, $kind:literal) => {
            $(#[$meta])*
            #[derive(
                Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            )]
            #[serde(try_from = "i64", into = "i64")]
            pub struct $name(i64);

            impl $name {
                pub fn try_new(value: i64) -> Result<Self, IdError> {
                    if value <= 0 {
                        return Err(IdError::NotPositive { kind: $kind, value });
                    }
                    Ok(Self(value))
                }

                pub fn get(self) -> i64 {
                    self.0
                }
            }

            impl TryFrom<i64> for $name {
                type Error = IdError;

                fn try_from(value: i64) -> Result<Self, Self::Error> {
                    Self::try_new(value)
                }
            }

            impl From<$name> for i64 {
                fn from(value: $name) -> Self {
                    value.0
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        };
    }

    positive_id!(
        /// Primary key of a contract. Assigned by the store, never reused.
        ContractId,
        "contract_id"
    );
    positive_id!(ContractTypeId, "contract_type_id");
    positive_id!(
        /// Key into the contacts table. Used for both the vendor and the contracted party.
        ContactId,
        "contact_id"
    );
    positive_id!(CurrencyId, "currency_id");
    positive_id!(
        /// Weak reference to a treasury approver. Nothing checks that the approver exists.
        ApproverId,
        "approver_id"
    );
    positive_id!(ChildId, "child_id");

    /// Globally unique 128-bit identifier carried by a contract alongside its integer key.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EntityId(uuid::Uuid);

    impl EntityId {
        pub fn new_v4() -> Self {
            Self(uuid::Uuid::new_v4())
        }

        pub fn from_uuid(value: uuid::Uuid) -> Self {
            Self(value)
        }

        pub fn from_slice(bytes: &[u8]) -> Result<Self, uuid::Error> {
            uuid::Uuid::from_slice(bytes).map(Self)
        }

        pub fn as_uuid(&self) -> &uuid::Uuid {
            &self.0
        }

        pub fn as_bytes(&self) -> &[u8; 16] {
            self.0.as_bytes()
        }
    }

    impl std::fmt::Display for EntityId {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }

}
