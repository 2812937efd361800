#![forbid(unsafe_code)]

use lb_core::{ChildKind, FieldError};

/// Which structural rule a refused write would have broken.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    DuplicateEntityId,
    DuplicateId,
    RetiredId,
    UnresolvedReference {
        field: &'static str,
        id: i64,
    },
    /// Foreign key failure reported by the engine itself, after the explicit checks.
    ForeignKey,
    SelfReference {
        field: &'static str,
    },
    PrecisionOverflow {
        field: &'static str,
        precision: u32,
        scale: u32,
    },
    DependentRows {
        children: Vec<(ChildKind, u64)>,
        mappings: u64,
        clones: u64,
    },
    AlreadyMapped,
    MappingCycle,
    DuplicateCurrencyCode,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateEntityId => write!(f, "entity_id already in use"),
            Self::DuplicateId => write!(f, "id already in use"),
            Self::RetiredId => write!(f, "id belonged to a deleted contract"),
            Self::UnresolvedReference { field, id } => {
                write!(f, "{field}={id} does not reference an existing row")
            }
            Self::ForeignKey => write!(f, "foreign key constraint failed"),
            Self::SelfReference { field } => {
                write!(f, "{field} must not reference the contract itself")
            }
            Self::PrecisionOverflow {
                field,
                precision,
                scale,
            } => write!(f, "{field} does not fit decimal({precision},{scale})"),
            Self::DependentRows {
                children,
                mappings,
                clones,
            } => {
                let child_rows: u64 = children.iter().map(|(_, count)| count).sum();
                write!(
                    f,
                    "dependent rows exist (children={child_rows}, mappings={mappings}, clones={clones})"
                )
            }
            Self::AlreadyMapped => write!(f, "sub-contract already has a parent"),
            Self::MappingCycle => write!(f, "mapping would create a contract hierarchy cycle"),
            Self::DuplicateCurrencyCode => write!(f, "currency code already in use"),
        }
    }
}

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    NotFound,
    ConstraintViolation(Violation),
    InvalidArgument(String),
    Cancelled,
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQL",
            Self::NotFound => "NOT_FOUND",
            Self::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            Self::InvalidArgument(message) if message.starts_with("RESET_REQUIRED") => {
                "RESET_REQUIRED"
            }
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Self::ConstraintViolation(violation) => Some(violation),
            _ => None,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::NotFound => write!(f, "not found"),
            Self::ConstraintViolation(violation) => write!(f, "constraint violation: {violation}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sql(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<FieldError> for StoreError {
    fn from(value: FieldError) -> Self {
        match value {
            FieldError::PrecisionOverflow {
                field,
                precision,
                scale,
            } => Self::ConstraintViolation(Violation::PrecisionOverflow {
                field,
                precision,
                scale,
            }),
            FieldError::SelfReference { field } => {
                Self::ConstraintViolation(Violation::SelfReference { field })
            }
            other => Self::InvalidArgument(other.to_string()),
        }
    }
}
