#![forbid(unsafe_code)]

/// Structural problem with a contract value, found before any storage access.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldError {
    TextTooLong {
        field: &'static str,
        max_chars: usize,
        actual_chars: usize,
    },
    PrecisionOverflow {
        field: &'static str,
        precision: u32,
        scale: u32,
    },
    Negative {
        field: &'static str,
    },
    SelfReference {
        field: &'static str,
    },
    EmptyPatch,
    UnknownChildKind,
}

impl FieldError {
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::TextTooLong { field, .. }
            | Self::PrecisionOverflow { field, .. }
            | Self::Negative { field }
            | Self::SelfReference { field } => Some(field),
            Self::EmptyPatch | Self::UnknownChildKind => None,
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextTooLong {
                field,
                max_chars,
                actual_chars,
            } => write!(
                f,
                "{field} exceeds {max_chars} characters (got {actual_chars})"
            ),
            Self::PrecisionOverflow {
                field,
                precision,
                scale,
            } => write!(f, "{field} does not fit decimal({precision},{scale})"),
            Self::Negative { field } => write!(f, "{field} must not be negative"),
            Self::SelfReference { field } => {
                write!(f, "{field} must not reference the contract itself")
            }
            Self::EmptyPatch => write!(f, "no fields to update"),
            Self::UnknownChildKind => write!(f, "unknown child kind"),
        }
    }
}

impl std::error::Error for FieldError {}
