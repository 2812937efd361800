#![forbid(unsafe_code)]

use super::FieldError;

/// Bounded text column. Limits count characters, not bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextColumn {
    pub name: &'static str,
    pub max_chars: usize,
}

pub const DESCRIPTION: TextColumn = TextColumn::new("description", 200);
pub const REFERENCE_NO: TextColumn = TextColumn::new("reference_no", 100);
pub const STATUS: TextColumn = TextColumn::new("status", 100);
pub const LIFECYCLE_STATE: TextColumn = TextColumn::new("lifecycle_state", 100);
pub const DISCRIMINATOR: TextColumn = TextColumn::new("discriminator", 128);
pub const LEASE_TYPE: TextColumn = TextColumn::new("lease_type", 100);
pub const ASSET_CATEGORY_TYPE: TextColumn = TextColumn::new("asset_category_type", 100);
pub const LEDGER_SYSTEM: TextColumn = TextColumn::new("ledger_system", 100);
pub const ACCOUNTING_CODE: TextColumn = TextColumn::new("accounting_code", 100);

pub const TEXT_COLUMNS: [TextColumn; 9] = [
    DESCRIPTION,
    REFERENCE_NO,
    STATUS,
    LIFECYCLE_STATE,
    DISCRIMINATOR,
    LEASE_TYPE,
    ASSET_CATEGORY_TYPE,
    LEDGER_SYSTEM,
    ACCOUNTING_CODE,
];

impl TextColumn {
    pub const fn new(name: &'static str, max_chars: usize) -> Self {
        Self { name, max_chars }
    }

    pub fn check(&self, value: &str) -> Result<(), FieldError> {
        let actual_chars = value.chars().count();
        if actual_chars > self.max_chars {
            return Err(FieldError::TextTooLong {
                field: self.name,
                max_chars: self.max_chars,
                actual_chars,
            });
        }
        Ok(())
    }

    pub fn check_opt(&self, value: Option<&str>) -> Result<(), FieldError> {
        match value {
            Some(value) => self.check(value),
            None => Ok(()),
        }
    }
}
