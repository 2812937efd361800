#![forbid(unsafe_code)]

use super::FieldError;
use rust_decimal::Decimal;

/// Fixed-point column with a declared `decimal(precision, scale)` shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecimalColumn {
    pub name: &'static str,
    pub precision: u32,
    pub scale: u32,
}

pub const NET_EQUIVALENT_FACTOR: DecimalColumn = DecimalColumn::new("net_equivalent_factor", 18, 8);
pub const ORIGINAL_PURCHASE_PRICE: DecimalColumn =
    DecimalColumn::new("original_purchase_price", 18, 2);
pub const INITIAL_PREPAYMENT: DecimalColumn = DecimalColumn::new("initial_prepayment", 18, 2);
pub const CALCULATED_RESTORING_RATE: DecimalColumn =
    DecimalColumn::new("calculated_restoring_rate", 18, 8);
pub const TERMINATION_COST: DecimalColumn = DecimalColumn::new("termination_cost", 16, 2);

pub const DECIMAL_COLUMNS: [DecimalColumn; 5] = [
    NET_EQUIVALENT_FACTOR,
    ORIGINAL_PURCHASE_PRICE,
    INITIAL_PREPAYMENT,
    CALCULATED_RESTORING_RATE,
    TERMINATION_COST,
];

impl DecimalColumn {
    pub const fn new(name: &'static str, precision: u32, scale: u32) -> Self {
        Self {
            name,
            precision,
            scale,
        }
    }

    pub fn integer_digits(&self) -> u32 {
        self.precision - self.scale
    }

    /// Returns `value` rescaled to the column scale, or an overflow error when it
    /// carries more fractional or integer digits than the column holds.
    ///
    /// Trailing fractional zeros do not count against the scale: `1.500` fits a
    /// scale of 2 and is stored as `1.50`.
    pub fn fit(&self, value: Decimal) -> Result<Decimal, FieldError> {
        let normalized = value.normalize();
        if normalized.scale() > self.scale || integer_digits(normalized) > self.integer_digits() {
            return Err(FieldError::PrecisionOverflow {
                field: self.name,
                precision: self.precision,
                scale: self.scale,
            });
        }
        let mut stored = normalized;
        stored.rescale(self.scale);
        Ok(stored)
    }

    pub fn fit_opt(&self, value: Option<Decimal>) -> Result<Option<Decimal>, FieldError> {
        value.map(|value| self.fit(value)).transpose()
    }
}

fn integer_digits(value: Decimal) -> u32 {
    let mut integral = value.abs().trunc();
    let mut digits = 0;
    while !integral.is_zero() {
        integral = (integral / Decimal::TEN).trunc();
        digits += 1;
    }
    digits
}
