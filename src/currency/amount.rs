//! Amount - signed magnitude in base units, tagged with a display unit.

use super::Unit;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Signed amount of a currency.
///
/// Arithmetic and comparison are only defined between compatible amounts.
/// Incompatible operations yield `None`, never a zero.
#[derive(Clone, Debug)]
pub struct Amount {
    unit: Unit,
    value: u128,
    negative: bool,
}

fn scale_factor(decimals: u8) -> Option<Decimal> {
    Decimal::from_i128(10i128.checked_pow(decimals as u32)?)
}

impl Amount {
    /// Amount of `value` base units, displayed in `unit`.
    pub fn from_base(value: u128, negative: bool, unit: &Unit) -> Self {
        Self { unit: unit.clone(), value, negative: negative && value != 0 }
    }

    pub fn zero(unit: &Unit) -> Self { Self::from_base(0, false, unit) }

    /// `value` whole `unit`s, e.g. `create_integer(2, btc)` is 200_000_000 sat.
    pub fn create_integer(value: i64, unit: &Unit) -> Option<Self> {
        let factor = 10u128.checked_pow(unit.decimals() as u32)?;
        let magnitude = (value.unsigned_abs() as u128).checked_mul(factor)?;
        Some(Self::from_base(magnitude, value < 0, unit))
    }

    /// Nearest base-unit amount to `value` `unit`s.
    pub fn create_double(value: f64, unit: &Unit) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = Decimal::from_f64(value.abs())?.checked_mul(scale_factor(unit.decimals())?)?;
        Some(Self::from_base(scaled.round().to_u128()?, value < 0.0, unit))
    }

    /// Parse a decimal string such as `"0.0125"` in `unit`s. Fails on more
    /// fractional digits than the unit can represent.
    pub fn create_string(value: &str, negative: bool, unit: &Unit) -> Option<Self> {
        let parsed = Decimal::from_str(value.trim()).ok()?;
        if parsed.is_sign_negative() && !parsed.is_zero() {
            return None;
        }
        let scaled = parsed.checked_mul(scale_factor(unit.decimals())?)?;
        if !scaled.fract().is_zero() {
            return None;
        }
        Some(Self::from_base(scaled.to_u128()?, negative, unit))
    }

    pub fn unit(&self) -> &Unit { &self.unit }
    /// Magnitude in base units.
    pub fn value(&self) -> u128 { self.value }
    pub fn is_negative(&self) -> bool { self.negative }
    pub fn is_zero(&self) -> bool { self.value == 0 }

    pub fn is_compatible(&self, other: &Amount) -> bool { self.unit.is_compatible(&other.unit) }

    pub fn negate(&self) -> Self { Self::from_base(self.value, !self.negative, &self.unit) }

    pub fn add(&self, other: &Amount) -> Option<Self> {
        if !self.is_compatible(other) {
            return None;
        }
        let (value, negative) = if self.negative == other.negative {
            (self.value.checked_add(other.value)?, self.negative)
        } else if self.value >= other.value {
            (self.value - other.value, self.negative)
        } else {
            (other.value - self.value, other.negative)
        };
        Some(Self::from_base(value, negative, &self.unit))
    }

    pub fn sub(&self, other: &Amount) -> Option<Self> { self.add(&other.negate()) }

    /// Same amount displayed in another compatible unit.
    pub fn convert(&self, unit: &Unit) -> Option<Self> {
        self.unit.is_compatible(unit).then(|| Self::from_base(self.value, self.negative, unit))
    }

    /// Value expressed in `unit` as a float. `None` on incompatible unit or when
    /// the magnitude exceeds the decimal range.
    pub fn double(&self, unit: &Unit) -> Option<f64> {
        let value = self.decimal(unit)?.to_f64()?;
        Some(if self.negative { -value } else { value })
    }

    /// Presentation string, e.g. `"-₿ 0.5"`.
    pub fn string(&self, unit: &Unit) -> Option<String> {
        let value = self.decimal(unit)?.normalize();
        let sign = if self.negative { "-" } else { "" };
        Some(format!("{}{} {}", sign, unit.symbol(), value))
    }

    /// Signed integer string in base units.
    pub fn string_base10(&self) -> String {
        if self.negative { format!("-{}", self.value) } else { self.value.to_string() }
    }

    fn decimal(&self, unit: &Unit) -> Option<Decimal> {
        if !self.unit.is_compatible(unit) {
            return None;
        }
        let magnitude = i128::try_from(self.value).ok()?;
        Decimal::try_from_i128_with_scale(magnitude, unit.decimals() as u32).ok()
    }

    fn signed_cmp(&self, other: &Amount) -> Ordering {
        match (self.negative, other.negative) {
            (false, false) => self.value.cmp(&other.value),
            (true, true) => other.value.cmp(&self.value),
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
        }
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool { self.partial_cmp(other) == Some(Ordering::Equal) }
}

/// Partial: incompatible amounts are unordered.
impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.is_compatible(other).then(|| self.signed_cmp(other))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.string(&self.unit) {
            Some(s) => f.write_str(&s),
            None => write!(f, "{} {}", self.string_base10(), self.unit.base().symbol()),
        }
    }
}
