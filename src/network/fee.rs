//! Fee estimation parameters.

use crate::currency::{Amount, Unit};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::time::Duration;

/// Network-wide fee rate and the time it targets for confirmation.
#[derive(Debug, Clone)]
pub struct NetworkFee {
    price_per_cost_factor: Amount,
    confirmation_time: Duration,
}

impl NetworkFee {
    pub fn new(price_per_cost_factor: Amount, confirmation_time: Duration) -> Self {
        Self { price_per_cost_factor, confirmation_time }
    }

    pub fn price_per_cost_factor(&self) -> &Amount { &self.price_per_cost_factor }
    pub fn confirmation_time(&self) -> Duration { self.confirmation_time }
}

/// Parameters used to estimate a transfer's fee before it confirms:
/// `fee = price_per_cost_factor * cost_factor` (sat/kB * kB, wei/gas * gas).
#[derive(Debug, Clone, PartialEq)]
pub struct FeeBasis {
    price_per_cost_factor: Amount,
    cost_factor: f64,
}

impl FeeBasis {
    /// `None` for a negative price or a negative/non-finite cost factor.
    pub fn new(price_per_cost_factor: Amount, cost_factor: f64) -> Option<Self> {
        if price_per_cost_factor.is_negative() || !cost_factor.is_finite() || cost_factor < 0.0 {
            return None;
        }
        Some(Self { price_per_cost_factor, cost_factor })
    }

    pub fn price_per_cost_factor(&self) -> &Amount { &self.price_per_cost_factor }
    pub fn cost_factor(&self) -> f64 { self.cost_factor }
    pub fn unit(&self) -> &Unit { self.price_per_cost_factor.unit() }

    /// Estimated fee, rounded to the nearest base unit.
    pub fn fee(&self) -> Option<Amount> {
        let price = Decimal::from_u128(self.price_per_cost_factor.value())?;
        let fee = price.checked_mul(Decimal::from_f64(self.cost_factor)?)?;
        Some(Amount::from_base(fee.round().to_u128()?, false, self.unit()))
    }
}
