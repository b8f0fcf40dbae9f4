//! CurrencyPair - exchange rate between two units.

use super::{Amount, Unit};

/// `1 base_unit == exchange_rate quote_unit`.
#[derive(Debug, Clone)]
pub struct CurrencyPair {
    base_unit: Unit,
    quote_unit: Unit,
    exchange_rate: f64,
}

impl CurrencyPair {
    /// `None` unless the rate is a positive finite number.
    pub fn new(base_unit: &Unit, quote_unit: &Unit, exchange_rate: f64) -> Option<Self> {
        (exchange_rate.is_finite() && exchange_rate > 0.0).then(|| Self {
            base_unit: base_unit.clone(),
            quote_unit: quote_unit.clone(),
            exchange_rate,
        })
    }

    pub fn base_unit(&self) -> &Unit { &self.base_unit }
    pub fn quote_unit(&self) -> &Unit { &self.quote_unit }
    pub fn exchange_rate(&self) -> f64 { self.exchange_rate }

    /// Base-currency amount converted into the quote unit.
    pub fn exchange_as_base(&self, amount: &Amount) -> Option<Amount> {
        let value = amount.double(&self.base_unit)?;
        Amount::create_double(value * self.exchange_rate, &self.quote_unit)
    }

    /// Quote-currency amount converted back into the base unit.
    pub fn exchange_as_quote(&self, amount: &Amount) -> Option<Amount> {
        let value = amount.double(&self.quote_unit)?;
        Amount::create_double(value / self.exchange_rate, &self.base_unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::tests::btc_units;
    use crate::currency::Currency;

    fn usd() -> Unit {
        let usd = Currency::create("iso4217:USD", "US Dollar", "usd", "fiat", None);
        let cent = Unit::create_as_base(&usd, "usd:cent", "Cent", "¢");
        Unit::create(&usd, "usd:dollar", "Dollar", "$", &cent, 2)
    }

    #[test]
    fn btc_usd_round_trip() {
        let (_, _, btc) = btc_units();
        let dollar = usd();
        let pair = CurrencyPair::new(&btc, &dollar, 1000.0).unwrap();

        let two_btc = Amount::create_double(2.0, &btc).unwrap();
        let quoted = pair.exchange_as_base(&two_btc).unwrap();
        assert_eq!(quoted, Amount::create_double(2000.0, &dollar).unwrap());

        let back = pair.exchange_as_quote(&quoted).unwrap();
        assert_eq!(back, two_btc);
    }

    #[test]
    fn wrong_side_has_no_result() {
        let (_, _, btc) = btc_units();
        let dollar = usd();
        let pair = CurrencyPair::new(&btc, &dollar, 1000.0).unwrap();
        let ten_usd = Amount::create_integer(10, &dollar).unwrap();
        assert!(pair.exchange_as_base(&ten_usd).is_none());
    }

    #[test]
    fn rate_must_be_positive() {
        let (_, _, btc) = btc_units();
        assert!(CurrencyPair::new(&btc, &usd(), 0.0).is_none());
        assert!(CurrencyPair::new(&btc, &usd(), f64::NAN).is_none());
    }
}
