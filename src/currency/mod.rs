//! Currency, Unit, Amount and CurrencyPair value types.
//!
//! A currency has exactly one base unit (integer denominated, e.g. satoshi, wei)
//! and any number of derived units, each a power-of-ten scaling of the base.
//! Amounts always hold their magnitude in base units; the unit they carry is
//! only a presentation preference.
//!
//! ```text
//! Currency "btc"
//!   └── Unit "sat"  (base, decimals 0)
//!         ├── Unit "bits" (decimals 2)
//!         ├── Unit "mbtc" (decimals 5)
//!         └── Unit "btc"  (decimals 8)
//! ```

mod amount;
mod pair;

pub use amount::Amount;
pub use pair::CurrencyPair;

use std::fmt;
use std::sync::Arc;

/// Shared currency handle. Equality is identity of the underlying handle.
#[derive(Clone)]
pub struct Currency {
    inner: Arc<CurrencyInner>,
}

struct CurrencyInner {
    uids: String,
    name: String,
    code: String,
    type_: String,
    issuer: Option<String>,
}

impl Currency {
    pub fn create(uids: &str, name: &str, code: &str, type_: &str, issuer: Option<&str>) -> Self {
        Self {
            inner: Arc::new(CurrencyInner {
                uids: uids.into(),
                name: name.into(),
                code: code.into(),
                type_: type_.into(),
                issuer: issuer.map(Into::into),
            }),
        }
    }

    pub fn uids(&self) -> &str { &self.inner.uids }
    pub fn name(&self) -> &str { &self.inner.name }
    pub fn code(&self) -> &str { &self.inner.code }
    /// `native`, `erc20` or `fiat`
    pub fn type_(&self) -> &str { &self.inner.type_ }
    /// Token contract for issued currencies.
    pub fn issuer(&self) -> Option<&str> { self.inner.issuer.as_deref() }
}

impl PartialEq for Currency {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.inner, &other.inner) }
}
impl Eq for Currency {}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Currency").field("uids", &self.inner.uids).field("code", &self.inner.code).finish()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.inner.code) }
}

/// Denomination of a currency. Derived units always point at the base unit.
#[derive(Clone)]
pub struct Unit {
    inner: Arc<UnitInner>,
}

struct UnitInner {
    currency: Currency,
    uids: String,
    name: String,
    symbol: String,
    /// None for the base unit itself
    base: Option<Unit>,
    decimals: u8,
}

impl Unit {
    /// Integer-denominated base unit of `currency`.
    pub fn create_as_base(currency: &Currency, uids: &str, name: &str, symbol: &str) -> Self {
        Self {
            inner: Arc::new(UnitInner {
                currency: currency.clone(),
                uids: uids.into(),
                name: name.into(),
                symbol: symbol.into(),
                base: None,
                decimals: 0,
            }),
        }
    }

    /// Unit scaled by `10^decimals` relative to `base`.
    ///
    /// If `base` is itself derived the new unit is re-rooted on the base unit, so
    /// `unit.base()` is always a base unit.
    pub fn create(currency: &Currency, uids: &str, name: &str, symbol: &str, base: &Unit, decimals: u8) -> Self {
        Self {
            inner: Arc::new(UnitInner {
                currency: currency.clone(),
                uids: uids.into(),
                name: name.into(),
                symbol: symbol.into(),
                base: Some(base.base()),
                decimals: base.decimals().saturating_add(decimals),
            }),
        }
    }

    pub fn currency(&self) -> &Currency { &self.inner.currency }
    pub fn uids(&self) -> &str { &self.inner.uids }
    pub fn name(&self) -> &str { &self.inner.name }
    pub fn symbol(&self) -> &str { &self.inner.symbol }
    pub fn decimals(&self) -> u8 { self.inner.decimals }
    pub fn is_base(&self) -> bool { self.inner.base.is_none() }

    pub fn base(&self) -> Unit {
        match &self.inner.base {
            Some(base) => base.clone(),
            None => self.clone(),
        }
    }

    pub fn has_currency(&self, currency: &Currency) -> bool { self.inner.currency == *currency }

    /// Compatible units share the same base unit.
    pub fn is_compatible(&self, other: &Unit) -> bool { self.base() == other.base() }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.inner, &other.inner) }
}
impl Eq for Unit {}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("uids", &self.inner.uids)
            .field("decimals", &self.inner.decimals)
            .finish()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.inner.name) }
}
