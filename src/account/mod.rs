//! Account - single seed-derived identity shared by every wallet manager.
//!
//! The recovery phrase is only needed at creation and again to sign; the
//! account keeps the derived seed (zeroized on drop) for address derivation.

mod keys;

use crate::error::{Error, Result};
use crate::network::{Address, Network};
use bip39::Mnemonic;
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Shared, immutable account handle.
#[derive(Clone)]
pub struct Account {
    inner: Arc<AccountInner>,
}

struct AccountInner {
    seed: Zeroizing<[u8; 64]>,
    uids: String,
    timestamp: DateTime<Utc>,
}

fn seed_from_phrase(phrase: &str) -> Result<Zeroizing<[u8; 64]>> {
    let mnemonic = Mnemonic::parse_normalized(phrase).map_err(|e| Error::InvalidPhrase(e.to_string()))?;
    Ok(Zeroizing::new(mnemonic.to_seed("")))
}

impl Account {
    /// `timestamp` is the account creation time; syncs never look earlier.
    pub fn create_from_phrase(phrase: &str, timestamp: DateTime<Utc>) -> Result<Self> {
        let seed = seed_from_phrase(phrase)?;
        Self::create_from_seed(&seed, timestamp)
    }

    pub fn create_from_seed(seed: &[u8; 64], timestamp: DateTime<Utc>) -> Result<Self> {
        let uids = keys::fingerprint(seed)?.to_string();
        Ok(Self { inner: Arc::new(AccountInner { seed: Zeroizing::new(*seed), uids, timestamp }) })
    }

    /// Fresh 12-word phrase.
    pub fn generate_phrase() -> Result<String> {
        let mut entropy = Zeroizing::new([0u8; 16]);
        rand::thread_rng().fill_bytes(entropy.as_mut());
        let mnemonic = Mnemonic::from_entropy(entropy.as_ref()).map_err(|e| Error::InvalidPhrase(e.to_string()))?;
        Ok(mnemonic.to_string())
    }

    pub fn validate_phrase(phrase: &str) -> bool { Mnemonic::parse_normalized(phrase).is_ok() }

    /// Master key fingerprint, hex.
    pub fn uids(&self) -> &str { &self.inner.uids }
    pub fn timestamp(&self) -> DateTime<Utc> { self.inner.timestamp }

    pub fn address(&self, network: &Network) -> Result<Address> { keys::derive_address(&self.inner.seed, network) }

    /// Sign `digest` for `network` with the key behind `phrase`, which must be
    /// this account's phrase.
    pub(crate) fn sign(&self, phrase: &str, network: &Network, digest: [u8; 32]) -> Result<Vec<u8>> {
        let seed = seed_from_phrase(phrase)?;
        if keys::fingerprint(&seed)?.to_string() != self.inner.uids {
            return Err(Error::AccountMismatch(self.inner.uids.clone()));
        }
        keys::sign_digest(&seed, network, digest)
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.inner, &other.inner) }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account").field("uids", &self.inner.uids).field("timestamp", &self.inner.timestamp).finish()
    }
}
