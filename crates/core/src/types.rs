use std::fmt;

use serde::{Deserialize, Serialize};

/// Asset ids are assigned sequentially by the registry, starting at 1.
pub type AssetId = u64;

/// Monetary amounts in minor units (see [`UNIT`]).
pub type Amount = u64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Minor units per whole currency unit (6 decimals).
pub const UNIT: Amount = 1_000_000;

/// Basis points in 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// An account or component address.
///
/// Identities are opaque, non-empty strings. Components (the pricing agent,
/// the exchange, each registry) have identities of their own so they can be
/// named as price authority or transfer delegate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Build an identity, rejecting empty or whitespace-only values.
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("identity must not be empty".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Identity for a fixed, known-good name such as a component address.
    pub(crate) fn known(name: &'static str) -> Self {
        debug_assert!(!name.trim().is_empty());
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identity::new(value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
pub(crate) fn id(value: &str) -> Identity {
    Identity::new(value).expect("test identity must be valid")
}
