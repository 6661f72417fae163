// Resource offers as seen by the cache
use std::borrow::Borrow;
use std::fmt;
use serde::{Serialize, Deserialize};

/// Identifier assigned to an offer by the resource manager.
///
/// Unique per issuance; the cache keys deduplication and rescinds on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(String);

impl OfferId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OfferId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for OfferId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for OfferId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A time-limited grant of resources from one agent.
///
/// The cache only looks at `id`; `source` and `payload` are passed through
/// untouched to whichever worker pops the offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer<P> {
    pub id: OfferId,
    /// Agent holding the offered resources
    pub source: String,
    pub payload: P,
}

impl<P> Offer<P> {
    pub fn new(id: impl Into<OfferId>, source: impl Into<String>, payload: P) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            payload,
        }
    }
}
