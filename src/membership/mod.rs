//! Membership Index - "have we seen this value since startup?"
//!
//! Two implementations behind one trait:
//!
//! - `BitsetIndex`: one bit per value in `[0, max]`. O(1) lookup, O(max/8)
//!   memory whether one value or a billion have been seen.
//! - `HashedIndex`: hash set of seen values. Expected O(1) lookup, memory
//!   grows with the number of distinct values. Use it for sparse or very
//!   large domains where a full bitset would not fit.
//!
//! Both reject values outside `[0, max]` with a `DomainError`.

mod bitset;
mod hashed;

pub use bitset::BitsetIndex;
pub use hashed::HashedIndex;

use serde::{Deserialize, Serialize};

/// Default upper bound of the value domain (nine decimal digits)
pub const DEFAULT_MAX_VALUE: u64 = 999_999_999;

/// Value rejected because it lies outside `[0, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainError {
    pub value: i64,
    pub max: u64,
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "value {} outside domain [0, {}]", self.value, self.max)
    }
}

impl std::error::Error for DomainError {}

/// Presence set over the bounded domain `[0, max]`.
///
/// Once `mark_seen(v)` succeeds, `contains(v)` returns `Ok(true)` for the
/// lifetime of the index. There is no removal.
pub trait MembershipIndex: Send {
    fn contains(&self, value: i64) -> Result<bool, DomainError>;
    fn mark_seen(&mut self, value: i64) -> Result<(), DomainError>;
    /// Inclusive upper bound of the domain
    fn max_value(&self) -> u64;

    /// Domain check shared by implementations
    fn check_domain(&self, value: i64) -> Result<u64, DomainError> {
        let max = self.max_value();
        match u64::try_from(value) {
            Ok(v) if v <= max => Ok(v),
            _ => Err(DomainError { value, max }),
        }
    }
}

/// Which index implementation the worker builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    #[default]
    Bitset,
    Hashed,
}

impl IndexKind {
    pub fn parse(s: &str) -> Option<IndexKind> {
        match s.trim().to_lowercase().as_str() {
            "bitset" => Some(IndexKind::Bitset),
            "hashed" | "hash" => Some(IndexKind::Hashed),
            _ => None,
        }
    }

    /// Build an empty index of this kind over `[0, max_value]`
    pub fn build(self, max_value: u64) -> Box<dyn MembershipIndex> {
        match self {
            IndexKind::Bitset => Box::new(BitsetIndex::new(max_value)),
            IndexKind::Hashed => Box::new(HashedIndex::new(max_value)),
        }
    }
}
