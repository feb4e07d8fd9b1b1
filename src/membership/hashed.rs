use super::{DomainError, MembershipIndex};
use ahash::AHashSet;

/// Hash-set index for sparse domains. Memory is proportional to the number of
/// distinct values seen, lookups are expected O(1) rather than guaranteed.
pub struct HashedIndex {
    seen: AHashSet<u64>,
    max: u64,
}

impl HashedIndex {
    pub fn new(max: u64) -> Self {
        HashedIndex {
            seen: AHashSet::with_capacity(1024),
            max,
        }
    }
}

impl MembershipIndex for HashedIndex {
    fn contains(&self, value: i64) -> Result<bool, DomainError> {
        let v = self.check_domain(value)?;
        Ok(self.seen.contains(&v))
    }

    fn mark_seen(&mut self, value: i64) -> Result<(), DomainError> {
        let v = self.check_domain(value)?;
        self.seen.insert(v);
        Ok(())
    }

    fn max_value(&self) -> u64 {
        self.max
    }
}
