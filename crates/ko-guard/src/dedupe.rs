//! Duplicate-Request Suppressor: short cooldowns per operation fingerprint.
//!
//! This is a debounce, not a mutual-exclusion lock: an entry only records
//! that an operation was attempted recently, not whether it finished.

use crate::GuardError;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupeKey {
    pub user_id: String,
    pub action: String,
    pub fingerprint: String,
}

impl DedupeKey {
    pub fn new(user_id: &str, action: &str, fingerprint: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            action: action.to_string(),
            fingerprint: fingerprint.to_string(),
        }
    }
}

/// Cooldown expiries, keyed by `(user, action, fingerprint)`.
#[derive(Debug, Default)]
pub struct DedupeLedger {
    expiries: HashMap<DedupeKey, u64>,
}

impl DedupeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject while a previous attempt is still cooling down. Never extends
    /// an existing lock.
    pub fn evaluate(&self, key: &DedupeKey, now_ms: u64) -> Result<(), GuardError> {
        match self.expiries.get(key) {
            Some(&expires_at) if expires_at > now_ms => Err(GuardError::DuplicateInFlight {
                action: key.action.clone(),
                retry_after_ms: expires_at - now_ms,
            }),
            _ => Ok(()),
        }
    }

    /// Create or renew the lock for `key`.
    pub fn lock(&mut self, key: DedupeKey, expires_at_ms: u64) {
        self.expiries.insert(key, expires_at_ms);
    }

    pub fn expiry(&self, key: &DedupeKey) -> Option<u64> {
        self.expiries.get(key).copied()
    }

    pub fn remove(&mut self, key: &DedupeKey) -> Option<u64> {
        self.expiries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }

    pub fn clear(&mut self) {
        self.expiries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_and_lock(ledger: &mut DedupeLedger, key: &DedupeKey, ms: u64, now: u64) -> Result<(), GuardError> {
        ledger.evaluate(key, now)?;
        ledger.lock(key.clone(), now + ms);
        Ok(())
    }

    #[test]
    fn cooldown_scenario() {
        let mut ledger = DedupeLedger::new();
        let key = DedupeKey::new("u1", "enrichNote", "abc");

        check_and_lock(&mut ledger, &key, 1000, 0).unwrap();

        let err = check_and_lock(&mut ledger, &key, 1000, 500).unwrap_err();
        assert_eq!(
            err,
            GuardError::DuplicateInFlight {
                action: "enrichNote".into(),
                retry_after_ms: 500,
            }
        );
        // rejected attempt did not extend the lock
        assert_eq!(ledger.expiry(&key), Some(1000));

        check_and_lock(&mut ledger, &key, 1000, 1001).unwrap();
        assert_eq!(ledger.expiry(&key), Some(2001));
    }

    #[test]
    fn lock_expires_exactly_at_deadline() {
        let mut ledger = DedupeLedger::new();
        let key = DedupeKey::new("u1", "semanticSearch", "rust");

        check_and_lock(&mut ledger, &key, 1000, 0).unwrap();
        assert!(check_and_lock(&mut ledger, &key, 1000, 999).is_err());
        assert!(check_and_lock(&mut ledger, &key, 1000, 1000).is_ok());
    }

    #[test]
    fn fingerprints_are_independent() {
        let mut ledger = DedupeLedger::new();
        check_and_lock(&mut ledger, &DedupeKey::new("u1", "a", "x"), 1000, 0).unwrap();

        assert!(check_and_lock(&mut ledger, &DedupeKey::new("u1", "a", "y"), 1000, 1).is_ok());
        assert!(check_and_lock(&mut ledger, &DedupeKey::new("u2", "a", "x"), 1000, 1).is_ok());
        assert!(check_and_lock(&mut ledger, &DedupeKey::new("u1", "b", "x"), 1000, 1).is_ok());
    }

    #[test]
    fn clear_empties_the_ledger() {
        let mut ledger = DedupeLedger::new();
        assert!(ledger.is_empty());
        check_and_lock(&mut ledger, &DedupeKey::new("u1", "a", "x"), 1000, 0).unwrap();
        assert_eq!(ledger.len(), 1);

        ledger.clear();
        assert!(ledger.is_empty());
    }
}
