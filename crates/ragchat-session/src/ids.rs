use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use ragchat_core::MessageId;

/// Session-scoped generator for locally authored message ids.
///
/// Ids are `local-<prefix>-<n>` where the prefix is taken from a fresh v4
/// UUID and `n` counts up from 1. They never collide within a session and
/// cannot be mistaken for the numeric ids the service assigns.
#[derive(Debug)]
pub struct LocalIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl Default for LocalIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdGenerator {
    pub fn new() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self {
            prefix: uuid.chars().take(8).collect(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn next_id(&self) -> MessageId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        MessageId::new(format!("local-{}-{}", self.prefix, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let ids = LocalIdGenerator::new();
        let first = ids.next_id();
        let second = ids.next_id();
        assert_ne!(first, second);
        assert_eq!(first.as_str(), format!("local-{}-1", ids.prefix()));
        assert_eq!(second.as_str(), format!("local-{}-2", ids.prefix()));
    }

    #[test]
    fn test_generators_use_distinct_prefixes() {
        let a = LocalIdGenerator::new();
        let b = LocalIdGenerator::new();
        assert_eq!(a.prefix().len(), 8);
        assert_ne!(a.prefix(), b.prefix());
    }

    #[test]
    fn test_concurrent_generation() {
        let ids = std::sync::Arc::new(LocalIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..250).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 1000);
    }
}
