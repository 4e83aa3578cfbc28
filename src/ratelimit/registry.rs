//! Per-client strategy storage.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use super::rules::Rule;
use super::strategy::{AdmissionStrategy, StrategyFactory};

/// Shared handle to one client's strategy state.
///
/// The mutex serializes decisions for a single client; different clients
/// hold different mutexes and never contend on each other's state.
pub type ClientState = Arc<Mutex<Box<dyn AdmissionStrategy>>>;

/// Lazily creates and retains one strategy instance per client identifier.
///
/// Entries are never evicted: memory grows with the number of distinct
/// client identifiers seen until [`ClientRegistry::clear`] is called.
pub struct ClientRegistry {
    /// Strategy state indexed by client identifier
    clients: DashMap<String, ClientState>,
    /// Constructor for new entries
    factory: StrategyFactory,
    /// Rule every new entry is seeded from
    rule: Rule,
}

impl ClientRegistry {
    /// Create an empty registry building entries with `factory`.
    pub fn new(factory: StrategyFactory, rule: Rule) -> Self {
        Self {
            clients: DashMap::new(),
            factory,
            rule,
        }
    }

    /// Get the state for `client_id`, creating it at `now` on first sight.
    ///
    /// Concurrent first calls for the same identifier observe a single
    /// instance: creation happens under the map's shard lock.
    pub fn get_or_create(&self, client_id: &str, now: Duration) -> ClientState {
        if let Some(state) = self.clients.get(client_id) {
            return Arc::clone(state.value());
        }

        let entry = self
            .clients
            .entry(client_id.to_owned())
            .or_insert_with(|| {
                debug!(
                    client_id = %client_id,
                    "Creating new client entry"
                );
                Arc::new(Mutex::new((self.factory)(self.rule, now)))
            });
        Arc::clone(entry.value())
    }

    /// Get the state for `client_id` if it has been seen.
    pub fn get(&self, client_id: &str) -> Option<ClientState> {
        self.clients.get(client_id).map(|state| Arc::clone(state.value()))
    }

    /// Whether `client_id` has an entry.
    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    /// Get the number of known clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether no client has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Drop every client entry.
    ///
    /// Clients seen afterwards start from fresh state.
    pub fn clear(&self) {
        self.clients.clear();
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.clients.len())
            .field("rule", &self.rule)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::rules::StrategyKind;
    use std::sync::Barrier;
    use std::thread;

    fn registry(kind: StrategyKind) -> ClientRegistry {
        let rule = Rule::new(3, Duration::from_millis(5000)).unwrap();
        ClientRegistry::new(kind.factory(), rule)
    }

    #[test]
    fn test_registry_creates_lazily() {
        let registry = registry(StrategyKind::TokenBucket);
        assert!(registry.is_empty());
        assert!(registry.get("user-1").is_none());

        registry.get_or_create("user-1", Duration::ZERO);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("user-1"));
    }

    #[test]
    fn test_registry_returns_same_instance() {
        let registry = registry(StrategyKind::FixedWindow);

        let first = registry.get_or_create("user-1", Duration::ZERO);
        first.lock().allow_request(Duration::ZERO);

        let second = registry.get_or_create("user-1", Duration::from_secs(1));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().remaining(Duration::from_secs(1)), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_keys_are_case_sensitive() {
        let registry = registry(StrategyKind::SlidingWindow);
        let lower = registry.get_or_create("user", Duration::ZERO);
        let upper = registry.get_or_create("USER", Duration::ZERO);
        assert!(!Arc::ptr_eq(&lower, &upper));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_clear() {
        let registry = registry(StrategyKind::TokenBucket);
        registry.get_or_create("a", Duration::ZERO);
        registry.get_or_create("b", Duration::ZERO);
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_creation_yields_single_instance() {
        let registry = registry(StrategyKind::SlidingWindow);
        let barrier = Barrier::new(8);

        let handles: Vec<ClientState> = thread::scope(|s| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        registry.get_or_create("new-client", Duration::ZERO)
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(registry.len(), 1);
        for handle in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0], handle));
        }
    }
}
