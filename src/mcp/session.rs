use dashmap::DashMap;

/// Where session tokens issued by the remote endpoint are kept.
///
/// Last writer wins; callers needing stronger guarantees serialize around it.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, token: String);
    fn invalidate(&self, key: &str);
}

/// Process-local store, lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, String>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.sessions.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, token: String) {
        self.sessions.insert(key.to_string(), token);
    }

    fn invalidate(&self, key: &str) {
        self.sessions.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_get_invalidate() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.get("default"), None);

        store.set("default", "abc".to_string());
        assert_eq!(store.get("default").as_deref(), Some("abc"));

        store.set("default", "def".to_string());
        assert_eq!(store.get("default").as_deref(), Some("def"));

        store.invalidate("default");
        assert_eq!(store.get("default"), None);
    }

    #[test]
    fn test_keys_are_independent() {
        let store = InMemorySessionStore::new();
        store.set("a", "1".to_string());
        store.set("b", "2".to_string());
        store.invalidate("a");
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b").as_deref(), Some("2"));
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(InMemorySessionStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.set("default", format!("token-{i}"));
                        let _ = store.get("default");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(store.get("default").unwrap().starts_with("token-"));
    }
}
