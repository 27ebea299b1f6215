//! In-memory registry of named reference embeddings.
//!
//! One embedding per name; re-registering a name replaces its embedding in
//! place, so iteration order stays the order in which names first appeared.
//! The registry has a single owner (`&mut` for writes), which is what keeps
//! iteration and mutation from interleaving.

use crate::types::{Embedding, Identity, IdentityName};

#[derive(Debug, Clone, Default)]
pub struct FaceRegistry {
    entries: Vec<Identity>,
}

impl FaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the embedding for `name`. Last write wins.
    ///
    /// Returns the embedding that was replaced, if any.
    pub fn register(&mut self, name: IdentityName, embedding: Embedding) -> Option<Embedding> {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => {
                tracing::debug!(name = %name, "overwriting registered identity");
                Some(std::mem::replace(&mut entry.embedding, embedding))
            }
            None => {
                tracing::debug!(name = %name, total = self.entries.len() + 1, "registered identity");
                self.entries.push(Identity { name, embedding });
                None
            }
        }
    }

    /// Snapshot of every registered identity, in first-registration order.
    pub fn lookup_all(&self) -> &[Identity] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&Embedding> {
        self.entries
            .iter()
            .find(|entry| entry.name.as_str() == name)
            .map(|entry| &entry.embedding)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.name.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> IdentityName {
        IdentityName::new(s).unwrap()
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry = FaceRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.lookup_all().is_empty());
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = FaceRegistry::new();
        assert!(registry.register(name("alice"), Embedding::new(vec![1.0, 0.0])).is_none());
        assert!(registry.register(name("bob"), Embedding::new(vec![0.0, 1.0])).is_none());

        assert!(!registry.is_empty());
        assert_eq!(registry.names(), vec!["alice", "bob"]);
        assert_eq!(registry.get("bob").unwrap().values, vec![0.0, 1.0]);
        assert!(registry.get("carol").is_none());
    }

    #[test]
    fn test_register_overwrites_in_place() {
        let mut registry = FaceRegistry::new();
        registry.register(name("alice"), Embedding::new(vec![1.0, 0.0]));
        registry.register(name("bob"), Embedding::new(vec![0.0, 1.0]));

        let previous = registry.register(name("alice"), Embedding::new(vec![2.0, 2.0]));

        assert_eq!(previous.unwrap().values, vec![1.0, 0.0]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["alice", "bob"]);
        assert_eq!(registry.get("alice").unwrap().values, vec![2.0, 2.0]);
    }
}
