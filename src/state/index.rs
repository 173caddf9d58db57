//! Substate name ↔ dense id bijection

use std::collections::HashMap;

/// Bijection between substate names and contiguous ids `0..len`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateIndex {
    names: Vec<String>,
    ids: HashMap<String, usize>,
}

impl StateIndex {
    /// Empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name, returning its id (existing id if already present)
    pub fn add(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        if let Some(&id) = self.ids.get(&name) {
            return id;
        }
        let id = self.names.len();
        self.ids.insert(name.clone(), id);
        self.names.push(name);
        id
    }

    /// Id of a name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    /// Name of an id
    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Whether a name is indexed
    pub fn contains(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }

    /// Number of indexed names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in id order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut index = StateIndex::new();
        assert_eq!(index.add("NP^0"), 0);
        assert_eq!(index.add("NP^1"), 1);
        assert_eq!(index.add("NP^0"), 0);
        assert_eq!(index.len(), 2);
        assert_eq!(index.name(1), Some("NP^1"));
        assert_eq!(index.index_of("VP^0"), None);
    }
}
