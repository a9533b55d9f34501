//! 守卫表：变迁使能条件引用的命名布尔量.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::net::structure::Guard;

/// Name → value bindings, seeded at construction with every guard name any
/// transition declares. Insertion order is preserved so iteration and logs
/// stay deterministic.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq, Debug)]
pub struct GuardTable {
    bindings: IndexMap<String, bool>,
}

impl GuardTable {
    pub fn seeded<'a, I>(names: I, initial: bool) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut bindings = IndexMap::new();
        for name in names {
            bindings.insert(name.to_string(), initial);
        }
        Self { bindings }
    }

    /// Inserts or replaces a binding. Returns `true` when `name` was
    /// already bound.
    pub fn set(&mut self, name: &str, value: bool) -> bool {
        self.bindings.insert(name.to_string(), value).is_some()
    }

    pub fn read(&self, name: &str) -> Option<bool> {
        self.bindings.get(name).copied()
    }

    /// A guard whose name is unbound never satisfies its transition.
    pub fn satisfied(&self, guard: &Guard) -> bool {
        self.read(&guard.name) == Some(guard.enable_when)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.bindings.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_deduplicates_names() {
        let table = GuardTable::seeded(["g", "h", "g"], false);
        assert_eq!(table.len(), 2);
        assert_eq!(table.read("g"), Some(false));
        assert_eq!(table.read("h"), Some(false));
    }

    #[test]
    fn set_distinguishes_insert_from_update() {
        let mut table = GuardTable::seeded(["g"], false);
        assert!(table.set("g", true));
        assert!(!table.set("fresh", true));
        assert_eq!(table.read("fresh"), Some(true));
    }

    #[test]
    fn unbound_guard_is_never_satisfied() {
        let table = GuardTable::seeded([], false);
        assert!(!table.satisfied(&Guard::new("missing", true)));
        assert!(!table.satisfied(&Guard::new("missing", false)));
    }
}
