//! Whitelist Registry
//!
//! Owns the mapping from bare command name to policy entry. Pure data: it
//! never spawns anything.

use std::collections::HashMap;

use super::entry::{SecurityLevel, WhitelistEntry};
use crate::tools::bare_command_name;

/// Registry of whitelisted commands keyed by bare command name
#[derive(Debug, Clone, Default)]
pub struct WhitelistRegistry {
    entries: HashMap<String, WhitelistEntry>,
}

impl WhitelistRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with entries (later entries win)
    pub fn with_entries(entries: impl IntoIterator<Item = WhitelistEntry>) -> Self {
        let mut registry = Self::new();
        for entry in entries {
            registry.add(entry);
        }
        registry
    }

    /// Insert or replace the entry for this command's bare name
    pub fn add(&mut self, mut entry: WhitelistEntry) {
        let key = bare_command_name(&entry.command).to_string();
        entry.command = key.clone();
        self.entries.insert(key, entry);
    }

    /// Remove an entry, returning it if present
    pub fn remove(&mut self, command: &str) -> Option<WhitelistEntry> {
        self.entries.remove(bare_command_name(command))
    }

    /// Change the level of an existing entry; no-op if absent
    ///
    /// Returns whether an entry was updated.
    pub fn update_level(&mut self, command: &str, level: SecurityLevel) -> bool {
        match self.entries.get_mut(bare_command_name(command)) {
            Some(entry) => {
                entry.security_level = level;
                true
            }
            None => false,
        }
    }

    /// Look up an entry by command (path components are ignored)
    pub fn get(&self, command: &str) -> Option<&WhitelistEntry> {
        self.entries.get(bare_command_name(command))
    }

    /// Snapshot of all entries; order is not significant
    pub fn list(&self) -> Vec<WhitelistEntry> {
        self.entries.values().cloned().collect()
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

    #[test]
    fn test_add_is_upsert() {
        let mut registry = WhitelistRegistry::new();
        registry.add(WhitelistEntry::new("echo", SecurityLevel::Safe));
        registry.add(
            WhitelistEntry::new("echo", SecurityLevel::Forbidden).with_description("replaced"),
        );

        assert_eq!(registry.len(), 1);
        let entry = registry.get("echo").unwrap();
        assert_eq!(entry.security_level, SecurityLevel::Forbidden);
        assert_eq!(entry.description.as_deref(), Some("replaced"));
    }

    #[test]
    fn test_add_keys_by_bare_name() {
        let mut registry = WhitelistRegistry::new();
        registry.add(WhitelistEntry::new("/usr/bin/ls", SecurityLevel::Safe));

        assert!(registry.get("ls").is_some());
        assert!(registry.get("/bin/ls").is_some());
        assert_eq!(registry.get("ls").unwrap().command, "ls");
    }

    #[test]
    fn test_remove() {
        let mut registry = WhitelistRegistry::new();
        registry.add(WhitelistEntry::new("cp", SecurityLevel::RequiresApproval));

        assert!(registry.remove("cp").is_some());
        assert!(registry.remove("cp").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_level_absent_is_noop() {
        let mut registry = WhitelistRegistry::new();
        assert!(!registry.update_level("ghost", SecurityLevel::Safe));
        assert!(registry.is_empty());

        registry.add(WhitelistEntry::new("mv", SecurityLevel::RequiresApproval));
        assert!(registry.update_level("mv", SecurityLevel::Forbidden));
        assert_eq!(
            registry.get("mv").unwrap().security_level,
            SecurityLevel::Forbidden
        );
    }

    #[test]
    fn test_list_snapshot_is_detached() {
        let mut registry = WhitelistRegistry::with_entries(vec![
            WhitelistEntry::new("ls", SecurityLevel::Safe),
            WhitelistEntry::new("pwd", SecurityLevel::Safe),
        ]);
        let snapshot = registry.list();
        registry.remove("ls");

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 1);
    }
}
