//! Enforcement catalog types
//!
//! A [`Catalog`] maps each governed path to exactly one [`CatalogEntry`].
//! The compiled-in catalog lives in `govsync-enforce`; this module only
//! defines the shape and the duplicate-path rule.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::level::EnforcementLevel;
use super::newtypes::RepoPath;

/// One governed file and its default enforcement level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    path: RepoPath,
    level: EnforcementLevel,
    reason: String,
}

impl CatalogEntry {
    pub fn new(path: RepoPath, level: EnforcementLevel, reason: impl Into<String>) -> Self {
        Self {
            path,
            level,
            reason: reason.into(),
        }
    }

    pub fn path(&self) -> &RepoPath {
        &self.path
    }

    pub fn level(&self) -> EnforcementLevel {
        self.level
    }

    /// Why the organization governs this file
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// An immutable set of catalog entries keyed by path
///
/// Iteration order is sorted by path so resolution output is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: BTreeMap<RepoPath, CatalogEntry>,
}

impl Catalog {
    /// Build a catalog from raw entries.
    ///
    /// When a path appears more than once, the entry with the highest
    /// [`EnforcementLevel`] is kept. Equal levels keep the first entry.
    pub fn new(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut map: BTreeMap<RepoPath, CatalogEntry> = BTreeMap::new();
        for entry in entries {
            match map.get(entry.path()) {
                Some(existing) if existing.level() >= entry.level() => {}
                _ => {
                    map.insert(entry.path().clone(), entry);
                }
            }
        }
        Self { entries: map }
    }

    pub fn get(&self, path: &RepoPath) -> Option<&CatalogEntry> {
        self.entries.get(path)
    }

    /// Level of `path` in this catalog, if governed
    pub fn level_of(&self, path: &RepoPath) -> Option<EnforcementLevel> {
        self.entries.get(path).map(CatalogEntry::level)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    /// Entries at exactly `level`
    pub fn at_level(&self, level: EnforcementLevel) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values().filter(move |e| e.level() == level)
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

    fn entry(path: &str, level: EnforcementLevel) -> CatalogEntry {
        CatalogEntry::new(RepoPath::new(path).unwrap(), level, format!("{level} file"))
    }

    #[test]
    fn test_duplicate_paths_keep_highest_level() {
        let catalog = Catalog::new(vec![
            entry("ci.yml", EnforcementLevel::Suggested),
            entry("ci.yml", EnforcementLevel::Forced),
            entry("ci.yml", EnforcementLevel::Required),
        ]);

        assert_eq!(catalog.len(), 1);
        let path = RepoPath::new("ci.yml").unwrap();
        assert_eq!(catalog.level_of(&path), Some(EnforcementLevel::Forced));
    }

    #[test]
    fn test_equal_levels_keep_first_entry() {
        let path = RepoPath::new("a.yml").unwrap();
        let catalog = Catalog::new(vec![
            CatalogEntry::new(path.clone(), EnforcementLevel::Required, "first"),
            CatalogEntry::new(path.clone(), EnforcementLevel::Required, "second"),
        ]);
        assert_eq!(catalog.get(&path).unwrap().reason(), "first");
    }

    #[test]
    fn test_entries_are_sorted_by_path() {
        let catalog = Catalog::new(vec![
            entry("z.yml", EnforcementLevel::Optional),
            entry("a.yml", EnforcementLevel::Forced),
            entry("m.yml", EnforcementLevel::Suggested),
        ]);
        let paths: Vec<&str> = catalog.entries().map(|e| e.path().as_str()).collect();
        assert_eq!(paths, vec!["a.yml", "m.yml", "z.yml"]);
    }

    #[test]
    fn test_at_level_filters() {
        let catalog = Catalog::new(vec![
            entry("a.yml", EnforcementLevel::Forced),
            entry("b.yml", EnforcementLevel::Forced),
            entry("c.yml", EnforcementLevel::Optional),
        ]);
        assert_eq!(catalog.at_level(EnforcementLevel::Forced).count(), 2);
        assert_eq!(catalog.at_level(EnforcementLevel::Required).count(), 0);
    }
}
