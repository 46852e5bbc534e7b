//! # Group Map
//!
//! Configurable mapping from assignment-group names to categories. One table
//! serves two pipeline points:
//!
//! - entries marked `dispositive = true` resolve a ticket outright, before
//!   the tiered engine runs (specialist queues where routing is the truth);
//! - the rest are only consulted as the engine's last lookup before the
//!   fallback category.
//!
//! Lookups are case-insensitive with separator normalization, same as the
//! product catalog.

use std::collections::HashMap;

use serde::Deserialize;

use crate::ticket::Category;

/// One `[[groups]]` entry as written in TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupRule {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub dispositive: bool,
}

#[derive(Debug, Clone)]
struct GroupEntry {
    category: Category,
    dispositive: bool,
}

/// Compiled group table with pre-normalized names.
#[derive(Debug, Clone, Default)]
pub struct GroupMap {
    entries: HashMap<String, GroupEntry>,
}

impl GroupMap {
    /// Build from config rules. Category validity is checked by the engine
    /// loader; duplicate names keep the last entry, matching TOML intuition.
    pub fn from_rules(rules: &[GroupRule]) -> Self {
        let mut entries = HashMap::new();
        for r in rules {
            entries.insert(
                normalize(&r.name),
                GroupEntry {
                    category: Category::new(r.category.trim()),
                    dispositive: r.dispositive,
                },
            );
        }
        Self { entries }
    }

    /// Category for a group that settles classification on its own, if the
    /// group is mapped dispositive.
    pub fn dispositive_category(&self, group: &str) -> Option<&Category> {
        self.entries
            .get(&normalize(group))
            .filter(|e| e.dispositive)
            .map(|e| &e.category)
    }

    /// Category for any mapped group, dispositive or not. This is the
    /// engine's tier-4 lookup.
    pub fn fallback_category(&self, group: &str) -> Option<&Category> {
        self.entries.get(&normalize(group)).map(|e| &e.category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All categories referenced by the table, for load-time validation.
    pub fn referenced_categories(&self) -> impl Iterator<Item = &Category> {
        self.entries.values().map(|e| &e.category)
    }
}

fn normalize(s: &str) -> String {
    let mut out = s.trim().to_ascii_lowercase();
    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
