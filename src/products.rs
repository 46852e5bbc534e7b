//! # Product Catalog
//!
//! Configurable mapping from raw product/tag spellings as they arrive on
//! tickets (e.g. "Homecare Homebase", "point click care") to the
//! business-facing display names used on reports.
//!
//! - Loaded from the `[products]` table of the classifier config.
//! - Case-insensitive lookup with normalization of punctuation and dashes.
//! - Fallback order: exact match → substring match → unresolved.
//!
//! The catalog only translates names. Whether a resolved name is a valid
//! category, and what to do with "no value" sentinels, is decided by the
//! classification engine.

use std::collections::HashMap;

use serde::Deserialize;

/// The `[products]` config section as written in TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductsSection {
    /// Raw spelling (any case, any separator style) → display name.
    #[serde(default)]
    pub display: HashMap<String, String>,
}

/// Compiled catalog with pre-normalized keys.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    display: HashMap<String, String>,
}

impl ProductCatalog {
    pub fn from_section(section: &ProductsSection) -> Self {
        let display = section
            .display
            .iter()
            .map(|(k, v)| (normalize(k), v.trim().to_string()))
            .collect();
        Self { display }
    }

    #[cfg(test)]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let display = pairs
            .into_iter()
            .map(|(k, v)| (normalize(k), v.to_string()))
            .collect();
        Self { display }
    }

    /// Resolve a raw product spelling to its display name.
    ///
    /// Steps:
    /// 1. Exact match on the normalized spelling.
    /// 2. Substring fallback (e.g. "HCHB Mobile App v2" → "hchb mobile").
    /// 3. Unresolved (`None`); callers decide what that means.
    pub fn resolve(&self, raw: &str) -> Option<&str> {
        let s = normalize(raw);
        if s.is_empty() {
            return None;
        }

        // 1) Exact match.
        if let Some(name) = self.display.get(&s) {
            return Some(name);
        }

        // 2) Substring fallback. Longer keys win so "hchb mobile" beats "hchb".
        let mut best: Option<(&str, &str)> = None;
        for (k, v) in &self.display {
            if s.contains(k.as_str()) {
                match best {
                    Some((bk, _)) if bk.len() >= k.len() => {}
                    _ => best = Some((k, v)),
                }
            }
        }
        if let Some((_, v)) = best {
            return Some(v);
        }

        // 3) Unresolved.
        None
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }
}

/// Normalize input string: lowercase, replace punctuation/dashes with spaces,
/// collapse multiple spaces into one.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_ascii_lowercase();

    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }

    out = out.replace(['\n', '\r', '\t', '.', ',', '’', '\''], " ");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
