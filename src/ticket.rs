// src/ticket.rs
//! Canonical ticket and category types shared by every pipeline stage.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Business-facing category label. The set of values is finite and comes
/// from configuration; the engine never emits free text. Ordering is
/// lexicographic so report rows sort deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Fallback label for tickets no rule claims.
    pub const OTHER: &'static str = "Other";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn other() -> Self {
        Self(Self::OTHER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_other(&self) -> bool {
        self.0 == Self::OTHER
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One support request after normalization. Immutable for the life of a run;
/// `subject` and `group` are non-empty, whitespace-collapsed strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    pub subject: String,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_taken: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_product: Option<String>,
    pub created_at: NaiveDate,
}

impl Ticket {
    pub fn new(
        id: u64,
        subject: impl Into<String>,
        group: impl Into<String>,
        created_at: NaiveDate,
    ) -> Self {
        Self {
            id,
            subject: subject.into(),
            group: group.into(),
            action_taken: None,
            existing_product: None,
            created_at,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action_taken = Some(action.into());
        self
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.existing_product = Some(product.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn category_orders_lexicographically() {
        let mut cats = vec![
            Category::new("Network"),
            Category::other(),
            Category::new("Account"),
        ];
        cats.sort();
        let names: Vec<&str> = cats.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["Account", "Network", "Other"]);
    }

    #[test]
    fn category_serializes_as_plain_string() {
        let json = serde_json::to_string(&Category::new("Equipment")).unwrap();
        assert_eq!(json, "\"Equipment\"");
        let back: Category = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_str(), "Equipment");
    }

    #[test]
    fn ticket_builder_sets_optional_fields() {
        let t = Ticket::new(7, "VPN drops every hour", "Service Desk", d(2024, 12, 15))
            .with_action("Reset VPN profile")
            .with_product("GlobalProtect");
        assert_eq!(t.action_taken.as_deref(), Some("Reset VPN profile"));
        assert_eq!(t.existing_product.as_deref(), Some("GlobalProtect"));
    }

    #[test]
    fn ticket_json_omits_absent_optionals() {
        let t = Ticket::new(1, "Printer jam", "Equipment", d(2025, 1, 2));
        let json = serde_json::to_string(&t).unwrap();
        assert!(!json.contains("action_taken"));
        assert!(!json.contains("existing_product"));
    }
}
