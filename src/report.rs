// src/report.rs
//! Report row types and the persisted ledger.
//!
//! Field order doubles as the canonical sort key: rows derive `Ord`, so
//! sorting a row vector yields the (date, category[, subject]) order every
//! consumer expects. Counts come last and never influence ordering of
//! distinct keys.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ticket::Category;

/// One (date, category) aggregate. `daily_total` repeats the whole-day sum
/// on every row of that date so each row reads standalone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DailySummaryRow {
    pub date: NaiveDate,
    pub category: Category,
    pub ticket_count: u32,
    pub daily_total: u32,
}

/// Per-subject breakdown emitted only for (date, category) cells whose count
/// exceeded the detail threshold. `subject` is the normalized form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DetailRow {
    pub date: NaiveDate,
    pub category: Category,
    pub subject: String,
    pub count: u32,
}

/// The full persisted report history: every summary and detail row across
/// all dates ever merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketLedger {
    #[serde(default)]
    pub summary: Vec<DailySummaryRow>,
    #[serde(default)]
    pub detail: Vec<DetailRow>,
}

impl TicketLedger {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.detail.is_empty()
    }

    /// Restore the canonical ordering after any mutation.
    pub fn sort_canonical(&mut self) {
        self.summary.sort();
        self.detail.sort();
    }

    /// Distinct dates present in the summary sheet.
    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.summary.iter().map(|r| r.date).collect()
    }

    /// Summary rows for one date, in category order.
    pub fn summary_for(&self, date: NaiveDate) -> Vec<&DailySummaryRow> {
        self.summary.iter().filter(|r| r.date == date).collect()
    }

    /// Detail rows for one date.
    pub fn detail_for(&self, date: NaiveDate) -> Vec<&DetailRow> {
        self.detail.iter().filter(|r| r.date == date).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, day).unwrap()
    }

    fn row(day: u32, cat: &str, count: u32, total: u32) -> DailySummaryRow {
        DailySummaryRow {
            date: d(day),
            category: Category::new(cat),
            ticket_count: count,
            daily_total: total,
        }
    }

    #[test]
    fn canonical_sort_orders_by_date_then_category() {
        let mut ledger = TicketLedger {
            summary: vec![
                row(16, "Account", 1, 1),
                row(15, "Network", 2, 5),
                row(15, "Account", 3, 5),
            ],
            detail: vec![
                DetailRow {
                    date: d(15),
                    category: Category::new("Network"),
                    subject: "vpn drops".into(),
                    count: 9,
                },
                DetailRow {
                    date: d(15),
                    category: Category::new("Network"),
                    subject: "no internet".into(),
                    count: 7,
                },
            ],
        };
        ledger.sort_canonical();

        let keys: Vec<(NaiveDate, &str)> = ledger
            .summary
            .iter()
            .map(|r| (r.date, r.category.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![(d(15), "Account"), (d(15), "Network"), (d(16), "Account")]
        );
        assert_eq!(ledger.detail[0].subject, "no internet");
    }

    #[test]
    fn dates_and_per_date_views() {
        let ledger = TicketLedger {
            summary: vec![row(15, "Account", 3, 5), row(16, "Account", 1, 1)],
            detail: vec![],
        };
        assert_eq!(ledger.dates().len(), 2);
        assert_eq!(ledger.summary_for(d(15)).len(), 1);
        assert!(ledger.detail_for(d(15)).is_empty());
    }

    #[test]
    fn ledger_json_round_trip() {
        let ledger = TicketLedger {
            summary: vec![row(15, "Equipment", 2, 3)],
            detail: vec![DetailRow {
                date: d(15),
                category: Category::new("Equipment"),
                subject: "laptop won't turn on".into(),
                count: 2,
            }],
        };
        let json = serde_json::to_string(&ledger).unwrap();
        assert!(json.contains("2024-12-15"));
        let back: TicketLedger = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ledger);
    }

    #[test]
    fn empty_ledger_deserializes_from_empty_object() {
        let back: TicketLedger = serde_json::from_str("{}").unwrap();
        assert!(back.is_empty());
    }
}
