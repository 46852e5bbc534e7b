// src/aggregate.rs
//! Aggregation of classified tickets into report rows.
//!
//! Pure arithmetic over one batch: count per (date, category), denormalize
//! per-date totals, and break out normalized subjects for any cell whose
//! count is strictly above the detail threshold. Deterministic regardless of
//! input order; a date with zero tickets simply produces no rows.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::report::{DailySummaryRow, DetailRow};
use crate::ticket::{Category, Ticket};

/// Label used when normalization strips a subject down to nothing.
pub const EMPTY_SUBJECT_BUCKET: &str = "(no subject)";

#[derive(Debug, Clone, Copy)]
pub struct AggregationConfig {
    /// Counts strictly greater than this get detail rows. A cell exactly at
    /// the threshold does not.
    pub detail_threshold: u32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            detail_threshold: crate::classify::DEFAULT_DETAIL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOutput {
    pub summary: Vec<DailySummaryRow>,
    pub detail: Vec<DetailRow>,
}

/// Roll one classified batch up into summary and detail rows.
pub fn aggregate(classified: &[(Ticket, Category)], cfg: &AggregationConfig) -> AggregateOutput {
    let mut counts: BTreeMap<(NaiveDate, Category), u32> = BTreeMap::new();
    let mut subjects: BTreeMap<(NaiveDate, Category), BTreeMap<String, u32>> = BTreeMap::new();

    for (ticket, category) in classified {
        let key = (ticket.created_at, category.clone());
        *counts.entry(key.clone()).or_insert(0) += 1;
        *subjects
            .entry(key)
            .or_default()
            .entry(bucket_subject(&ticket.subject))
            .or_insert(0) += 1;
    }

    let mut totals: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for ((date, _), n) in &counts {
        *totals.entry(*date).or_insert(0) += n;
    }

    // BTreeMap iteration is already (date, category) ascending, which is the
    // canonical row order.
    let summary = counts
        .iter()
        .map(|((date, category), n)| DailySummaryRow {
            date: *date,
            category: category.clone(),
            ticket_count: *n,
            daily_total: totals[date],
        })
        .collect();

    let mut detail = Vec::new();
    for ((date, category), n) in &counts {
        if *n > cfg.detail_threshold {
            for (subject, count) in &subjects[&(*date, category.clone())] {
                detail.push(DetailRow {
                    date: *date,
                    category: category.clone(),
                    subject: subject.clone(),
                    count: *count,
                });
            }
        }
    }

    AggregateOutput { summary, detail }
}

static RE_REPLY_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:(?:re|fw|fwd)\s*:\s*)+").expect("reply prefix regex"));
static RE_REFERENCE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:#\d{3,}|\b(?:inc|req|chg|tkt)\d{4,}\b)").expect("reference token regex")
});

/// Collapse a raw subject into its detail-row bucket.
///
/// Case folds, decodes HTML entities, strips reply prefixes ("Re:", "FW:")
/// and ticket reference tokens ("#48211", "INC0012345"), and collapses
/// whitespace, so retitled copies of the same complaint land in one bucket.
pub fn bucket_subject(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let lowered = decoded.trim().to_lowercase();
    let no_reply = RE_REPLY_PREFIX.replace_all(&lowered, "");
    let no_refs = RE_REFERENCE_TOKEN.replace_all(&no_reply, " ");
    let collapsed = no_refs.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        EMPTY_SUBJECT_BUCKET.to_string()
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, day).unwrap()
    }

    fn pair(day: u32, subject: &str, cat: &str) -> (Ticket, Category) {
        (
            Ticket::new(0, subject, "IT", d(day)),
            Category::new(cat),
        )
    }

    #[test]
    fn counts_and_daily_totals() {
        let cfg = AggregationConfig::default();
        let out = aggregate(
            &[
                pair(15, "Laptop won't turn on", "Equipment"),
                pair(15, "Laptop won't turn on", "Equipment"),
                pair(15, "Password reset", "Account"),
                pair(16, "VPN down", "Network"),
            ],
            &cfg,
        );

        assert_eq!(out.summary.len(), 3);
        let equip = &out.summary[1];
        assert_eq!(equip.category.as_str(), "Equipment");
        assert_eq!(equip.ticket_count, 2);
        assert_eq!(equip.daily_total, 3);
        let account = &out.summary[0];
        assert_eq!(account.category.as_str(), "Account");
        assert_eq!(account.ticket_count, 1);
        assert_eq!(account.daily_total, 3);
        let network = &out.summary[2];
        assert_eq!(network.date, d(16));
        assert_eq!(network.daily_total, 1);
    }

    #[test]
    fn no_tickets_no_rows() {
        let out = aggregate(&[], &AggregationConfig::default());
        assert!(out.summary.is_empty());
        assert!(out.detail.is_empty());
    }

    #[test]
    fn detail_requires_strictly_above_threshold() {
        let cfg = AggregationConfig {
            detail_threshold: 3,
        };
        let at: Vec<_> = (0..3).map(|_| pair(15, "printer jam", "Equipment")).collect();
        assert!(aggregate(&at, &cfg).detail.is_empty());

        let above: Vec<_> = (0..4).map(|_| pair(15, "printer jam", "Equipment")).collect();
        let out = aggregate(&above, &cfg);
        assert_eq!(out.detail.len(), 1);
        assert_eq!(out.detail[0].count, 4);
    }

    #[test]
    fn detail_counts_sum_to_cell_count() {
        let cfg = AggregationConfig {
            detail_threshold: 5,
        };
        let mut batch = Vec::new();
        for _ in 0..4 {
            batch.push(pair(15, "Laptop won't turn on", "Equipment"));
        }
        for _ in 0..3 {
            batch.push(pair(15, "LAPTOP WON'T TURN ON", "Equipment"));
        }
        for _ in 0..2 {
            batch.push(pair(15, "Printer jam", "Equipment"));
        }
        let out = aggregate(&batch, &cfg);

        assert_eq!(out.summary[0].ticket_count, 9);
        let total: u32 = out.detail.iter().map(|r| r.count).sum();
        assert_eq!(total, 9);
        // Case variants merge into one bucket.
        assert_eq!(out.detail.len(), 2);
        assert_eq!(out.detail[0].subject, "laptop won't turn on");
        assert_eq!(out.detail[0].count, 7);
    }

    #[test]
    fn flagged_cell_does_not_leak_detail_for_quiet_cells() {
        let cfg = AggregationConfig {
            detail_threshold: 2,
        };
        let mut batch = vec![pair(15, "password reset", "Account")];
        for _ in 0..3 {
            batch.push(pair(15, "printer jam", "Equipment"));
        }
        let out = aggregate(&batch, &cfg);
        assert!(out.detail.iter().all(|r| r.category.as_str() == "Equipment"));
    }

    #[test]
    fn output_is_independent_of_input_order() {
        let cfg = AggregationConfig {
            detail_threshold: 1,
        };
        let forward = vec![
            pair(15, "a problem", "Account"),
            pair(15, "b problem", "Account"),
            pair(16, "c problem", "Network"),
            pair(15, "a problem", "Account"),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(aggregate(&forward, &cfg), aggregate(&reversed, &cfg));
    }

    #[test]
    fn bucket_strips_reply_prefixes_and_references() {
        assert_eq!(
            bucket_subject("RE: FW: Laptop won't turn on #48211"),
            "laptop won't turn on"
        );
        assert_eq!(
            bucket_subject("Re:   INC0012345 VPN   keeps dropping"),
            "vpn keeps dropping"
        );
    }

    #[test]
    fn bucket_decodes_entities_and_folds_case() {
        assert_eq!(
            bucket_subject("Printer &amp; scanner OFFLINE"),
            "printer & scanner offline"
        );
    }

    #[test]
    fn bucket_handles_stripped_to_empty() {
        assert_eq!(bucket_subject("RE: #48211"), EMPTY_SUBJECT_BUCKET);
        assert_eq!(bucket_subject("   "), EMPTY_SUBJECT_BUCKET);
    }
}
