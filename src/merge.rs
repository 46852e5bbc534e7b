// src/merge.rs
//! Merge of one batch's rows into the historical ledger.
//!
//! Replace-by-date: every existing row for the batch date is dropped, the
//! new rows are appended, and the ledger is re-sorted. Rows for other dates
//! pass through untouched, so re-running a day converges instead of
//! double-counting. The pre-merge copy is returned alongside the result and
//! must be persisted as the backup before the updated ledger overwrites the
//! old one.

use chrono::NaiveDate;

use crate::report::{DailySummaryRow, DetailRow, TicketLedger};

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The ledger after the replace, canonically sorted.
    pub updated: TicketLedger,
    /// Exact copy of the ledger as it was before the merge.
    pub backup: TicketLedger,
    /// How many old rows the batch date displaced.
    pub replaced_summary: usize,
    pub replaced_detail: usize,
}

/// Merge `summary`/`detail` for `batch_date` into `ledger`.
///
/// Pure value computation; nothing is written here. Callers persist
/// `backup` first, then `updated`.
pub fn merge_batch(
    ledger: TicketLedger,
    summary: Vec<DailySummaryRow>,
    detail: Vec<DetailRow>,
    batch_date: NaiveDate,
) -> MergeOutcome {
    let backup = ledger.clone();

    let mut updated = ledger;
    let before_summary = updated.summary.len();
    let before_detail = updated.detail.len();
    updated.summary.retain(|r| r.date != batch_date);
    updated.detail.retain(|r| r.date != batch_date);
    let replaced_summary = before_summary - updated.summary.len();
    let replaced_detail = before_detail - updated.detail.len();

    updated.summary.extend(summary);
    updated.detail.extend(detail);
    updated.sort_canonical();

    MergeOutcome {
        updated,
        backup,
        replaced_summary,
        replaced_detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::Category;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, day).unwrap()
    }

    fn srow(day: u32, cat: &str, count: u32, total: u32) -> DailySummaryRow {
        DailySummaryRow {
            date: d(day),
            category: Category::new(cat),
            ticket_count: count,
            daily_total: total,
        }
    }

    fn drow(day: u32, cat: &str, subject: &str, count: u32) -> DetailRow {
        DetailRow {
            date: d(day),
            category: Category::new(cat),
            subject: subject.into(),
            count,
        }
    }

    fn history() -> TicketLedger {
        TicketLedger {
            summary: vec![
                srow(14, "Account", 4, 10),
                srow(14, "Equipment", 6, 10),
                srow(15, "Equipment", 1, 1),
            ],
            detail: vec![drow(15, "Equipment", "stale subject", 1)],
        }
    }

    #[test]
    fn replaces_only_the_batch_date() {
        let out = merge_batch(
            history(),
            vec![srow(15, "Network", 3, 3)],
            vec![],
            d(15),
        );

        assert_eq!(out.replaced_summary, 1);
        assert_eq!(out.replaced_detail, 1);
        // Day 14 rows intact.
        assert_eq!(out.updated.summary_for(d(14)).len(), 2);
        // Day 15 now holds exactly the new rows.
        let day15 = out.updated.summary_for(d(15));
        assert_eq!(day15.len(), 1);
        assert_eq!(day15[0].category.as_str(), "Network");
        assert!(out.updated.detail_for(d(15)).is_empty());
    }

    #[test]
    fn backup_is_the_exact_pre_merge_ledger() {
        let before = history();
        let out = merge_batch(
            before.clone(),
            vec![srow(15, "Network", 3, 3)],
            vec![drow(15, "Network", "vpn drops", 3)],
            d(15),
        );
        assert_eq!(out.backup, before);
        assert_ne!(out.updated, before);
    }

    #[test]
    fn merge_is_idempotent() {
        let summary = vec![srow(15, "Account", 2, 5), srow(15, "Equipment", 3, 5)];
        let detail = vec![drow(15, "Equipment", "laptop won't turn on", 3)];

        let once = merge_batch(history(), summary.clone(), detail.clone(), d(15));
        let twice = merge_batch(once.updated.clone(), summary, detail, d(15));
        assert_eq!(once.updated, twice.updated);
    }

    #[test]
    fn empty_batch_clears_the_date() {
        // A rerun that found zero tickets removes the old rows for that day.
        let out = merge_batch(history(), vec![], vec![], d(15));
        assert!(out.updated.summary_for(d(15)).is_empty());
        assert_eq!(out.updated.summary_for(d(14)).len(), 2);
    }

    #[test]
    fn merge_into_empty_ledger() {
        let out = merge_batch(
            TicketLedger::default(),
            vec![srow(15, "Account", 1, 1)],
            vec![],
            d(15),
        );
        assert_eq!(out.replaced_summary, 0);
        assert_eq!(out.updated.summary.len(), 1);
        assert!(out.backup.is_empty());
    }

    #[test]
    fn result_is_canonically_sorted() {
        // Appended rows arrive out of order relative to history.
        let out = merge_batch(
            history(),
            vec![srow(15, "Network", 1, 4), srow(15, "Account", 3, 4)],
            vec![],
            d(15),
        );
        let mut sorted = out.updated.clone();
        sorted.sort_canonical();
        assert_eq!(out.updated, sorted);
        assert!(out.updated.summary.windows(2).all(|w| w[0] <= w[1]));
    }
}
