// tests/merge_ledger.rs
//
// Replace-by-date merge semantics: backups, idempotence, and isolation of
// unrelated dates.

use chrono::NaiveDate;

use helpdesk_ticket_analyzer::merge::merge_batch;
use helpdesk_ticket_analyzer::report::{DailySummaryRow, DetailRow, TicketLedger};
use helpdesk_ticket_analyzer::ticket::Category;

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

fn week_of_history() -> TicketLedger {
    let mut ledger = TicketLedger {
        summary: vec![
            srow(12, "Account", 5, 9),
            srow(12, "Equipment", 4, 9),
            srow(13, "Network", 2, 2),
            srow(14, "Equipment", 17, 17),
        ],
        detail: vec![drow(14, "Equipment", "laptop won't turn on", 17)],
    };
    ledger.sort_canonical();
    ledger
}

#[test]
fn rerun_converges_to_the_same_ledger() {
    let summary = vec![srow(14, "Equipment", 18, 20), srow(14, "Account", 2, 20)];
    let detail = vec![drow(14, "Equipment", "laptop won't turn on", 18)];

    let first = merge_batch(week_of_history(), summary.clone(), detail.clone(), d(14));
    let second = merge_batch(first.updated.clone(), summary.clone(), detail.clone(), d(14));
    let third = merge_batch(second.updated.clone(), summary, detail, d(14));

    assert_eq!(first.updated, second.updated);
    assert_eq!(second.updated, third.updated);
}

#[test]
fn other_dates_survive_byte_for_byte() {
    let before = week_of_history();
    let out = merge_batch(before.clone(), vec![srow(14, "Network", 1, 1)], vec![], d(14));

    for day in [12u32, 13] {
        assert_eq!(
            out.updated.summary_for(d(day)),
            before.summary_for(d(day)),
            "day {day} must be untouched"
        );
    }
}

#[test]
fn backup_matches_pre_merge_state_exactly() {
    let before = week_of_history();
    let out = merge_batch(
        before.clone(),
        vec![srow(14, "Equipment", 1, 1)],
        vec![],
        d(14),
    );
    assert_eq!(out.backup, before);
}

#[test]
fn batch_date_rows_are_fully_replaced_not_appended() {
    let out = merge_batch(
        week_of_history(),
        vec![srow(14, "Account", 3, 3)],
        vec![],
        d(14),
    );

    let day14 = out.updated.summary_for(d(14));
    assert_eq!(day14.len(), 1);
    assert_eq!(day14[0].category.as_str(), "Account");
    assert_eq!(day14[0].ticket_count, 3);
    // The old Equipment detail for the day went with it.
    assert!(out.updated.detail_for(d(14)).is_empty());
    assert_eq!(out.replaced_summary, 1);
    assert_eq!(out.replaced_detail, 1);
}

#[test]
fn first_merge_into_empty_history() {
    let out = merge_batch(
        TicketLedger::default(),
        vec![srow(15, "Account", 1, 1)],
        vec![],
        d(15),
    );
    assert!(out.backup.is_empty());
    assert_eq!(out.updated.summary.len(), 1);
    assert_eq!(out.replaced_summary, 0);
}

#[test]
fn merged_ledger_is_sorted_across_old_and_new_rows() {
    // New day lands between existing days.
    let mut history = TicketLedger {
        summary: vec![srow(12, "Account", 1, 1), srow(16, "Account", 1, 1)],
        detail: vec![],
    };
    history.sort_canonical();

    let out = merge_batch(history, vec![srow(14, "Network", 2, 2)], vec![], d(14));
    let dates: Vec<NaiveDate> = out.updated.summary.iter().map(|r| r.date).collect();
    assert_eq!(dates, vec![d(12), d(14), d(16)]);
}
