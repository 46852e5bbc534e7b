// src/ingest/mod.rs
pub mod types;

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ingest::types::RawTicket;
use crate::ticket::Ticket;

static RE_MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("markup regex"));
static RE_SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Normalize subject text: decode HTML entities, strip stray markup, fix
/// typographic quotes, collapse whitespace. Case is preserved here; the
/// aggregation layer folds case when it buckets subjects.
pub fn normalize_subject_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    // Some mail clients submit rich-text subjects.
    let stripped = RE_MARKUP.replace_all(&decoded, "");
    let ascii_quoted = stripped
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"");
    let mut out = RE_SPACE_RUN.replace_all(&ascii_quoted, " ").trim().to_string();

    // Pathological subjects exist; cap the length so a pasted stack trace
    // cannot blow up bucket keys downstream.
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }
    out
}

fn clean_optional(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Turn raw records into canonical tickets.
///
/// Re-validates the source's invariants defensively: empty subjects or
/// groups and repeated ids are rejected and counted, never fatal. Returns
/// the kept tickets and the reject count.
pub fn normalize_tickets(raw: Vec<RawTicket>) -> (Vec<Ticket>, usize) {
    let mut rejected = 0usize;
    let mut seen_ids: HashSet<u64> = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for r in raw {
        let subject = normalize_subject_text(&r.subject);
        let group = r.group.trim().to_string();

        if subject.is_empty() || group.is_empty() || !seen_ids.insert(r.id) {
            rejected += 1;
            tracing::debug!(target: "ingest", ticket_id = r.id, "rejected malformed ticket");
            continue;
        }

        out.push(Ticket {
            id: r.id,
            subject,
            group,
            action_taken: clean_optional(r.action_taken),
            existing_product: clean_optional(r.existing_product),
            created_at: r.created_at.date_naive(),
        });
    }

    (out, rejected)
}
