// src/ingest/mod.rs
//! Item pipeline: normalize -> filter -> dedup -> rank -> select -> render.
//! Pure transformation; fetching lives in `providers`.

pub mod digest;
pub mod providers;
pub mod types;
pub mod xml;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::ingest::types::{NormalizedItem, ProcessedFeed, RawItem};
use crate::target::selection_size;

/// Max characters of the normalized title that take part in dedup.
pub const FINGERPRINT_MAX_CHARS: usize = 140;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_items_raw_total", "Raw entries handed to the pipeline.");
        describe_counter!(
            "ingest_filtered_total",
            "Entries dropped because the title was empty."
        );
        describe_counter!(
            "ingest_dedup_total",
            "Entries dropped as fingerprint duplicates."
        );
        describe_histogram!("brief_items_selected", "Headlines kept per run.");
    });
}

/// Start of the Unix epoch; the rank of undated items.
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

fn from_offset(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}

/// Parse a feed date (RFC 2822, RFC 3339, or RFC 2822 with named zones).
/// Anything else maps to the epoch.
pub fn parse_published(raw: &str) -> DateTime<Utc> {
    let s = raw.trim();
    OffsetDateTime::parse(s, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .ok()
        .and_then(from_offset)
        .or_else(|| {
            DateTime::parse_from_rfc2822(s)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
        .unwrap_or_else(epoch)
}

pub fn normalize_item(raw: &RawItem) -> NormalizedItem {
    NormalizedItem {
        title: raw.title.as_deref().unwrap_or_default().trim().to_string(),
        link: raw.link.as_ref().map(|l| l.resolve()).unwrap_or_default(),
        description: raw.description.clone().unwrap_or_default(),
        published_at: raw
            .pub_date
            .as_deref()
            .map(parse_published)
            .unwrap_or_else(epoch),
    }
}

/// Lowercase, whitespace runs -> one space, first 140 chars.
pub fn fingerprint(title: &str) -> String {
    let lower = title.to_lowercase();
    digest::re_ws()
        .replace_all(&lower, " ")
        .chars()
        .take(FINGERPRINT_MAX_CHARS)
        .collect()
}

/// Normalize, drop empty titles, keep the first item per fingerprint.
/// Returns (kept, filtered_count, dedup_count); kept preserves feed order.
pub fn normalize_filter_dedup(raw: &[RawItem]) -> (Vec<NormalizedItem>, usize, usize) {
    let mut filtered_out = 0usize;
    let mut dedup_out = 0usize;
    let mut seen: HashSet<String> = HashSet::new();
    let mut keep = Vec::with_capacity(raw.len());

    for it in raw {
        let n = normalize_item(it);
        if n.title.is_empty() {
            filtered_out += 1;
            continue;
        }
        if !seen.insert(fingerprint(&n.title)) {
            dedup_out += 1;
            continue;
        }
        keep.push(n);
    }

    (keep, filtered_out, dedup_out)
}

/// Newest first (stable, so equal timestamps keep feed order), then cap.
pub fn rank_and_select(mut items: Vec<NormalizedItem>, limit: usize) -> Vec<NormalizedItem> {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items.truncate(limit);
    items
}

/// Full pipeline for one feed.
pub fn process(raw: &[RawItem], page_size: Option<usize>) -> ProcessedFeed {
    ensure_metrics_described();

    let (unique, filtered, dedup) = normalize_filter_dedup(raw);
    let items = rank_and_select(unique, selection_size(page_size));
    let digest_lines = digest::render_lines(&items);
    let digest_text = digest_lines.join("\n");

    counter!("feed_items_raw_total").increment(raw.len() as u64);
    counter!("ingest_filtered_total").increment(filtered as u64);
    counter!("ingest_dedup_total").increment(dedup as u64);
    histogram!("brief_items_selected").record(items.len() as f64);

    tracing::debug!(
        target: "ingest",
        raw = raw.len(),
        filtered,
        dedup,
        selected = items.len(),
        "items processed"
    );

    ProcessedFeed {
        items,
        digest_lines,
        digest_text,
    }
}
