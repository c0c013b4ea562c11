// src/ingest/digest.rs
//! Compact one-line-per-headline rendering used as AI input and stored as `brief`.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ingest::types::NormalizedItem;

/// Max characters of cleaned description kept per line.
pub const DESCRIPTION_MAX_CHARS: usize = 180;
pub const BULLET: &str = "• ";
const ELLIPSIS: char = '…';

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag regex"))
}

pub(crate) fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

/// Strip tags, collapse whitespace, trim, cap at 180 chars (+ `…` when cut).
pub fn clean_description(desc: &str) -> String {
    let no_tags = re_tags().replace_all(desc, "");
    let collapsed = re_ws().replace_all(&no_tags, " ");
    let clean = collapsed.trim();

    if clean.chars().count() > DESCRIPTION_MAX_CHARS {
        let mut short: String = clean.chars().take(DESCRIPTION_MAX_CHARS).collect();
        short.push(ELLIPSIS);
        short
    } else {
        clean.to_string()
    }
}

/// `"{title} — {clean}"`, or just the title when nothing survives cleaning.
pub fn summarize_line(title: &str, description: &str) -> String {
    let short = clean_description(description);
    if short.is_empty() {
        title.to_string()
    } else {
        format!("{title} — {short}")
    }
}

/// Bulleted lines, one per item, in the given order.
pub fn render_lines(items: &[NormalizedItem]) -> Vec<String> {
    items
        .iter()
        .map(|it| format!("{BULLET}{}", summarize_line(&it.title, &it.description)))
        .collect()
}
