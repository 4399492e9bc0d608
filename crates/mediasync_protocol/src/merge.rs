//! Client-side merge of list-shaped records.
//!
//! The gateway stores exactly what it is given. Clients fetch the current
//! list, concatenate it with their local copy (`cloud ++ local`) and merge
//! before writing the whole list back. Records are deduplicated by
//! normalized URL; later entries overwrite fields of earlier ones.

use crate::record::Record;
use std::collections::HashMap;

/// Policy for the `saved_at` field when two records share a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Keep the first known timestamp. Used for history lists, where
    /// `saved_at` records when an item was first catalogued.
    #[default]
    KeepOldest,
    /// Keep the most recent timestamp. Used for note-like stores, so a
    /// note edited later is not lost.
    PreferNewest,
}

impl MergePolicy {
    /// Picks the policy for a store key. Keys ending in `_extra_field`
    /// hold user notes and prefer the newest write.
    pub fn for_key(key: &str) -> Self {
        if key.ends_with("_extra_field") {
            MergePolicy::PreferNewest
        } else {
            MergePolicy::KeepOldest
        }
    }

    fn merge_saved_at(&self, existing: Option<i64>, incoming: Option<i64>, now: i64) -> i64 {
        match self {
            MergePolicy::KeepOldest => existing.or(incoming).unwrap_or(now),
            MergePolicy::PreferNewest => {
                let newest = existing.unwrap_or(0).max(incoming.unwrap_or(0));
                if newest > 0 {
                    newest
                } else {
                    now
                }
            }
        }
    }
}

/// Normalizes a record URL for deduplication: trims, drops the query
/// string (a fragment is kept) and strips one trailing slash.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let (before_fragment, fragment) = match trimmed.find('#') {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, ""),
    };
    let mut base = match before_fragment.find('?') {
        Some(idx) => &before_fragment[..idx],
        None => before_fragment,
    };

    if fragment.is_empty() {
        base = base.strip_suffix('/').unwrap_or(base);
        return base.to_string();
    }
    format!("{base}{fragment}")
}

/// Chooses between an incoming and an existing title.
///
/// The incoming title wins when it is non-blank, at least three characters
/// long and different from the existing one.
pub fn better_title(incoming: Option<&str>, existing: Option<&str>) -> Option<String> {
    let new = incoming.map(str::trim).unwrap_or("");
    let old = existing.map(str::trim).unwrap_or("");
    if new.is_empty() {
        return non_empty(old);
    }
    if old.is_empty() {
        return non_empty(new);
    }
    if new.chars().count() >= 3 && new != old {
        return non_empty(new);
    }
    non_empty(old)
}

/// Chooses between an incoming and an existing poster URL.
///
/// The incoming poster wins only when it is a plausible `http(s)` URL
/// longer than eight characters.
pub fn better_poster(incoming: Option<&str>, existing: Option<&str>) -> Option<String> {
    let new = incoming.map(str::trim).unwrap_or("");
    let old = existing.map(str::trim).unwrap_or("");
    if new.len() <= 8 || !is_http_url(new) {
        return non_empty(old);
    }
    non_empty(new)
}

/// Merges records by normalized URL.
///
/// `now` stamps records that carry no `saved_at`. Records whose URL
/// normalizes to an empty string are dropped. Output keeps the order in
/// which each URL was first seen.
pub fn merge_records<I>(records: I, policy: MergePolicy, now: i64) -> Vec<Record>
where
    I: IntoIterator<Item = Record>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<Record> = Vec::new();

    for item in records {
        let url = normalize_url(&item.url);
        if url.is_empty() {
            continue;
        }

        match index.get(&url) {
            None => {
                let mut record = item;
                record.url = url.clone();
                if policy == MergePolicy::KeepOldest {
                    record.title = non_empty(record.title.as_deref().unwrap_or("").trim());
                    record.poster = non_empty(record.poster.as_deref().unwrap_or("").trim());
                }
                record.saved_at = Some(record.saved_at.unwrap_or(now));
                index.insert(url, merged.len());
                merged.push(record);
            }
            Some(&pos) => {
                let existing = &mut merged[pos];
                let saved_at = policy.merge_saved_at(existing.saved_at, item.saved_at, now);
                let title = better_title(item.title.as_deref(), existing.title.as_deref());
                let poster = better_poster(item.poster.as_deref(), existing.poster.as_deref());

                for (name, value) in item.extra {
                    existing.extra.insert(name, value);
                }
                existing.url = url;
                existing.saved_at = Some(saved_at);
                existing.title = title;
                existing.poster = poster;
            }
        }
    }

    merged
}

fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("http://")
        .or_else(|| value.strip_prefix("https://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or("");
            !host.is_empty() && !host.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
