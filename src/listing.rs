//! Listing model: entries, groups and their display helpers.
//!
//! A flat listing is partitioned by the first `/`-delimited segment of each
//! key.  Groups are ordered by name, descending; entries keep the order in
//! which the provider listed them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;

use crate::storage::lister::ListedObject;

/// Base for human-readable sizes.
const UNIT: i64 = 1024;

/// Unit prefixes above bytes.
const UNIT_PREFIXES: &[u8] = b"KMGTPE";

/// Characters escaped in a key when URL encoding is enabled.  `/` stays
/// literal so the key keeps its path shape.
const KEY_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// One listed object, ready to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Public URL of the object.
    pub url: String,
    /// Size in bytes.
    pub size: i64,
    /// Full storage key.
    #[serde(skip)]
    pub key: String,
    /// Last-modified timestamp.
    #[serde(skip)]
    pub last_modified: DateTime<Utc>,
}

impl Entry {
    /// Build an entry from a listed object.
    ///
    /// The URL is `public_domain + key`.  With `encode_keys` unset the key is
    /// appended verbatim, which yields an invalid URL for keys containing
    /// spaces or reserved characters.
    pub fn from_listed(object: ListedObject, public_domain: &str, encode_keys: bool) -> Self {
        let url = if encode_keys {
            format!(
                "{public_domain}{}",
                utf8_percent_encode(&object.key, KEY_ENCODE_SET)
            )
        } else {
            format!("{public_domain}{}", object.key)
        };
        Self {
            url,
            size: object.size,
            key: object.key,
            last_modified: object.last_modified,
        }
    }

    /// Last path segment of the key.
    pub fn short_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    /// First path segment of the key, or `None` for top-level objects.
    pub fn group_name(&self) -> Option<&str> {
        self.key.split_once('/').map(|(first, _)| first)
    }

    /// Size rendered as bytes or base-1024 units with one decimal.
    pub fn human_readable_size(&self) -> String {
        human_readable_size(self.size)
    }

    /// Last-modified time as `YYYY-MM-DD HH:MM:SS` (UTC).
    pub fn last_modified_display(&self) -> String {
        self.last_modified.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Entries sharing a first path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    /// Group name.
    pub name: String,
    /// Members in listing order.
    #[serde(rename = "urls")]
    pub entries: Vec<Entry>,
}

/// Format a byte count: `n B` below 1024, otherwise `x.x KB`, `x.x MB`, ...
pub fn human_readable_size(size: i64) -> String {
    if size < UNIT {
        return format!("{size} B");
    }
    let mut div = UNIT;
    let mut exp = 0usize;
    let mut n = size / UNIT;
    while n >= UNIT && exp + 1 < UNIT_PREFIXES.len() {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!(
        "{:.1} {}B",
        size as f64 / div as f64,
        UNIT_PREFIXES[exp] as char
    )
}

/// Partition entries by first path segment.
///
/// Keys without `/` go to `ungrouped_name`.  Every entry lands in exactly
/// one group; groups are sorted by name in descending order.
pub fn group_entries(entries: Vec<Entry>, ungrouped_name: &str) -> Vec<Group> {
    let mut groups: BTreeMap<String, Vec<Entry>> = BTreeMap::new();
    for entry in entries {
        let name = entry.group_name().unwrap_or(ungrouped_name).to_string();
        groups.entry(name).or_default().push(entry);
    }
    groups
        .into_iter()
        .rev()
        .map(|(name, entries)| Group { name, entries })
        .collect()
}

// -- Tests -------------------------------------------------------------------
