#![forbid(unsafe_code)]

use crate::ids::{ColumnKey, MAX_COLUMN_KEY_LEN};

const FALLBACK_SLUG: &str = "column";
// Leaves room for a numeric disambiguation suffix.
const MAX_SLUG_LEN: usize = MAX_COLUMN_KEY_LEN - 16;

pub fn slugify(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for ch in label.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.truncate(MAX_SLUG_LEN);
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Derives a key from `label` that collides with none of `existing`,
/// appending `-1`, `-2`, ... until a free key is found.
pub fn unique_column_key<'a>(
    label: &str,
    existing: impl IntoIterator<Item = &'a ColumnKey>,
) -> ColumnKey {
    let taken = existing
        .into_iter()
        .map(ColumnKey::as_str)
        .collect::<std::collections::BTreeSet<_>>();
    let base = slugify(label);
    let mut candidate = base.clone();
    let mut suffix = 1u32;
    while taken.contains(candidate.as_str()) {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    match ColumnKey::try_new(candidate) {
        Ok(key) => key,
        Err(_) => unreachable!("slugify only emits valid column key characters"),
    }
}
