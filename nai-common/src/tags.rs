//! Tag-set algebra over preset values
//!
//! Pure functions used by the preset editor: normalizing tag input,
//! fingerprinting tag sets, detecting duplicate/subset values, factoring out
//! tags shared by every value and finding tags used both plainly and negated.
//!
//! All functions are deterministic: outputs follow input order, never hash
//! iteration order.

use crate::preset::PresetValue;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Separator used by [`tags_key`]; not expected to appear inside a tag.
pub const TAGS_KEY_SEPARATOR: &str = "||";

/// Prefix marking a negated tag (`-red` negates `red`).
pub const NEGATION_PREFIX: char = '-';

/// Split comma-separated user input into trimmed, non-empty tags.
///
/// Duplicates are kept; pass the result through [`normalize_tags`] to drop them.
pub fn normalize_tag_text(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Trim every tag, drop empty ones and keep only the first occurrence of each.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut output = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.as_ref().trim();
        if trimmed.is_empty() || !seen.insert(trimmed) {
            continue;
        }
        output.push(trimmed.to_string());
    }
    output
}

/// Order-insensitive fingerprint of a tag list. Only used for equality checks.
pub fn tags_key<S: AsRef<str>>(tags: &[S]) -> String {
    let mut sorted: Vec<&str> = tags.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.join(TAGS_KEY_SEPARATOR)
}

/// Duplicate and subset relations found among a variable's values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSummary {
    /// Unordered pairs of values with identical tag sets, in input order
    pub duplicates: Vec<(String, String)>,
    /// `(subset, superset)` pairs
    pub subsets: Vec<(String, String)>,
}

impl ConflictSummary {
    pub fn is_empty(&self) -> bool {
        self.duplicates.is_empty() && self.subsets.is_empty()
    }
}

/// Compare every pair of values and report duplicates and subsets.
///
/// Equal keys are reported as duplicates only; the subset tests run only for
/// pairs that are not duplicates.
pub fn detect_conflicts(values: &[PresetValue]) -> ConflictSummary {
    let keys: Vec<String> = values.iter().map(|value| tags_key(&value.tags)).collect();
    let sets: Vec<HashSet<&str>> = values
        .iter()
        .map(|value| value.tags.iter().map(String::as_str).collect())
        .collect();

    let mut summary = ConflictSummary::default();
    for i in 0..values.len() {
        for j in (i + 1)..values.len() {
            let (a, b) = (&values[i].name, &values[j].name);
            if keys[i] == keys[j] {
                summary.duplicates.push((a.clone(), b.clone()));
            } else if sets[i].is_subset(&sets[j]) {
                summary.subsets.push((a.clone(), b.clone()));
            } else if sets[j].is_subset(&sets[i]) {
                summary.subsets.push((b.clone(), a.clone()));
            }
        }
    }
    summary
}

/// Values with the shared tags stripped, plus the shared tags themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonTags {
    pub values: Vec<PresetValue>,
    pub common: Vec<String>,
}

/// Tags present in every value, in the first value's order.
pub fn find_common_tags(values: &[PresetValue]) -> Vec<String> {
    let Some((first, rest)) = values.split_first() else {
        return Vec::new();
    };

    let mut common: Vec<&String> = Vec::new();
    for tag in &first.tags {
        if !common.contains(&tag) {
            common.push(tag);
        }
    }
    for value in rest {
        common.retain(|tag| value.tags.contains(*tag));
    }
    common.into_iter().cloned().collect()
}

/// Copy of `values` with every tag in `common` removed.
pub fn strip_tags<S: AsRef<str>>(values: &[PresetValue], common: &[S]) -> Vec<PresetValue> {
    let common: HashSet<&str> = common.iter().map(AsRef::as_ref).collect();
    values
        .iter()
        .map(|value| PresetValue {
            name: value.name.clone(),
            tags: value
                .tags
                .iter()
                .filter(|tag| !common.contains(tag.as_str()))
                .cloned()
                .collect(),
        })
        .collect()
}

/// Factor out the tags every value shares. The input is left untouched.
pub fn remove_common_tags(values: &[PresetValue]) -> CommonTags {
    let common = find_common_tags(values);
    CommonTags {
        values: strip_tags(values, common.as_slice()),
        common,
    }
}

/// A tag used plainly by some values and negated by others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagConflict {
    pub tag: String,
    pub negative: String,
    /// Values using the tag plainly, then values negating it
    pub values: Vec<String>,
}

#[derive(Default)]
struct Usage<'a> {
    positive: Vec<&'a str>,
    negative: Vec<&'a str>,
}

fn push_unique<'a>(names: &mut Vec<&'a str>, name: &'a str) {
    if !names.contains(&name) {
        names.push(name);
    }
}

/// Find base tags that appear both as `x` and as `-x` across `values`.
///
/// Records come out in the order each base tag was first encountered.
pub fn find_tag_conflicts(values: &[PresetValue]) -> Vec<TagConflict> {
    let mut order: Vec<&str> = Vec::new();
    let mut usage: HashMap<&str, Usage> = HashMap::new();

    for value in values {
        for tag in &value.tags {
            let (base, negated) = match tag.strip_prefix(NEGATION_PREFIX) {
                Some(base) => (base, true),
                None => (tag.as_str(), false),
            };
            if base.is_empty() {
                continue;
            }
            let entry = usage.entry(base).or_insert_with(|| {
                order.push(base);
                Usage::default()
            });
            if negated {
                push_unique(&mut entry.negative, &value.name);
            } else {
                push_unique(&mut entry.positive, &value.name);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|base| {
            let entry = usage.get(base)?;
            if entry.positive.is_empty() || entry.negative.is_empty() {
                return None;
            }
            let mut names: Vec<String> = Vec::new();
            for name in entry.positive.iter().chain(entry.negative.iter()) {
                if !names.iter().any(|existing| existing == name) {
                    names.push(name.to_string());
                }
            }
            Some(TagConflict {
                tag: base.to_string(),
                negative: format!("{NEGATION_PREFIX}{base}"),
                values: names,
            })
        })
        .collect()
}

/// Return `name` if unused, else the first free `name_2`, `name_3`, ...
///
/// The chosen name is inserted into `existing`, so repeated calls while
/// merging several incoming values keep producing fresh names.
pub fn ensure_unique_value_name(name: &str, existing: &mut HashSet<String>) -> String {
    let mut candidate = name.to_string();
    let mut index = 2;
    while existing.contains(&candidate) {
        candidate = format!("{name}_{index}");
        index += 1;
    }
    existing.insert(candidate.clone());
    candidate
}
