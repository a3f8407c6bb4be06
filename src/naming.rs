use std::collections::HashSet;

use crate::record::Record;

const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if INVALID_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect::<String>()
        .trim()
        .trim_end_matches('.')
        .to_string()
}

/// Hands out per-record file stems, unique within one merge run.
#[derive(Default)]
pub struct OutputNames {
    used: HashSet<String>,
}

impl OutputNames {
    pub fn new() -> Self {
        OutputNames::default()
    }

    /// Stem for the record at `index` (0-based): its first field value, or
    /// `record_<n>` when that is empty. Repeats get `_1`, `_2`, … suffixes.
    pub fn next(&mut self, record: &Record, index: usize) -> String {
        let base = record.first_value().map(sanitize).unwrap_or_default();
        let base = if base.is_empty() {
            format!("record_{}", index + 1)
        } else {
            base
        };

        let mut candidate = base.clone();
        let mut counter = 1;
        while !self.used.insert(candidate.to_lowercase()) {
            candidate = format!("{base}_{counter}");
            counter += 1;
        }
        candidate
    }
}
