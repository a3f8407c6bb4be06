use std::sync::OnceLock;

use regex::Regex;

use crate::model::Document;

/// One `{{field}}` occurrence in a paragraph's flattened text.
/// Offsets are byte offsets; `end` is exclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenSpan {
    pub field_name: String,
    pub start: usize,
    pub end: usize,
}

static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn token_re() -> &'static Regex {
    // ASCII word characters only; Unicode \w would accept field names the
    // data source never produces.
    TOKEN_RE.get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("static pattern"))
}

/// Cheap pre-filter run before the regex scan.
pub fn may_contain_tokens(text: &str) -> bool {
    text.contains("{{") && text.contains("}}")
}

/// All tokens in `text`, left to right, non-overlapping.
pub fn scan(text: &str) -> Vec<TokenSpan> {
    if !may_contain_tokens(text) {
        return Vec::new();
    }
    token_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            Some(TokenSpan {
                field_name: name.as_str().to_string(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

pub fn contains_token(text: &str) -> bool {
    may_contain_tokens(text) && token_re().is_match(text)
}

/// Distinct field names referenced anywhere in `doc`, in first-seen order.
pub fn field_names(doc: &Document) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    doc.for_each_paragraph(&mut |p| {
        for span in scan(&p.text()) {
            if !names.contains(&span.field_name) {
                names.push(span.field_name);
            }
        }
    });
    names
}
