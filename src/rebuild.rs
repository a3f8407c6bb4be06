use crate::formatting;
use crate::model::{Formatting, Paragraph, RawInline, Run};
use crate::placeholder::TokenSpan;
use crate::record::Record;

/// A piece of rebuilt paragraph content and the formatting it should carry.
/// Raw content (drawings, fields, bookmarks) travels with empty `text`.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub text: String,
    pub formatting: Formatting,
    pub raw: Option<RawInline>,
}

impl Fragment {
    pub fn new(text: impl Into<String>, formatting: Formatting) -> Self {
        Fragment {
            text: text.into(),
            formatting,
            raw: None,
        }
    }
}

/// Replaces every span in `paragraph` with the record's value.
///
/// Text outside the spans keeps the formatting of the run it came from; each
/// replacement takes the formatting found at its token's start offset. Raw
/// runs stay where they were; one sitting inside a token follows the
/// replacement. The new run list is built completely before it replaces the
/// old one.
pub fn rebuild(paragraph: &mut Paragraph, spans: &[TokenSpan], record: &Record) {
    if spans.is_empty() {
        return;
    }
    let fragments = fragments(&paragraph.runs, spans, record);
    paragraph.runs = commit(fragments);
}

/// Splits the paragraph into literal and replacement fragments, left to right.
pub fn fragments(runs: &[Run], spans: &[TokenSpan], record: &Record) -> Vec<Fragment> {
    let text: String = runs.iter().map(|r| r.text.as_str()).collect();
    let mut out = Vec::with_capacity(runs.len() + spans.len() * 2);
    let mut walk = RunWalk::new(runs);
    let mut cursor = 0;

    for span in spans {
        if span.start < cursor || span.end > text.len() || text.get(span.start..span.end).is_none() {
            log::warn!(
                "ignoring token {:?} at {}..{}: outside paragraph text or overlapping",
                span.field_name,
                span.start,
                span.end
            );
            continue;
        }
        walk.literal(&mut out, cursor, span.start);
        out.push(Fragment::new(
            record.get(&span.field_name),
            formatting::resolve_runs(runs, span.start),
        ));
        cursor = span.end;
    }
    walk.literal(&mut out, cursor, text.len());
    out
}

/// Walks the runs once, left to right, as literal ranges are emitted.
struct RunWalk<'r> {
    runs: &'r [Run],
    next: usize,
    start: usize, // offset of runs[next]
}

impl<'r> RunWalk<'r> {
    fn new(runs: &'r [Run]) -> Self {
        RunWalk { runs, next: 0, start: 0 }
    }

    /// Emits `[from, to)` split wherever the original runs change, so each
    /// piece keeps the formatting of the run that owned it, together with
    /// every raw run positioned at or before `to`.
    fn literal(&mut self, out: &mut Vec<Fragment>, from: usize, to: usize) {
        let runs = self.runs;
        while let Some(run) = runs.get(self.next) {
            if let Some(raw) = &run.raw {
                if self.start > to {
                    break;
                }
                out.push(Fragment {
                    text: String::new(),
                    formatting: run.formatting.clone(),
                    raw: Some(raw.clone()),
                });
                self.next += 1;
                continue;
            }
            let end = self.start + run.text.len();
            let lo = from.max(self.start);
            let hi = to.min(end);
            if lo < hi {
                out.push(Fragment::new(
                    &run.text[lo - self.start..hi - self.start],
                    run.formatting.clone(),
                ));
            }
            if end > to {
                break;
            }
            self.next += 1;
            self.start = end;
        }
    }
}

/// Turns fragments into runs, dropping empty text. Formatting is assigned
/// attribute by attribute; an attribute that cannot be applied is logged and
/// skipped without affecting the text.
pub fn commit(fragments: Vec<Fragment>) -> Vec<Run> {
    fragments
        .into_iter()
        .filter(|f| !f.text.is_empty() || f.raw.is_some())
        .map(|f| {
            if let Some(raw) = f.raw {
                return Run::raw(raw, f.formatting);
            }
            let mut run = Run::plain(f.text);
            for err in formatting::apply(&f.formatting, &mut run.formatting) {
                log::warn!("formatting dropped for {:?}: {err}", run.text);
            }
            run
        })
        .collect()
}
