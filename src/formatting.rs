use crate::error::FormattingError;
use crate::model::{FontColor, Formatting, Paragraph, Run};

// w:sz is stored in half-points as an unsigned value up to 3276.
const MIN_FONT_SIZE: f32 = 1.0;
const MAX_FONT_SIZE: f32 = 1638.0;

/// The run owning byte `offset` of the flattened run text.
///
/// A run owns `[start, start + len)`, so an offset on a boundary belongs to
/// the run that starts there. Offsets past the end (and paragraphs whose runs
/// are all empty) fall back to the first text run.
pub fn owning_run(runs: &[Run], offset: usize) -> Option<&Run> {
    let mut start = 0;
    for run in runs {
        let end = start + run.text.len();
        if (start..end).contains(&offset) {
            return Some(run);
        }
        start = end;
    }
    runs.iter().find(|r| r.is_text()).or(runs.first())
}

/// Formatting in effect at `offset`; all-unset when the paragraph has no runs.
pub fn resolve(paragraph: &Paragraph, offset: usize) -> Formatting {
    resolve_runs(&paragraph.runs, offset)
}

pub fn resolve_runs(runs: &[Run], offset: usize) -> Formatting {
    owning_run(runs, offset)
        .map(|run| run.formatting.clone())
        .unwrap_or_default()
}

/// Assigns every set attribute of `source` onto `target`. Unset attributes
/// leave `target` untouched. Attributes that cannot be applied are skipped
/// and returned; the others are still applied.
pub fn apply(source: &Formatting, target: &mut Formatting) -> Vec<FormattingError> {
    let mut errors = Vec::new();

    if let Some(bold) = source.bold {
        target.bold = Some(bold);
    }
    if let Some(italic) = source.italic {
        target.italic = Some(italic);
    }
    if let Some(underline) = source.underline {
        target.underline = Some(underline);
    }

    if let Some(name) = &source.font_name {
        if name.trim().is_empty() {
            errors.push(FormattingError::EmptyFontName);
        } else {
            target.font_name = Some(name.clone());
        }
    }

    if let Some(size) = source.font_size {
        if size.is_finite() && (MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&size) {
            target.font_size = Some(size);
        } else {
            errors.push(FormattingError::FontSizeOutOfRange(size));
        }
    }

    match &source.font_color {
        Some(FontColor::Unsupported(val)) => {
            errors.push(FormattingError::UnsupportedColor(val.clone()));
        }
        Some(color) => target.font_color = Some(color.clone()),
        None => {}
    }

    for prop in &source.extra {
        if !target.extra.iter().any(|p| p.name == prop.name) {
            target.extra.push(prop.clone());
        }
    }

    errors
}
