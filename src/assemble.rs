use std::str::FromStr;

use rayon::prelude::*;

use crate::error::{AppendError, Error};
use crate::merge::merge;
use crate::model::{Block, Cell, Document, Paragraph, Row, Run, StyleRegistry, Table, tables_in};
use crate::record::Record;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// One document per record.
    Separate,
    /// One document, records separated by page breaks.
    Combined,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "separate" | "multiple" => Ok(OutputMode::Separate),
            "combined" | "single" => Ok(OutputMode::Combined),
            other => Err(format!("unknown output mode {other:?} (expected separate or combined)")),
        }
    }
}

#[derive(Debug)]
pub enum Assembled {
    Separate(Vec<Document>),
    Combined(Document),
}

impl Assembled {
    pub fn len(&self) -> usize {
        match self {
            Assembled::Separate(docs) => docs.len(),
            Assembled::Combined(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Merges every record into `template` and shapes the result per `mode`.
pub fn assemble(template: &Document, records: &[Record], mode: OutputMode) -> Result<Assembled, Error> {
    if template.body.is_empty() {
        return Err(Error::EmptyTemplate);
    }
    if records.is_empty() {
        return Err(Error::NoRecords);
    }
    match mode {
        OutputMode::Separate => Ok(Assembled::Separate(merge_separate(template, records))),
        OutputMode::Combined => combine(template, records).map(Assembled::Combined),
    }
}

/// One independent document per record, merged in parallel. Output order
/// follows record order.
pub fn merge_separate(template: &Document, records: &[Record]) -> Vec<Document> {
    records
        .par_iter()
        .map(|record| merge(template.clone(), record))
        .collect()
}

/// Makes style `id` available in `target`. A definition only the source has
/// is copied over; an id neither side defines stays a plain reference. Fails
/// when both sides define the id with different kinds.
fn resolve_style(id: &str, source: &StyleRegistry, target: &mut StyleRegistry) -> Result<(), AppendError> {
    let existing = target.get(id).map(|style| style.kind);
    match (existing, source.get(id)) {
        (Some(found), Some(style)) if found != style.kind => Err(AppendError::StyleKindMismatch {
            id: id.to_string(),
            expected: style.kind,
            found,
        }),
        (Some(_), _) => Ok(()),
        (None, Some(style)) => {
            target.insert(style.clone());
            Ok(())
        }
        (None, None) => {
            log::debug!("style {id:?} is not defined; reference kept as is");
            Ok(())
        }
    }
}

fn copy_paragraph(
    para: &Paragraph,
    source: &StyleRegistry,
    target: &mut Document,
) -> Result<Paragraph, AppendError> {
    if let Some(style) = &para.style {
        resolve_style(style, source, &mut target.styles)?;
    }
    if let Some(idx) = para.section_break
        && idx >= target.sections.len()
    {
        return Err(AppendError::DanglingSection(idx));
    }
    Ok(Paragraph {
        style: para.style.clone(),
        alignment: para.alignment,
        runs: para.runs.clone(),
        section_break: para.section_break,
        extra: para.extra.clone(),
    })
}

fn copy_blocks(
    blocks: &[Block],
    source: &StyleRegistry,
    target: &mut Document,
) -> Result<Vec<Block>, AppendError> {
    blocks
        .iter()
        .map(|block| copy_block(block, source, target))
        .collect()
}

fn copy_table(table: &Table, source: &StyleRegistry, target: &mut Document) -> Result<Table, AppendError> {
    if let Some(style) = &table.style {
        resolve_style(style, source, &mut target.styles)?;
    }
    let mut rows = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let mut cells = Vec::with_capacity(row.cells.len());
        for cell in &row.cells {
            cells.push(Cell {
                width: cell.width,
                grid_span: cell.grid_span,
                vertical_merge: cell.vertical_merge,
                shading: cell.shading.clone(),
                borders: cell.borders.clone(),
                extra: cell.extra.clone(),
                blocks: copy_blocks(&cell.blocks, source, target)?,
            });
        }
        rows.push(Row {
            properties: row.properties.clone(),
            cells,
        });
    }
    let copy = Table {
        style: table.style.clone(),
        extra: table.extra.clone(),
        grid: table.grid.clone(),
        rows,
    };
    if copy.shape() != table.shape() {
        return Err(AppendError::ShapeMismatch {
            expected: table.shape(),
            actual: copy.shape(),
        });
    }
    Ok(copy)
}

/// Rebuilds `block` for `target`: styles it references are registered in
/// the target's style registry, everything else is copied element by element.
pub fn copy_block(block: &Block, source: &StyleRegistry, target: &mut Document) -> Result<Block, AppendError> {
    Ok(match block {
        Block::Paragraph(para) => Block::Paragraph(copy_paragraph(para, source, target)?),
        Block::Table(table) => Block::Table(copy_table(table, source, target)?),
        Block::PageBreak => Block::PageBreak,
    })
}

/// Reduced-fidelity copy: text only, default styles, same table dimensions.
/// Nested tables are copied the same way inside their cells.
pub fn plain_copy(block: &Block) -> Block {
    match block {
        Block::Paragraph(para) => Block::Paragraph(plain_paragraph(&para.text())),
        Block::Table(table) => Block::Table(Table {
            style: None,
            extra: Vec::new(),
            grid: table.grid.clone(),
            rows: table
                .rows
                .iter()
                .map(|row| Row {
                    properties: None,
                    cells: row
                        .cells
                        .iter()
                        .map(|cell| Cell {
                            grid_span: cell.grid_span,
                            vertical_merge: cell.vertical_merge,
                            blocks: plain_cell_blocks(cell),
                            ..Cell::default()
                        })
                        .collect(),
                })
                .collect(),
        }),
        Block::PageBreak => Block::PageBreak,
    }
}

fn plain_cell_blocks(cell: &Cell) -> Vec<Block> {
    if cell.blocks.is_empty() {
        return vec![Block::Paragraph(Paragraph::default())];
    }
    cell.blocks.iter().map(plain_copy).collect()
}

fn plain_paragraph(text: &str) -> Paragraph {
    if text.is_empty() {
        return Paragraph::default();
    }
    Paragraph::with_runs(vec![Run::plain(text)])
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CopyMode {
    Structured,
    Plain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CombineState {
    Init,
    MergingRecord(usize),
    AppendingBreak(usize),
    AppendingBlocks(usize),
    Done,
}

/// Sequential COMBINED assembly. Each record passes through merge, page
/// separator and block append, strictly in record order.
struct Combiner<'a> {
    template: &'a Document,
    records: &'a [Record],
    mode: CopyMode,
    combined: Option<Document>,
    pending: Option<Document>,
    separators: usize,
    degraded_blocks: usize,
}

impl<'a> Combiner<'a> {
    fn new(template: &'a Document, records: &'a [Record], mode: CopyMode) -> Self {
        Combiner {
            template,
            records,
            mode,
            combined: None,
            pending: None,
            separators: 0,
            degraded_blocks: 0,
        }
    }

    fn run(mut self) -> Result<Document, Error> {
        let mut state = CombineState::Init;
        while state != CombineState::Done {
            let next = self.step(state)?;
            log::trace!("combine: {state:?} -> {next:?}");
            state = next;
        }
        if self.degraded_blocks > 0 {
            log::warn!("{} blocks were copied without formatting", self.degraded_blocks);
        }
        let combined = self
            .combined
            .ok_or_else(|| Error::Assembly("no record was merged".into()))?;
        verify_combined(self.template, &combined, self.records.len())?;
        Ok(combined)
    }

    fn step(&mut self, state: CombineState) -> Result<CombineState, Error> {
        Ok(match state {
            CombineState::Init => {
                if self.records.is_empty() {
                    return Err(Error::NoRecords);
                }
                CombineState::MergingRecord(0)
            }
            CombineState::MergingRecord(i) => {
                let merged = merge(self.template.clone(), &self.records[i]);
                if i == 0 {
                    match self.mode {
                        CopyMode::Structured => self.combined = Some(merged),
                        CopyMode::Plain => {
                            self.combined = Some(Document {
                                body: Vec::new(),
                                sections: merged.sections.clone(),
                                styles: merged.styles.clone(),
                            });
                            self.pending = Some(merged);
                        }
                    }
                } else {
                    self.pending = Some(merged);
                }
                CombineState::AppendingBreak(i)
            }
            CombineState::AppendingBreak(i) => {
                if i > 0 {
                    self.combined_mut()?.body.push(Block::PageBreak);
                    self.separators += 1;
                }
                CombineState::AppendingBlocks(i)
            }
            CombineState::AppendingBlocks(i) => {
                if let Some(merged) = self.pending.take() {
                    self.append(&merged)?;
                }
                if i + 1 < self.records.len() {
                    CombineState::MergingRecord(i + 1)
                } else {
                    CombineState::Done
                }
            }
            CombineState::Done => CombineState::Done,
        })
    }

    fn combined_mut(&mut self) -> Result<&mut Document, Error> {
        self.combined
            .as_mut()
            .ok_or_else(|| Error::Assembly("combined document not initialised".into()))
    }

    fn append(&mut self, merged: &Document) -> Result<(), Error> {
        let mode = self.mode;
        let mut degraded = 0;
        let target = self.combined_mut()?;
        for block in &merged.body {
            let copy = match mode {
                CopyMode::Plain => plain_copy(block),
                CopyMode::Structured => match copy_block(block, &merged.styles, target) {
                    Ok(copy) => copy,
                    Err(e) => {
                        log::warn!("block copied as plain text: {e}");
                        degraded += 1;
                        plain_copy(block)
                    }
                },
            };
            target.body.push(copy);
        }
        self.degraded_blocks += degraded;
        Ok(())
    }
}

/// Checks the combined body: one template body per record, a page break
/// between consecutive records, and every table (nested ones included) in
/// its template shape.
pub fn verify_combined(template: &Document, combined: &Document, records: usize) -> Result<(), Error> {
    let per_record = template.body.len();
    let expected_len = records * per_record + records.saturating_sub(1);
    if combined.body.len() != expected_len {
        return Err(Error::Assembly(format!(
            "expected {expected_len} blocks for {records} records, found {}",
            combined.body.len()
        )));
    }
    for k in 1..records {
        let at = k * (per_record + 1) - 1;
        if combined.body.get(at) != Some(&Block::PageBreak) {
            return Err(Error::Assembly(format!("missing page separator before record {}", k + 1)));
        }
    }
    for k in 0..records {
        let start = k * (per_record + 1);
        let blocks = &combined.body[start..start + per_record];
        let expected = tables_in(&template.body);
        let found = tables_in(blocks);
        if expected.len() != found.len() {
            return Err(Error::Assembly(format!(
                "record {}: {} tables, template has {}",
                k + 1,
                found.len(),
                expected.len()
            )));
        }
        for (src, copy) in expected.iter().zip(&found) {
            if src.shape() != copy.shape() {
                return Err(Error::Assembly(format!(
                    "record {}: table shape {:?} differs from template {:?}",
                    k + 1,
                    copy.shape(),
                    src.shape()
                )));
            }
        }
    }
    Ok(())
}

/// One way of producing the COMBINED document. Strategies are tried in
/// order by [`combine_with`]; the first success wins.
pub trait CombineStrategy {
    fn name(&self) -> &'static str;
    fn combine(&self, template: &Document, records: &[Record]) -> Result<Document, Error>;
}

/// Element-by-element copies keeping styles, run formatting and table layout.
pub struct StructuredCopy;

impl CombineStrategy for StructuredCopy {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn combine(&self, template: &Document, records: &[Record]) -> Result<Document, Error> {
        Combiner::new(template, records, CopyMode::Structured).run()
    }
}

/// Page break markers plus unstyled copies of every block.
pub struct PlainCopy;

impl CombineStrategy for PlainCopy {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn combine(&self, template: &Document, records: &[Record]) -> Result<Document, Error> {
        Combiner::new(template, records, CopyMode::Plain).run()
    }
}

pub fn combine_with(
    strategies: &[&dyn CombineStrategy],
    template: &Document,
    records: &[Record],
) -> Result<Document, Error> {
    let mut failures = Vec::new();
    for strategy in strategies {
        match strategy.combine(template, records) {
            Ok(doc) => {
                log::info!(
                    "combined {} records using the {} strategy",
                    records.len(),
                    strategy.name()
                );
                return Ok(doc);
            }
            Err(e @ (Error::NoRecords | Error::EmptyTemplate)) => return Err(e),
            Err(e) => {
                log::warn!("{} combine strategy failed: {e}", strategy.name());
                failures.push(format!("{}: {e}", strategy.name()));
            }
        }
    }
    Err(Error::Assembly(failures.join("; ")))
}

pub fn combine(template: &Document, records: &[Record]) -> Result<Document, Error> {
    combine_with(&[&StructuredCopy, &PlainCopy], template, records)
}
