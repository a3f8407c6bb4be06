#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

/// A `w:pPr`/`w:rPr`/`w:tblPr`/`w:tcPr` child the model does not interpret,
/// kept verbatim so it can be written back in schema order.
#[derive(Clone, Debug, PartialEq)]
pub struct RawProperty {
    pub name: String, // local element name, e.g. "spacing"
    pub xml: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FontColor {
    Rgb([u8; 3]),
    Auto,
    Unsupported(String),
}

/// Character formatting of a run. `None` means "inherit from the style".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Formatting {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub font_name: Option<String>,
    pub font_size: Option<f32>, // points
    pub font_color: Option<FontColor>,
    pub extra: Vec<RawProperty>,
}

impl Formatting {
    pub fn is_unset(&self) -> bool {
        *self == Formatting::default()
    }
}

/// Paragraph content the model does not interpret, written back verbatim.
#[derive(Clone, Debug, PartialEq)]
pub enum RawInline {
    /// A non-text run child such as `w:drawing`, `w:fldChar` or `w:instrText`.
    /// Written inside a `w:r` that carries the run's formatting.
    RunContent(String),
    /// A paragraph child that is not a run, e.g. `w:bookmarkStart` or `w:fldSimple`.
    Element(String),
}

/// A run of text with uniform formatting. A run holding `raw` content has
/// empty `text` and takes no room in the paragraph's character offsets.
#[derive(Clone, Debug, PartialEq)]
pub struct Run {
    pub text: String,
    pub formatting: Formatting,
    pub raw: Option<RawInline>,
}

impl Run {
    pub fn new(text: impl Into<String>, formatting: Formatting) -> Self {
        Run {
            text: text.into(),
            formatting,
            raw: None,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Run::new(text, Formatting::default())
    }

    pub fn raw(raw: RawInline, formatting: Formatting) -> Self {
        Run {
            text: String::new(),
            formatting,
            raw: Some(raw),
        }
    }

    pub fn is_text(&self) -> bool {
        self.raw.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Paragraph {
    pub style: Option<String>,
    pub alignment: Option<Alignment>,
    pub runs: Vec<Run>,
    /// Set on the last paragraph of a non-final section: index into `Document::sections`.
    pub section_break: Option<usize>,
    pub extra: Vec<RawProperty>,
}

impl Paragraph {
    pub fn with_runs(runs: Vec<Run>) -> Self {
        Paragraph { runs, ..Default::default() }
    }

    /// The paragraph's flattened text: all run texts concatenated in order.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn text_len(&self) -> usize {
        self.runs.iter().map(|r| r.text.len()).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VerticalMerge {
    Restart,
    Continue,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub width: Option<u32>, // twips
    pub grid_span: u32,
    pub vertical_merge: Option<VerticalMerge>,
    pub shading: Option<String>, // fill, hex
    pub borders: Option<String>, // raw w:tcBorders
    pub extra: Vec<RawProperty>,
    pub blocks: Vec<Block>,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            width: None,
            grid_span: 1,
            vertical_merge: None,
            shading: None,
            borders: None,
            extra: Vec::new(),
            blocks: Vec::new(),
        }
    }
}

impl Cell {
    pub fn text(&self) -> String {
        let mut parts = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Paragraph(p) => parts.push(p.text()),
                Block::Table(t) => parts.extend(t.rows.iter().flat_map(|r| r.cells.iter().map(Cell::text))),
                Block::PageBreak => {}
            }
        }
        parts.join("\n")
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    pub properties: Option<String>, // raw w:trPr
    pub cells: Vec<Cell>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub style: Option<String>,
    pub extra: Vec<RawProperty>,
    pub grid: Vec<u32>, // column widths, twips
    pub rows: Vec<Row>,
}

impl Table {
    /// (rows, columns). Columns come from the grid, or from the widest row
    /// when the table carries no grid.
    pub fn shape(&self) -> (usize, usize) {
        let cols = if self.grid.is_empty() {
            self.rows
                .iter()
                .map(|r| r.cells.iter().map(|c| c.grid_span.max(1) as usize).sum())
                .max()
                .unwrap_or(0)
        } else {
            self.grid.len()
        };
        (self.rows.len(), cols)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    PageBreak,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HeaderFooterKind {
    Header,
    Footer,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HeaderFooter {
    pub kind: HeaderFooterKind,
    pub part: String, // e.g. "word/header1.xml"
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Section {
    pub properties: String, // raw w:sectPr
    pub header_footers: Vec<HeaderFooter>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StyleKind {
    Paragraph,
    Character,
    Table,
    Numbering,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Style {
    pub id: String,
    pub kind: StyleKind,
    pub xml: String,
}

/// Named styles of one document. Inserts are append-only: inserting an id
/// that is already registered leaves the registry unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StyleRegistry {
    styles: Vec<Style>,
    added: Vec<String>,
}

impl StyleRegistry {
    pub fn from_styles(styles: Vec<Style>) -> Self {
        StyleRegistry { styles, added: Vec::new() }
    }

    pub fn get(&self, id: &str) -> Option<&Style> {
        self.styles.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Returns true when the style was not yet present.
    pub fn insert(&mut self, style: Style) -> bool {
        if self.contains(&style.id) {
            return false;
        }
        self.added.push(style.id.clone());
        self.styles.push(style);
        true
    }

    /// Styles inserted after the registry was loaded, in insertion order.
    pub fn added(&self) -> impl Iterator<Item = &Style> {
        self.added.iter().filter_map(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    pub body: Vec<Block>,
    /// In document order; the last entry is the body-level `w:sectPr`.
    pub sections: Vec<Section>,
    pub styles: StyleRegistry,
}

impl Document {
    pub fn header_footers(&self) -> impl Iterator<Item = &HeaderFooter> {
        self.sections.iter().flat_map(|s| s.header_footers.iter())
    }

    /// Visits every paragraph in document order: body (including table cells,
    /// recursively), then each section's headers and footers.
    pub fn for_each_paragraph(&self, f: &mut impl FnMut(&Paragraph)) {
        visit_paragraphs(&self.body, f);
        for hf in self.header_footers() {
            visit_paragraphs(&hf.blocks, f);
        }
    }

    pub fn for_each_paragraph_mut(&mut self, f: &mut impl FnMut(&mut Paragraph)) {
        visit_paragraphs_mut(&mut self.body, f);
        for section in &mut self.sections {
            for hf in &mut section.header_footers {
                visit_paragraphs_mut(&mut hf.blocks, f);
            }
        }
    }

    pub fn tables(&self) -> Vec<&Table> {
        tables_in(&self.body)
    }
}

pub fn visit_paragraphs(blocks: &[Block], f: &mut impl FnMut(&Paragraph)) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => f(p),
            Block::Table(t) => {
                for cell in t.rows.iter().flat_map(|r| r.cells.iter()) {
                    visit_paragraphs(&cell.blocks, f);
                }
            }
            Block::PageBreak => {}
        }
    }
}

pub fn visit_paragraphs_mut(blocks: &mut [Block], f: &mut impl FnMut(&mut Paragraph)) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => f(p),
            Block::Table(t) => {
                for cell in t.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
                    visit_paragraphs_mut(&mut cell.blocks, f);
                }
            }
            Block::PageBreak => {}
        }
    }
}

/// Every table in `blocks`, including tables nested inside cells, in document order.
pub fn tables_in(blocks: &[Block]) -> Vec<&Table> {
    let mut out = Vec::new();
    collect_tables(blocks, &mut out);
    out
}

fn collect_tables<'a>(blocks: &'a [Block], out: &mut Vec<&'a Table>) {
    for block in blocks {
        if let Block::Table(t) = block {
            out.push(t);
            for cell in t.rows.iter().flat_map(|r| r.cells.iter()) {
                collect_tables(&cell.blocks, out);
            }
        }
    }
}
