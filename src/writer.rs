use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::ops::Range;

use crate::docx::{DOCUMENT_PART, PAGE_BREAK, PartFrame, STYLES_PART};
use crate::error::Error;
use crate::model::{
    Alignment, Block, Cell, Document, FontColor, Formatting, Paragraph, RawInline, RawProperty,
    Run, Section, Table, VerticalMerge,
};
use crate::package::DocxPackage;

// Child order required by the WordprocessingML schema.
const PPR_ORDER: &[&str] = &[
    "pStyle", "keepNext", "keepLines", "pageBreakBefore", "framePr", "widowControl", "numPr",
    "suppressLineNumbers", "pBdr", "shd", "tabs", "suppressAutoHyphens", "kinsoku", "wordWrap",
    "overflowPunct", "topLinePunct", "autoSpaceDE", "autoSpaceDN", "bidi", "adjustRightInd",
    "snapToGrid", "spacing", "ind", "contextualSpacing", "mirrorIndents", "suppressOverlap", "jc",
    "textDirection", "textAlignment", "textboxTightWrap", "outlineLvl", "divId", "cnfStyle", "rPr",
    "sectPr", "pPrChange",
];

const RPR_ORDER: &[&str] = &[
    "rStyle", "rFonts", "b", "bCs", "i", "iCs", "caps", "smallCaps", "strike", "dstrike",
    "outline", "shadow", "emboss", "imprint", "noProof", "snapToGrid", "vanish", "webHidden",
    "color", "spacing", "w", "kern", "position", "sz", "szCs", "highlight", "u", "effect", "bdr",
    "shd", "fitText", "vertAlign", "rtl", "cs", "em", "lang", "eastAsianLayout", "specVanish",
    "oMath", "rPrChange",
];

const TBLPR_ORDER: &[&str] = &[
    "tblStyle", "tblpPr", "tblOverlap", "bidiVisual", "tblStyleRowBandSize",
    "tblStyleColBandSize", "tblW", "jc", "tblCellSpacing", "tblInd", "tblBorders", "shd",
    "tblLayout", "tblCellMar", "tblLook", "tblCaption", "tblDescription", "tblPrChange",
];

const TCPR_ORDER: &[&str] = &[
    "cnfStyle", "tcW", "gridSpan", "hMerge", "vMerge", "tcBorders", "shd", "noWrap", "tcMar",
    "textDirection", "tcFitText", "vAlign", "hideMark", "headers", "cellIns", "cellDel",
    "cellMerge", "tcPrChange",
];

const DEFAULT_GRID_COL: u32 = 2000;

fn rank(order: &[&str], name: &str) -> usize {
    order.iter().position(|n| *n == name).unwrap_or(order.len())
}

fn is_xml_char(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

/// Escapes markup characters and drops characters XML 1.0 cannot carry.
fn escape_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ if !is_xml_char(ch) => {}
            _ => out.push(ch),
        }
    }
}

fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => escape_text(&mut out, ch.encode_utf8(&mut [0u8; 4])),
        }
    }
    out
}

/// Byte range of the value of attribute `qname` inside the start tag `xml`.
fn attr_value_range(xml: &str, qname: &str) -> Option<Range<usize>> {
    let mut from = 0;
    while let Some(found) = xml[from..].find(qname) {
        let start = from + found;
        from = start + qname.len();
        let after = xml[from..].trim_start();
        if !xml[..start].ends_with(char::is_whitespace) || !after.starts_with('=') {
            continue;
        }
        let quoted = after[1..].trim_start();
        let quote = quoted.chars().next().filter(|q| *q == '"' || *q == '\'')?;
        let value_start = xml.len() - quoted.len() + 1;
        let value_end = value_start + xml[value_start..].find(quote)?;
        return Some(value_start..value_end);
    }
    None
}

/// Sets attribute `qname` of the start tag `xml` to the already escaped `value`.
fn set_attr(xml: &str, qname: &str, value: &str) -> String {
    if let Some(range) = attr_value_range(xml, qname) {
        let mut out = xml.to_string();
        out.replace_range(range, value);
        return out;
    }
    let Some(close) = xml.find('>') else {
        return xml.to_string();
    };
    let at = if xml[..close].ends_with('/') { close - 1 } else { close };
    let mut out = xml.to_string();
    out.insert_str(at, &format!(" {qname}=\"{value}\""));
    out
}

/// Points the ascii and hAnsi slots of a source `w:rFonts` at `name`. The
/// other slots and theme attributes stay as they were.
fn retarget_fonts(raw: &str, p: &str, name: &str) -> String {
    let ascii = format!("{p}ascii");
    let value = escape_attr(name);
    if attr_value_range(raw, &ascii).is_some_and(|r| raw[r] == value) {
        return raw.to_string();
    }
    let xml = set_attr(raw, &ascii, &value);
    set_attr(&xml, &format!("{p}hAnsi"), &value)
}

/// Collects property children with their schema rank and writes them sorted.
struct PropertyList<'o> {
    order: &'o [&'o str],
    items: Vec<(usize, String)>,
}

impl<'o> PropertyList<'o> {
    fn new(order: &'o [&'o str]) -> Self {
        PropertyList { order, items: Vec::new() }
    }

    fn push(&mut self, name: &str, xml: String) {
        self.items.push((rank(self.order, name), xml));
    }

    fn extend(&mut self, extra: &[RawProperty]) {
        for prop in extra {
            self.push(&prop.name, prop.xml.clone());
        }
    }

    fn has(&self, name: &str) -> bool {
        let r = rank(self.order, name);
        r < self.order.len() && self.items.iter().any(|(i, _)| *i == r)
    }

    fn write(mut self, out: &mut String, p: &str, element: &str) {
        if self.items.is_empty() {
            return;
        }
        self.items.sort_by_key(|(r, _)| *r);
        let _ = write!(out, "<{p}{element}>");
        for (_, xml) in self.items {
            out.push_str(&xml);
        }
        let _ = write!(out, "</{p}{element}>");
    }
}

/// Serializes blocks using `p` as the WordprocessingML prefix (e.g. `"w:"`).
pub struct BlockWriter<'d> {
    p: &'d str,
    sections: &'d [Section],
}

impl<'d> BlockWriter<'d> {
    pub fn new(prefix: &'d str, sections: &'d [Section]) -> Self {
        BlockWriter { p: prefix, sections }
    }

    pub fn blocks(&self, out: &mut String, blocks: &[Block]) {
        for block in blocks {
            match block {
                Block::Paragraph(para) => self.paragraph(out, para),
                Block::Table(table) => self.table(out, table),
                Block::PageBreak => self.page_break(out),
            }
        }
    }

    fn page_break(&self, out: &mut String) {
        let p = self.p;
        let _ = write!(out, "<{p}p><{p}r><{p}br {p}type=\"page\"/></{p}r></{p}p>");
    }

    fn paragraph(&self, out: &mut String, para: &Paragraph) {
        let p = self.p;
        let _ = write!(out, "<{p}p>");

        let mut props = PropertyList::new(PPR_ORDER);
        if let Some(style) = &para.style {
            props.push("pStyle", format!("<{p}pStyle {p}val=\"{}\"/>", escape_attr(style)));
        }
        if let Some(alignment) = para.alignment {
            let val = match alignment {
                Alignment::Left => "left",
                Alignment::Center => "center",
                Alignment::Right => "right",
                Alignment::Justify => "both",
            };
            props.push("jc", format!("<{p}jc {p}val=\"{val}\"/>"));
        }
        props.extend(&para.extra);
        if let Some(section) = para.section_break.and_then(|i| self.sections.get(i)) {
            props.push("sectPr", section.properties.clone());
        }
        props.write(out, p, "pPr");

        for run in &para.runs {
            self.run(out, run);
        }
        let _ = write!(out, "</{p}p>");
    }

    fn run(&self, out: &mut String, run: &Run) {
        let p = self.p;
        if let Some(RawInline::Element(xml)) = &run.raw {
            out.push_str(xml);
            return;
        }
        let _ = write!(out, "<{p}r>");
        self.run_properties(out, &run.formatting);
        if let Some(RawInline::RunContent(xml)) = &run.raw {
            out.push_str(xml);
            let _ = write!(out, "</{p}r>");
            return;
        }

        let mut pending = String::new();
        let mut chars = run.text.chars().peekable();
        while let Some(ch) = chars.next() {
            let special = match ch {
                '\t' => Some(format!("<{p}tab/>")),
                '\r' => {
                    chars.next_if_eq(&'\n');
                    Some(format!("<{p}br/>"))
                }
                '\n' | '\u{b}' => Some(format!("<{p}br/>")),
                PAGE_BREAK => Some(format!("<{p}br {p}type=\"page\"/>")),
                _ if !is_xml_char(ch) => continue,
                _ => None,
            };
            match special {
                Some(xml) => {
                    self.text(out, &pending);
                    pending.clear();
                    out.push_str(&xml);
                }
                None => pending.push(ch),
            }
        }
        self.text(out, &pending);
        let _ = write!(out, "</{p}r>");
    }

    fn text(&self, out: &mut String, text: &str) {
        if text.is_empty() {
            return;
        }
        let p = self.p;
        let preserve = text.starts_with(char::is_whitespace)
            || text.ends_with(char::is_whitespace)
            || text.contains("  ");
        if preserve {
            let _ = write!(out, "<{p}t xml:space=\"preserve\">");
        } else {
            let _ = write!(out, "<{p}t>");
        }
        escape_text(out, text);
        let _ = write!(out, "</{p}t>");
    }

    fn run_properties(&self, out: &mut String, fmt: &Formatting) {
        let p = self.p;
        let on_off = |name: &str, on: bool| {
            if on {
                format!("<{p}{name}/>")
            } else {
                format!("<{p}{name} {p}val=\"0\"/>")
            }
        };

        let mut props = PropertyList::new(RPR_ORDER);
        if let Some(name) = &fmt.font_name {
            let xml = match fmt.extra.iter().find(|e| e.name == "rFonts") {
                Some(fonts) => retarget_fonts(&fonts.xml, p, name),
                None => {
                    let name = escape_attr(name);
                    format!("<{p}rFonts {p}ascii=\"{name}\" {p}hAnsi=\"{name}\"/>")
                }
            };
            props.push("rFonts", xml);
        }
        if let Some(bold) = fmt.bold {
            props.push("b", on_off("b", bold));
        }
        if let Some(italic) = fmt.italic {
            props.push("i", on_off("i", italic));
        }
        if let Some(color) = &fmt.font_color {
            let val = match color {
                FontColor::Rgb([r, g, b]) => format!("{r:02X}{g:02X}{b:02X}"),
                FontColor::Auto => "auto".to_string(),
                FontColor::Unsupported(raw) => escape_attr(raw),
            };
            props.push("color", format!("<{p}color {p}val=\"{val}\"/>"));
        }
        if let Some(size) = fmt.font_size {
            let half_points = (size * 2.0).round() as u32;
            props.push("sz", format!("<{p}sz {p}val=\"{half_points}\"/>"));
        }
        if let Some(underline) = fmt.underline {
            let val = if underline { "single" } else { "none" };
            props.push("u", format!("<{p}u {p}val=\"{val}\"/>"));
        }
        for prop in &fmt.extra {
            if prop.name == "rFonts" && fmt.font_name.is_some() {
                continue;
            }
            props.push(&prop.name, prop.xml.clone());
        }
        props.write(out, p, "rPr");
    }

    fn table(&self, out: &mut String, table: &Table) {
        let p = self.p;
        let _ = write!(out, "<{p}tbl>");

        let mut props = PropertyList::new(TBLPR_ORDER);
        if let Some(style) = &table.style {
            props.push("tblStyle", format!("<{p}tblStyle {p}val=\"{}\"/>", escape_attr(style)));
        }
        props.extend(&table.extra);
        if !props.has("tblW") {
            props.push("tblW", format!("<{p}tblW {p}w=\"0\" {p}type=\"auto\"/>"));
        }
        props.write(out, p, "tblPr");

        let _ = write!(out, "<{p}tblGrid>");
        if table.grid.is_empty() {
            for _ in 0..table.shape().1 {
                let _ = write!(out, "<{p}gridCol {p}w=\"{DEFAULT_GRID_COL}\"/>");
            }
        } else {
            for width in &table.grid {
                let _ = write!(out, "<{p}gridCol {p}w=\"{width}\"/>");
            }
        }
        let _ = write!(out, "</{p}tblGrid>");

        for row in &table.rows {
            let _ = write!(out, "<{p}tr>");
            if let Some(tr_pr) = &row.properties {
                out.push_str(tr_pr);
            }
            for cell in &row.cells {
                self.cell(out, cell);
            }
            let _ = write!(out, "</{p}tr>");
        }
        let _ = write!(out, "</{p}tbl>");
    }

    fn cell(&self, out: &mut String, cell: &Cell) {
        let p = self.p;
        let _ = write!(out, "<{p}tc>");

        let mut props = PropertyList::new(TCPR_ORDER);
        if let Some(width) = cell.width {
            props.push("tcW", format!("<{p}tcW {p}w=\"{width}\" {p}type=\"dxa\"/>"));
        }
        if cell.grid_span > 1 {
            props.push("gridSpan", format!("<{p}gridSpan {p}val=\"{}\"/>", cell.grid_span));
        }
        match cell.vertical_merge {
            Some(VerticalMerge::Restart) => {
                props.push("vMerge", format!("<{p}vMerge {p}val=\"restart\"/>"))
            }
            Some(VerticalMerge::Continue) => props.push("vMerge", format!("<{p}vMerge/>")),
            None => {}
        }
        if let Some(borders) = &cell.borders {
            props.push("tcBorders", borders.clone());
        }
        if let Some(fill) = &cell.shading {
            props.push(
                "shd",
                format!("<{p}shd {p}val=\"clear\" {p}color=\"auto\" {p}fill=\"{}\"/>", escape_attr(fill)),
            );
        }
        props.extend(&cell.extra);
        props.write(out, p, "tcPr");

        self.blocks(out, &cell.blocks);
        // A cell must end with a paragraph.
        if !matches!(cell.blocks.last(), Some(Block::Paragraph(_) | Block::PageBreak)) {
            let _ = write!(out, "<{p}p/>");
        }
        let _ = write!(out, "</{p}tc>");
    }
}

/// The body-level section: the last section, unless a paragraph ends it.
fn body_section(doc: &Document) -> Option<&Section> {
    let mut referenced = HashSet::new();
    doc.for_each_paragraph(&mut |para| {
        if let Some(i) = para.section_break {
            referenced.insert(i);
        }
    });
    let last = doc.sections.len().checked_sub(1)?;
    if referenced.contains(&last) {
        return None;
    }
    doc.sections.get(last)
}

pub fn render_body(doc: &Document, frame: &PartFrame) -> String {
    let mut out = frame.head.clone();
    let writer = BlockWriter::new(&frame.prefix, &doc.sections);
    writer.blocks(&mut out, &doc.body);
    if let Some(section) = body_section(doc) {
        out.push_str(&section.properties);
    }
    out.push_str(&frame.tail);
    out
}

fn render_styles(package: &DocxPackage, doc: &Document) -> Result<Option<Vec<u8>>, Error> {
    let added: Vec<_> = doc.styles.added().collect();
    if added.is_empty() {
        return Ok(None);
    }
    let Some(mut text) = package.text(STYLES_PART)? else {
        log::warn!("template has no {STYLES_PART}; {} new styles not written", added.len());
        return Ok(None);
    };
    let Some(close) = text.rfind("</") else {
        return Err(Error::InvalidDocx(format!("{STYLES_PART} has no root end tag")));
    };
    let inserted: String = added.iter().map(|s| s.xml.as_str()).collect();
    text.insert_str(close, &inserted);
    Ok(Some(text.into_bytes()))
}

/// New bytes for every part whose content a merge can change.
pub fn replacements(
    package: &DocxPackage,
    frames: &HashMap<String, PartFrame>,
    doc: &Document,
) -> Result<HashMap<String, Vec<u8>>, Error> {
    let mut parts = HashMap::new();

    let frame = frames
        .get(DOCUMENT_PART)
        .ok_or_else(|| Error::InvalidDocx(format!("no frame for {DOCUMENT_PART}")))?;
    parts.insert(DOCUMENT_PART.to_string(), render_body(doc, frame).into_bytes());

    for hf in doc.header_footers() {
        let Some(frame) = frames.get(&hf.part) else {
            log::warn!("no frame for {}; part left unchanged", hf.part);
            continue;
        };
        let mut out = frame.head.clone();
        BlockWriter::new(&frame.prefix, &doc.sections).blocks(&mut out, &hf.blocks);
        if hf.blocks.is_empty() {
            let _ = write!(out, "<{}p/>", frame.prefix);
        }
        out.push_str(&frame.tail);
        parts.insert(hf.part.clone(), out.into_bytes());
    }

    if let Some(styles) = render_styles(package, doc)? {
        parts.insert(STYLES_PART.to_string(), styles);
    }
    Ok(parts)
}
