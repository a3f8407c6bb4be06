use std::collections::{HashMap, HashSet};

use crate::error::Error;
use crate::model::{
    Alignment, Block, Cell, Document, FontColor, Formatting, HeaderFooter, HeaderFooterKind,
    Paragraph, RawInline, RawProperty, Row, Run, Section, Style, StyleKind, StyleRegistry, Table,
    VerticalMerge,
};
use crate::package::DocxPackage;

const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub(crate) const DOCUMENT_PART: &str = "word/document.xml";
pub(crate) const STYLES_PART: &str = "word/styles.xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";

pub(crate) const PAGE_BREAK: char = '\u{c}';

/// Everything of a part's XML outside the block container (`w:body`,
/// `w:hdr`, `w:ftr`): serialized blocks go between `head` and `tail`.
#[derive(Clone, Debug)]
pub struct PartFrame {
    pub head: String,
    pub tail: String,
    /// Prefix bound to the WordprocessingML namespace, including the colon.
    pub prefix: String,
}

pub struct ParsedPackage {
    pub document: Document,
    pub frames: HashMap<String, PartFrame>,
}

fn is_wml(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

fn wml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children().find(|n| is_wml(*n, name))
}

fn wml_val<'a>(node: roxmltree::Node<'a, 'a>) -> Option<&'a str> {
    node.attribute((WML_NS, "val"))
}

fn twips_attr(node: roxmltree::Node, attr: &str) -> Option<u32> {
    node.attribute((WML_NS, attr))
        .and_then(|v| v.parse::<f32>().ok())
        .filter(|v| *v >= 0.0)
        .map(|v| v.round() as u32)
}

fn parse_hex_color(val: &str) -> Option<[u8; 3]> {
    if val.len() != 6 || !val.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&val[0..2], 16).ok()?;
    let g = u8::from_str_radix(&val[2..4], 16).ok()?;
    let b = u8::from_str_radix(&val[4..6], 16).ok()?;
    Some([r, g, b])
}

fn parse_color(val: &str) -> FontColor {
    if val == "auto" {
        return FontColor::Auto;
    }
    match parse_hex_color(val) {
        Some(rgb) => FontColor::Rgb(rgb),
        None => FontColor::Unsupported(val.to_string()),
    }
}

fn parse_alignment(val: &str) -> Option<Alignment> {
    match val {
        "left" | "start" => Some(Alignment::Left),
        "center" => Some(Alignment::Center),
        "right" | "end" => Some(Alignment::Right),
        "both" | "distribute" => Some(Alignment::Justify),
        _ => None,
    }
}

/// `w:b`, `w:i` and friends: present means on unless `w:val` says otherwise.
fn on_off(node: roxmltree::Node) -> bool {
    !matches!(wml_val(node), Some("0" | "false" | "off"))
}

/// Byte index just past the `>` closing the start tag that begins at `start`.
fn start_tag_end(source: &str, start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in source.as_bytes().iter().enumerate().skip(start + 1) {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(i + 1),
            None => {}
        }
    }
    None
}

fn frame_for(source: &str, container: roxmltree::Node) -> Result<PartFrame, Error> {
    let range = container.range();
    let open_end = start_tag_end(source, range.start)
        .ok_or_else(|| Error::InvalidDocx("unterminated start tag".into()))?;
    let open = &source[range.start..open_end];
    let qname: &str = open[1..]
        .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or_default();
    let prefix = qname
        .split_once(':')
        .map(|(p, _)| format!("{p}:"))
        .unwrap_or_default();

    if open.ends_with("/>") {
        let head = format!(
            "{}{}>",
            &source[..range.start],
            open[..open.len() - 2].trim_end()
        );
        let tail = format!("</{qname}>{}", &source[range.end..]);
        return Ok(PartFrame { head, tail, prefix });
    }

    let close_start = source[..range.end]
        .rfind("</")
        .filter(|i| *i >= open_end)
        .ok_or_else(|| Error::InvalidDocx(format!("missing end tag for {qname}")))?;
    Ok(PartFrame {
        head: source[..open_end].to_string(),
        tail: source[close_start..].to_string(),
        prefix,
    })
}

fn raw(source: &str, node: roxmltree::Node) -> String {
    source[node.range()].to_string()
}

fn raw_property(source: &str, node: roxmltree::Node) -> RawProperty {
    RawProperty {
        name: node.tag_name().name().to_string(),
        xml: raw(source, node),
    }
}

/// Appends the text a run child stands for. Returns false for children that
/// carry no text, such as drawings and field characters.
fn push_run_text(node: roxmltree::Node, text: &mut String) -> bool {
    if node.tag_name().namespace() != Some(WML_NS) {
        return false;
    }
    match node.tag_name().name() {
        "t" => text.push_str(node.text().unwrap_or_default()),
        "tab" => text.push('\t'),
        "br" => match node.attribute((WML_NS, "type")) {
            Some("page") => text.push(PAGE_BREAK),
            _ => text.push('\n'),
        },
        "cr" => text.push('\n'),
        "noBreakHyphen" => text.push('\u{2011}'),
        _ => return false,
    }
    true
}

struct PendingSection {
    properties: String,
    references: Vec<(HeaderFooterKind, String)>,
}

/// Parses the blocks of one XML part. Section properties found on the way
/// are collected so the caller can resolve their header/footer parts.
struct PartParser<'s> {
    source: &'s str,
    sections: Vec<PendingSection>,
}

impl<'s> PartParser<'s> {
    fn new(source: &'s str) -> Self {
        PartParser { source, sections: Vec::new() }
    }

    fn parse_blocks(&mut self, container: roxmltree::Node) -> Vec<Block> {
        let mut blocks = Vec::new();
        for node in container.children().filter(|n| n.is_element()) {
            if node.tag_name().namespace() != Some(WML_NS) {
                log::debug!("skipping foreign element {:?}", node.tag_name().name());
                continue;
            }
            match node.tag_name().name() {
                "p" => blocks.push(self.parse_paragraph(node)),
                "tbl" => blocks.push(Block::Table(self.parse_table(node))),
                "sdt" => {
                    if let Some(content) = wml(node, "sdtContent") {
                        blocks.extend(self.parse_blocks(content));
                    }
                }
                "sectPr" => {
                    self.push_section(node);
                }
                other => log::debug!("skipping unsupported block element w:{other}"),
            }
        }
        blocks
    }

    fn push_section(&mut self, sect: roxmltree::Node) -> usize {
        let references = sect
            .children()
            .filter_map(|n| {
                let kind = if is_wml(n, "headerReference") {
                    HeaderFooterKind::Header
                } else if is_wml(n, "footerReference") {
                    HeaderFooterKind::Footer
                } else {
                    return None;
                };
                n.attribute((REL_NS, "id")).map(|id| (kind, id.to_string()))
            })
            .collect();
        self.sections.push(PendingSection {
            properties: raw(self.source, sect),
            references,
        });
        self.sections.len() - 1
    }

    fn parse_paragraph(&mut self, node: roxmltree::Node) -> Block {
        let mut paragraph = Paragraph::default();

        if let Some(ppr) = wml(node, "pPr") {
            for child in ppr.children().filter(|n| n.is_element()) {
                if child.tag_name().namespace() != Some(WML_NS) {
                    paragraph.extra.push(raw_property(self.source, child));
                    continue;
                }
                match child.tag_name().name() {
                    "pStyle" => paragraph.style = wml_val(child).map(str::to_string),
                    "jc" => match wml_val(child).and_then(parse_alignment) {
                        Some(alignment) => paragraph.alignment = Some(alignment),
                        None => paragraph.extra.push(raw_property(self.source, child)),
                    },
                    "sectPr" => paragraph.section_break = Some(self.push_section(child)),
                    _ => paragraph.extra.push(raw_property(self.source, child)),
                }
            }
        }

        self.collect_runs(node, &mut paragraph.runs);

        let only_page_break = !paragraph.runs.is_empty()
            && paragraph
                .runs
                .iter()
                .all(|r| r.is_text() && r.text.chars().all(|c| c == PAGE_BREAK))
            && paragraph.section_break.is_none();
        if only_page_break {
            return Block::PageBreak;
        }
        Block::Paragraph(paragraph)
    }

    /// Flattens the runs of a paragraph-like container. Wrappers such as
    /// hyperlinks and content controls are unwrapped; any other child is kept
    /// as a raw element in place.
    fn collect_runs(&self, container: roxmltree::Node, runs: &mut Vec<Run>) {
        for child in container.children().filter(|n| n.is_element()) {
            let name = child.tag_name().name();
            if child.tag_name().namespace() != Some(WML_NS) {
                runs.push(self.raw_element(child));
                continue;
            }
            match name {
                "r" => self.parse_run(child, runs),
                "hyperlink" | "smartTag" | "ins" | "customXml" | "moveTo" => {
                    self.collect_runs(child, runs)
                }
                "sdt" => {
                    if let Some(content) = wml(child, "sdtContent") {
                        self.collect_runs(content, runs);
                    }
                }
                _ if name.ends_with("Pr") => {}
                _ => runs.push(self.raw_element(child)),
            }
        }
    }

    fn raw_element(&self, node: roxmltree::Node) -> Run {
        Run::raw(RawInline::Element(raw(self.source, node)), Formatting::default())
    }

    /// Splits a `w:r` into text runs and raw runs, all sharing its formatting.
    fn parse_run(&self, node: roxmltree::Node, runs: &mut Vec<Run>) {
        let formatting = self.parse_formatting(wml(node, "rPr"));
        let mut text = String::new();
        for child in node.children().filter(|n| n.is_element()) {
            let skipped = is_wml(child, "rPr") || is_wml(child, "lastRenderedPageBreak");
            if skipped || push_run_text(child, &mut text) {
                continue;
            }
            if !text.is_empty() {
                runs.push(Run::new(std::mem::take(&mut text), formatting.clone()));
            }
            let content = RawInline::RunContent(raw(self.source, child));
            runs.push(Run::raw(content, formatting.clone()));
        }
        if !text.is_empty() {
            runs.push(Run::new(text, formatting));
        }
    }

    fn parse_formatting(&self, rpr: Option<roxmltree::Node>) -> Formatting {
        let mut fmt = Formatting::default();
        let Some(rpr) = rpr else {
            return fmt;
        };
        for child in rpr.children().filter(|n| n.is_element()) {
            if child.tag_name().namespace() != Some(WML_NS) {
                fmt.extra.push(raw_property(self.source, child));
                continue;
            }
            match child.tag_name().name() {
                "b" => fmt.bold = Some(on_off(child)),
                "i" => fmt.italic = Some(on_off(child)),
                "u" => fmt.underline = Some(wml_val(child).is_some_and(|v| v != "none")),
                "rFonts" => {
                    fmt.font_name = child.attribute((WML_NS, "ascii")).map(str::to_string);
                    fmt.extra.push(raw_property(self.source, child));
                }
                "sz" => match wml_val(child).and_then(|v| v.parse::<f32>().ok()) {
                    Some(half_points) => fmt.font_size = Some(half_points / 2.0),
                    None => fmt.extra.push(raw_property(self.source, child)),
                },
                "color" => fmt.font_color = wml_val(child).map(parse_color),
                _ => fmt.extra.push(raw_property(self.source, child)),
            }
        }
        fmt
    }

    fn parse_table(&mut self, node: roxmltree::Node) -> Table {
        let mut table = Table::default();

        if let Some(tbl_pr) = wml(node, "tblPr") {
            for child in tbl_pr.children().filter(|n| n.is_element()) {
                if is_wml(child, "tblStyle") {
                    table.style = wml_val(child).map(str::to_string);
                } else {
                    table.extra.push(raw_property(self.source, child));
                }
            }
        }

        if let Some(grid) = wml(node, "tblGrid") {
            table.grid = grid
                .children()
                .filter(|n| is_wml(*n, "gridCol"))
                .map(|n| twips_attr(n, "w").unwrap_or(0))
                .collect();
        }

        for tr in node.children().filter(|n| is_wml(*n, "tr")) {
            let mut row = Row {
                properties: wml(tr, "trPr").map(|n| raw(self.source, n)),
                cells: Vec::new(),
            };
            for tc in tr.children().filter(|n| is_wml(*n, "tc")) {
                row.cells.push(self.parse_cell(tc));
            }
            table.rows.push(row);
        }

        table
    }

    fn parse_cell(&mut self, node: roxmltree::Node) -> Cell {
        let mut cell = Cell::default();
        if let Some(tc_pr) = wml(node, "tcPr") {
            for child in tc_pr.children().filter(|n| n.is_element()) {
                if child.tag_name().namespace() != Some(WML_NS) {
                    cell.extra.push(raw_property(self.source, child));
                    continue;
                }
                match child.tag_name().name() {
                    "tcW" if matches!(child.attribute((WML_NS, "type")), None | Some("dxa")) => {
                        cell.width = twips_attr(child, "w");
                    }
                    "gridSpan" => {
                        cell.grid_span = wml_val(child)
                            .and_then(|v| v.parse::<u32>().ok())
                            .filter(|v| *v > 0)
                            .unwrap_or(1);
                    }
                    "vMerge" => {
                        cell.vertical_merge = Some(match wml_val(child) {
                            Some("restart") => VerticalMerge::Restart,
                            _ => VerticalMerge::Continue,
                        });
                    }
                    "tcBorders" => cell.borders = Some(raw(self.source, child)),
                    "shd" => match child.attribute((WML_NS, "fill")) {
                        Some(fill) if fill != "auto" => cell.shading = Some(fill.to_string()),
                        _ => cell.extra.push(raw_property(self.source, child)),
                    },
                    _ => cell.extra.push(raw_property(self.source, child)),
                }
            }
        }
        cell.blocks = self.parse_blocks(node);
        cell
    }
}

fn parse_relationships(xml_content: &str) -> Result<HashMap<String, String>, Error> {
    let xml = roxmltree::Document::parse(xml_content)?;
    let mut rels = HashMap::new();
    for node in xml.root_element().children().filter(|n| n.tag_name().name() == "Relationship") {
        let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target")) else {
            continue;
        };
        if node.attribute("TargetMode") == Some("External") {
            continue;
        }
        let part = match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("word/{target}"),
        };
        rels.insert(id.to_string(), part);
    }
    Ok(rels)
}

fn parse_styles(xml_content: &str) -> StyleRegistry {
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        log::warn!("styles.xml could not be parsed; continuing without styles");
        return StyleRegistry::default();
    };
    let styles = xml
        .root_element()
        .children()
        .filter(|n| is_wml(*n, "style"))
        .filter_map(|node| {
            let id = node.attribute((WML_NS, "styleId"))?;
            let kind = match node.attribute((WML_NS, "type")) {
                Some("character") => StyleKind::Character,
                Some("table") => StyleKind::Table,
                Some("numbering") => StyleKind::Numbering,
                _ => StyleKind::Paragraph,
            };
            Some(Style {
                id: id.to_string(),
                kind,
                xml: raw(xml_content, node),
            })
        })
        .collect();
    StyleRegistry::from_styles(styles)
}

fn parse_header_footer(
    package: &DocxPackage,
    kind: HeaderFooterKind,
    part: &str,
) -> Result<(HeaderFooter, PartFrame), Error> {
    let xml_content = package
        .text(part)?
        .ok_or_else(|| Error::InvalidDocx(format!("missing part {part}")))?;
    let xml = roxmltree::Document::parse(&xml_content)?;
    let root = xml.root_element();
    let mut parser = PartParser::new(&xml_content);
    let blocks = parser.parse_blocks(root);
    let frame = frame_for(&xml_content, root)?;
    Ok((
        HeaderFooter {
            kind,
            part: part.to_string(),
            blocks,
        },
        frame,
    ))
}

pub fn parse(package: &DocxPackage) -> Result<ParsedPackage, Error> {
    let xml_content = package
        .text(DOCUMENT_PART)?
        .ok_or_else(|| Error::InvalidDocx(format!("missing {DOCUMENT_PART}")))?;
    let xml = roxmltree::Document::parse(&xml_content)?;
    let root = xml.root_element();
    let body = wml(root, "body").ok_or_else(|| Error::InvalidDocx("missing w:body".into()))?;

    let styles = match package.text(STYLES_PART)? {
        Some(text) => parse_styles(&text),
        None => StyleRegistry::default(),
    };
    let rels = match package.text(DOCUMENT_RELS_PART)? {
        Some(text) => parse_relationships(&text)?,
        None => HashMap::new(),
    };

    let mut frames = HashMap::new();
    frames.insert(DOCUMENT_PART.to_string(), frame_for(&xml_content, body)?);

    let mut parser = PartParser::new(&xml_content);
    let blocks = parser.parse_blocks(body);

    let mut seen_parts: HashSet<String> = HashSet::new();
    let mut sections = Vec::with_capacity(parser.sections.len());
    for pending in parser.sections {
        let mut section = Section {
            properties: pending.properties,
            header_footers: Vec::new(),
        };
        for (kind, rel_id) in pending.references {
            let Some(part) = rels.get(&rel_id) else {
                log::warn!("section refers to unknown relationship {rel_id}");
                continue;
            };
            if !seen_parts.insert(part.clone()) {
                continue;
            }
            match parse_header_footer(package, kind, part) {
                Ok((hf, frame)) => {
                    frames.insert(part.clone(), frame);
                    section.header_footers.push(hf);
                }
                Err(e) => log::warn!("skipping {part}: {e}"),
            }
        }
        sections.push(section);
    }

    log::debug!(
        "parsed {} body blocks, {} sections, {} styles",
        blocks.len(),
        sections.len(),
        styles.len()
    );

    Ok(ParsedPackage {
        document: Document {
            body: blocks,
            sections,
            styles,
        },
        frames,
    })
}
