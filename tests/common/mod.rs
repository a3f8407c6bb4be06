#![allow(dead_code)]

use std::io::{Cursor, Write};

use docx_merge::model::{Block, Document, FontColor, Formatting, Paragraph, Run, Table};
use docx_merge::{Error, Record, Template};
use zip::write::SimpleFileOptions;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/header1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml"/><Override PartName="/word/footer1.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rIdHeader1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/><Relationship Id="rIdFooter1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer" Target="footer1.xml"/><Relationship Id="rIdLink" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/></w:style><w:style w:type="table" w:styleId="TableGrid"><w:name w:val="Table Grid"/></w:style><w:style w:type="character" w:styleId="Strong"><w:name w:val="Strong"/></w:style></w:styles>"#;

/// A minimal but complete DOCX package: body, styles, one header and one
/// footer referenced from the body-level section.
pub struct Fixture {
    pub body: String,
    pub header: String,
    pub footer: String,
}

impl Fixture {
    pub fn new(body: impl Into<String>) -> Self {
        Fixture {
            body: body.into(),
            header: p(&r("Header")),
            footer: p(&r("Footer")),
        }
    }

    pub fn header(mut self, xml: impl Into<String>) -> Self {
        self.header = xml.into();
        self
    }

    pub fn footer(mut self, xml: impl Into<String>) -> Self {
        self.footer = xml.into();
        self
    }

    pub fn document_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}" xmlns:r="{R_NS}"><w:body>{}<w:sectPr><w:headerReference w:type="default" r:id="rIdHeader1"/><w:footerReference w:type="default" r:id="rIdFooter1"/><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440"/></w:sectPr></w:body></w:document>"#,
            self.body
        )
    }

    pub fn bytes(&self) -> Vec<u8> {
        let header = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:hdr xmlns:w="{W_NS}" xmlns:r="{R_NS}">{}</w:hdr>"#,
            self.header
        );
        let footer = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:ftr xmlns:w="{W_NS}" xmlns:r="{R_NS}">{}</w:ftr>"#,
            self.footer
        );
        let parts: Vec<(&str, String)> = vec![
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("_rels/.rels", ROOT_RELS.to_string()),
            ("word/document.xml", self.document_xml()),
            ("word/_rels/document.xml.rels", DOCUMENT_RELS.to_string()),
            ("word/styles.xml", STYLES.to_string()),
            ("word/header1.xml", header),
            ("word/footer1.xml", footer),
        ];

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        for (name, content) in parts {
            zip.start_file(name, opts).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    pub fn template(&self) -> Template {
        self.template_result().expect("fixture parses")
    }

    pub fn template_result(&self) -> Result<Template, Error> {
        Template::from_bytes(&self.bytes())
    }
}

pub fn p(runs: &str) -> String {
    format!("<w:p>{runs}</w:p>")
}

pub fn p_styled(style: &str, runs: &str) -> String {
    format!(r#"<w:p><w:pPr><w:pStyle w:val="{style}"/><w:spacing w:after="120"/><w:jc w:val="center"/></w:pPr>{runs}</w:p>"#)
}

pub fn r(text: &str) -> String {
    format!(r#"<w:r><w:t xml:space="preserve">{text}</w:t></w:r>"#)
}

pub fn r_bold(text: &str) -> String {
    format!(r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">{text}</w:t></w:r>"#)
}

pub fn r_fmt(rpr: &str, text: &str) -> String {
    format!(r#"<w:r><w:rPr>{rpr}</w:rPr><w:t xml:space="preserve">{text}</w:t></w:r>"#)
}

/// A table of `rows` x `cells.len()` where each row repeats `cells`.
pub fn table(rows: usize, cells: &[&str]) -> String {
    let grid: String = cells.iter().map(|_| r#"<w:gridCol w:w="3000"/>"#).collect();
    let row: String = cells
        .iter()
        .map(|c| {
            format!(
                r#"<w:tc><w:tcPr><w:tcW w:w="3000" w:type="dxa"/><w:shd w:val="clear" w:color="auto" w:fill="D9E2F3"/></w:tcPr>{}</w:tc>"#,
                p(&r(c))
            )
        })
        .collect();
    let rows: String = (0..rows).map(|_| format!("<w:tr>{row}</w:tr>")).collect();
    format!(
        r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="0" w:type="auto"/><w:tblLook w:val="04A0"/></w:tblPr><w:tblGrid>{grid}</w:tblGrid>{rows}</w:tbl>"#
    )
}

/// Ends a landscape section after this paragraph.
pub fn p_section_end(runs: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:sectPr><w:pgSz w:w="15840" w:h="12240" w:orient="landscape"/><w:pgMar w:top="720" w:right="720" w:bottom="720" w:left="720"/></w:sectPr></w:pPr>{runs}</w:p>"#
    )
}

/// A 1x2 table whose second cell holds a 2x2 table with `inner` in its
/// bottom-left cell.
pub fn nested_table(inner: &str) -> String {
    let cell = |content: String| {
        format!(r#"<w:tc><w:tcPr><w:tcW w:w="3000" w:type="dxa"/></w:tcPr>{content}</w:tc>"#)
    };
    let inner_rows = format!(
        "<w:tr>{}{}</w:tr><w:tr>{}{}</w:tr>",
        cell(p(&r("a"))),
        cell(p(&r("b"))),
        cell(p(&r(inner))),
        cell(p(&r("d")))
    );
    let inner_table = format!(
        r#"<w:tbl><w:tblPr><w:tblW w:w="0" w:type="auto"/></w:tblPr><w:tblGrid><w:gridCol w:w="1500"/><w:gridCol w:w="1500"/></w:tblGrid>{inner_rows}</w:tbl>"#
    );
    let outer_row = format!(
        "<w:tr>{}{}</w:tr>",
        cell(p(&r("outer"))),
        cell(format!("{inner_table}{}", p("")))
    );
    format!(
        r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="0" w:type="auto"/></w:tblPr><w:tblGrid><w:gridCol w:w="3000"/><w:gridCol w:w="3000"/></w:tblGrid>{outer_row}</w:tbl>"#
    )
}

pub fn record(pairs: &[(&str, &str)]) -> Record {
    pairs.iter().map(|(k, v)| (*k, *v)).collect()
}

pub fn bold() -> Formatting {
    Formatting {
        bold: Some(true),
        ..Formatting::default()
    }
}

pub fn paragraph(runs: Vec<Run>) -> Paragraph {
    Paragraph::with_runs(runs)
}

pub fn rgb(r: u8, g: u8, b: u8) -> Option<FontColor> {
    Some(FontColor::Rgb([r, g, b]))
}

pub fn body_paragraphs(doc: &Document) -> Vec<&Paragraph> {
    doc.body
        .iter()
        .filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
        .collect()
}

pub fn body_tables(doc: &Document) -> Vec<&Table> {
    doc.body
        .iter()
        .filter_map(|b| match b {
            Block::Table(t) => Some(t),
            _ => None,
        })
        .collect()
}

pub fn page_breaks(doc: &Document) -> usize {
    doc.body.iter().filter(|b| **b == Block::PageBreak).count()
}

pub fn all_text(doc: &Document) -> Vec<String> {
    let mut out = Vec::new();
    doc.for_each_paragraph(&mut |p| out.push(p.text()));
    out
}
