use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use crate::docx::{self, PartFrame};
use crate::error::Error;
use crate::model::{Document, Paragraph};
use crate::package::DocxPackage;
use crate::placeholder;
use crate::rebuild;
use crate::record::Record;
use crate::writer;

/// A loaded template: the parsed document plus the package it came from,
/// which frames every merged document written back out. Read-only once
/// built, so it can be shared across threads.
#[derive(Clone, Debug)]
pub struct Template {
    package: DocxPackage,
    frames: HashMap<String, PartFrame>,
    document: Document,
}

impl Template {
    pub fn open(path: &Path) -> Result<Template, Error> {
        Template::from_package(DocxPackage::open(path)?)
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Template, Error> {
        Template::from_package(DocxPackage::read(reader)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Template, Error> {
        Template::from_reader(Cursor::new(bytes))
    }

    pub fn from_package(package: DocxPackage) -> Result<Template, Error> {
        let parsed = docx::parse(&package)?;
        if parsed.document.body.is_empty() {
            return Err(Error::EmptyTemplate);
        }
        Ok(Template {
            package,
            frames: parsed.frames,
            document: parsed.document,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// A fresh deep copy to merge one record into.
    pub fn instantiate(&self) -> Document {
        self.document.clone()
    }

    pub fn field_names(&self) -> Vec<String> {
        placeholder::field_names(&self.document)
    }

    pub fn write<W: Write + Seek>(&self, doc: &Document, writer: W) -> Result<(), Error> {
        let parts = writer::replacements(&self.package, &self.frames, doc)?;
        self.package.write_with_replacements(writer, &parts)
    }

    pub fn to_bytes(&self, doc: &Document) -> Result<Vec<u8>, Error> {
        let mut buf = Cursor::new(Vec::new());
        self.write(doc, &mut buf)?;
        Ok(buf.into_inner())
    }

    pub fn save(&self, doc: &Document, path: &Path) -> Result<(), Error> {
        let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
        self.write(doc, &mut out)?;
        out.flush()?;
        Ok(())
    }
}

/// Substitutes the record into one paragraph. Returns whether it changed.
pub fn merge_paragraph(paragraph: &mut Paragraph, record: &Record) -> bool {
    let text = paragraph.text();
    if !placeholder::may_contain_tokens(&text) {
        return false;
    }
    let spans = placeholder::scan(&text);
    if spans.is_empty() {
        return false;
    }
    rebuild::rebuild(paragraph, &spans, record);
    true
}

/// Merges `record` into `doc`, a copy of the template owned by this call:
/// body paragraphs, table cells at any depth, then headers and footers.
pub fn merge(mut doc: Document, record: &Record) -> Document {
    let mut changed = 0usize;
    doc.for_each_paragraph_mut(&mut |paragraph| {
        if merge_paragraph(paragraph, record) {
            changed += 1;
        }
    });
    log::trace!("merged record into {changed} paragraphs");
    doc
}
