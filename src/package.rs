use std::collections::HashMap;
use std::io::{Read, Seek, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::Error;

/// A DOCX package held fully in memory, entry order preserved.
#[derive(Clone, Debug)]
pub struct DocxPackage {
    entries: Vec<DocxEntry>,
}

#[derive(Clone, Debug)]
struct DocxEntry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    last_modified: zip::DateTime,
    unix_mode: Option<u32>,
    is_dir: bool,
}

impl DocxPackage {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        DocxPackage::read(file)
    }

    pub fn read<R: Read + Seek>(reader: R) -> Result<Self, Error> {
        let mut zip = ZipArchive::new(reader)
            .map_err(|e| Error::InvalidDocx(format!("not a ZIP archive ({e})")))?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        Ok(DocxPackage { entries })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Part content as UTF-8, `None` when the part does not exist.
    pub fn text(&self, name: &str) -> Result<Option<String>, Error> {
        let Some(bytes) = self.bytes(name) else {
            return Ok(None);
        };
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|_| Error::InvalidDocx(format!("{name} is not UTF-8")))
    }

    pub fn write_with_replacements<W: Write + Seek>(
        &self,
        writer: W,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> Result<(), Error> {
        let mut zout = ZipWriter::new(writer);
        for ent in &self.entries {
            let data = replacements
                .get(&ent.name)
                .map(Vec::as_slice)
                .unwrap_or(&ent.data);
            let compression = if replacements.contains_key(&ent.name) {
                CompressionMethod::Deflated
            } else {
                ent.compression
            };
            let mut opts = SimpleFileOptions::default()
                .compression_method(compression)
                .last_modified_time(ent.last_modified);
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(ent.name.as_str(), opts)?;
            } else {
                zout.start_file(ent.name.as_str(), opts)?;
                zout.write_all(data)?;
            }
        }
        zout.finish()?;
        Ok(())
    }
}
