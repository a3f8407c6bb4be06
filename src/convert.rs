use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::Error;
use crate::merge::Template;
use crate::model::Document;
use crate::pdf;

pub const CONVERTERS_ENV: &str = "DOCX_MERGE_CONVERTERS";
const DEFAULT_CHAIN: &str = "soffice,pandoc,builtin";
const DEFAULT_MIN_OUTPUT_BYTES: u64 = 256;

/// Input of one conversion attempt: the serialized DOCX on disk, the
/// document it was written from, and where the PDF must end up.
pub struct ConversionJob<'a> {
    pub docx: &'a Path,
    pub document: &'a Document,
    pub output: &'a Path,
}

pub trait Converter: Send + Sync {
    fn name(&self) -> &str;
    fn convert(&self, job: &ConversionJob) -> Result<(), Error>;
}

fn run_tool(program: &str, args: &[&OsStr]) -> Result<(), Error> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::Conversion(format!("{program}: {e}")))?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(Error::Conversion(format!(
        "{program} exited with status {}: {}",
        output.status.code().unwrap_or(-1),
        stderr.trim()
    )))
}

/// LibreOffice in headless mode. It writes `<stem>.pdf` next to the input,
/// which is then moved to the requested output path.
pub struct Soffice {
    program: String,
}

impl Soffice {
    pub fn new(program: impl Into<String>) -> Self {
        Soffice { program: program.into() }
    }
}

impl Default for Soffice {
    fn default() -> Self {
        Soffice::new("soffice")
    }
}

impl Converter for Soffice {
    fn name(&self) -> &str {
        "soffice"
    }

    fn convert(&self, job: &ConversionJob) -> Result<(), Error> {
        let outdir = job.docx.parent().unwrap_or(Path::new("."));
        run_tool(
            &self.program,
            &[
                OsStr::new("--headless"),
                OsStr::new("--convert-to"),
                OsStr::new("pdf"),
                OsStr::new("--outdir"),
                outdir.as_os_str(),
                job.docx.as_os_str(),
            ],
        )?;
        let produced: PathBuf = outdir.join(job.docx.with_extension("pdf").file_name().unwrap_or_default());
        if produced != job.output {
            std::fs::rename(&produced, job.output).or_else(|_| {
                std::fs::copy(&produced, job.output)?;
                std::fs::remove_file(&produced)
            })?;
        }
        Ok(())
    }
}

pub struct Pandoc {
    program: String,
}

impl Pandoc {
    pub fn new(program: impl Into<String>) -> Self {
        Pandoc { program: program.into() }
    }
}

impl Default for Pandoc {
    fn default() -> Self {
        Pandoc::new("pandoc")
    }
}

impl Converter for Pandoc {
    fn name(&self) -> &str {
        "pandoc"
    }

    fn convert(&self, job: &ConversionJob) -> Result<(), Error> {
        run_tool(
            &self.program,
            &[job.docx.as_os_str(), OsStr::new("-o"), job.output.as_os_str()],
        )
    }
}

/// In-process text rendering; always available.
pub struct BuiltinPdf;

impl Converter for BuiltinPdf {
    fn name(&self) -> &str {
        "builtin"
    }

    fn convert(&self, job: &ConversionJob) -> Result<(), Error> {
        let bytes = pdf::render(job.document)?;
        std::fs::write(job.output, bytes).map_err(Error::Io)
    }
}

/// Converters tried in order; the first one producing an output of at
/// least `min_output_bytes` wins.
pub struct ConversionChain {
    converters: Vec<Box<dyn Converter>>,
    min_output_bytes: u64,
}

impl ConversionChain {
    pub fn new(converters: Vec<Box<dyn Converter>>) -> Self {
        ConversionChain {
            converters,
            min_output_bytes: DEFAULT_MIN_OUTPUT_BYTES,
        }
    }

    pub fn with_min_output_bytes(mut self, bytes: u64) -> Self {
        self.min_output_bytes = bytes;
        self
    }

    /// Builds a chain from a comma-separated list of converter names.
    pub fn from_names(names: &str) -> Result<Self, Error> {
        let mut converters: Vec<Box<dyn Converter>> = Vec::new();
        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match name.to_ascii_lowercase().as_str() {
                "soffice" | "libreoffice" => converters.push(Box::new(Soffice::default())),
                "pandoc" => converters.push(Box::new(Pandoc::default())),
                "builtin" => converters.push(Box::new(BuiltinPdf)),
                other => return Err(Error::Conversion(format!("unknown converter {other:?}"))),
            }
        }
        if converters.is_empty() {
            return Err(Error::Conversion("no converters configured".into()));
        }
        Ok(ConversionChain::new(converters))
    }

    /// Chain named by `DOCX_MERGE_CONVERTERS`, or soffice, pandoc, builtin.
    pub fn from_env() -> Result<Self, Error> {
        match std::env::var(CONVERTERS_ENV) {
            Ok(names) => ConversionChain::from_names(&names),
            Err(_) => ConversionChain::from_names(DEFAULT_CHAIN),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.converters.iter().map(|c| c.name()).collect()
    }

    /// Returns the name of the converter that succeeded.
    pub fn convert(&self, job: &ConversionJob) -> Result<String, Error> {
        let mut failures = Vec::new();
        for converter in &self.converters {
            let attempt = converter.convert(job).and_then(|()| {
                let size = std::fs::metadata(job.output)?.len();
                if size < self.min_output_bytes {
                    let _ = std::fs::remove_file(job.output);
                    return Err(Error::Conversion(format!(
                        "output is {size} bytes, below the {} byte minimum",
                        self.min_output_bytes
                    )));
                }
                Ok(())
            });
            match attempt {
                Ok(()) => {
                    log::info!("converted {} with {}", job.docx.display(), converter.name());
                    return Ok(converter.name().to_string());
                }
                Err(e) => {
                    log::warn!("{} failed: {e}", converter.name());
                    failures.push(format!("{}: {e}", converter.name()));
                }
            }
        }
        Err(Error::Conversion(failures.join("; ")))
    }

    /// Serializes `doc` into a scratch directory, then converts it to `output`.
    pub fn convert_document(&self, template: &Template, doc: &Document, output: &Path) -> Result<String, Error> {
        let scratch = tempfile::tempdir()?;
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "merged".to_string());
        let docx = scratch.path().join(format!("{stem}.docx"));
        template.save(doc, &docx)?;
        self.convert(&ConversionJob {
            docx: &docx,
            document: doc,
            output,
        })
    }
}
