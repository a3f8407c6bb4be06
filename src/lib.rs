pub mod assemble;
pub mod convert;
mod docx;
mod error;
pub mod formatting;
pub mod merge;
pub mod model;
pub mod naming;
mod package;
mod pdf;
pub mod placeholder;
pub mod rebuild;
pub mod record;
mod writer;

pub use assemble::{Assembled, OutputMode, assemble};
pub use error::{AppendError, Error, FormattingError};
pub use merge::{Template, merge};
pub use package::DocxPackage;
pub use record::{Dataset, Record};

use std::path::{Path, PathBuf};

use convert::ConversionChain;
use model::Document;
use naming::OutputNames;

/// How merged documents are written out.
pub enum OutputFormat {
    Docx,
    /// PDF through a converter chain.
    Pdf(ConversionChain),
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Pdf(_) => "pdf",
        }
    }

    pub fn write(&self, template: &Template, doc: &Document, path: &Path) -> Result<(), Error> {
        match self {
            OutputFormat::Docx => template.save(doc, path),
            OutputFormat::Pdf(chain) => chain.convert_document(template, doc, path).map(|_| ()),
        }
    }
}

/// Writes assembled documents. Separate output goes into the `output`
/// directory, one file per record named after its first value; combined
/// output is the single file `output`. Returns the paths written.
pub fn write_assembled(
    template: &Template,
    assembled: &Assembled,
    records: &[Record],
    output: &Path,
    format: &OutputFormat,
) -> Result<Vec<PathBuf>, Error> {
    match assembled {
        Assembled::Separate(docs) => {
            std::fs::create_dir_all(output)?;
            let mut names = OutputNames::new();
            let mut written = Vec::with_capacity(docs.len());
            for (i, (doc, record)) in docs.iter().zip(records).enumerate() {
                let path = output.join(format!("{}.{}", names.next(record, i), format.extension()));
                format.write(template, doc, &path)?;
                log::info!("wrote {}", path.display());
                written.push(path);
            }
            Ok(written)
        }
        Assembled::Combined(doc) => {
            format.write(template, doc, output)?;
            log::info!("wrote {}", output.display());
            Ok(vec![output.to_path_buf()])
        }
    }
}

/// Merges every record of `dataset` into the template at `template` and
/// writes `.docx` output: one file per record into the `output` directory for
/// [`OutputMode::Separate`], or a single file at `output` for
/// [`OutputMode::Combined`]. Returns the paths written.
pub fn merge_docx(
    template: &Path,
    dataset: &Dataset,
    mode: OutputMode,
    output: &Path,
) -> Result<Vec<PathBuf>, Error> {
    let template = Template::open(template)?;
    let assembled = assemble(template.document(), &dataset.records, mode)?;
    write_assembled(&template, &assembled, &dataset.records, output, &OutputFormat::Docx)
}
