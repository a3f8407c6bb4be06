use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use docx_merge::convert::ConversionChain;
use docx_merge::{
    Assembled, Dataset, Error, OutputFormat, OutputMode, Template, assemble, write_assembled,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Docx,
    Pdf,
}

#[derive(Parser)]
#[command(name = "docx-merge", about = "Fill a DOCX template with one record per CSV row")]
struct Args {
    /// Template DOCX containing {{field}} placeholders
    template: PathBuf,
    /// CSV file with a header row naming the fields
    #[arg(required_unless_present = "list_fields")]
    data: Option<PathBuf>,
    /// Output file (combined) or directory (separate)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// separate: one document per record; combined: one document, page per record
    #[arg(short, long, default_value = "combined")]
    mode: OutputMode,
    /// Output format; PDF goes through the DOCX_MERGE_CONVERTERS chain
    #[arg(short, long, value_enum, default_value_t = Format::Docx)]
    format: Format,
    /// Print the template's merge fields and exit
    #[arg(long)]
    list_fields: bool,
}

fn check_file(path: &Path) {
    if !path.exists() {
        eprintln!("Error: file not found: {}", path.display());
        std::process::exit(1);
    }
    if !path.is_file() {
        eprintln!("Error: not a file: {}", path.display());
        std::process::exit(1);
    }
}

fn default_output(template: &Path, mode: OutputMode, format: &OutputFormat) -> PathBuf {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "merged".to_string());
    match mode {
        OutputMode::Separate => template.with_file_name(format!("{stem}_merged")),
        OutputMode::Combined => {
            template.with_file_name(format!("{stem}_merged.{}", format.extension()))
        }
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let template = Template::open(&args.template)?;

    if args.list_fields {
        for field in template.field_names() {
            println!("{field}");
        }
        return Ok(());
    }

    let data = args.data.as_deref().ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "a CSV data file is required unless --list-fields is given",
        ))
    })?;
    check_file(data);
    let dataset = Dataset::from_csv_path(data)?;

    for field in template.field_names() {
        if !dataset.header.contains(&field) {
            log::warn!("template field {{{{{field}}}}} has no column in {}; it will be left empty", data.display());
        }
    }

    let format = match args.format {
        Format::Pdf => OutputFormat::Pdf(ConversionChain::from_env()?),
        Format::Docx => OutputFormat::Docx,
    };
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.template, args.mode, &format));

    let assembled = assemble(template.document(), &dataset.records, args.mode)?;
    let written = write_assembled(&template, &assembled, &dataset.records, &output, &format)?;
    match assembled {
        Assembled::Separate(_) => {
            println!("{} documents written to {}", written.len(), output.display())
        }
        Assembled::Combined(_) => {
            println!("{} records merged into {}", dataset.records.len(), output.display())
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    check_file(&args.template);

    if let Err(e) = run(&args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
