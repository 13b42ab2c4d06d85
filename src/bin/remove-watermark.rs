//! Watermark remover CLI
//!
//! Removes watermark text from every page of a PDF.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process;

use pdf_tools::cli::{expand_legacy_flags, init_logging};
use pdf_tools::pdf::watermark::DEFAULT_SAMPLE_PAGES;
use pdf_tools::pdf::{remove_watermarks, WatermarkOptions};

/// Remove watermark text from a PDF
#[derive(Parser)]
#[command(name = "remove-watermark")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Auto-detect the watermark
    remove-watermark -i input.pdf

    # Remove specific strings
    remove-watermark -i input.pdf -rs \"CONFIDENTIAL\" \"Draft copy\"

    # Choose the output file
    remove-watermark -i input.pdf -o clean.pdf")]
struct Cli {
    /// Input PDF file
    #[arg(short, long)]
    input: PathBuf,

    /// Output PDF file (default: ./<input>_remove_watermark.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Watermark strings to remove; auto-detected when omitted
    #[arg(long = "remove-string", num_args = 1..)]
    remove_string: Vec<String>,

    /// Number of leading pages compared during auto-detection
    #[arg(long, default_value_t = DEFAULT_SAMPLE_PAGES)]
    sample_pages: usize,
}

fn main() {
    let cli = Cli::parse_from(expand_legacy_flags(
        std::env::args_os(),
        &[("-rs", "--remove-string")],
    ));
    init_logging();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let options = WatermarkOptions {
        input_path: cli.input,
        output_path: cli.output,
        remove_strings: cli.remove_string,
        sample_pages: cli.sample_pages,
    };

    let report = remove_watermarks(&options)
        .with_context(|| format!("Failed to process {}", options.input_path.display()))?;

    if !report.stats.removed_anything() {
        log::warn!("No watermark text was found to remove");
    }
    eprintln!("Output: {}", report.output_path.display());
    Ok(())
}
