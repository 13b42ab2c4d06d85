//! Page extractor CLI

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process;

use pdf_tools::cli::{expand_legacy_flags, init_logging};
use pdf_tools::pdf::{extract_pages, ExtractOptions};
use pdf_tools::PageRange;

/// Extract a page range from a PDF into a new file
#[derive(Parser)]
#[command(name = "extract-pages")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Pages 286 to 314, written next to the input as guide_286-314.pdf
    extract-pages -i guide.pdf -pr 286,314

    # Dash form with an explicit output
    extract-pages -i guide.pdf -pr 3-14 -o chapter1.pdf")]
struct Cli {
    /// Input PDF file
    #[arg(short, long)]
    input: PathBuf,

    /// Page range to extract, as start,end or start-end (1-indexed, inclusive)
    #[arg(long = "page-range")]
    page_range: String,

    /// Output PDF file (default: <input-dir>/<input>_<start>-<end>.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse_from(expand_legacy_flags(
        std::env::args_os(),
        &[("-pr", "--page-range")],
    ));
    init_logging();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let range: PageRange = cli.page_range.parse()?;

    let options = ExtractOptions {
        input_path: cli.input,
        output_path: cli.output,
        range,
    };

    let summary = extract_pages(&options)
        .with_context(|| format!("Failed to extract pages from {}", options.input_path.display()))?;

    eprintln!(
        "Extracted {} page(s) to: {}",
        summary.page_count,
        summary.output_path.display()
    );
    Ok(())
}
