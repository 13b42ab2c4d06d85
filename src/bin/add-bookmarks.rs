//! TOC bookmark CLI
//!
//! Links the rows of a table of contents to their pages and writes an
//! outline.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process;

use pdf_tools::cli::{expand_legacy_flags, init_logging};
use pdf_tools::pdf::{add_bookmarks, BookmarkOptions, OutlineStyle};
use pdf_tools::PageRange;

/// Add table-of-contents links and bookmarks to a PDF
#[derive(Parser)]
#[command(name = "add-bookmarks")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Detect the table of contents automatically
    add-bookmarks -i book.pdf

    # TOC on pages 3 to 5, printed page 1 is physical page 12
    add-bookmarks -i book.pdf -ir 3,5 --page-offset 11

    # Nested outline from the TOC, no links
    add-bookmarks -i book.pdf --outline toc --no-links -o out.pdf")]
struct Cli {
    /// Input PDF file
    #[arg(short, long)]
    input: PathBuf,

    /// Output PDF file (default: <input-dir>/<input>_linked.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pages holding the table of contents, as start,end or start-end
    #[arg(long = "index-range")]
    index_range: Option<String>,

    /// Added to printed page numbers to get physical page numbers
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    page_offset: i32,

    /// Outline to write
    #[arg(long, value_enum, default_value_t = OutlineStyle::Pages)]
    outline: OutlineStyle,

    /// Only write the outline, without link annotations
    #[arg(long)]
    no_links: bool,
}

fn main() {
    let cli = Cli::parse_from(expand_legacy_flags(
        std::env::args_os(),
        &[("-ir", "--index-range")],
    ));
    init_logging();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let index_range = cli
        .index_range
        .as_deref()
        .map(str::parse::<PageRange>)
        .transpose()?;

    let options = BookmarkOptions {
        input_path: cli.input,
        output_path: cli.output,
        index_range,
        page_offset: cli.page_offset,
        outline: cli.outline,
        add_links: !cli.no_links,
    };

    let report = add_bookmarks(&options)
        .with_context(|| format!("Failed to add bookmarks to {}", options.input_path.display()))?;

    eprintln!(
        "{} TOC entries, {} link(s), {} bookmark(s)",
        report.entries, report.links.added, report.outline_items
    );
    eprintln!("Output: {}", report.output_path.display());
    Ok(())
}
