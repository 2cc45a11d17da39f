//! Parse command - extract the text of a single deck.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use deckparse_core::{CancellationFlag, DeckParser, ParseProgress, ParsedDocument};

use super::{ExtractionOverrides, cancel_on_ctrl_c, load_config};

/// Arguments for the parse command.
#[derive(Args)]
pub struct ParseArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    #[command(flatten)]
    overrides: ExtractionOverrides,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// Full parsed document as JSON
    Json,
    /// Plain text summary
    Text,
    /// Page-by-page text
    Pages,
}

pub async fn run(args: ParseArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.overrides.apply(&mut config);

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Parsing file: {}", args.input.display());

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    let bar = pb.clone();
    let parser = DeckParser::try_new(config)?.on_progress(move |event| match event {
        ParseProgress::PageStarted { page, page_count } => {
            bar.set_length(page_count as u64);
            bar.set_message(format!("page {}", page));
        }
        ParseProgress::Ocr { page, percent } => {
            bar.set_message(format!("page {} OCR {}%", page, percent));
        }
        ParseProgress::PageFinished { page, .. } => {
            bar.set_position(page as u64);
        }
    });

    let cancel = CancellationFlag::new();
    cancel_on_ctrl_c(&cancel);

    let document = parser
        .parse_file(&args.input, &cancel)
        .await
        .with_context(|| format!("Failed to parse {}", args.input.display()));
    pb.finish_and_clear();
    let document = document?;

    let output = format_document(&document, args.format, args.pretty)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    for warning in &document.warnings {
        eprintln!("{} {}", style("⚠").yellow(), warning);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn format_document(
    document: &ParsedDocument,
    format: OutputFormat,
    pretty: bool,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json if pretty => Ok(serde_json::to_string_pretty(document)?),
        OutputFormat::Json => Ok(serde_json::to_string(document)?),
        OutputFormat::Text => Ok(format_summary(document)),
        OutputFormat::Pages => Ok(format_pages(document)),
    }
}

fn format_summary(document: &ParsedDocument) -> String {
    let stats = &document.extraction_stats;
    let mut output = String::new();

    if let Some(title) = &document.metadata.title {
        output.push_str(&format!("Title: {}\n", title));
    }
    if let Some(author) = &document.metadata.author {
        output.push_str(&format!("Author: {}\n", author));
    }
    if let Some(created) = document.metadata.creation_datetime() {
        output.push_str(&format!("Created: {}\n", created.format("%Y-%m-%d %H:%M")));
    }

    output.push_str(&format!("Pages: {}\n", document.page_count));
    output.push_str(&format!("  Text layer: {}\n", stats.pages_with_text));
    output.push_str(&format!("  OCR:        {}\n", stats.pages_with_ocr));
    output.push_str(&format!("Words: {}\n", stats.total_words));
    output.push_str(&format!("Characters: {}\n", stats.total_characters));
    output.push_str(&format!("Processing time: {}ms\n", stats.processing_time_ms));

    let degraded: Vec<_> = document.degraded_pages().collect();
    if !degraded.is_empty() {
        output.push_str("\nDegraded pages:\n");
        for page in degraded {
            output.push_str(&format!(
                "  {}: {}\n",
                page.page_number,
                page.warning.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    output
}

fn format_pages(document: &ParsedDocument) -> String {
    document
        .pages
        .iter()
        .map(|page| {
            format!(
                "--- Page {} ({}, {} words) ---\n{}\n",
                page.page_number, page.extraction_method, page.word_count, page.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
