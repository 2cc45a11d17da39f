//! Batch command - parse many decks with one shared OCR engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use deckparse_core::{CancellationFlag, DeckParser, OcrSession, ParsedDocument, PureOcrFactory};

use super::{ExtractionOverrides, cancel_on_ctrl_c, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching input PDFs (e.g. "decks/*.pdf")
    #[arg(required = true)]
    input: String,

    /// Output directory for per-deck JSON files
    #[arg(short, long, default_value = "parsed")]
    output_dir: PathBuf,

    /// Also write summary.csv to the output directory
    #[arg(long)]
    summary: bool,

    /// Number of decks parsed concurrently
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Keep going when a deck fails
    #[arg(long)]
    continue_on_error: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    #[command(flatten)]
    overrides: ExtractionOverrides,
}

/// Result of parsing a single file.
struct DeckOutcome {
    path: PathBuf,
    document: Option<ParsedDocument>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.overrides.apply(&mut config);

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    fs::create_dir_all(&args.output_dir)?;

    // One engine for the whole batch; its mutex serializes recognition
    let session = config
        .ocr
        .enabled
        .then(|| OcrSession::shared(Arc::new(PureOcrFactory::from_config(&config))));
    let mut parser = DeckParser::try_new(config)?;
    if let Some(session) = &session {
        parser = parser.with_shared_session(Arc::clone(session));
    }
    let parser = Arc::new(parser);

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let cancel = CancellationFlag::new();
    cancel_on_ctrl_c(&cancel);

    let permits = Arc::new(Semaphore::new(args.jobs.max(1)));
    let mut tasks = JoinSet::new();

    for (index, path) in files.into_iter().enumerate() {
        let parser = Arc::clone(&parser);
        let permits = Arc::clone(&permits);
        let cancel = cancel.clone();

        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let file_start = Instant::now();
            let result = parser.parse_file(&path, &cancel).await;
            let processing_time_ms = file_start.elapsed().as_millis() as u64;

            let outcome = match result {
                Ok(document) => DeckOutcome {
                    path,
                    document: Some(document),
                    error: None,
                    processing_time_ms,
                },
                Err(e) => DeckOutcome {
                    path,
                    document: None,
                    error: Some(e.to_string()),
                    processing_time_ms,
                },
            };
            (index, outcome)
        });
    }

    let mut results: Vec<(usize, DeckOutcome)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) = joined?;
        overall_pb.inc(1);

        if let Some(message) = &outcome.error {
            if args.continue_on_error {
                warn!("Failed to process {}: {}", outcome.path.display(), message);
            } else {
                error!("Failed to process {}: {}", outcome.path.display(), message);
                cancel.cancel();
                tasks.abort_all();
                overall_pb.abandon();
                terminate(&session).await;
                anyhow::bail!("Processing failed: {}", message);
            }
        }

        results.push((index, outcome));
    }

    overall_pb.finish_and_clear();
    terminate(&session).await;

    results.sort_by_key(|(index, _)| *index);
    let results: Vec<DeckOutcome> = results.into_iter().map(|(_, outcome)| outcome).collect();

    for result in &results {
        if let Some(document) = &result.document {
            let output_path = output_path_for(&args.output_dir, &result.path);
            let content = if args.pretty {
                serde_json::to_string_pretty(document)?
            } else {
                serde_json::to_string(document)?
            };
            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args.output_dir.join("summary.csv");
        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(results.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

async fn terminate(session: &Option<deckparse_core::SharedOcrSession>) {
    if let Some(session) = session {
        session.lock().await.terminate();
    }
}

fn output_path_for(output_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("deck");
    output_dir.join(format!("{}.json", stem))
}

fn write_summary(path: &Path, results: &[DeckOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "method",
        "pages",
        "words",
        "pages_with_text",
        "pages_with_ocr",
        "degraded_pages",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        if let Some(document) = &result.document {
            let stats = &document.extraction_stats;
            wtr.write_record([
                filename,
                "success",
                document.dominant_method().as_str(),
                &document.page_count.to_string(),
                &stats.total_words.to_string(),
                &stats.pages_with_text.to_string(),
                &stats.pages_with_ocr.to_string(),
                &document.degraded_pages().count().to_string(),
                &result.processing_time_ms.to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                "",
                "",
                "",
                &result.processing_time_ms.to_string(),
                result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
