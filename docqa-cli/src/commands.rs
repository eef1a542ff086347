//! Batch ingestion and the interactive chat loop.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use docqa_rag::{DocumentQa, IndexStats, IngestReport};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{info, warn};

use crate::render::{format_response, format_stats};
use crate::settings::Settings;

/// Outcome of ingesting a set of files.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub ingested: Vec<IngestReport>,
    pub failed: Vec<(PathBuf, String)>,
}

impl IngestSummary {
    /// Total chunks written across all files.
    pub fn chunks_added(&self) -> usize {
        self.ingested.iter().map(|r| r.chunks_added).sum()
    }
}

/// Every `*.pdf` directly inside `dir`, sorted by name.
pub fn collect_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read upload directory {}", dir.display()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Ingest each file in turn. A failing file is recorded and skipped.
pub async fn ingest_files(qa: &DocumentQa, files: &[PathBuf]) -> IngestSummary {
    let mut summary = IngestSummary::default();
    for path in files {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let result = match tokio::fs::read(path).await {
            Ok(bytes) => qa.ingest(&bytes, &filename).await.map_err(|e| e.to_string()),
            Err(e) => Err(format!("failed to read {}: {e}", path.display())),
        };
        match result {
            Ok(report) => {
                info!(file = %report.filename, chunks = report.chunks_added, "ingested file");
                summary.ingested.push(report);
            }
            Err(message) => {
                warn!(file = %filename, error = %message, "skipping file");
                summary.failed.push((path.clone(), message));
            }
        }
    }
    info!(
        files = summary.ingested.len(),
        failed = summary.failed.len(),
        chunks_added = summary.chunks_added(),
        "ingestion finished"
    );
    summary
}

/// Run `ingest` for the given files, or for every PDF in `dir` when none are given.
pub async fn run_ingest(qa: &DocumentQa, files: Vec<PathBuf>, dir: &Path, clear: bool) -> Result<()> {
    if clear {
        qa.clear().await?;
        println!("Cleared existing index.");
    }

    let files = if files.is_empty() { collect_pdfs(dir)? } else { files };
    if files.is_empty() {
        println!("No PDF files found in {}.", dir.display());
        return Ok(());
    }

    println!("Ingesting {} file(s)...", files.len());
    let summary = ingest_files(qa, &files).await;
    for report in &summary.ingested {
        println!("  ✓ {} ({} chunks)", report.filename, report.chunks_added);
    }
    for (path, message) in &summary.failed {
        println!("  ✗ {}: {message}", path.display());
    }
    let stats = qa.stats().await?;
    println!(
        "Added {} chunks from {} file(s); index now holds {}.",
        summary.chunks_added(),
        summary.ingested.len(),
        format_stats(&stats)
    );

    if summary.ingested.is_empty() && !summary.failed.is_empty() {
        bail!("no files could be ingested ({} failed)", summary.failed.len());
    }
    Ok(())
}

/// Clear the index, then ingest every PDF in `dir`. A missing `dir` holds no files.
pub async fn reingest(qa: &DocumentQa, dir: &Path) -> Result<IngestSummary> {
    qa.clear().await?;
    let files = if dir.exists() { collect_pdfs(dir)? } else { Vec::new() };
    info!(dir = %dir.display(), files = files.len(), "re-ingesting upload directory");
    Ok(ingest_files(qa, &files).await)
}

/// Index size, without connecting to the model services.
pub async fn index_stats(settings: &Settings) -> Result<IndexStats> {
    Ok(settings.open_index().await?.stats().await?)
}

/// Empty the index, without connecting to the model services.
pub async fn clear_index(settings: &Settings) -> Result<()> {
    settings.open_index().await?.clear().await?;
    Ok(())
}

const CHAT_HELP: &str = "Commands:
  help              show this message
  stats             show index size
  clear             remove every document from the index
  quit | exit | q   leave the chat
Anything else is answered from the indexed documents.";

/// Interactive question loop.
pub async fn run_chat(qa: &DocumentQa) -> Result<()> {
    let stats = qa.stats().await?;
    if stats.total_chunks == 0 {
        bail!("the index is empty; run `docqa ingest` first");
    }

    println!("Document QA assistant ({}). Type 'help' for commands.", format_stats(&stats));
    let mut editor = DefaultEditor::new().context("failed to start line editor")?;

    loop {
        let line = match editor.readline("\nQuestion> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        match input.to_ascii_lowercase().as_str() {
            "quit" | "exit" | "q" => break,
            "help" => println!("{CHAT_HELP}"),
            "stats" => println!("{}", format_stats(&qa.stats().await?)),
            "clear" => {
                qa.clear().await?;
                println!("Index cleared.");
            }
            _ => match qa.query(input).await {
                Ok(response) => println!("\n{}", format_response(&response)),
                Err(e) => println!("Error ({}): {e}", e.kind()),
            },
        }
    }
    println!("Goodbye.");
    Ok(())
}
