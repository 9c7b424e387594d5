//! Codebase indexing with a progress UI
//!
//! Embeds every tracked source file under a target directory and stores the
//! vectors keyed by path.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use crate::ai::provider::EmbeddingProvider;
use crate::config::IndexConfig;
use crate::core::git;
use crate::store::{EmbeddingRecord, VectorStore};

// ANSI color codes from design system
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const PRIMARY: &str = "\x1b[38;2;100;181;246m";      // #64B5F6
    pub const SUCCESS: &str = "\x1b[38;2;165;214;167m";      // #A5D6A7
    pub const WARNING: &str = "\x1b[38;2;255;245;157m";      // #FFF59D
    pub const ERROR: &str = "\x1b[38;2;239;154;154m";        // #EF9A9A
    pub const AI_ACCENT: &str = "\x1b[38;2;255;202;40m";     // #FFCA28
    pub const MUTED: &str = "\x1b[38;2;84;110;122m";         // #546E7A
    pub const FG: &str = "\x1b[38;2;212;212;215m";           // #D4D4D7
}

mod symbols {
    pub const LOADING: &str = "󰊍";
    pub const SUCCESS: &str = "󰄂";
    pub const WARNING: &str = "⚠";
}

/// A file selected for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Target directory joined with the tracked path, `/`-separated
    pub path: String,
    pub content: String,
}

/// Result of indexing operation
#[derive(Debug, Default)]
pub struct IndexResult {
    pub files_indexed: usize,
    pub files_skipped: usize,
    /// Vector length of the stored embeddings, if any were produced
    pub dimensions: Option<usize>,
    pub time_taken_ms: u64,
    pub errors: Vec<(String, String)>,
}

impl IndexResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Embed the files under `root` and write them to `store`.
///
/// Requests are sent one at a time, at least `request_interval_ms` apart.
/// A file whose request is rejected is skipped. A transport failure stops
/// the run after storing what was already embedded, unless `clear` is set,
/// in which case the store is left as it was. With `clear` the old contents
/// are swapped for the new records in one transaction.
pub async fn index_directory<E: EmbeddingProvider>(
    store: &mut VectorStore,
    embedder: &E,
    root: &Path,
    config: &IndexConfig,
    clear: bool,
) -> Result<IndexResult> {
    let start_time = Instant::now();

    print_header(root);

    let files = collect_files(root, config)?;
    if files.is_empty() {
        print_warning("No supported files found");
        return Ok(IndexResult::empty());
    }

    let interval = Duration::from_millis(config.request_interval_ms);
    let pb = create_progress_bar(files.len() as u64);

    let mut records = Vec::with_capacity(files.len());
    let mut errors = Vec::new();
    let mut last_request: Option<Instant> = None;
    let mut fatal = None;

    for file in &files {
        pb.set_message(file.path.clone());

        if let Some(last) = last_request {
            let wait = interval.saturating_sub(last.elapsed());
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
        last_request = Some(Instant::now());

        match embedder.embed(&file.content).await {
            Ok(vector) => {
                debug!("Generated embedding for {}: {} dimensions", file.path, vector.len());
                records.push(EmbeddingRecord::new(file.path.clone(), vector));
            }
            Err(e) if e.is_skippable() => {
                warn!("Skipping {}: {}", file.path, e);
                errors.push((file.path.clone(), e.to_string()));
            }
            Err(e) => {
                fatal = Some(anyhow::Error::new(e).context(format!("Failed to embed {}", file.path)));
                break;
            }
        }

        pb.inc(1);
    }

    pb.finish_and_clear();

    if let Some(err) = fatal {
        if clear {
            warn!("Keeping the previous index, {} new embeddings discarded", records.len());
        } else {
            store
                .upsert_batch(&records)
                .context("Failed to write embeddings")?;
        }
        return Err(err);
    }

    let stored = if clear {
        store
            .replace_all(&records)
            .context("Failed to replace embeddings")?
    } else {
        store
            .upsert_batch(&records)
            .context("Failed to write embeddings")?
    };

    println!("Finished generating embeddings!");

    let mut dimensions: Vec<usize> = records.iter().map(EmbeddingRecord::dimensions).collect();
    dimensions.sort_unstable();
    dimensions.dedup();
    if dimensions.len() > 1 {
        warn!("Embeddings have mixed dimensions: {:?}", dimensions);
    }

    let result = IndexResult {
        files_indexed: stored,
        files_skipped: errors.len(),
        dimensions: dimensions.first().copied(),
        time_taken_ms: start_time.elapsed().as_millis() as u64,
        errors,
    };

    print_summary(&result);

    Ok(result)
}

/// Select the files under `root` worth embedding.
///
/// Tracked files are filtered by extension and name, then by size, and
/// files that are unreadable or only whitespace are dropped.
pub fn collect_files(root: &Path, config: &IndexConfig) -> Result<Vec<SourceFile>> {
    let tracked = git::tracked_files(root)
        .with_context(|| format!("Failed to list files in {}", root.display()))?;
    let max_bytes = u64::from(config.max_file_size_mb) * 1024 * 1024;

    let mut files = Vec::new();
    for relative in tracked {
        if !is_selected(&relative, config) {
            continue;
        }

        let path = git::join_normalized(root, &relative);

        match std::fs::metadata(&path) {
            Ok(meta) if meta.len() > max_bytes => {
                debug!("Skipping {}: {} bytes exceeds size limit", path, meta.len());
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Error reading file {}: {}", path, e);
                continue;
            }
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Error reading file {}: {}", path, e);
                continue;
            }
        };

        if content.trim().is_empty() {
            debug!("Skipping empty file {}", path);
            continue;
        }

        files.push(SourceFile { path, content });
    }

    Ok(files)
}

fn is_selected(relative: &str, config: &IndexConfig) -> bool {
    let name = relative.rsplit('/').next().unwrap_or(relative);
    if config.skip_files.iter().any(|skip| skip == name) {
        return false;
    }

    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => config
            .extensions
            .iter()
            .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

/// Create a styled progress bar
fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);

    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.cyan} {prefix:.bold} [{bar:40.cyan/dim}] {pos}/{len} {msg:.dim}")
    {
        pb.set_style(
            style
                .progress_chars("█▓░")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
    }

    pb.set_prefix("Embedding");
    pb.enable_steady_tick(Duration::from_millis(80));

    pb
}

/// Print the indexing header
fn print_header(path: &Path) {
    println!();
    println!(
        "{}{}╭─ {} Context Forge ───────────────────────────────────────────╮{}",
        colors::PRIMARY, colors::BOLD, symbols::LOADING, colors::RESET
    );
    println!(
        "{}│{}  Target: {}{}{}",
        colors::PRIMARY, colors::RESET, colors::FG,
        truncate_path(path, 50), colors::RESET
    );
    println!(
        "{}│{}  Mode:   {}File embeddings{}",
        colors::PRIMARY, colors::RESET, colors::MUTED, colors::RESET
    );
    println!(
        "{}╰──────────────────────────────────────────────────────────────╯{}",
        colors::PRIMARY, colors::RESET
    );
    println!();
}

/// Print the indexing summary
fn print_summary(result: &IndexResult) {
    println!();

    let (icon, color, title) = if result.files_skipped > 0 {
        (symbols::WARNING, colors::WARNING, "Indexing Completed with Warnings")
    } else {
        (symbols::SUCCESS, colors::SUCCESS, "Indexing Successful")
    };

    println!(
        "{}{}╭─ {} {} ─────────────────────────────────────────╮{}",
        color, colors::BOLD, icon, title, colors::RESET
    );
    println!(
        "{}│{}  {}Files Indexed:{}     {}{:>6}{}",
        color, colors::RESET, colors::MUTED, colors::RESET,
        colors::FG, result.files_indexed, colors::RESET
    );
    if let Some(dimensions) = result.dimensions {
        println!(
            "{}│{}  {}Dimensions:{}        {}{:>6}{}",
            color, colors::RESET, colors::MUTED, colors::RESET,
            colors::AI_ACCENT, dimensions, colors::RESET
        );
    }
    println!(
        "{}│{}  {}Time Elapsed:{}      {}{:.2}s{}",
        color, colors::RESET, colors::MUTED, colors::RESET,
        colors::FG, result.time_taken_ms as f64 / 1000.0, colors::RESET
    );

    if result.files_skipped > 0 {
        println!(
            "{}│{}  {}Skipped Files: {}{}",
            color, colors::RESET, colors::ERROR, result.files_skipped, colors::RESET
        );
        for (path, reason) in &result.errors {
            println!(
                "{}│{}    {}{}: {}{}",
                color, colors::RESET, colors::MUTED, path, reason, colors::RESET
            );
        }
    }

    println!(
        "{}│{}  {}Ready for queries. Try: `forge ask \"How does the game loop work?\"`{}",
        color, colors::RESET, colors::MUTED, colors::RESET
    );
    println!(
        "{}╰──────────────────────────────────────────────────────────────╯{}",
        color, colors::RESET
    );
    println!();
}

/// Print a warning message
fn print_warning(message: &str) {
    println!(
        "\n{}  {} {}{}",
        colors::WARNING, symbols::WARNING, message, colors::RESET
    );
}

/// Truncate a path for display
fn truncate_path(path: &Path, max_len: usize) -> String {
    let s = path.display().to_string();
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}
