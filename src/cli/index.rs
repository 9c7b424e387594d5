//! Index command - embed the tracked files of a directory

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::ai::OpenAiClient;
use crate::config::Config;
use crate::index;
use crate::store::VectorStore;

pub async fn run(config: Config, path: Option<&str>, clear: bool) -> Result<()> {
    let root = path
        .map(PathBuf::from)
        .unwrap_or_else(|| config.general.target_directory.clone());

    if !root.is_dir() {
        anyhow::bail!("Target directory {} does not exist", root.display());
    }

    let client = OpenAiClient::from_config(&config.ai)?;
    let mut store = VectorStore::open(&config.general.database).with_context(|| {
        format!("Failed to open embedding store {}", config.general.database.display())
    })?;

    let result = index::index_directory(&mut store, &client, &root, &config.index, clear).await?;
    tracing::info!(
        "Indexed {} files ({} skipped) in {}ms",
        result.files_indexed,
        result.files_skipped,
        result.time_taken_ms
    );

    // Skipped files are reported in the summary, not as a failure
    Ok(())
}
