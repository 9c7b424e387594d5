//! Info command - show version, paths and provider status

use anyhow::Result;

use crate::config::{self, Config};
use crate::store::VectorStore;

pub fn run(config: &Config) -> Result<()> {
    println!("Context Forge v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("System Information:");
    println!("  OS: {} {}", std::env::consts::OS, std::env::consts::ARCH);

    println!();
    println!("Configuration:");
    println!("  Config file: {}", config_file());
    println!("  Target directory: {}", config.general.target_directory.display());
    println!("  Database: {}", database_status(config));
    println!("  Responses: {}", config.general.responses_dir.display());

    println!();
    println!("AI Provider:");
    println!("  Endpoint: {}", config.ai.base_url);
    println!("  Embedding model: {}", config.ai.embedding_model);
    println!("  Completion model: {}", config.ai.completion_model);
    let status = if config.has_api_key() {
        "configured"
    } else {
        "not configured"
    };
    println!("  {}: {}", config.ai.api_key_env, status);

    Ok(())
}

fn config_file() -> String {
    config::config_path()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn database_status(config: &Config) -> String {
    let path = &config.general.database;
    if !path.exists() {
        return format!("{} (not created)", path.display());
    }

    match VectorStore::open(path).and_then(|store| store.len()) {
        Ok(count) => format!("{} ({} embeddings)", path.display(), count),
        Err(e) => format!("{} (unreadable: {})", path.display(), e),
    }
}
