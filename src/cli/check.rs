//! Check command - list stored embeddings and their dimensions

use anyhow::{Context, Result};
use std::collections::BTreeMap;

use crate::config::Config;
use crate::store::{EmbeddingRecord, VectorStore};

pub fn run(config: Config) -> Result<()> {
    let store = VectorStore::open(&config.general.database).with_context(|| {
        format!("Failed to open embedding store {}", config.general.database.display())
    })?;
    let entries = store.entries().context("Failed to read embeddings")?;

    if entries.is_empty() {
        println!("No embeddings stored in {}", config.general.database.display());
        return Ok(());
    }

    let mut records = Vec::with_capacity(entries.len());
    let mut corrupt = 0;
    for (file_path, vector) in entries {
        match vector {
            Ok(vector) => {
                println!("File: {}, Embedding dimensions: {}", file_path, vector.len());
                records.push(EmbeddingRecord::new(file_path, vector));
            }
            Err(e) => {
                println!("File: {}, corrupt: {}", file_path, e);
                corrupt += 1;
            }
        }
    }

    let by_dimension = dimension_counts(&records);
    println!();
    println!("{} embeddings in {}", records.len(), config.general.database.display());
    if corrupt > 0 {
        tracing::warn!("{} stored records are corrupt. Re-index with --clear to rebuild.", corrupt);
    }

    if by_dimension.len() > 1 {
        let summary: Vec<String> = by_dimension
            .iter()
            .map(|(dims, count)| format!("{dims} ({count} files)"))
            .collect();
        tracing::warn!(
            "Mixed embedding dimensions: {}. Re-index with --clear to rebuild.",
            summary.join(", ")
        );
    }

    Ok(())
}

fn dimension_counts(records: &[EmbeddingRecord]) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.dimensions()).or_insert(0) += 1;
    }
    counts
}
