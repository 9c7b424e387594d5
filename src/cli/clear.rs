//! Clear command - delete every stored embedding

use anyhow::{Context, Result};
use dialoguer::Confirm;

use crate::config::Config;
use crate::store::VectorStore;
use crate::ui::ForgeTheme;

pub fn run(config: Config, yes: bool) -> Result<()> {
    let database = &config.general.database;
    if !database.exists() {
        println!("Nothing to clear: {} does not exist", database.display());
        return Ok(());
    }

    let store = VectorStore::open(database)
        .with_context(|| format!("Failed to open embedding store {}", database.display()))?;
    let count = store.len()?;

    if count == 0 {
        println!("Embedding store is already empty");
        return Ok(());
    }

    if !yes {
        if !console::Term::stdout().is_term() {
            anyhow::bail!("Refusing to clear {} embeddings without --yes", count);
        }

        let confirmed = Confirm::with_theme(&ForgeTheme::new())
            .with_prompt(format!("Delete {} embeddings from {}?", count, database.display()))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;

        if !confirmed {
            println!("Cancelled");
            return Ok(());
        }
    }

    let removed = store.clear()?;
    println!("Removed {} embeddings", removed);
    Ok(())
}
