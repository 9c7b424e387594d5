//! Tree command - print the tracked files of a directory

use anyhow::Result;
use std::path::PathBuf;

use crate::config::Config;
use crate::core::git::{self, FileTree};

pub fn run(config: Config, path: Option<&str>) -> Result<()> {
    let root = path
        .map(PathBuf::from)
        .unwrap_or(config.general.target_directory);

    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let files = git::tracked_files(&root)?;
    print!("{}", FileTree::from_paths(&files).render());

    Ok(())
}
