//! Tracked file listing and tree rendering
//!
//! Inside a git repository the listing is the repository index, the same set
//! `git ls-files` prints. Outside one it falls back to a directory walk that
//! honours `.gitignore`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::Repository;
use ignore::gitignore::Gitignore;
use walkdir::WalkDir;

const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "build",
    "dist",
    "__pycache__",
    "vendor",
];

/// Files under `root` as `/`-separated paths relative to `root`, sorted
pub fn tracked_files(root: &Path) -> Result<Vec<String>> {
    match Repository::discover(root) {
        Ok(repo) => index_files(&repo, root),
        Err(e) => {
            tracing::debug!("{} is not a git repository ({}), walking directory", root.display(), e.message());
            walk_files(root)
        }
    }
}

fn index_files(repo: &Repository, root: &Path) -> Result<Vec<String>> {
    let index = repo.index().context("Failed to read git index")?;

    // `root` may be a subdirectory of the work tree; list only what is under it.
    let prefix = match repo.workdir() {
        Some(workdir) => {
            let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());
            let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
            root.strip_prefix(&workdir)
                .map(to_slash_path)
                .unwrap_or_default()
        }
        None => String::new(),
    };

    let mut files: Vec<String> = index
        .iter()
        .filter_map(|entry| String::from_utf8(entry.path).ok())
        .filter_map(|path| {
            if prefix.is_empty() {
                Some(path)
            } else {
                path.strip_prefix(&prefix)
                    .and_then(|rest| rest.strip_prefix('/'))
                    .map(str::to_string)
            }
        })
        .collect();

    files.sort();
    files.dedup();
    Ok(files)
}

fn walk_files(root: &Path) -> Result<Vec<String>> {
    let gitignore_path = root.join(".gitignore");
    let gitignore = if gitignore_path.exists() {
        Gitignore::new(&gitignore_path).0
    } else {
        Gitignore::empty()
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            if name.starts_with('.') || SKIPPED_DIRS.iter().any(|dir| *dir == name) {
                return false;
            }
            !gitignore
                .matched(e.path(), e.file_type().is_dir())
                .is_ignore()
        })
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.file_type().is_file() {
            if let Ok(relative) = entry.path().strip_prefix(root) {
                files.push(to_slash_path(relative));
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Render a path with `/` separators whatever the platform
pub fn to_slash_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `root` joined with a relative tracked path, normalized to `/` separators
pub fn join_normalized(root: &Path, relative: &str) -> String {
    let joined: PathBuf = root.join(relative);
    let mut out = Vec::new();
    for component in joined.components() {
        use std::path::Component;
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.last(), Some(last) if last != "..") {
                    out.pop();
                } else {
                    out.push("..".to_string());
                }
            }
            Component::RootDir => out.push(String::new()),
            Component::Prefix(prefix) => out.push(prefix.as_os_str().to_string_lossy().into_owned()),
            Component::Normal(part) => out.push(part.to_string_lossy().into_owned()),
        }
    }

    match out.as_slice() {
        [] => ".".to_string(),
        [only] if only.is_empty() => "/".to_string(),
        _ => out.join("/"),
    }
}

/// Directory tree built from relative file paths
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FileTree {
    children: BTreeMap<String, FileTree>,
}

impl FileTree {
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = FileTree::default();
        for path in paths {
            let mut current = &mut tree;
            for part in path.as_ref().split('/').filter(|p| !p.is_empty()) {
                current = current.children.entry(part.to_string()).or_default();
            }
        }
        tree
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// `.` followed by one line per entry, box-drawing prefixes, names sorted
    pub fn render(&self) -> String {
        let mut out = String::from(".\n");
        self.render_into(&mut out, "");
        out
    }

    fn render_into(&self, out: &mut String, prefix: &str) {
        let last_index = self.children.len().saturating_sub(1);
        for (index, (name, child)) in self.children.iter().enumerate() {
            let is_last = index == last_index;
            out.push_str(prefix);
            out.push_str(if is_last { "└── " } else { "├── " });
            out.push_str(name);
            out.push('\n');

            if !child.is_empty() {
                let extension = if is_last { "    " } else { "│   " };
                child.render_into(out, &format!("{prefix}{extension}"));
            }
        }
    }
}
