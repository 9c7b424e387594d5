//! Source language detection from file extensions

use std::path::Path;

/// Languages with a known code-fence label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    Ruby,
    Shell,
    Toml,
    Markdown,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Language::Rust,
            "py" | "pyw" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cc" | "cpp" | "cxx" | "hpp" | "hh" => Language::Cpp,
            "rb" => Language::Ruby,
            "sh" | "bash" | "zsh" => Language::Shell,
            "toml" => Language::Toml,
            "md" | "markdown" => Language::Markdown,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Info string for a fenced code block
    pub fn fence(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Ruby => "ruby",
            Language::Shell => "bash",
            Language::Toml => "toml",
            Language::Markdown => "markdown",
            Language::Unknown => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_from_path() {
        assert_eq!(Language::from_path(Path::new("game/state.py")).fence(), "python");
        assert_eq!(Language::from_path(Path::new("src/main.RS")).fence(), "rust");
        assert_eq!(Language::from_path(Path::new("Makefile")), Language::Unknown);
        assert_eq!(Language::Unknown.fence(), "");
    }
}
