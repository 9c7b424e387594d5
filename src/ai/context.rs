//! Context assembly for code questions
//!
//! Embeds the question, shortlists the closest indexed files, inlines their
//! current contents under the question and asks the completion model.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use super::provider::{CompletionProvider, EmbeddingProvider, Message};
use crate::core::language::Language;
use crate::retrieval::{self, SelectionPolicy, Shortlist};
use crate::store::VectorStore;

/// Result of one answered question
#[derive(Debug, Clone)]
pub struct Answer {
    pub response: String,
    /// The question with the project context appended, as sent to the model
    pub detailed_query: String,
    pub shortlist: Shortlist,
}

/// Answers questions using an embedding provider and a completion provider
pub struct ContextAssembler<E, C> {
    embedder: E,
    completer: C,
    policy: SelectionPolicy,
    system_prompt: String,
}

impl<E, C> ContextAssembler<E, C>
where
    E: EmbeddingProvider,
    C: CompletionProvider,
{
    pub fn new(embedder: E, completer: C, policy: SelectionPolicy, system_prompt: &str) -> Self {
        Self {
            embedder,
            completer,
            policy,
            system_prompt: system_prompt.to_string(),
        }
    }

    /// Shortlist files for `query` without calling the completion model
    pub async fn relevant_files(&self, store: &VectorStore, query: &str) -> Result<Shortlist> {
        let query_vector = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed query")?;

        let records = store.scan_valid().context("Failed to read embeddings")?;
        if records.is_empty() {
            warn!("Embedding store is empty, answering without project context");
        }

        Ok(retrieval::shortlist(&query_vector, &records, &self.policy))
    }

    pub async fn answer(&self, store: &VectorStore, query: &str) -> Result<Answer> {
        let shortlist = self.relevant_files(store, query).await?;
        for candidate in &shortlist.candidates {
            info!("Using {} ({:.3})", candidate.file_path, candidate.score);
        }

        let context = assemble_context(&shortlist.paths());
        let detailed_query = format!("{query}\n\nProject Context:\n{context}");
        debug!("Detailed query is {} bytes", detailed_query.len());

        let messages = [
            Message::system(self.system_prompt.as_str()),
            Message::user(detailed_query.as_str()),
        ];
        let response = self
            .completer
            .complete(&messages)
            .await
            .context("Failed to get completion")?;

        Ok(Answer {
            response,
            detailed_query,
            shortlist,
        })
    }
}

/// Inline the current contents of `paths` as fenced code blocks.
///
/// Files that cannot be read are skipped.
pub fn assemble_context<S: AsRef<str>>(paths: &[S]) -> String {
    let mut context = String::new();

    for path in paths {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping {} in context: {}", path, e);
                continue;
            }
        };

        let lang = Language::from_path(Path::new(path)).fence();
        context.push_str(&format!("\n\n{path}:\n```{lang}\n{content}\n```"));
    }

    context
}

/// Write `answer` to `dir/response-YYYY-MM-DD-HHMM.md`
pub fn save_response(dir: &Path, answer: &Answer, now: DateTime<Local>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join(format!("response-{}.md", now.format("%Y-%m-%d-%H%M")));
    let body = format!(
        "# Query\n\n{}\n\n# Response\n\n{}\n",
        answer.detailed_query, answer.response
    );

    std::fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::error::ProviderError;
    use crate::ai::provider::fake::{FakeCompleter, FakeEmbedder};
    use crate::ai::provider::Role;
    use crate::retrieval::Tier;
    use chrono::TimeZone;
    use std::fs;

    struct Project {
        dir: tempfile::TempDir,
        store: VectorStore,
    }

    impl Project {
        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).to_string_lossy().replace('\\', "/")
        }
    }

    fn project() -> Project {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def jump():\n    pass").unwrap();
        fs::write(dir.path().join("b.py"), "SPEED = 4").unwrap();
        fs::write(dir.path().join("c.py"), "print('menu')").unwrap();

        let store = VectorStore::open_in_memory().unwrap();
        let project = Project { dir, store };
        project.store.upsert(&project.path("a.py"), &[1.0, 0.0]).unwrap();
        project.store.upsert(&project.path("b.py"), &[0.8, 0.6]).unwrap();
        project.store.upsert(&project.path("c.py"), &[0.0, 1.0]).unwrap();
        project
    }

    #[tokio::test]
    async fn test_answer_inlines_shortlisted_files() {
        let project = project();
        let embedder = FakeEmbedder::default().with("how does jumping work?", vec![1.0, 0.0]);
        let assembler = ContextAssembler::new(
            embedder,
            FakeCompleter::replying("It calls jump()."),
            SelectionPolicy::default(),
            "You are helpful.",
        );

        let answer = assembler
            .answer(&project.store, "how does jumping work?")
            .await
            .unwrap();

        assert_eq!(answer.response, "It calls jump().");
        assert_eq!(answer.shortlist.tier, Tier::Initial);
        assert_eq!(answer.shortlist.paths(), vec![project.path("a.py"), project.path("b.py")]);

        let expected = format!(
            "how does jumping work?\n\nProject Context:\n\n\n{}:\n```python\ndef jump():\n    pass\n```\n\n{}:\n```python\nSPEED = 4\n```",
            project.path("a.py"),
            project.path("b.py")
        );
        assert_eq!(answer.detailed_query, expected);

        let received = assembler.completer.received.borrow();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].role, Role::System);
        assert_eq!(received[0].content, "You are helpful.");
        assert_eq!(received[1].role, Role::User);
        assert_eq!(received[1].content, expected);
    }

    #[tokio::test]
    async fn test_answer_uses_current_file_contents() {
        let project = project();
        fs::write(project.dir.path().join("a.py"), "def jump(height):\n    pass").unwrap();

        let assembler = ContextAssembler::new(
            FakeEmbedder::default().with("q", vec![1.0, 0.0]),
            FakeCompleter::replying("ok"),
            SelectionPolicy::default(),
            "",
        );

        let answer = assembler.answer(&project.store, "q").await.unwrap();
        assert!(answer.detailed_query.contains("def jump(height):"));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped() {
        let project = project();
        fs::remove_file(project.dir.path().join("a.py")).unwrap();

        let assembler = ContextAssembler::new(
            FakeEmbedder::default().with("q", vec![1.0, 0.0]),
            FakeCompleter::replying("ok"),
            SelectionPolicy::default(),
            "",
        );

        let answer = assembler.answer(&project.store, "q").await.unwrap();
        assert_eq!(answer.shortlist.len(), 2);
        assert!(!answer.detailed_query.contains("a.py"));
        assert!(answer.detailed_query.contains("SPEED = 4"));
    }

    #[tokio::test]
    async fn test_empty_store_still_answers() {
        let store = VectorStore::open_in_memory().unwrap();
        let assembler = ContextAssembler::new(
            FakeEmbedder::default().with("q", vec![1.0, 0.0]),
            FakeCompleter::replying("no context"),
            SelectionPolicy::default(),
            "",
        );

        let answer = assembler.answer(&store, "q").await.unwrap();
        assert!(answer.shortlist.is_empty());
        assert_eq!(answer.detailed_query, "q\n\nProject Context:\n");
        assert_eq!(answer.response, "no context");
    }

    #[tokio::test]
    async fn test_bad_stored_rows_do_not_abort_answer() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.py");
        fs::write(&good, "GOOD = True").unwrap();
        let good = good.to_string_lossy().to_string();

        let db = dir.path().join("embeddings.db");
        let store = VectorStore::open(&db).unwrap();
        store.upsert(&good, &[1.0, 0.0]).unwrap();

        let raw = rusqlite::Connection::open(&db).unwrap();
        raw.execute(
            "INSERT INTO embeddings (file_path, embedding) VALUES ('bad.py', x'000080')",
            [],
        )
        .unwrap();
        raw.execute(
            "INSERT INTO embeddings (file_path, embedding) VALUES ('null.py', NULL)",
            [],
        )
        .unwrap();

        let assembler = ContextAssembler::new(
            FakeEmbedder::default().with("q", vec![1.0, 0.0]),
            FakeCompleter::replying("ok"),
            SelectionPolicy::default(),
            "",
        );

        let answer = assembler.answer(&store, "q").await.unwrap();
        assert_eq!(answer.shortlist.paths(), vec![good]);
        assert!(answer.detailed_query.contains("GOOD = True"));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_reported() {
        let store = VectorStore::open_in_memory().unwrap();
        let embedder = FakeEmbedder::default().fail_next(ProviderError::EmptyResponse { provider: "fake" });
        let assembler = ContextAssembler::new(
            embedder,
            FakeCompleter::replying("unused"),
            SelectionPolicy::default(),
            "",
        );

        let err = assembler.answer(&store, "q").await.unwrap_err();
        assert!(err.to_string().contains("Failed to embed query"));
        assert!(assembler.completer.received.borrow().is_empty());
    }

    #[test]
    fn test_context_block_language() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.rs");
        fs::write(&file, "fn main() {}").unwrap();
        let path = file.to_string_lossy().to_string();

        let context = assemble_context(&[path.clone()]);
        assert_eq!(context, format!("\n\n{path}:\n```rust\nfn main() {{}}\n```"));
    }

    #[test]
    fn test_save_response() {
        let dir = tempfile::tempdir().unwrap();
        let responses = dir.path().join("responses");
        let answer = Answer {
            response: "Use jump().".to_string(),
            detailed_query: "how?\n\nProject Context:\n".to_string(),
            shortlist: Shortlist {
                tier: Tier::Closest,
                candidates: Vec::new(),
            },
        };
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();

        let path = save_response(&responses, &answer, now).unwrap();
        assert_eq!(path, responses.join("response-2024-03-09-1405.md"));
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "# Query\n\nhow?\n\nProject Context:\n\n\n# Response\n\nUse jump().\n"
        );
    }
}
