//! Embedding storage
//!
//! A single SQLite table mapping file paths to packed `f32` vectors.
//! The handle is opened explicitly by the caller and closed on drop.

use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;

const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS embeddings (
        file_path TEXT PRIMARY KEY,
        embedding BLOB
    )
";

const F32_WIDTH: usize = std::mem::size_of::<f32>();

/// Errors raised by the embedding store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("embedding store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    #[error("failed to prepare store directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt embedding for {file_path}: {len} bytes is not a whole number of f32 values")]
    CorruptBlob { file_path: String, len: usize },

    #[error("no embedding stored for {file_path}")]
    MissingBlob { file_path: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One stored file embedding
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub file_path: String,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn new(file_path: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            file_path: file_path.into(),
            vector,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }
}

/// SQLite-backed embedding store
pub struct VectorStore {
    conn: Connection,
}

impl VectorStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open a throwaway store that lives only as long as the handle
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Insert or replace the vector stored for `file_path`
    pub fn upsert(&self, file_path: &str, vector: &[f32]) -> Result<()> {
        self.conn.execute(
            "INSERT INTO embeddings (file_path, embedding) VALUES (?1, ?2)
             ON CONFLICT(file_path) DO UPDATE SET embedding = excluded.embedding",
            params![file_path, encode_vector(vector)],
        )?;
        Ok(())
    }

    /// Upsert every record inside one transaction.
    ///
    /// Nothing is committed if any write fails.
    pub fn upsert_batch(&mut self, records: &[EmbeddingRecord]) -> Result<usize> {
        self.write_batch(records, false)
    }

    /// Replace the whole store with `records` inside one transaction.
    ///
    /// The previous contents survive if any write fails.
    pub fn replace_all(&mut self, records: &[EmbeddingRecord]) -> Result<usize> {
        self.write_batch(records, true)
    }

    fn write_batch(&mut self, records: &[EmbeddingRecord], clear_first: bool) -> Result<usize> {
        let tx = self.conn.transaction()?;
        if clear_first {
            let removed = tx.execute("DELETE FROM embeddings", [])?;
            tracing::debug!("Replacing {} embeddings", removed);
        }
        {
            let mut stmt = tx.prepare(
                "INSERT INTO embeddings (file_path, embedding) VALUES (?1, ?2)
                 ON CONFLICT(file_path) DO UPDATE SET embedding = excluded.embedding",
            )?;
            for record in records {
                stmt.execute(params![record.file_path, encode_vector(&record.vector)])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Remove every record, returning how many were deleted
    pub fn clear(&self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM embeddings", [])?;
        tracing::debug!("Cleared {} embeddings", removed);
        Ok(removed)
    }

    /// Return all stored records ordered by path.
    ///
    /// Fails on the first row whose embedding cannot be decoded.
    pub fn scan(&self) -> Result<Vec<EmbeddingRecord>> {
        self.entries()?
            .into_iter()
            .map(|(file_path, vector)| Ok(EmbeddingRecord { file_path, vector: vector? }))
            .collect()
    }

    /// Like [`scan`](Self::scan), but rows with a missing or corrupt
    /// embedding are logged and left out.
    pub fn scan_valid(&self) -> Result<Vec<EmbeddingRecord>> {
        let mut records = Vec::new();
        for (file_path, vector) in self.entries()? {
            match vector {
                Ok(vector) => records.push(EmbeddingRecord { file_path, vector }),
                Err(e) => tracing::warn!("Skipping stored record: {}", e),
            }
        }
        Ok(records)
    }

    /// Every row with its decoded embedding, or the reason it could not be
    /// decoded
    pub fn entries(&self) -> Result<Vec<(String, Result<Vec<f32>>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT file_path, embedding FROM embeddings ORDER BY file_path")?;

        let rows = stmt.query_map([], |row| {
            let file_path: String = row.get(0)?;
            let blob: Option<Vec<u8>> = row.get(1)?;
            Ok((file_path, blob))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (file_path, blob) = row?;
            let vector = match blob {
                Some(blob) => decode_vector(&file_path, &blob),
                None => Err(StoreError::MissingBlob {
                    file_path: file_path.clone(),
                }),
            };
            entries.push((file_path, vector));
        }

        Ok(entries)
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Pack a vector as little-endian `f32` bytes
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * F32_WIDTH);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Unpack little-endian `f32` bytes
pub fn decode_vector(file_path: &str, blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % F32_WIDTH != 0 {
        return Err(StoreError::CorruptBlob {
            file_path: file_path.to_string(),
            len: blob.len(),
        });
    }

    Ok(blob
        .chunks_exact(F32_WIDTH)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
