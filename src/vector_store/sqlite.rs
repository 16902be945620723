//! Durable index storage.
//!
//! A persisted index is a directory holding `chunks.db` (SQLite, one row per
//! chunk with its vector as a little-endian BLOB) and `index_meta.json`. The
//! metadata file is written last and acts as the commit marker. Loading
//! validates everything and reports any problem as
//! [`ProspektError::PersistenceCorruption`].

use super::{bytes_to_vector, vector_to_bytes, IndexMetadata, VectorIndex, FORMAT_VERSION};
use crate::chunking::Chunk;
use crate::error::{ProspektError, Result};
use rusqlite::{params, Connection, OpenFlags};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Chunk database file name.
pub const CHUNKS_FILE: &str = "chunks.db";
/// Index metadata file name.
pub const METADATA_FILE: &str = "index_meta.json";

/// SQLite sidecars left next to `chunks.db` by an interrupted write.
const SIDECAR_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

const SCHEMA: &str = r#"
    CREATE TABLE chunks (
        position INTEGER PRIMARY KEY,
        id TEXT NOT NULL UNIQUE,
        document_id TEXT NOT NULL,
        text TEXT NOT NULL,
        metadata TEXT NOT NULL,
        excluded_llm_keys TEXT NOT NULL,
        excluded_embed_keys TEXT NOT NULL,
        embedding BLOB NOT NULL
    );
"#;

/// Reads and writes [`VectorIndex`] directories.
pub struct IndexStorage;

impl IndexStorage {
    /// Whether `dir` exists and contains anything at all.
    pub fn is_populated(dir: &Path) -> bool {
        std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    /// Replace the index stored in `dir` with `index`.
    ///
    /// Only the files this module writes are removed. Anything else in `dir`
    /// is left alone.
    #[instrument(skip(index), fields(chunks = index.len()))]
    pub fn persist(index: &VectorIndex, dir: &Path) -> Result<()> {
        let dimensions = index.metadata().dimensions;
        if let Some(chunk) = index.chunks().iter().find(|c| c.embedding.len() != dimensions) {
            return Err(ProspektError::VectorStore(format!(
                "refusing to persist chunk {} with {} dimensions into a {}-dimensional index",
                chunk.id,
                chunk.embedding.len(),
                dimensions
            )));
        }

        std::fs::create_dir_all(dir)?;
        Self::remove_own_files(dir)?;

        let mut conn = Connection::open(dir.join(CHUNKS_FILE))?;
        conn.execute_batch(SCHEMA)?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO chunks
                (position, id, document_id, text, metadata, excluded_llm_keys, excluded_embed_keys, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;

            for (position, chunk) in index.chunks().iter().enumerate() {
                stmt.execute(params![
                    position as i64,
                    chunk.id,
                    chunk.document_id,
                    chunk.text,
                    serde_json::to_string(&chunk.metadata)?,
                    serde_json::to_string(&chunk.excluded_llm_metadata_keys)?,
                    serde_json::to_string(&chunk.excluded_embed_metadata_keys)?,
                    vector_to_bytes(&chunk.embedding),
                ])?;
            }
        }
        tx.commit()?;
        drop(conn);

        let tmp = dir.join(format!("{}.tmp", METADATA_FILE));
        std::fs::write(&tmp, serde_json::to_string_pretty(index.metadata())?)?;
        std::fs::rename(&tmp, dir.join(METADATA_FILE))?;

        info!("Persisted {} chunks to {:?}", index.len(), dir);
        Ok(())
    }

    fn remove_own_files(dir: &Path) -> Result<()> {
        let mut names = vec![
            METADATA_FILE.to_string(),
            format!("{}.tmp", METADATA_FILE),
            CHUNKS_FILE.to_string(),
        ];
        names.extend(SIDECAR_SUFFIXES.iter().map(|suffix| format!("{}{}", CHUNKS_FILE, suffix)));

        for name in names {
            let path = dir.join(name);
            if path.is_file() {
                debug!("Removing {:?}", path);
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Load and validate the index in `dir`.
    ///
    /// The stored embedding model and dimensions must match the expected
    /// ones, since vectors from another model are not comparable.
    #[instrument]
    pub fn load(dir: &Path, expected_model: &str, expected_dimensions: usize) -> Result<VectorIndex> {
        let index = Self::read(dir).map_err(into_corruption)?;
        let metadata = index.metadata();

        if metadata.embedding_model != expected_model {
            return Err(ProspektError::PersistenceCorruption(format!(
                "index was built with embedding model '{}', configured '{}'",
                metadata.embedding_model, expected_model
            )));
        }
        if metadata.dimensions != expected_dimensions {
            return Err(ProspektError::PersistenceCorruption(format!(
                "index has {} dimensions, configured {}",
                metadata.dimensions, expected_dimensions
            )));
        }

        info!("Loaded {} chunks from {:?}", index.len(), dir);
        Ok(index)
    }

    /// Read the metadata file only.
    pub fn read_metadata(dir: &Path) -> Result<IndexMetadata> {
        let content = std::fs::read_to_string(dir.join(METADATA_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }

    fn read(dir: &Path) -> Result<VectorIndex> {
        let metadata = Self::read_metadata(dir)?;
        if metadata.format_version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {} (expected {})",
                metadata.format_version, FORMAT_VERSION
            )));
        }

        let conn = Connection::open_with_flags(
            dir.join(CHUNKS_FILE),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(corrupt(format!("integrity check failed: {}", integrity)));
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT id, document_id, text, metadata, excluded_llm_keys, excluded_embed_keys, embedding
            FROM chunks ORDER BY position
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(StoredRow {
                id: row.get(0)?,
                document_id: row.get(1)?,
                text: row.get(2)?,
                metadata: row.get(3)?,
                excluded_llm_keys: row.get(4)?,
                excluded_embed_keys: row.get(5)?,
                embedding: row.get(6)?,
            })
        })?;

        let mut chunks = Vec::with_capacity(metadata.chunk_count);
        for row in rows {
            let chunk = row?.into_chunk()?;
            if chunk.embedding.len() != metadata.dimensions {
                return Err(corrupt(format!(
                    "chunk {} has {} dimensions, index declares {}",
                    chunk.id,
                    chunk.embedding.len(),
                    metadata.dimensions
                )));
            }
            chunks.push(chunk);
        }

        if chunks.len() != metadata.chunk_count {
            return Err(corrupt(format!(
                "found {} chunks, index declares {}",
                chunks.len(),
                metadata.chunk_count
            )));
        }

        debug!("Read {} chunks from {:?}", chunks.len(), dir);
        Ok(VectorIndex::from_parts(metadata, chunks))
    }
}

struct StoredRow {
    id: String,
    document_id: String,
    text: String,
    metadata: String,
    excluded_llm_keys: String,
    excluded_embed_keys: String,
    embedding: Vec<u8>,
}

impl StoredRow {
    fn into_chunk(self) -> Result<Chunk> {
        let metadata: BTreeMap<String, String> = serde_json::from_str(&self.metadata)?;
        let embedding = bytes_to_vector(&self.embedding)
            .ok_or_else(|| corrupt(format!("chunk {} has a truncated vector", self.id)))?;

        Ok(Chunk {
            id: self.id,
            document_id: self.document_id,
            text: self.text,
            metadata,
            excluded_llm_metadata_keys: serde_json::from_str(&self.excluded_llm_keys)?,
            excluded_embed_metadata_keys: serde_json::from_str(&self.excluded_embed_keys)?,
            embedding,
        })
    }
}

fn corrupt(message: String) -> ProspektError {
    ProspektError::PersistenceCorruption(message)
}

fn into_corruption(error: ProspektError) -> ProspektError {
    match error {
        ProspektError::PersistenceCorruption(_) => error,
        other => ProspektError::PersistenceCorruption(other.to_string()),
    }
}
