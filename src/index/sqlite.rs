//! SQLite-based embedding index.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! Collections are generational: a rebuild writes documents under a fresh
//! generation row and a single transaction swaps it in, deleting the old
//! generation. For large corpora consider the sqlite-vec extension or a
//! dedicated vector database.

use super::{
    sort_scored, CancelFlag, CollectionInfo, EmbeddingIndex, RebuildReport, Scored,
    cosine_similarity,
};
use crate::chunking::Chunk;
use crate::embedding::Embedder;
use crate::error::{AvisaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    embedder_fingerprint TEXT NOT NULL,
    dimensions INTEGER NOT NULL,
    status TEXT NOT NULL,
    built_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_collections_name ON collections(name, status);

CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    collection_id TEXT NOT NULL,
    chunk_key TEXT NOT NULL,
    video_id TEXT NOT NULL,
    channel TEXT NOT NULL,
    title TEXT NOT NULL,
    start_offset REAL NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection_id);
"#;

/// SQLite-backed embedding index.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl SqliteIndex {
    /// Open (or create) an index at the given path.
    #[instrument(skip(embedder))]
    pub fn new(path: &Path, embedder: Arc<dyn Embedder>, batch_size: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
            batch_size: batch_size.max(1),
        })
    }

    /// Create an in-memory index (useful for testing).
    pub fn in_memory(embedder: Arc<dyn Embedder>, batch_size: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
            batch_size: batch_size.max(1),
        })
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| AvisaError::Config(format!("Failed to acquire index lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    /// Look up the live generation of a collection.
    fn active_generation(conn: &Connection, name: &str) -> Result<Option<(String, String)>> {
        let result = conn.query_row(
            "SELECT id, embedder_fingerprint FROM collections WHERE name = ?1 AND status = 'active'",
            params![name],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        );

        match result {
            Ok(pair) => Ok(Some(pair)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop a generation and its documents.
    fn delete_generation(conn: &Connection, generation_id: &str) -> Result<()> {
        conn.execute(
            "DELETE FROM documents WHERE collection_id = ?1",
            params![generation_id],
        )?;
        conn.execute(
            "DELETE FROM collections WHERE id = ?1",
            params![generation_id],
        )?;
        Ok(())
    }
}

#[async_trait]
impl EmbeddingIndex for SqliteIndex {
    #[instrument(skip(self, chunks, cancel), fields(chunks = chunks.len()))]
    async fn rebuild(
        &self,
        collection: &str,
        chunks: &[Chunk],
        cancel: &CancelFlag,
    ) -> Result<RebuildReport> {
        let generation_id = uuid::Uuid::new_v4().to_string();

        // Register the staging generation. Queries only ever see 'active'.
        {
            let conn = self.lock_conn()?;
            conn.execute(
                r#"
                INSERT INTO collections (id, name, embedder_fingerprint, dimensions, status, built_at)
                VALUES (?1, ?2, ?3, ?4, 'staging', ?5)
                "#,
                params![
                    generation_id,
                    collection,
                    self.embedder.fingerprint(),
                    self.embedder.dimensions() as i64,
                    Utc::now().to_rfc3339(),
                ],
            )?;
        }

        let mut batches = 0;
        for batch in chunks.chunks(self.batch_size) {
            if let Err(e) = cancel.check() {
                warn!("Rebuild of '{}' cancelled after {} batches", collection, batches);
                let conn = self.lock_conn()?;
                Self::delete_generation(&conn, &generation_id)?;
                return Err(e);
            }

            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            // The embedder retries transient failures internally; a batch
            // that still fails aborts the build and discards the staging
            // generation, leaving the previous one live.
            let embeddings = match self.embedder.embed_batch(&texts).await {
                Ok(e) => e,
                Err(e) => {
                    let conn = self.lock_conn()?;
                    Self::delete_generation(&conn, &generation_id)?;
                    return Err(e);
                }
            };

            let conn = self.lock_conn()?;
            let tx = conn.unchecked_transaction()?;
            for (chunk, embedding) in batch.iter().zip(embeddings) {
                tx.execute(
                    r#"
                    INSERT INTO documents
                    (id, collection_id, chunk_key, video_id, channel, title, start_offset, text, embedding)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    "#,
                    params![
                        uuid::Uuid::new_v4().to_string(),
                        generation_id,
                        chunk.id(),
                        chunk.video_id,
                        chunk.channel,
                        chunk.title,
                        chunk.start_offset,
                        chunk.text,
                        Self::embedding_to_bytes(&embedding),
                    ],
                )?;
            }
            tx.commit()?;
            batches += 1;
            debug!("Committed batch {} ({} chunks)", batches, batch.len());
        }

        // Swap: retire every other generation of this name in one transaction.
        {
            let conn = self.lock_conn()?;
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                r#"
                DELETE FROM documents WHERE collection_id IN
                    (SELECT id FROM collections WHERE name = ?1 AND id != ?2)
                "#,
                params![collection, generation_id],
            )?;
            tx.execute(
                "DELETE FROM collections WHERE name = ?1 AND id != ?2",
                params![collection, generation_id],
            )?;
            tx.execute(
                "UPDATE collections SET status = 'active' WHERE id = ?1",
                params![generation_id],
            )?;
            tx.commit()?;
        }

        info!(
            "Rebuilt collection '{}': {} chunks in {} batches",
            collection,
            chunks.len(),
            batches
        );

        Ok(RebuildReport {
            collection: collection.to_string(),
            chunks_indexed: chunks.len(),
            batches,
        })
    }

    #[instrument(skip(self, text))]
    async fn query(&self, collection: &str, text: &str, top_k: usize) -> Result<Vec<Scored>> {
        // Resolve the live generation and enforce the embedding space before
        // spending an API call on the query embedding.
        let generation_id = {
            let conn = self.lock_conn()?;
            let (generation_id, fingerprint) = Self::active_generation(&conn, collection)?
                .ok_or_else(|| AvisaError::CollectionNotFound(collection.to_string()))?;

            if fingerprint != self.embedder.fingerprint() {
                return Err(AvisaError::EmbeddingSpaceMismatch {
                    built_with: fingerprint,
                    query_with: self.embedder.fingerprint(),
                });
            }
            generation_id
        };

        let query_embedding = self.embedder.embed(text).await?;

        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT video_id, channel, title, start_offset, text, embedding
            FROM documents
            WHERE collection_id = ?1
            "#,
        )?;

        let rows = stmt.query_map(params![generation_id], |row| {
            let embedding_bytes: Vec<u8> = row.get(5)?;
            Ok((
                Chunk {
                    video_id: row.get(0)?,
                    channel: row.get(1)?,
                    title: row.get(2)?,
                    start_offset: row.get(3)?,
                    text: row.get(4)?,
                },
                Self::bytes_to_embedding(&embedding_bytes),
            ))
        })?;

        let mut results: Vec<Scored> = rows
            .filter_map(|r| r.ok())
            .map(|(chunk, embedding)| Scored {
                score: cosine_similarity(&query_embedding, &embedding),
                chunk,
            })
            .collect();

        sort_scored(&mut results);
        results.truncate(top_k);

        debug!("Query matched {} documents", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.name, c.embedder_fingerprint, c.built_at, COUNT(d.id)
            FROM collections c LEFT JOIN documents d ON d.collection_id = c.id
            WHERE c.status = 'active'
            GROUP BY c.id
            ORDER BY c.name
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            let built_at_str: String = row.get(2)?;
            Ok(CollectionInfo {
                name: row.get(0)?,
                embedder_fingerprint: row.get(1)?,
                built_at: DateTime::parse_from_rfc3339(&built_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                chunk_count: row.get::<_, i64>(3)? as usize,
            })
        })?;

        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbedder;

    fn chunk(video_id: &str, start: f64, text: &str) -> Chunk {
        Chunk {
            video_id: video_id.to_string(),
            channel: "Channel".to_string(),
            title: "Title".to_string(),
            start_offset: start,
            text: text.to_string(),
        }
    }

    fn index() -> SqliteIndex {
        SqliteIndex::in_memory(Arc::new(MockEmbedder::new()), 2).unwrap()
    }

    #[tokio::test]
    async fn test_rebuild_and_query() {
        let index = index();
        let chunks = vec![
            chunk("v1", 0.0, "quarterly earnings report beat estimates"),
            chunk("v1", 60.0, "weather forecast sunny skies"),
            chunk("v2", 0.0, "earnings call with the finance team"),
        ];

        let report = index
            .rebuild("news", &chunks, &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(report.chunks_indexed, 3);
        assert_eq!(report.batches, 2);

        let results = index.query("news", "earnings", 10).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].chunk.text.contains("earnings"));
        assert!(results[0].score >= results[1].score);
    }

    #[tokio::test]
    async fn test_missing_collection_is_not_found() {
        let index = index();
        let err = index.query("absent", "anything", 5).await.unwrap_err();
        assert!(matches!(err, AvisaError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_collection_returns_empty_not_error() {
        let index = index();
        index
            .rebuild("empty", &[], &CancelFlag::new())
            .await
            .unwrap();

        let results = index.query("empty", "anything", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent_in_ranking() {
        let index = index();
        let chunks = vec![
            chunk("v1", 0.0, "alpha beta gamma"),
            chunk("v1", 60.0, "delta epsilon zeta"),
            chunk("v2", 0.0, "alpha delta"),
        ];

        index
            .rebuild("news", &chunks, &CancelFlag::new())
            .await
            .unwrap();
        let first: Vec<String> = index
            .query("news", "alpha", 10)
            .await
            .unwrap()
            .iter()
            .map(|s| s.chunk.id())
            .collect();

        index
            .rebuild("news", &chunks, &CancelFlag::new())
            .await
            .unwrap();
        let second: Vec<String> = index
            .query("news", "alpha", 10)
            .await
            .unwrap()
            .iter()
            .map(|s| s.chunk.id())
            .collect();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_previous_generation() {
        let index = index();
        index
            .rebuild("news", &[chunk("v1", 0.0, "old content")], &CancelFlag::new())
            .await
            .unwrap();
        index
            .rebuild("news", &[chunk("v2", 0.0, "new content")], &CancelFlag::new())
            .await
            .unwrap();

        let results = index.query("news", "content", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.video_id, "v2");

        let collections = index.list_collections().await.unwrap();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].chunk_count, 1);
    }

    #[tokio::test]
    async fn test_fingerprint_mismatch_rejected() {
        let embedder_a: Arc<dyn Embedder> = Arc::new(MockEmbedder::with_dimensions(64));
        let embedder_b: Arc<dyn Embedder> = Arc::new(MockEmbedder::with_dimensions(32));

        // Same database file, different embedding spaces.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        let index_a = SqliteIndex::new(&path, embedder_a, 8).unwrap();
        index_a
            .rebuild("news", &[chunk("v1", 0.0, "content")], &CancelFlag::new())
            .await
            .unwrap();
        drop(index_a);

        let index_b = SqliteIndex::new(&path, embedder_b, 8).unwrap();
        let err = index_b.query("news", "content", 5).await.unwrap_err();
        assert!(matches!(err, AvisaError::EmbeddingSpaceMismatch { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_rebuild_keeps_previous_generation() {
        let index = index();
        index
            .rebuild("news", &[chunk("v1", 0.0, "keep me")], &CancelFlag::new())
            .await
            .unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = index
            .rebuild("news", &[chunk("v2", 0.0, "never lands")], &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AvisaError::Cancelled));

        let results = index.query("news", "keep", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.video_id, "v1");
    }
}
