//! Embedding index over promotion documents, persisted to a SQLite file.

use crate::ai::Embedder;
use crate::errors::{PromoError, Result};
use crate::routing::filters::{apply_filters, fetch_size};
use crate::vector::document::{Metadata, VectorDocument};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// A document with its similarity to the query
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: VectorDocument,
    pub score: f32,
}

pub struct VectorIndex {
    documents: Vec<VectorDocument>,
    embeddings: Vec<Vec<f32>>,
    model: String,
}

impl VectorIndex {
    /// Build from scratch, embedding `chunk_size` documents per request
    pub async fn build(
        documents: Vec<VectorDocument>,
        embedder: &dyn Embedder,
        chunk_size: usize,
    ) -> Result<Self> {
        let chunk_size = chunk_size.max(1);
        let total_chunks = documents.len().div_ceil(chunk_size);
        let mut embeddings = Vec::with_capacity(documents.len());

        for (i, chunk) in documents.chunks(chunk_size).enumerate() {
            let texts: Vec<String> = chunk.iter().map(|d| d.content.clone()).collect();
            let vectors = embedder.embed_documents(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(PromoError::Storage(format!(
                    "embedder returned {} vectors for {} documents",
                    vectors.len(),
                    texts.len()
                )));
            }
            embeddings.extend(vectors);
            log::info!("[INDEX] Embedded chunk {}/{}", i + 1, total_chunks);
        }

        Ok(Self {
            documents,
            embeddings,
            model: embedder.model_name().to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Overwrite `path` with this index
    pub fn save(&self, path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE index_meta (model TEXT NOT NULL, dims INTEGER NOT NULL);
             CREATE TABLE documents (
                 id INTEGER PRIMARY KEY,
                 content TEXT NOT NULL,
                 metadata TEXT NOT NULL,
                 embedding BLOB NOT NULL
             );",
        )?;

        let dims = self.embeddings.first().map(|e| e.len()).unwrap_or(0);
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO index_meta (model, dims) VALUES (?1, ?2)",
            params![self.model, dims as i64],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (id, content, metadata, embedding) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (id, (doc, embedding)) in self.documents.iter().zip(&self.embeddings).enumerate() {
                stmt.execute(params![
                    id as i64,
                    doc.content,
                    serde_json::to_string(&doc.metadata)?,
                    encode_embedding(embedding),
                ])?;
            }
        }
        tx.commit()?;

        log::info!("[INDEX] Saved {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    /// Load a persisted index; `None` when the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let conn = Connection::open(path)?;

        let meta: Option<(String, i64)> = conn
            .query_row("SELECT model, dims FROM index_meta LIMIT 1", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .optional()?;
        let Some((model, dims)) = meta else {
            return Err(PromoError::Storage(format!(
                "vector index {} has no metadata",
                path.display()
            )));
        };

        let mut stmt = conn.prepare("SELECT content, metadata, embedding FROM documents ORDER BY id")?;
        let rows = stmt.query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, Vec<u8>>(2)?,
            ))
        })?;

        let mut documents = Vec::new();
        let mut embeddings = Vec::new();
        for row in rows {
            let (content, metadata, blob) = row?;
            let metadata: Metadata = serde_json::from_str(&metadata)?;
            let embedding = decode_embedding(&blob);
            if embedding.len() != dims as usize {
                return Err(PromoError::Storage(format!(
                    "vector index {} has a {}-dim vector, expected {}",
                    path.display(),
                    embedding.len(),
                    dims
                )));
            }
            documents.push(VectorDocument { content, metadata });
            embeddings.push(embedding);
        }

        log::info!("[INDEX] Loaded {} vectors from {}", documents.len(), path.display());
        Ok(Some(Self {
            documents,
            embeddings,
            model,
        }))
    }

    /// Top `k` documents by cosine similarity, best first
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredDocument> {
        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, e)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredDocument {
                document: self.documents[i].clone(),
                score,
            })
            .collect()
    }

    /// Similarity search honoring metadata filters (over-fetches 3×k when filtering)
    pub fn search_filtered(&self, query: &[f32], k: usize, filters: &Metadata) -> Vec<ScoredDocument> {
        let candidates = self.search(query, fetch_size(k, filters));
        apply_filters(candidates, |c| &c.document.metadata, filters, k)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
