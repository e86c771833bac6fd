//! In-memory vector store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use docpipe_core::{AppError, AppResult};

use crate::store::VectorStore;
use crate::types::{DocumentPayload, ScoredPoint, StoredPoint};

/// In-memory vector store for development and testing.
///
/// Uses brute-force cosine similarity search. Suitable for small datasets;
/// use Qdrant for anything that must outlive the process.
#[derive(Debug)]
pub struct MemoryStore {
    collection: String,
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    dimensions: Option<usize>,
    /// Ids in first-insertion order, used by scroll
    order: Vec<String>,
    points: HashMap<String, Entry>,
}

#[derive(Debug, Clone)]
struct Entry {
    vector: Vec<f32>,
    payload: DocumentPayload,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.read().map(|inner| inner.points.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| AppError::Store("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| AppError::Store("memory store lock poisoned".to_string()))
    }
}

impl Inner {
    fn check_dimensions(&self, vector: &[f32]) -> AppResult<()> {
        match self.dimensions {
            Some(expected) if expected != vector.len() => Err(AppError::Store(format!(
                "Vector dimension error: expected dim: {}, got {}",
                expected,
                vector.len()
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl VectorStore for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    fn collection(&self) -> &str {
        &self.collection
    }

    async fn ensure_collection(&self, dimensions: usize) -> AppResult<()> {
        let mut inner = self.write()?;
        match inner.dimensions {
            None => {
                inner.dimensions = Some(dimensions);
                Ok(())
            }
            Some(existing) if existing == dimensions => Ok(()),
            Some(existing) => Err(AppError::Store(format!(
                "Collection '{}' holds {}-dimensional vectors, requested {}",
                self.collection, existing, dimensions
            ))),
        }
    }

    async fn upsert(&self, id: &str, vector: &[f32], payload: &DocumentPayload) -> AppResult<()> {
        let mut inner = self.write()?;
        inner.check_dimensions(vector)?;
        if inner.dimensions.is_none() {
            inner.dimensions = Some(vector.len());
        }

        let entry = Entry {
            vector: vector.to_vec(),
            payload: payload.clone(),
        };
        if inner.points.insert(id.to_string(), entry).is_none() {
            inner.order.push(id.to_string());
        }
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> AppResult<Vec<ScoredPoint>> {
        let inner = self.read()?;
        inner.check_dimensions(vector)?;

        let mut results: Vec<ScoredPoint> = inner
            .order
            .iter()
            .filter_map(|id| inner.points.get(id).map(|entry| (id, entry)))
            .map(|(id, entry)| ScoredPoint {
                id: id.clone(),
                payload: entry.payload.clone(),
                score: cosine_similarity(vector, &entry.vector),
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);
        Ok(results)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let mut inner = self.write()?;
        if inner.points.remove(id).is_some() {
            inner.order.retain(|existing| existing != id);
        }
        Ok(())
    }

    async fn scroll(&self, limit: usize) -> AppResult<Vec<StoredPoint>> {
        let inner = self.read()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| {
                inner.points.get(id).map(|entry| StoredPoint {
                    id: id.clone(),
                    payload: entry.payload.clone(),
                })
            })
            .take(limit)
            .collect())
    }

    async fn health(&self) -> AppResult<()> {
        self.read().map(|_| ())
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 means identical direction.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
