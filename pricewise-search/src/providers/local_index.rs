//! In-process vector index over catalog entries.
//!
//! Documents and queries are embedded by feature hashing: every word and
//! every character trigram of a word is hashed into a fixed-size vector,
//! which is then L2-normalized. Similarity is the cosine between the query
//! vector and each document vector. No model files or network are needed,
//! and spelling variants like `"tomatoes"` still land near `"tomato"`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::{self, CatalogEntry};
use crate::error::{ProviderError, SearchError};
use crate::provider::Provider;
use crate::types::{Capability, Query, RawRecord};

/// Local index settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalIndexConfig {
    /// Embedding width.
    pub dimensions: usize,
    /// Minimum cosine similarity for a hit.
    pub min_similarity: f32,
    /// Maximum hits returned.
    pub top_k: usize,
}

impl Default for LocalIndexConfig {
    fn default() -> Self {
        Self {
            dimensions: 512,
            min_similarity: 0.2,
            top_k: 10,
        }
    }
}

impl LocalIndexConfig {
    /// Validates this config.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.dimensions == 0 {
            return Err(SearchError::Config("dimensions must be greater than 0".into()));
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(SearchError::Config(
                "min_similarity must be between 0.0 and 1.0".into(),
            ));
        }
        if self.top_k == 0 {
            return Err(SearchError::Config("top_k must be greater than 0".into()));
        }
        Ok(())
    }
}

struct IndexedEntry {
    entry: CatalogEntry,
    vector: Vec<f32>,
}

/// Semantic search over an in-memory catalog.
pub struct LocalIndexProvider {
    config: LocalIndexConfig,
    entries: Vec<IndexedEntry>,
}

impl std::fmt::Debug for LocalIndexProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIndexProvider")
            .field("config", &self.config)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl LocalIndexProvider {
    /// Provider name.
    pub const NAME: &'static str = "local_index";

    /// Index `entries`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `config` is invalid.
    pub fn new(config: LocalIndexConfig, entries: Vec<CatalogEntry>) -> Result<Self, SearchError> {
        config.validate()?;
        let entries = entries
            .into_iter()
            .map(|entry| IndexedEntry {
                vector: embed(&entry.document(), config.dimensions),
                entry,
            })
            .collect::<Vec<_>>();
        tracing::info!(
            documents = entries.len(),
            dimensions = config.dimensions,
            "local index built"
        );
        Ok(Self { config, entries })
    }

    /// Index the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] if `config` is invalid.
    pub fn with_builtin(config: LocalIndexConfig) -> Result<Self, SearchError> {
        Self::new(config, catalog::builtin())
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries scoring at least `min_similarity`, best first, at most `top_k`.
    pub fn nearest(&self, text: &str) -> Vec<(f32, &CatalogEntry)> {
        let query = embed(text, self.config.dimensions);
        let mut hits: Vec<(f32, &CatalogEntry)> = self
            .entries
            .iter()
            .map(|indexed| (cosine(&query, &indexed.vector), &indexed.entry))
            .filter(|(score, _)| *score >= self.config.min_similarity)
            .collect();
        hits.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        hits.truncate(self.config.top_k);
        hits
    }
}

#[async_trait]
impl Provider for LocalIndexProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::SemanticIndex]
    }

    async fn search(&self, query: &Query) -> Result<Vec<RawRecord>, ProviderError> {
        if self.entries.is_empty() {
            return Err(ProviderError::Unavailable("local index is empty".into()));
        }
        let text = match query.quantity() {
            Some(quantity) => format!("{} {quantity}", query.text()),
            None => query.text().to_string(),
        };
        let hits = self.nearest(&text);
        tracing::debug!(count = hits.len(), "local index hits");
        Ok(hits
            .into_iter()
            .map(|(score, entry)| {
                let mut record = entry.to_record();
                if let Some(body) = record.body.as_object_mut() {
                    body.insert("similarity".into(), serde_json::json!(score));
                }
                record
            })
            .collect())
    }

    fn fallback(&self, query: &Query) -> Option<Vec<RawRecord>> {
        let entries: Vec<CatalogEntry> = self.entries.iter().map(|i| i.entry.clone()).collect();
        Some(
            catalog::find(&entries, query)
                .into_iter()
                .take(self.config.top_k)
                .map(CatalogEntry::to_record)
                .collect(),
        )
    }
}

/// Feature-hashed, L2-normalized embedding of `text`.
pub fn embed(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0.0_f32; dimensions];
    let lower = text.to_lowercase();
    for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        vector[bucket(word, dimensions)] += 1.0;
        let padded: Vec<char> = format!("#{word}#").chars().collect();
        for trigram in padded.windows(3) {
            let gram: String = trigram.iter().collect();
            vector[bucket(&gram, dimensions)] += 1.0;
        }
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Cosine of two normalized vectors.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn bucket(feature: &str, dimensions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    feature.hash(&mut hasher);
    (hasher.finish() % dimensions as u64) as usize
}
