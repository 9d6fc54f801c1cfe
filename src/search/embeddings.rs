//! Embeddings and the semantic index
//!
//! The embedding model is injected through the [`Embedder`] trait so the core
//! has no dependency on a particular model. [`HashEmbedder`] is the built-in
//! FNV-1a feature-hashing embedder: no model files, fully deterministic.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{SwError, Result};

/// Text → vector function used for semantic search.
///
/// Implementations may fail (model unavailable, remote backend down); the
/// ranker treats a failure as "semantic search unavailable" for that call.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    fn dims(&self) -> usize;

    fn name(&self) -> &str {
        "custom"
    }
}

/// Adapter turning a closure into an [`Embedder`].
pub struct FnEmbedder<F> {
    dims: usize,
    func: F,
}

impl<F> FnEmbedder<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<f32>> + Send + Sync,
{
    pub const fn new(dims: usize, func: F) -> Self {
        Self { dims, func }
    }
}

impl<F> Embedder for FnEmbedder<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<f32>> + Send + Sync,
{
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        (self.func)(text)
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn name(&self) -> &str {
        "fn"
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Hash embedder using FNV-1a over unigrams and bigrams
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    /// Embedding dimension (default: 384)
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dim: 384 }
    }
}

impl HashEmbedder {
    /// Create embedder with specified dimension
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    /// Embed text into an L2-normalized vector
    #[must_use]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();

        for word in &words {
            self.accumulate(&mut vector, word.as_bytes(), 1.0);
        }
        for pair in words.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.accumulate(&mut vector, bigram.as_bytes(), 0.5);
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }

    fn accumulate(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let hash = fnv1a(feature);
        let bucket = (hash % self.dim as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    /// Compute cosine similarity between two embeddings
    #[must_use]
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dims(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Embed `(skill_name, text)` pairs in parallel; the first failure aborts.
pub fn embed_all(
    documents: &[(String, String)],
    embedder: &dyn Embedder,
) -> Result<Vec<(String, Vec<f32>)>> {
    documents
        .par_iter()
        .map(|(name, text)| {
            embedder
                .embed(text)
                .map(|vector| (name.clone(), vector))
                .map_err(|err| SwError::IndexUnavailable(format!("embed {name}: {err:#}")))
        })
        .collect()
}

/// A ranked semantic hit
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticResult {
    pub skill_name: String,
    pub similarity: f32,
}

/// Brute-force nearest-neighbour index, one vector per skill
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dims: usize,
    names: Vec<String>,
    vectors: Vec<Vec<f32>>,
    positions: HashMap<String, usize>,
}

impl VectorIndex {
    /// Build from precomputed `(skill_name, vector)` pairs.
    pub fn from_vectors<I>(dims: usize, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<f32>)>,
    {
        let mut index = Self {
            dims,
            ..Self::default()
        };
        for (name, vector) in entries {
            if vector.len() != dims {
                return Err(SwError::IndexUnavailable(format!(
                    "embedding for {name} has {} dims, expected {dims}",
                    vector.len()
                )));
            }
            index.positions.insert(name.clone(), index.names.len());
            index.names.push(name);
            index.vectors.push(vector);
        }
        Ok(index)
    }

    /// Embed `(skill_name, text)` pairs in parallel and build the index.
    pub fn index(documents: &[(String, String)], embedder: &dyn Embedder) -> Result<Self> {
        Self::from_vectors(embedder.dims(), embed_all(documents, embedder)?)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub const fn dims(&self) -> usize {
        self.dims
    }

    /// Similarity of a single skill to the query vector.
    #[must_use]
    pub fn similarity(&self, skill_name: &str, query: &[f32]) -> Option<f32> {
        self.positions
            .get(skill_name)
            .map(|&pos| cosine_similarity(&self.vectors[pos], query))
    }

    /// Top `k` skills by cosine similarity, best first. Skills with no
    /// positive similarity to the query are not candidates.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SemanticResult> {
        let mut hits: Vec<SemanticResult> = self
            .names
            .iter()
            .zip(&self.vectors)
            .map(|(name, vector)| SemanticResult {
                skill_name: name.clone(),
                similarity: cosine_similarity(vector, query),
            })
            .filter(|hit| hit.similarity > 0.0)
            .collect();
        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.skill_name.cmp(&b.skill_name))
        });
        hits.truncate(k);
        hits
    }
}

/// Shared handle used across threads.
pub type SharedEmbedder = Arc<dyn Embedder>;
