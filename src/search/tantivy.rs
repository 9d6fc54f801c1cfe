//! BM25 lexical index
//!
//! Tokenization uses tantivy's analyzer pipeline (simple tokenizer, long-token
//! removal, lowercasing, stopword filtering) so indexing and querying agree on
//! terms. Scoring is an in-memory BM25 over per-skill postings with tunable
//! `k1` and `b`.

use std::collections::HashMap;

use ::tantivy::tokenizer::{
    LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer,
};
use unicode_normalization::UnicodeNormalization;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "how", "i", "in", "is", "it",
    "my", "of", "on", "or", "that", "the", "this", "to", "was", "what", "when", "with",
];

const MAX_TOKEN_LEN: usize = 40;

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Shared text analyzer for index and query text.
#[derive(Clone)]
pub struct Analyzer {
    inner: TextAnalyzer,
}

impl Default for Analyzer {
    fn default() -> Self {
        let inner = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
            .filter(LowerCaser)
            .filter(StopWordFilter::remove(
                STOP_WORDS.iter().map(|word| (*word).to_string()),
            ))
            .build();
        Self { inner }
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer").finish_non_exhaustive()
    }
}

impl Analyzer {
    /// NFKC-normalize and tokenize `text`.
    #[must_use]
    pub fn tokens(&self, text: &str) -> Vec<String> {
        let normalized: String = text.nfkc().collect();
        let mut analyzer = self.inner.clone();
        let mut stream = analyzer.token_stream(&normalized);
        let mut tokens = Vec::new();
        while stream.advance() {
            tokens.push(stream.token().text.clone());
        }
        tokens
    }
}

/// A ranked lexical hit
#[derive(Debug, Clone, PartialEq)]
pub struct Bm25Result {
    pub skill_name: String,
    pub score: f32,
}

/// Postings-based BM25 index over skill text
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    params: Bm25Params,
    analyzer: Analyzer,
    names: Vec<String>,
    doc_lens: Vec<u32>,
    /// term -> (doc id, term frequency)
    postings: HashMap<String, Vec<(u32, u32)>>,
    avg_doc_len: f32,
}

impl Bm25Index {
    #[must_use]
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Replace the indexed documents with `(skill_name, text)` pairs.
    pub fn index<I, N, T>(&mut self, documents: I)
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: AsRef<str>,
    {
        self.names.clear();
        self.doc_lens.clear();
        self.postings.clear();

        let mut total_len: u64 = 0;
        for (name, text) in documents {
            let doc_id = u32::try_from(self.names.len()).unwrap_or(u32::MAX);
            let tokens = self.analyzer.tokens(text.as_ref());
            let len = u32::try_from(tokens.len()).unwrap_or(u32::MAX);
            total_len += u64::from(len);

            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for (term, tf) in freqs {
                self.postings.entry(term).or_default().push((doc_id, tf));
            }

            self.names.push(name.into());
            self.doc_lens.push(len);
        }

        self.avg_doc_len = if self.names.is_empty() {
            0.0
        } else {
            total_len as f32 / self.names.len() as f32
        };
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
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    #[must_use]
    pub const fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Top `k` skills for `query`, best first. Empty query or index yields no hits.
    #[must_use]
    pub fn search(&self, query: &str, k: usize) -> Vec<Bm25Result> {
        if self.names.is_empty() || k == 0 {
            return Vec::new();
        }
        let mut terms = self.analyzer.tokens(query);
        terms.sort();
        terms.dedup();
        if terms.is_empty() {
            return Vec::new();
        }

        let n_docs = self.names.len() as f32;
        let Bm25Params { k1, b } = self.params;
        let mut scores: HashMap<u32, f32> = HashMap::new();

        for term in &terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = ((n_docs - df + 0.5) / (df + 0.5)).ln_1p();
            for &(doc_id, tf) in postings {
                let tf = tf as f32;
                let doc_len = self.doc_lens[doc_id as usize] as f32;
                let norm = if self.avg_doc_len > 0.0 {
                    1.0 - b + b * doc_len / self.avg_doc_len
                } else {
                    1.0
                };
                let term_score = idf * (tf * (k1 + 1.0)) / (tf + k1 * norm);
                *scores.entry(doc_id).or_insert(0.0) += term_score;
            }
        }

        let mut hits: Vec<Bm25Result> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(doc_id, score)| Bm25Result {
                skill_name: self.names[doc_id as usize].clone(),
                score,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.skill_name.cmp(&b.skill_name))
        });
        hits.truncate(k);
        hits
    }
}
