//! Tokenization, TF-IDF weighting and cosine similarity.
//!
//! Vectors are built per batch: document frequencies come from the batch
//! being clustered, so a vector is only comparable with vectors from the
//! same [`vectorize`] call.

use std::collections::{HashMap, HashSet};

use super::news::NewsItem;

pub const STOPWORDS: &[&str] = &[
    "the", "and", "for", "from", "that", "this", "with", "news", "기사", "관련", "대한", "했다",
    "한다", "에서", "으로",
];

/// Minimum token length, in characters.
pub const MIN_TOKEN_CHARS: usize = 2;

/// Lower-cases `text` and returns its alphanumeric runs, dropping short,
/// purely numeric and stop-word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_TOKEN_CHARS)
        .filter(|token| !token.chars().all(char::is_numeric))
        .filter(|token| !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct VectorizedDocument<'a> {
    pub item: &'a NewsItem,
    pub tokens: Vec<String>,
    pub weights: HashMap<String, f64>,
    pub norm: f64,
}

impl VectorizedDocument<'_> {
    pub fn distinct_token_count(&self) -> usize {
        self.tokens.iter().collect::<HashSet<_>>().len()
    }
}

/// Smoothed inverse document frequency; always >= 1.
pub fn idf(total_docs: usize, document_frequency: usize) -> f64 {
    ((1 + total_docs) as f64 / (1 + document_frequency) as f64).ln() + 1.0
}

/// Vectorizes a batch of articles (title + body), preserving input order.
pub fn vectorize<'a, I>(items: I) -> Vec<VectorizedDocument<'a>>
where
    I: IntoIterator<Item = &'a NewsItem>,
{
    let items: Vec<&'a NewsItem> = items.into_iter().collect();
    let tokenized: Vec<Vec<String>> = items
        .iter()
        .map(|item| tokenize(&format!("{}\n{}", item.title, item.raw_text)))
        .collect();

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for tokens in &tokenized {
        let distinct: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        for term in distinct {
            *doc_freq.entry(term).or_insert(0) += 1;
        }
    }

    let idf_by_term: HashMap<&str, f64> = doc_freq
        .iter()
        .map(|(&term, &df)| (term, idf(items.len(), df)))
        .collect();

    items
        .into_iter()
        .zip(tokenized.iter())
        .map(|(item, tokens)| {
            let mut term_freq: HashMap<&str, usize> = HashMap::new();
            for token in tokens {
                *term_freq.entry(token.as_str()).or_insert(0) += 1;
            }
            let weights: HashMap<String, f64> = term_freq
                .into_iter()
                .map(|(term, count)| (term.to_string(), count as f64 * idf_by_term[term]))
                .collect();
            let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
            VectorizedDocument {
                item,
                tokens: tokens.clone(),
                weights,
                norm,
            }
        })
        .collect()
}

/// Cosine similarity of two weighted vectors, in `[0, 1]`. Zero when either
/// document has no tokens.
pub fn cosine_similarity(left: &VectorizedDocument<'_>, right: &VectorizedDocument<'_>) -> f64 {
    if left.norm == 0.0 || right.norm == 0.0 {
        return 0.0;
    }

    let (small, large) = if left.weights.len() > right.weights.len() {
        (right, left)
    } else {
        (left, right)
    };

    let dot: f64 = small
        .weights
        .iter()
        .map(|(term, weight)| weight * large.weights.get(term).copied().unwrap_or(0.0))
        .sum();

    // rounding can push identical documents a hair above 1
    (dot / (left.norm * right.norm)).clamp(0.0, 1.0)
}
