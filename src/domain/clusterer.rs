//! Greedy TF-IDF clustering of news articles per ticker bucket.
//!
//! Articles are bucketed by their lexicographically smallest ticker (or
//! [`NO_TICKER_KEY`]), ordered by `(published_at, id)` and assigned in a
//! single pass: each article joins the existing cluster it is most similar
//! to, provided that similarity exceeds the threshold, otherwise it opens a
//! new cluster. Similarity to a cluster is the maximum similarity to any of
//! its current members. The result depends on input order, which is why the
//! ordering above is fixed.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use sha1::{Digest, Sha1};

use super::error::StockotterError;
use super::news::{Cluster, NewsItem};
use super::vectorizer::{cosine_similarity, vectorize, VectorizedDocument};

pub const NO_TICKER_KEY: &str = "_NO_TICKER_";
pub const NO_TICKER_LABEL: &str = "NO_TICKER";
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.35;
pub const SUMMARY_KEYWORDS: usize = 3;
const CLUSTER_ID_HEX_CHARS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepresentativePolicy {
    /// Smallest `(published_at, id)`.
    #[default]
    Earliest,
    /// Most distinct tokens, ties broken by `(published_at, id)`.
    Keyword,
}

impl FromStr for RepresentativePolicy {
    type Err = StockotterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "earliest" => Ok(RepresentativePolicy::Earliest),
            "keyword" => Ok(RepresentativePolicy::Keyword),
            other => Err(StockotterError::config_invalid(
                "cluster",
                "representative_policy",
                format!("must be one of: earliest, keyword (got '{other}')"),
            )),
        }
    }
}

impl fmt::Display for RepresentativePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepresentativePolicy::Earliest => write!(f, "earliest"),
            RepresentativePolicy::Keyword => write!(f, "keyword"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TfidfClusterer {
    similarity_threshold: f64,
    representative_policy: RepresentativePolicy,
}

impl Default for TfidfClusterer {
    fn default() -> Self {
        TfidfClusterer {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            representative_policy: RepresentativePolicy::Earliest,
        }
    }
}

impl TfidfClusterer {
    /// Fails with `ConfigInvalid` when the threshold lies outside `[0, 1]`.
    pub fn new(
        similarity_threshold: f64,
        representative_policy: RepresentativePolicy,
    ) -> Result<Self, StockotterError> {
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(StockotterError::config_invalid(
                "cluster",
                "similarity_threshold",
                "similarity_threshold must be between 0.0 and 1.0",
            ));
        }
        Ok(TfidfClusterer {
            similarity_threshold,
            representative_policy,
        })
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    pub fn representative_policy(&self) -> RepresentativePolicy {
        self.representative_policy
    }

    /// Partitions `items` into clusters. Buckets are emitted in key order;
    /// within a bucket, clusters appear in the order they were opened.
    pub fn cluster(&self, items: &[NewsItem]) -> Vec<Cluster> {
        let mut buckets: BTreeMap<String, Vec<&NewsItem>> = BTreeMap::new();
        for item in items {
            buckets.entry(grouping_key(item)).or_default().push(item);
        }

        let mut clusters = Vec::new();
        for (key, mut bucket) in buckets {
            bucket.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
            let docs = vectorize(bucket);
            for members in self.group_similar(&docs) {
                clusters.push(self.build_cluster(&key, members));
            }
        }
        clusters
    }

    fn group_similar<'d, 'a>(
        &self,
        docs: &'d [VectorizedDocument<'a>],
    ) -> Vec<Vec<&'d VectorizedDocument<'a>>> {
        let mut groups: Vec<Vec<&VectorizedDocument<'a>>> = Vec::new();
        for candidate in docs {
            let mut best_index = None;
            let mut best_similarity = self.similarity_threshold;
            for (index, members) in groups.iter().enumerate() {
                let similarity = members
                    .iter()
                    .map(|member| cosine_similarity(candidate, member))
                    .fold(0.0, f64::max);
                if similarity > best_similarity {
                    best_similarity = similarity;
                    best_index = Some(index);
                }
            }
            match best_index {
                Some(index) => groups[index].push(candidate),
                None => groups.push(vec![candidate]),
            }
        }
        groups
    }

    fn build_cluster(&self, key: &str, mut members: Vec<&VectorizedDocument<'_>>) -> Cluster {
        members.sort_by(|a, b| a.item.order_key().cmp(&b.item.order_key()));
        let member_news_ids: Vec<String> = members.iter().map(|m| m.item.id.clone()).collect();
        let representative = pick_representative(&members, self.representative_policy);

        Cluster {
            cluster_id: cluster_id(key, &member_news_ids),
            representative_news_id: representative,
            summary: build_summary(key, &members),
            member_news_ids,
        }
    }
}

/// The smallest distinct ticker, or [`NO_TICKER_KEY`] for untagged articles.
pub fn grouping_key(item: &NewsItem) -> String {
    item.tickers_mentioned
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .min()
        .map_or_else(|| NO_TICKER_KEY.to_string(), str::to_string)
}

/// `{key}-{first 12 hex chars of sha1("{key}|{sorted ids joined by |}")}`.
pub fn cluster_id(key: &str, member_news_ids: &[String]) -> String {
    let mut sorted: Vec<&str> = member_news_ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(b"|");
    hasher.update(sorted.join("|").as_bytes());
    let digest = hex::encode(hasher.finalize());

    format!("{key}-{}", &digest[..CLUSTER_ID_HEX_CHARS])
}

fn pick_representative(members: &[&VectorizedDocument<'_>], policy: RepresentativePolicy) -> String {
    let chosen = match policy {
        RepresentativePolicy::Earliest => members
            .iter()
            .min_by(|a, b| a.item.order_key().cmp(&b.item.order_key())),
        RepresentativePolicy::Keyword => members.iter().min_by(|a, b| {
            b.distinct_token_count()
                .cmp(&a.distinct_token_count())
                .then_with(|| a.item.order_key().cmp(&b.item.order_key()))
        }),
    };
    chosen.map(|doc| doc.item.id.clone()).unwrap_or_default()
}

/// Member count plus the top keywords by frequency (desc), then lexically.
pub fn build_summary(key: &str, members: &[&VectorizedDocument<'_>]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for member in members {
        for token in &member.tokens {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let keywords: Vec<&str> = ranked
        .into_iter()
        .take(SUMMARY_KEYWORDS)
        .map(|(token, _)| token)
        .collect();

    let label = if key == NO_TICKER_KEY { NO_TICKER_LABEL } else { key };
    if keywords.is_empty() {
        format!("{label} 기사 {}건", members.len())
    } else {
        format!("{label} 기사 {}건: {}", members.len(), keywords.join(", "))
    }
}
