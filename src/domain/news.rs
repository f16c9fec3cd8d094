//! News articles and the clusters built from them.

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};

/// A fetched news article. Ticker associations are the only field that may
/// change after fetch (merged when the same url is seen again).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    #[serde(default)]
    pub source: String,
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub published_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub tickers_mentioned: Vec<String>,
    #[serde(default = "fetched_now")]
    pub fetched_at: DateTime<FixedOffset>,
}

fn fetched_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

impl NewsItem {
    /// Sort key used everywhere ordering matters: publish time, then id.
    pub fn order_key(&self) -> (DateTime<FixedOffset>, &str) {
        (self.published_at, self.id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub cluster_id: String,
    pub representative_news_id: String,
    pub member_news_ids: Vec<String>,
    pub summary: String,
}
