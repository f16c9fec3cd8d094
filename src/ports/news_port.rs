//! News and cluster storage port.

use crate::domain::error::StockotterError;
use crate::domain::news::{Cluster, NewsItem};
use chrono::{DateTime, FixedOffset};

pub trait NewsPort {
    /// Inserts or replaces the article stored under the same url.
    fn upsert_news_item(&self, item: &NewsItem) -> Result<(), StockotterError>;

    /// Articles published at or after `cutoff`, ordered by `(published_at, id)`.
    fn list_news_since(
        &self,
        cutoff: DateTime<FixedOffset>,
    ) -> Result<Vec<NewsItem>, StockotterError>;

    /// Last write wins per `cluster_id`.
    fn upsert_cluster(&self, cluster: &Cluster) -> Result<(), StockotterError>;

    fn list_clusters(&self) -> Result<Vec<Cluster>, StockotterError>;
}
