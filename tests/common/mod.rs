#![allow(dead_code)]

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use stockotter::domain::error::StockotterError;
use stockotter::domain::news::{Cluster, NewsItem};
use stockotter::domain::position::{PaperEvent, PaperPosition};
use stockotter::ports::news_port::NewsPort;
use stockotter::ports::paper_store_port::PaperStorePort;

/// News keyed by url, clusters keyed by id.
pub struct MockNewsPort {
    pub items: RefCell<BTreeMap<String, NewsItem>>,
    pub clusters: RefCell<BTreeMap<String, Cluster>>,
}

impl MockNewsPort {
    pub fn new() -> Self {
        Self {
            items: RefCell::new(BTreeMap::new()),
            clusters: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn with_items(items: &[NewsItem]) -> Self {
        let port = Self::new();
        for item in items {
            port.upsert_news_item(item).unwrap();
        }
        port
    }
}

impl NewsPort for MockNewsPort {
    fn upsert_news_item(&self, item: &NewsItem) -> Result<(), StockotterError> {
        let url = if item.url.is_empty() {
            item.id.clone()
        } else {
            item.url.clone()
        };
        let mut items = self.items.borrow_mut();
        items.retain(|_, stored| stored.id != item.id);
        items.insert(url, item.clone());
        Ok(())
    }

    fn list_news_since(
        &self,
        cutoff: DateTime<FixedOffset>,
    ) -> Result<Vec<NewsItem>, StockotterError> {
        let mut items: Vec<NewsItem> = self
            .items
            .borrow()
            .values()
            .filter(|item| item.published_at >= cutoff)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
        Ok(items)
    }

    fn upsert_cluster(&self, cluster: &Cluster) -> Result<(), StockotterError> {
        self.clusters
            .borrow_mut()
            .insert(cluster.cluster_id.clone(), cluster.clone());
        Ok(())
    }

    fn list_clusters(&self) -> Result<Vec<Cluster>, StockotterError> {
        Ok(self.clusters.borrow().values().cloned().collect())
    }
}

pub struct MockPaperStore {
    pub positions: RefCell<BTreeMap<String, PaperPosition>>,
    pub events: RefCell<Vec<PaperEvent>>,
    pub fail_writes: bool,
}

impl MockPaperStore {
    pub fn new() -> Self {
        Self {
            positions: RefCell::new(BTreeMap::new()),
            events: RefCell::new(Vec::new()),
            fail_writes: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    pub fn position(&self, ticker: &str) -> PaperPosition {
        self.positions.borrow()[ticker].clone()
    }

    fn check_writable(&self) -> Result<(), StockotterError> {
        if self.fail_writes {
            return Err(StockotterError::Database {
                reason: "store unavailable".into(),
            });
        }
        Ok(())
    }
}

impl PaperStorePort for MockPaperStore {
    fn get_position(&self, ticker: &str) -> Result<Option<PaperPosition>, StockotterError> {
        Ok(self.positions.borrow().get(ticker).cloned())
    }

    fn put_position(&self, position: &PaperPosition) -> Result<(), StockotterError> {
        self.check_writable()?;
        position.validate()?;
        self.positions
            .borrow_mut()
            .insert(position.ticker.clone(), position.clone());
        Ok(())
    }

    fn append_event(&self, event: &PaperEvent) -> Result<(), StockotterError> {
        self.check_writable()?;
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }

    fn list_open_positions(&self) -> Result<Vec<PaperPosition>, StockotterError> {
        Ok(self
            .positions
            .borrow()
            .values()
            .filter(|p| p.is_open())
            .cloned()
            .collect())
    }

    fn list_events(&self, ticker: Option<&str>) -> Result<Vec<PaperEvent>, StockotterError> {
        Ok(self
            .events
            .borrow()
            .iter()
            .filter(|e| ticker.is_none_or(|t| e.ticker == t))
            .cloned()
            .collect())
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn base_time() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2026-02-25T09:00:00+09:00").unwrap()
}

pub fn make_news(id: &str, title: &str, body: &str, tickers: &[&str], minutes: i64) -> NewsItem {
    NewsItem {
        id: id.to_string(),
        source: "fixture".to_string(),
        title: title.to_string(),
        url: format!("https://news.example.com/{id}"),
        published_at: base_time() + Duration::minutes(minutes),
        raw_text: body.to_string(),
        tickers_mentioned: tickers.iter().map(|t| t.to_string()).collect(),
        fetched_at: base_time(),
    }
}

/// Three near-duplicate semiconductor investment articles for 005930, one
/// unrelated 005930 article, and one same-topic article for 000660.
pub fn semiconductor_news() -> Vec<NewsItem> {
    vec![
        make_news(
            "news-001",
            "삼성전자 반도체 투자 확대",
            "삼성전자 반도체 투자 확대 계획 발표 생산능력 증설",
            &["005930"],
            0,
        ),
        make_news(
            "news-002",
            "삼성전자 반도체 투자 확대 계획",
            "반도체 투자 확대 계획 발표와 생산능력 증설 내용",
            &["005930"],
            3,
        ),
        make_news(
            "news-003",
            "삼성전자 반도체 투자 확대 소식",
            "삼성전자 투자 확대와 생산능력 증설에 대한 기사",
            &["005930"],
            6,
        ),
        make_news(
            "news-004",
            "삼성전자 배당 기준일 공시",
            "삼성전자가 배당 기준일과 지급 일정을 공시했다",
            &["005930"],
            9,
        ),
        make_news(
            "news-005",
            "SK하이닉스 반도체 투자 확대",
            "하이닉스 반도체 투자 확대 계획 발표 생산능력 증설",
            &["000660"],
            4,
        ),
    ]
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn news_to_jsonl(items: &[NewsItem]) -> String {
    items
        .iter()
        .map(|item| serde_json::to_string(item).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}
