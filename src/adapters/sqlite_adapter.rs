//! SQLite storage adapter for news, clusters and paper positions.

use crate::domain::config_validation::validate_storage_config;
use crate::domain::error::StockotterError;
use crate::domain::news::{Cluster, NewsItem};
use crate::domain::position::{PaperEvent, PaperPosition};
use crate::ports::config_port::ConfigPort;
use crate::ports::news_port::NewsPort;
use crate::ports::paper_store_port::PaperStorePort;
use chrono::{DateTime, FixedOffset, NaiveDate};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;

pub const DEFAULT_DB_PATH: &str = "data/stockotter.db";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS news_items (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    title TEXT NOT NULL,
    published_at TEXT NOT NULL,
    published_ts INTEGER NOT NULL,
    raw_text TEXT NOT NULL,
    tickers_mentioned TEXT NOT NULL,
    fetched_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_news_items_published ON news_items(published_ts, id);

CREATE TABLE IF NOT EXISTS clusters (
    cluster_id TEXT PRIMARY KEY,
    representative_news_id TEXT NOT NULL,
    member_news_ids TEXT NOT NULL,
    summary TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS paper_positions (
    ticker TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    entry_price REAL NOT NULL,
    qty_total REAL NOT NULL,
    qty_remaining REAL NOT NULL,
    entry_date TEXT NOT NULL,
    last_close REAL NOT NULL,
    updated_at TEXT NOT NULL,
    highest_close_since_tp REAL,
    exit_price REAL,
    exit_date TEXT,
    sideways_days INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS paper_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticker TEXT NOT NULL,
    event_date TEXT NOT NULL,
    event_type TEXT NOT NULL,
    price REAL NOT NULL,
    quantity REAL NOT NULL,
    state_before TEXT NOT NULL,
    state_after TEXT NOT NULL,
    note TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_paper_events_ticker ON paper_events(ticker);";

const POSITION_COLUMNS: &str = "ticker, state, entry_price, qty_total, qty_remaining, entry_date,
     last_close, updated_at, highest_close_since_tp, exit_price, exit_date, sideways_days";

const EVENT_COLUMNS: &str =
    "ticker, event_date, event_type, price, quantity, state_before, state_after, note";

const NEWS_COLUMNS: &str =
    "id, source, title, url, published_at, raw_text, tickers_mentioned, fetched_at";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self, StockotterError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| StockotterError::Database {
                reason: e.to_string(),
            })?;

        tracing::debug!(path = %path.display(), pool_size, "opened sqlite pool");
        Ok(Self { pool })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StockotterError> {
        validate_storage_config(config)?;
        let db_path = config.get_string_or("storage", "path", DEFAULT_DB_PATH);
        let pool_size = u32::try_from(config.get_int("storage", "pool_size", 4)).map_err(|_| {
            StockotterError::ConfigInvalid {
                section: "storage".into(),
                key: "pool_size".into(),
                reason: "pool_size must be positive".into(),
            }
        })?;
        Self::open(db_path, pool_size)
    }

    pub fn in_memory() -> Result<Self, StockotterError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| StockotterError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), StockotterError> {
        self.conn()?
            .execute_batch(SCHEMA)
            .map_err(query_error)?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StockotterError> {
        self.pool.get().map_err(|e: r2d2::Error| StockotterError::Database {
            reason: e.to_string(),
        })
    }
}

fn query_error(e: rusqlite::Error) -> StockotterError {
    StockotterError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, err.into())
}

fn date_column(row: &Row<'_>, column: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(column)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| conversion_error(column, e))
}

fn timestamp_column(row: &Row<'_>, column: usize) -> rusqlite::Result<DateTime<FixedOffset>> {
    let text: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&text).map_err(|e| conversion_error(column, e))
}

fn json_list_column(row: &Row<'_>, column: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(column)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(column, e))
}

fn parsed_column<T>(row: &Row<'_>, column: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let text: String = row.get(column)?;
    text.parse().map_err(|e: String| conversion_error(column, e))
}

fn to_json(list: &[String]) -> Result<String, StockotterError> {
    serde_json::to_string(list).map_err(|e| StockotterError::DatabaseQuery {
        reason: e.to_string(),
    })
}

fn row_to_news_item(row: &Row<'_>) -> rusqlite::Result<NewsItem> {
    Ok(NewsItem {
        id: row.get(0)?,
        source: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        published_at: timestamp_column(row, 4)?,
        raw_text: row.get(5)?,
        tickers_mentioned: json_list_column(row, 6)?,
        fetched_at: timestamp_column(row, 7)?,
    })
}

fn row_to_cluster(row: &Row<'_>) -> rusqlite::Result<Cluster> {
    Ok(Cluster {
        cluster_id: row.get(0)?,
        representative_news_id: row.get(1)?,
        member_news_ids: json_list_column(row, 2)?,
        summary: row.get(3)?,
    })
}

fn row_to_position(row: &Row<'_>) -> rusqlite::Result<PaperPosition> {
    let exit_date: Option<String> = row.get(10)?;
    let exit_date = exit_date
        .map(|text| NaiveDate::parse_from_str(&text, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| conversion_error(10, e))?;

    Ok(PaperPosition {
        ticker: row.get(0)?,
        state: parsed_column(row, 1)?,
        entry_price: row.get(2)?,
        qty_total: row.get(3)?,
        qty_remaining: row.get(4)?,
        entry_date: date_column(row, 5)?,
        last_close: row.get(6)?,
        updated_at: timestamp_column(row, 7)?,
        highest_close_since_tp: row.get(8)?,
        exit_price: row.get(9)?,
        exit_date,
        sideways_days: row.get(11)?,
    })
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<PaperEvent> {
    Ok(PaperEvent {
        ticker: row.get(0)?,
        event_date: date_column(row, 1)?,
        event_type: parsed_column(row, 2)?,
        price: row.get(3)?,
        quantity: row.get(4)?,
        state_before: parsed_column(row, 5)?,
        state_after: parsed_column(row, 6)?,
        note: row.get(7)?,
    })
}

impl NewsPort for SqliteAdapter {
    fn upsert_news_item(&self, item: &NewsItem) -> Result<(), StockotterError> {
        let url = if item.url.is_empty() {
            &item.id
        } else {
            &item.url
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        // a row sharing either the id or the url is the same article
        let mut tickers: Vec<String> = Vec::new();
        {
            let mut stmt = tx
                .prepare(
                    "SELECT tickers_mentioned FROM news_items
                     WHERE id = ?1 OR url = ?2
                     ORDER BY published_ts ASC, id ASC",
                )
                .map_err(query_error)?;
            let rows = stmt
                .query_map(params![item.id, url], |row| json_list_column(row, 0))
                .map_err(query_error)?;
            for row in rows {
                for ticker in row.map_err(query_error)? {
                    if !tickers.contains(&ticker) {
                        tickers.push(ticker);
                    }
                }
            }
        }
        for ticker in &item.tickers_mentioned {
            if !tickers.contains(ticker) {
                tickers.push(ticker.clone());
            }
        }

        tx.execute(
            "DELETE FROM news_items WHERE id = ?1 OR url = ?2",
            params![item.id, url],
        )
        .map_err(query_error)?;
        tx.execute(
            "INSERT INTO news_items (
                id, url, source, title, published_at, published_ts, raw_text,
                tickers_mentioned, fetched_at
             )
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                item.id,
                url,
                item.source,
                item.title,
                item.published_at.to_rfc3339(),
                item.published_at.timestamp_micros(),
                item.raw_text,
                to_json(&tickers)?,
                item.fetched_at.to_rfc3339(),
            ],
        )
        .map_err(query_error)?;

        tx.commit().map_err(query_error)?;
        Ok(())
    }

    fn list_news_since(
        &self,
        cutoff: DateTime<FixedOffset>,
    ) -> Result<Vec<NewsItem>, StockotterError> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {NEWS_COLUMNS} FROM news_items
             WHERE published_ts >= ?1
             ORDER BY published_ts ASC, id ASC"
        );
        let mut stmt = conn.prepare(&query).map_err(query_error)?;
        let rows = stmt
            .query_map(params![cutoff.timestamp_micros()], row_to_news_item)
            .map_err(query_error)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row.map_err(query_error)?);
        }
        Ok(items)
    }

    fn upsert_cluster(&self, cluster: &Cluster) -> Result<(), StockotterError> {
        self.conn()?
            .execute(
                "INSERT INTO clusters (cluster_id, representative_news_id, member_news_ids, summary)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(cluster_id) DO UPDATE SET
                    representative_news_id = excluded.representative_news_id,
                    member_news_ids = excluded.member_news_ids,
                    summary = excluded.summary,
                    updated_at = CURRENT_TIMESTAMP",
                params![
                    cluster.cluster_id,
                    cluster.representative_news_id,
                    to_json(&cluster.member_news_ids)?,
                    cluster.summary,
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }

    fn list_clusters(&self) -> Result<Vec<Cluster>, StockotterError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT cluster_id, representative_news_id, member_news_ids, summary
                 FROM clusters ORDER BY cluster_id ASC",
            )
            .map_err(query_error)?;
        let rows = stmt.query_map([], row_to_cluster).map_err(query_error)?;

        let mut clusters = Vec::new();
        for row in rows {
            clusters.push(row.map_err(query_error)?);
        }
        Ok(clusters)
    }
}

impl PaperStorePort for SqliteAdapter {
    fn get_position(&self, ticker: &str) -> Result<Option<PaperPosition>, StockotterError> {
        let conn = self.conn()?;
        let query = format!("SELECT {POSITION_COLUMNS} FROM paper_positions WHERE ticker = ?1");
        let position = conn
            .query_row(&query, params![ticker], row_to_position)
            .optional()
            .map_err(query_error)?;

        if let Some(position) = &position {
            position.validate()?;
        }
        Ok(position)
    }

    fn put_position(&self, position: &PaperPosition) -> Result<(), StockotterError> {
        position.validate()?;
        self.conn()?
            .execute(
                "INSERT INTO paper_positions (
                    ticker, state, entry_price, qty_total, qty_remaining, entry_date,
                    last_close, updated_at, highest_close_since_tp, exit_price, exit_date,
                    sideways_days
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(ticker) DO UPDATE SET
                    state = excluded.state,
                    entry_price = excluded.entry_price,
                    qty_total = excluded.qty_total,
                    qty_remaining = excluded.qty_remaining,
                    entry_date = excluded.entry_date,
                    last_close = excluded.last_close,
                    updated_at = excluded.updated_at,
                    highest_close_since_tp = excluded.highest_close_since_tp,
                    exit_price = excluded.exit_price,
                    exit_date = excluded.exit_date,
                    sideways_days = excluded.sideways_days",
                params![
                    position.ticker,
                    position.state.as_str(),
                    position.entry_price,
                    position.qty_total,
                    position.qty_remaining,
                    position.entry_date.format("%Y-%m-%d").to_string(),
                    position.last_close,
                    position.updated_at.to_rfc3339(),
                    position.highest_close_since_tp,
                    position.exit_price,
                    position
                        .exit_date
                        .map(|d| d.format("%Y-%m-%d").to_string()),
                    position.sideways_days,
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }

    fn append_event(&self, event: &PaperEvent) -> Result<(), StockotterError> {
        self.conn()?
            .execute(
                "INSERT INTO paper_events (
                    ticker, event_date, event_type, price, quantity, state_before,
                    state_after, note
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    event.ticker,
                    event.event_date.format("%Y-%m-%d").to_string(),
                    event.event_type.as_str(),
                    event.price,
                    event.quantity,
                    event.state_before.as_str(),
                    event.state_after.as_str(),
                    event.note,
                ],
            )
            .map_err(query_error)?;
        Ok(())
    }

    fn list_open_positions(&self) -> Result<Vec<PaperPosition>, StockotterError> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {POSITION_COLUMNS} FROM paper_positions
             WHERE state != 'EXITED'
             ORDER BY ticker ASC"
        );
        let mut stmt = conn.prepare(&query).map_err(query_error)?;
        let rows = stmt.query_map([], row_to_position).map_err(query_error)?;

        let mut positions = Vec::new();
        for row in rows {
            let position = row.map_err(query_error)?;
            position.validate()?;
            positions.push(position);
        }
        Ok(positions)
    }

    fn list_events(&self, ticker: Option<&str>) -> Result<Vec<PaperEvent>, StockotterError> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {EVENT_COLUMNS} FROM paper_events
             WHERE ?1 IS NULL OR ticker = ?1
             ORDER BY id ASC"
        );
        let mut stmt = conn.prepare(&query).map_err(query_error)?;
        let rows = stmt
            .query_map(params![ticker], row_to_event)
            .map_err(query_error)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row.map_err(query_error)?);
        }
        Ok(events)
    }
}
