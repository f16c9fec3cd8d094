//! Daily close price file adapter (`ticker,date,close`).

use crate::domain::error::StockotterError;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

const REQUIRED_COLUMNS: [&str; 3] = ["ticker", "date", "close"];

pub struct CsvPriceAdapter {
    path: PathBuf,
}

struct PriceRow {
    ticker: String,
    date: NaiveDate,
    close: f64,
}

impl CsvPriceAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Closes for one date keyed by ticker. Rows for other dates are ignored;
    /// a ticker appearing twice for `asof` is an error.
    pub fn closes_for(&self, asof: NaiveDate) -> Result<BTreeMap<String, f64>, StockotterError> {
        let mut closes = BTreeMap::new();
        for row in self.read_rows()? {
            if row.date != asof {
                continue;
            }
            if closes.insert(row.ticker.clone(), row.close).is_some() {
                return Err(StockotterError::PriceData {
                    reason: format!("duplicate ticker for {asof}: {}", row.ticker),
                });
            }
        }
        Ok(closes)
    }

    /// Distinct dates in the file, ascending.
    pub fn trading_dates(&self) -> Result<Vec<NaiveDate>, StockotterError> {
        let dates: BTreeSet<NaiveDate> = self.read_rows()?.into_iter().map(|r| r.date).collect();
        Ok(dates.into_iter().collect())
    }

    fn read_rows(&self) -> Result<Vec<PriceRow>, StockotterError> {
        let content = fs::read_to_string(&self.path).map_err(|e| StockotterError::PriceData {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| StockotterError::PriceData {
                reason: format!("CSV header error: {}", e),
            })?
            .clone();
        let mut index = [0usize; 3];
        for (slot, column) in index.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| StockotterError::PriceData {
                    reason: "prices csv must include columns: ticker,date,close".into(),
                })?;
        }
        let [ticker_idx, date_idx, close_idx] = index;

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| StockotterError::PriceData {
                reason: format!("CSV parse error: {}", e),
            })?;

            let ticker = record.get(ticker_idx).unwrap_or_default();
            if ticker.is_empty() {
                return Err(StockotterError::PriceData {
                    reason: "prices csv has empty ticker row".into(),
                });
            }

            let date_str = record.get(date_idx).unwrap_or_default();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                StockotterError::PriceData {
                    reason: format!("invalid date for ticker={ticker}: {date_str} ({e})"),
                }
            })?;

            let close_str = record.get(close_idx).unwrap_or_default();
            let close: f64 = close_str.parse().map_err(|_| StockotterError::PriceData {
                reason: format!("invalid close value for ticker={ticker}: {close_str}"),
            })?;
            if !(close > 0.0) {
                return Err(StockotterError::PriceData {
                    reason: format!("close must be > 0 for ticker={ticker}"),
                });
            }

            rows.push(PriceRow {
                ticker: ticker.to_string(),
                date,
                close,
            });
        }
        Ok(rows)
    }
}
