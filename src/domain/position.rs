//! Paper-trading position records and their lifecycle events.

use chrono::{DateTime, FixedOffset, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::StockotterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionState {
    Entry,
    PartialTp,
    Trailing,
    Exited,
}

impl PositionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionState::Entry => "ENTRY",
            PositionState::PartialTp => "PARTIAL_TP",
            PositionState::Trailing => "TRAILING",
            PositionState::Exited => "EXITED",
        }
    }

    pub fn is_open(&self) -> bool {
        *self != PositionState::Exited
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENTRY" => Ok(PositionState::Entry),
            "PARTIAL_TP" => Ok(PositionState::PartialTp),
            "TRAILING" => Ok(PositionState::Trailing),
            "EXITED" => Ok(PositionState::Exited),
            other => Err(format!("unknown position state '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaperEventType {
    PartialTp,
    TrailingStop,
    StopLoss,
    SidewaysExit,
}

impl PaperEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperEventType::PartialTp => "PARTIAL_TP",
            PaperEventType::TrailingStop => "TRAILING_STOP",
            PaperEventType::StopLoss => "STOP_LOSS",
            PaperEventType::SidewaysExit => "SIDEWAYS_EXIT",
        }
    }
}

impl fmt::Display for PaperEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaperEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PARTIAL_TP" => Ok(PaperEventType::PartialTp),
            "TRAILING_STOP" => Ok(PaperEventType::TrailingStop),
            "STOP_LOSS" => Ok(PaperEventType::StopLoss),
            "SIDEWAYS_EXIT" => Ok(PaperEventType::SidewaysExit),
            other => Err(format!("unknown paper event type '{other}'")),
        }
    }
}

/// One position per ticker. Never deleted: an EXITED position is kept for
/// audit and ignores further closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperPosition {
    pub ticker: String,
    pub state: PositionState,
    pub entry_price: f64,
    pub qty_total: f64,
    pub qty_remaining: f64,
    pub entry_date: NaiveDate,
    pub last_close: f64,
    pub updated_at: DateTime<FixedOffset>,
    pub highest_close_since_tp: Option<f64>,
    pub exit_price: Option<f64>,
    pub exit_date: Option<NaiveDate>,
    pub sideways_days: u32,
}

impl PaperPosition {
    pub fn is_open(&self) -> bool {
        self.state.is_open()
    }

    /// Checks field bounds and the EXITED invariant: a position is EXITED
    /// exactly when nothing remains and both exit fields are set.
    pub fn validate(&self) -> Result<(), StockotterError> {
        let invalid = |reason: &str| {
            Err(StockotterError::InvalidPosition {
                ticker: self.ticker.clone(),
                reason: reason.to_string(),
            })
        };

        if self.ticker.trim().is_empty() {
            return invalid("ticker must not be empty");
        }
        if !(self.entry_price > 0.0) {
            return invalid("entry_price must be > 0");
        }
        if !(self.qty_total > 0.0) {
            return invalid("qty_total must be > 0");
        }
        if !(self.qty_remaining >= 0.0) {
            return invalid("qty_remaining must be >= 0");
        }
        if self.qty_remaining > self.qty_total {
            return invalid("qty_remaining must be <= qty_total");
        }
        if !(self.last_close > 0.0) {
            return invalid("last_close must be > 0");
        }
        if matches!(self.highest_close_since_tp, Some(h) if !(h > 0.0)) {
            return invalid("highest_close_since_tp must be > 0");
        }
        if matches!(self.exit_price, Some(p) if !(p > 0.0)) {
            return invalid("exit_price must be > 0");
        }

        let exit_recorded = self.exit_price.is_some() && self.exit_date.is_some();
        if self.state == PositionState::Exited {
            if self.qty_remaining != 0.0 {
                return invalid("EXITED state requires qty_remaining == 0");
            }
            if !exit_recorded {
                return invalid("EXITED state requires exit_price and exit_date");
            }
        } else {
            if self.qty_remaining == 0.0 {
                return invalid("open position must have qty_remaining > 0");
            }
            if self.exit_price.is_some() || self.exit_date.is_some() {
                return invalid("open position must not have exit_price or exit_date");
            }
        }
        Ok(())
    }
}

/// Opens a fresh ENTRY position at `entry_price`.
pub fn create_entry_position(
    ticker: &str,
    entry_price: f64,
    entry_date: NaiveDate,
    qty_total: f64,
) -> Result<PaperPosition, StockotterError> {
    let position = PaperPosition {
        ticker: ticker.to_string(),
        state: PositionState::Entry,
        entry_price,
        qty_total,
        qty_remaining: qty_total,
        entry_date,
        last_close: entry_price,
        updated_at: Local::now().fixed_offset(),
        highest_close_since_tp: None,
        exit_price: None,
        exit_date: None,
        sideways_days: 0,
    };
    position.validate()?;
    Ok(position)
}

/// Immutable audit record of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperEvent {
    pub ticker: String,
    pub event_date: NaiveDate,
    pub event_type: PaperEventType,
    pub price: f64,
    pub quantity: f64,
    pub state_before: PositionState,
    pub state_after: PositionState,
    pub note: String,
}
