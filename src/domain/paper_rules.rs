//! End-of-day rule engine for paper positions.
//!
//! Rules are checked in a fixed priority order and the first one that fires
//! ends evaluation, so a single call emits at most one event:
//!
//! 1. EXITED positions are left alone.
//! 2. Stop-loss against the entry price, from any open state.
//! 3. Partial take-profit, from ENTRY only.
//! 4. PARTIAL_TP silently advances to TRAILING.
//! 5. Trailing stop against the highest close since take-profit.
//! 6. Sideways exit, from ENTRY only.

use chrono::{Local, NaiveDate};

use super::error::StockotterError;
use super::position::{PaperEvent, PaperEventType, PaperPosition, PositionState};

pub const DEFAULT_TAKE_PROFIT_PCT: f64 = 0.08;
pub const DEFAULT_TRAILING_STOP_PCT: f64 = 0.06;
pub const DEFAULT_STOP_LOSS_PCT: f64 = 0.07;
pub const DEFAULT_SIDEWAYS_DAYS: u32 = 3;
pub const DEFAULT_SIDEWAYS_BAND_PCT: f64 = 0.01;
/// Share of `qty_total` sold on take-profit.
pub const PARTIAL_TP_FRACTION: f64 = 0.5;

/// Tunable thresholds. Validated once by the config layer, not per call.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperRules {
    pub take_profit_pct: f64,
    pub trailing_stop_pct: f64,
    pub stop_loss_pct: f64,
    pub enable_sideways_exit: bool,
    pub sideways_days: u32,
    pub sideways_band_pct: f64,
}

impl Default for PaperRules {
    fn default() -> Self {
        PaperRules {
            take_profit_pct: DEFAULT_TAKE_PROFIT_PCT,
            trailing_stop_pct: DEFAULT_TRAILING_STOP_PCT,
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            enable_sideways_exit: true,
            sideways_days: DEFAULT_SIDEWAYS_DAYS,
            sideways_band_pct: DEFAULT_SIDEWAYS_BAND_PCT,
        }
    }
}

impl PaperRules {
    pub fn stop_loss_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 - self.stop_loss_pct)
    }

    pub fn take_profit_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 + self.take_profit_pct)
    }

    pub fn trailing_stop_price(&self, highest_close: f64) -> f64 {
        highest_close * (1.0 - self.trailing_stop_pct)
    }

    pub fn sideways_band(&self, entry_price: f64) -> (f64, f64) {
        (
            entry_price * (1.0 - self.sideways_band_pct),
            entry_price * (1.0 + self.sideways_band_pct),
        )
    }
}

/// Next snapshot of a position plus the event it emitted, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct EodOutcome {
    pub position: PaperPosition,
    pub event: Option<PaperEvent>,
}

/// Applies one day's close to `position`.
///
/// Fails with `InvalidInput` when `close <= 0` or `asof` precedes the entry
/// date; the input position is never modified. `last_close` and
/// `updated_at` are refreshed on every successful call, including no-ops.
pub fn apply_eod_rules(
    position: &PaperPosition,
    close: f64,
    asof: NaiveDate,
    rules: &PaperRules,
) -> Result<EodOutcome, StockotterError> {
    if !(close > 0.0) {
        return Err(StockotterError::InvalidInput {
            ticker: position.ticker.clone(),
            reason: format!("close must be > 0 (got {close})"),
        });
    }
    if asof < position.entry_date {
        return Err(StockotterError::InvalidInput {
            ticker: position.ticker.clone(),
            reason: format!(
                "asof {asof} must be >= entry_date {}",
                position.entry_date
            ),
        });
    }

    let mut next = position.clone();
    next.last_close = close;
    next.updated_at = Local::now().fixed_offset();

    if next.state == PositionState::Exited {
        return Ok(EodOutcome {
            position: next,
            event: None,
        });
    }

    let stop_loss_price = rules.stop_loss_price(next.entry_price);
    if close <= stop_loss_price {
        let note = format!(
            "entry={:.4} stop={:.4}",
            next.entry_price, stop_loss_price
        );
        return Ok(exit_all(next, close, asof, PaperEventType::StopLoss, note));
    }

    let take_profit_price = rules.take_profit_price(next.entry_price);
    if next.state == PositionState::Entry && close >= take_profit_price {
        let qty_to_sell = next.qty_total * PARTIAL_TP_FRACTION;
        next.qty_remaining = (next.qty_remaining - qty_to_sell).max(0.0);
        next.state = PositionState::PartialTp;
        next.highest_close_since_tp = Some(close);
        next.sideways_days = 0;
        let event = PaperEvent {
            ticker: next.ticker.clone(),
            event_date: asof,
            event_type: PaperEventType::PartialTp,
            price: close,
            quantity: qty_to_sell,
            state_before: PositionState::Entry,
            state_after: PositionState::PartialTp,
            note: format!(
                "entry={:.4} tp={:.4}",
                next.entry_price, take_profit_price
            ),
        };
        return Ok(EodOutcome {
            position: next,
            event: Some(event),
        });
    }

    // trailing protection starts the day after take-profit
    if next.state == PositionState::PartialTp {
        next.state = PositionState::Trailing;
    }

    if next.state == PositionState::Trailing {
        let highest = next.highest_close_since_tp.unwrap_or(close).max(close);
        next.highest_close_since_tp = Some(highest);
        let trailing_price = rules.trailing_stop_price(highest);
        if close <= trailing_price {
            let note = format!("highest={highest:.4} stop={trailing_price:.4}");
            return Ok(exit_all(
                next,
                close,
                asof,
                PaperEventType::TrailingStop,
                note,
            ));
        }
    }

    if rules.enable_sideways_exit && next.state == PositionState::Entry {
        let (lower, upper) = rules.sideways_band(next.entry_price);
        if (lower..=upper).contains(&close) {
            next.sideways_days += 1;
        } else {
            next.sideways_days = 0;
        }

        if next.sideways_days >= rules.sideways_days {
            let note = format!(
                "range=[{lower:.4}, {upper:.4}] days={}",
                next.sideways_days
            );
            return Ok(exit_all(
                next,
                close,
                asof,
                PaperEventType::SidewaysExit,
                note,
            ));
        }
    }

    Ok(EodOutcome {
        position: next,
        event: None,
    })
}

fn exit_all(
    mut position: PaperPosition,
    close: f64,
    asof: NaiveDate,
    event_type: PaperEventType,
    note: String,
) -> EodOutcome {
    let state_before = position.state;
    let quantity = position.qty_remaining;
    position.state = PositionState::Exited;
    position.qty_remaining = 0.0;
    position.exit_price = Some(close);
    position.exit_date = Some(asof);

    let event = PaperEvent {
        ticker: position.ticker.clone(),
        event_date: asof,
        event_type,
        price: close,
        quantity,
        state_before,
        state_after: PositionState::Exited,
        note,
    };
    EodOutcome {
        position,
        event: Some(event),
    }
}
