//! Daily driver: applies one as-of date's closes to every ticker's position.
//!
//! Tickers are processed in lexical order. A ticker seen for the first time
//! opens an ENTRY position at its close and no rules run for it that day.
//! Rejected closes are logged and counted per ticker; storage failures abort
//! the step.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::error::StockotterError;
use super::paper_rules::{apply_eod_rules, PaperRules};
use super::position::create_entry_position;
use crate::ports::paper_store_port::PaperStorePort;

pub const DEFAULT_ENTRY_QUANTITY: f64 = 1.0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepSummary {
    pub prices: usize,
    pub updated: usize,
    pub new_entries: usize,
    pub events: usize,
    pub failed: Vec<String>,
}

pub fn run_paper_step(
    store: &dyn PaperStorePort,
    closes: &BTreeMap<String, f64>,
    asof: NaiveDate,
    rules: &PaperRules,
    entry_quantity: f64,
) -> Result<StepSummary, StockotterError> {
    let mut summary = StepSummary {
        prices: closes.len(),
        ..StepSummary::default()
    };

    for (ticker, &close) in closes {
        let Some(position) = store.get_position(ticker)? else {
            match create_entry_position(ticker, close, asof, entry_quantity) {
                Ok(position) => {
                    store.put_position(&position)?;
                    tracing::info!(ticker = %ticker, %asof, close, "opened paper position");
                    summary.updated += 1;
                    summary.new_entries += 1;
                }
                Err(e) => {
                    tracing::warn!(ticker = %ticker, %asof, error = %e, "skipping entry");
                    summary.failed.push(ticker.clone());
                }
            }
            continue;
        };

        let outcome = match apply_eod_rules(&position, close, asof, rules) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(ticker = %ticker, %asof, error = %e, "skipping close");
                summary.failed.push(ticker.clone());
                continue;
            }
        };

        store.put_position(&outcome.position)?;
        if let Some(event) = &outcome.event {
            store.append_event(event)?;
            tracing::info!(
                ticker = %ticker,
                %asof,
                event = %event.event_type,
                price = event.price,
                quantity = event.quantity,
                state = %event.state_after,
                "paper event"
            );
            summary.events += 1;
        }
        summary.updated += 1;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{PaperEvent, PaperEventType, PaperPosition, PositionState};
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        positions: RefCell<HashMap<String, PaperPosition>>,
        events: RefCell<Vec<PaperEvent>>,
    }

    impl PaperStorePort for MemoryStore {
        fn get_position(&self, ticker: &str) -> Result<Option<PaperPosition>, StockotterError> {
            Ok(self.positions.borrow().get(ticker).cloned())
        }

        fn put_position(&self, position: &PaperPosition) -> Result<(), StockotterError> {
            self.positions
                .borrow_mut()
                .insert(position.ticker.clone(), position.clone());
            Ok(())
        }

        fn append_event(&self, event: &PaperEvent) -> Result<(), StockotterError> {
            self.events.borrow_mut().push(event.clone());
            Ok(())
        }

        fn list_open_positions(&self) -> Result<Vec<PaperPosition>, StockotterError> {
            let mut open: Vec<_> = self
                .positions
                .borrow()
                .values()
                .filter(|p| p.is_open())
                .cloned()
                .collect();
            open.sort_by(|a, b| a.ticker.cmp(&b.ticker));
            Ok(open)
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

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn closes(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(t, c)| (t.to_string(), *c)).collect()
    }

    #[test]
    fn first_observation_opens_entry_without_rules() {
        let store = MemoryStore::default();
        let summary = run_paper_step(
            &store,
            &closes(&[("005930", 100.0)]),
            date(2026, 2, 25),
            &PaperRules::default(),
            DEFAULT_ENTRY_QUANTITY,
        )
        .unwrap();

        assert_eq!(summary.new_entries, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.events, 0);
        let pos = store.get_position("005930").unwrap().unwrap();
        assert_eq!(pos.state, PositionState::Entry);
        assert_eq!(pos.sideways_days, 0);
    }

    #[test]
    fn full_lifecycle_persists_events() {
        let store = MemoryStore::default();
        let rules = PaperRules::default();
        for (day, close) in [(25, 100.0), (26, 108.0), (27, 112.0), (28, 104.0)] {
            run_paper_step(
                &store,
                &closes(&[("005930", close)]),
                date(2026, 2, day),
                &rules,
                1.0,
            )
            .unwrap();
        }

        let pos = store.get_position("005930").unwrap().unwrap();
        assert_eq!(pos.state, PositionState::Exited);
        let types: Vec<_> = store
            .list_events(Some("005930"))
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            types,
            vec![PaperEventType::PartialTp, PaperEventType::TrailingStop]
        );
        assert!(store.list_open_positions().unwrap().is_empty());
    }

    #[test]
    fn bad_ticker_does_not_abort_others() {
        let store = MemoryStore::default();
        let rules = PaperRules::default();
        run_paper_step(
            &store,
            &closes(&[("000660", 200.0), ("005930", 100.0)]),
            date(2026, 2, 26),
            &rules,
            1.0,
        )
        .unwrap();

        // asof before 000660's entry date
        let summary = run_paper_step(
            &store,
            &closes(&[("000660", 190.0), ("005930", 90.0)]),
            date(2026, 2, 25),
            &rules,
            1.0,
        )
        .unwrap();

        assert_eq!(summary.failed, vec!["000660".to_string(), "005930".to_string()]);
        assert_eq!(summary.updated, 0);

        let summary = run_paper_step(
            &store,
            &closes(&[("000660", -1.0), ("005930", 90.0)]),
            date(2026, 2, 27),
            &rules,
            1.0,
        )
        .unwrap();
        assert_eq!(summary.failed, vec!["000660".to_string()]);
        assert_eq!(summary.events, 1);
        let pos = store.get_position("000660").unwrap().unwrap();
        assert_eq!(pos.last_close, 200.0);
    }

    #[test]
    fn invalid_first_close_is_reported() {
        let store = MemoryStore::default();
        let summary = run_paper_step(
            &store,
            &closes(&[("005930", 0.0)]),
            date(2026, 2, 25),
            &PaperRules::default(),
            1.0,
        )
        .unwrap();
        assert_eq!(summary.failed, vec!["005930".to_string()]);
        assert!(store.get_position("005930").unwrap().is_none());
    }

    #[test]
    fn empty_prices_is_a_no_op() {
        let store = MemoryStore::default();
        let summary = run_paper_step(
            &store,
            &BTreeMap::new(),
            date(2026, 2, 25),
            &PaperRules::default(),
            1.0,
        )
        .unwrap();
        assert_eq!(summary, StepSummary::default());
    }
}
