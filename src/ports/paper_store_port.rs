//! Paper position and event log storage port.

use crate::domain::error::StockotterError;
use crate::domain::position::{PaperEvent, PaperPosition};

/// One position per ticker (last write wins) and an append-only event log.
pub trait PaperStorePort {
    fn get_position(&self, ticker: &str) -> Result<Option<PaperPosition>, StockotterError>;

    fn put_position(&self, position: &PaperPosition) -> Result<(), StockotterError>;

    fn append_event(&self, event: &PaperEvent) -> Result<(), StockotterError>;

    /// Non-EXITED positions ordered by ticker.
    fn list_open_positions(&self) -> Result<Vec<PaperPosition>, StockotterError>;

    /// Events in insertion order, optionally for one ticker.
    fn list_events(&self, ticker: Option<&str>) -> Result<Vec<PaperEvent>, StockotterError>;
}
