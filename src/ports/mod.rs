//! Port traits the domain depends on.

pub mod config_port;
pub mod news_port;
pub mod paper_store_port;
