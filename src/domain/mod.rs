//! Core domain types and logic.

pub mod news;
pub mod vectorizer;
pub mod clusterer;
pub mod position;
pub mod paper_rules;
pub mod paper_step;
pub mod config_validation;
pub mod error;
