//! Configuration validation.
//!
//! Every tunable is checked before a run starts. Out-of-range values are
//! rejected, never clamped.

use crate::domain::clusterer::RepresentativePolicy;
use crate::domain::error::StockotterError;
use crate::ports::config_port::ConfigPort;

/// Longest lookback accepted for `since_hours` (ten years).
pub const MAX_SINCE_HOURS: i64 = 24 * 365 * 10;

/// Boolean spellings accepted in config files.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

pub fn validate_cluster_config(config: &dyn ConfigPort) -> Result<(), StockotterError> {
    validate_similarity_threshold(config)?;
    validate_representative_policy(config)?;
    validate_since_hours(config)?;
    Ok(())
}

pub fn validate_paper_config(config: &dyn ConfigPort) -> Result<(), StockotterError> {
    for key in [
        "take_profit_pct",
        "trailing_stop_pct",
        "stop_loss_pct",
        "sideways_band_pct",
    ] {
        validate_fraction(config, key)?;
    }
    validate_sideways_days(config)?;
    validate_bool(config, "paper", "enable_sideways_exit")?;
    validate_default_quantity(config)?;
    Ok(())
}

pub fn validate_storage_config(config: &dyn ConfigPort) -> Result<(), StockotterError> {
    if let Some(path) = config.get_string("storage", "path") {
        if path.trim().is_empty() {
            return Err(StockotterError::config_invalid(
                "storage",
                "path",
                "path must not be empty",
            ));
        }
    }
    let pool_size = integer_value(config, "storage", "pool_size")?.unwrap_or(4);
    if !(1..=64).contains(&pool_size) {
        return Err(StockotterError::config_invalid(
            "storage",
            "pool_size",
            "pool_size must be between 1 and 64",
        ));
    }
    Ok(())
}

/// A present key whose value does not parse as a number is an error rather
/// than a silent fallback to the default.
fn numeric_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, StockotterError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<f64>().map(Some).map_err(|_| {
            StockotterError::config_invalid(section, key, format!("'{raw}' is not a number"))
        }),
    }
}

/// Integer keys are read with `get_int`, which only understands plain
/// integer text, so anything else (including `5.0`) is rejected here.
fn integer_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, StockotterError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| {
            StockotterError::config_invalid(section, key, format!("'{raw}' is not a whole number"))
        }),
    }
}

fn validate_bool(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), StockotterError> {
    match config.get_string(section, key) {
        Some(raw) if parse_bool(&raw).is_none() => Err(StockotterError::config_invalid(
            section,
            key,
            format!("'{raw}' is not a boolean (true/false, yes/no, on/off, 1/0)"),
        )),
        _ => Ok(()),
    }
}

fn validate_similarity_threshold(config: &dyn ConfigPort) -> Result<(), StockotterError> {
    if let Some(value) = numeric_value(config, "cluster", "similarity_threshold")? {
        if !(0.0..=1.0).contains(&value) {
            return Err(StockotterError::config_invalid(
                "cluster",
                "similarity_threshold",
                "similarity_threshold must be between 0.0 and 1.0",
            ));
        }
    }
    Ok(())
}

fn validate_representative_policy(config: &dyn ConfigPort) -> Result<(), StockotterError> {
    match config.get_string("cluster", "representative_policy") {
        Some(policy) => policy.parse::<RepresentativePolicy>().map(|_| ()),
        None => Ok(()),
    }
}

fn validate_since_hours(config: &dyn ConfigPort) -> Result<(), StockotterError> {
    match integer_value(config, "cluster", "since_hours")? {
        Some(hours) => check_since_hours(hours),
        None => Ok(()),
    }
}

pub fn check_since_hours(hours: i64) -> Result<(), StockotterError> {
    if !(1..=MAX_SINCE_HOURS).contains(&hours) {
        return Err(StockotterError::config_invalid(
            "cluster",
            "since_hours",
            format!("since_hours must be between 1 and {MAX_SINCE_HOURS}"),
        ));
    }
    Ok(())
}

fn validate_fraction(config: &dyn ConfigPort, key: &str) -> Result<(), StockotterError> {
    if let Some(value) = numeric_value(config, "paper", key)? {
        if !(value > 0.0 && value < 1.0) {
            return Err(StockotterError::config_invalid(
                "paper",
                key,
                format!("{key} must be between 0 and 1 (exclusive)"),
            ));
        }
    }
    Ok(())
}

fn validate_sideways_days(config: &dyn ConfigPort) -> Result<(), StockotterError> {
    if let Some(days) = integer_value(config, "paper", "sideways_days")? {
        if days < 1 || u32::try_from(days).is_err() {
            return Err(StockotterError::config_invalid(
                "paper",
                "sideways_days",
                "sideways_days must be a whole number >= 1",
            ));
        }
    }
    Ok(())
}

fn validate_default_quantity(config: &dyn ConfigPort) -> Result<(), StockotterError> {
    if let Some(value) = numeric_value(config, "paper", "default_quantity")? {
        if !(value > 0.0) {
            return Err(StockotterError::config_invalid(
                "paper",
                "default_quantity",
                "default_quantity must be positive",
            ));
        }
    }
    Ok(())
}
