//! Domain error types.

/// Top-level error type for stockotter.
#[derive(Debug, thiserror::Error)]
pub enum StockotterError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid input for {ticker}: {reason}")]
    InvalidInput { ticker: String, reason: String },

    #[error("invalid position {ticker}: {reason}")]
    InvalidPosition { ticker: String, reason: String },

    #[error("price data error: {reason}")]
    PriceData { reason: String },

    #[error("news data error at line {line}: {reason}")]
    NewsData { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StockotterError {
    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        StockotterError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&StockotterError> for std::process::ExitCode {
    fn from(err: &StockotterError) -> Self {
        let code: u8 = match err {
            StockotterError::Io(_) => 1,
            StockotterError::ConfigParse { .. }
            | StockotterError::ConfigMissing { .. }
            | StockotterError::ConfigInvalid { .. } => 2,
            StockotterError::Database { .. } | StockotterError::DatabaseQuery { .. } => 3,
            StockotterError::InvalidInput { .. } | StockotterError::InvalidPosition { .. } => 4,
            StockotterError::PriceData { .. } | StockotterError::NewsData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
