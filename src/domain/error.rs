//! Domain error types.

/// Top-level error type for atrtrader.
#[derive(Debug, thiserror::Error)]
pub enum AtrtraderError {
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

    #[error("no data for {symbol} ({interval})")]
    NoData { symbol: String, interval: String },

    #[error("failed to read bar data: {reason}")]
    DataSource { reason: String },

    #[error("invalid bar at row {row}: {reason}")]
    /// `row` is the file line for parse errors and the series index for
    /// validation errors.
    InvalidBar { row: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AtrtraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        AtrtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        AtrtraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&AtrtraderError> for std::process::ExitCode {
    fn from(err: &AtrtraderError) -> Self {
        let code: u8 = match err {
            AtrtraderError::Io(_) => 1,
            AtrtraderError::ConfigParse { .. }
            | AtrtraderError::ConfigMissing { .. }
            | AtrtraderError::ConfigInvalid { .. } => 2,
            AtrtraderError::DataSource { .. } => 3,
            AtrtraderError::NoData { .. } | AtrtraderError::InvalidBar { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
