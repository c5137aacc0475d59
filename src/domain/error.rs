//! Domain error types.

/// Top-level error type for crosstrader.
#[derive(Debug, thiserror::Error)]
pub enum CrosstraderError {
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

    #[error("missing credential: {name} is not set")]
    MissingCredential { name: String },

    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("order rejected for {symbol}: {reason}")]
    OrderRejected { symbol: String, reason: String },

    #[error("broker error: {reason}")]
    Broker { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&CrosstraderError> for std::process::ExitCode {
    fn from(err: &CrosstraderError) -> Self {
        let code: u8 = match err {
            CrosstraderError::Io(_) => 1,
            CrosstraderError::ConfigParse { .. }
            | CrosstraderError::ConfigMissing { .. }
            | CrosstraderError::ConfigInvalid { .. }
            | CrosstraderError::MissingCredential { .. } => 2,
            CrosstraderError::DataUnavailable { .. } => 3,
            CrosstraderError::OrderRejected { .. } | CrosstraderError::Broker { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}
