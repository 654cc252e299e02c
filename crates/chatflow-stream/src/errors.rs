/// Failure surfaced to the caller through `StreamEvent::Error`.
///
/// None of these halt a session; the caller decides whether to stop feeding
/// chunks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum StreamFailure {
    /// Upstream sent an explicit `error` event.
    #[error("upstream error: {message}")]
    Upstream { message: String },
    /// A frame with no recoverable JSON mentioned an error in plain text.
    #[error("response contains error text: {frame}")]
    ErrorText { frame: String },
}

impl StreamFailure {
    /// Creates an upstream-reported failure.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Creates a failure from an unstructured frame that mentions an error.
    pub fn error_text(frame: impl Into<String>) -> Self {
        Self::ErrorText {
            frame: frame.into(),
        }
    }

    /// Returns the human-readable message for this failure.
    pub fn message(&self) -> &str {
        match self {
            Self::Upstream { message } => message,
            Self::ErrorText { frame } => frame,
        }
    }
}

/// Non-fatal problems the decoder works around. Counted in `SessionStats`
/// and logged, never surfaced as events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeIssue {
    /// A frame or embedded substring failed to parse as JSON and was dropped.
    #[error("recoverable parse failure: {detail}")]
    RecoverableParse { detail: String },
    /// Structured parsing failed entirely; content was salvaged heuristically.
    #[error("malformed frame salvaged: {detail}")]
    Salvaged { detail: String },
}

/// Invalid decoder or normalizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable was set but could not be parsed.
    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
    /// A configuration value is out of its accepted range.
    #[error("config error: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn invalid_env(key: &str, value: impl Into<String>) -> Self {
        Self::InvalidEnv {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_returns_payload_text() {
        assert_eq!(StreamFailure::upstream("quota exceeded").message(), "quota exceeded");
        assert_eq!(
            StreamFailure::error_text("error: gateway").to_string(),
            "response contains error text: error: gateway"
        );
    }

    #[test]
    fn config_error_names_the_variable() {
        let err = ConfigError::invalid_env("CHATFLOW_MAX_JSON_DEPTH", "deep");
        assert!(err.to_string().contains("CHATFLOW_MAX_JSON_DEPTH"));
    }
}
