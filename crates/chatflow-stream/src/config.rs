use std::str::FromStr;

use crate::errors::ConfigError;

/// Literal in-band end-of-stream token sent by the backend.
pub const DEFAULT_TERMINATION_MARKER: &str = "[DONE]";

/// Placeholder texts the backend sends while it has nothing to say yet.
pub const DEFAULT_PLACEHOLDERS: &[&str] = &["[waiting]", "[等待内容...]"];

/// Bounds for the brace-scanning JSON recovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoveryLimits {
    /// Deepest `{` nesting a recovered candidate may reach. Matches
    /// serde_json's own recursion limit by default.
    pub max_depth: usize,
    /// Frames longer than this (in bytes) skip the brace scan.
    pub max_scan_bytes: usize,
}

impl Default for RecoveryLimits {
    fn default() -> Self {
        Self {
            max_depth: 128,
            max_scan_bytes: 1_048_576,
        }
    }
}

/// Configuration for a `StreamSession` and the transport adapters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    pub termination_marker: String,
    /// Texts that are never emitted as content.
    pub placeholders: Vec<String>,
    pub recovery: RecoveryLimits,
    /// Bytes the chunk reassembler may hold before releasing text early.
    pub max_pending_bytes: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            termination_marker: DEFAULT_TERMINATION_MARKER.to_string(),
            placeholders: DEFAULT_PLACEHOLDERS.iter().map(|s| s.to_string()).collect(),
            recovery: RecoveryLimits::default(),
            max_pending_bytes: 1_048_576,
        }
    }
}

impl DecoderConfig {
    /// Builds a config from defaults overridden by environment variables.
    ///
    /// - `CHATFLOW_TERMINATION_MARKER`
    /// - `CHATFLOW_MAX_JSON_DEPTH`
    /// - `CHATFLOW_MAX_SCAN_BYTES`
    /// - `CHATFLOW_MAX_PENDING_BYTES`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(marker) = env_string("CHATFLOW_TERMINATION_MARKER") {
            config = config.termination_marker(marker);
        }
        if let Some(depth) = env_parse::<usize>("CHATFLOW_MAX_JSON_DEPTH")? {
            config.recovery.max_depth = depth;
        }
        if let Some(bytes) = env_parse::<usize>("CHATFLOW_MAX_SCAN_BYTES")? {
            config.recovery.max_scan_bytes = bytes;
        }
        if let Some(bytes) = env_parse::<usize>("CHATFLOW_MAX_PENDING_BYTES")? {
            config.max_pending_bytes = bytes;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the in-band termination marker.
    pub fn termination_marker(mut self, marker: impl Into<String>) -> Self {
        self.termination_marker = marker.into();
        self
    }

    /// Adds a placeholder text that must never be emitted as content.
    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.placeholders.push(text.into());
        self
    }

    /// Overrides the brace-scan bounds.
    pub fn recovery(mut self, limits: RecoveryLimits) -> Self {
        self.recovery = limits;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.termination_marker.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "termination marker must not be empty".into(),
            ));
        }
        if self.recovery.max_depth == 0 {
            return Err(ConfigError::Invalid(
                "max JSON depth must be greater than 0".into(),
            ));
        }
        if self.max_pending_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max pending bytes must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Reads a non-blank environment variable.
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Reads and parses an environment variable. Unset or blank is `Ok(None)`;
/// a value that does not parse is an error rather than a silent default.
pub fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::invalid_env(key, raw)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_done_marker_and_bounded_recovery() {
        let config = DecoderConfig::default();
        assert_eq!(config.termination_marker, "[DONE]");
        assert_eq!(config.recovery.max_depth, 128);
        assert!(config.placeholders.iter().any(|p| p == "[waiting]"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_marker() {
        let config = DecoderConfig::default().termination_marker("  ");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn env_parse_reports_unparseable_values() {
        // Unique key so parallel tests never observe it.
        let key = "CHATFLOW_TEST_ENV_PARSE_BAD";
        unsafe { std::env::set_var(key, "not-a-number") };
        let result = env_parse::<usize>(key);
        unsafe { std::env::remove_var(key) };
        assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    }

    #[test]
    fn env_parse_treats_unset_as_none() {
        let result = env_parse::<usize>("CHATFLOW_TEST_ENV_PARSE_UNSET").expect("ok");
        assert_eq!(result, None);
    }
}
