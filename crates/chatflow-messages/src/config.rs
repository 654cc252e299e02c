use chatflow_stream::ConfigError;
use chatflow_stream::config::{env_parse, env_string};
use chrono::{FixedOffset, Offset, Utc};

use crate::usage::DEFAULT_COST_PER_MILLION_TOKENS;

pub const DEFAULT_USER_AVATAR: &str = "https://avatars.githubusercontent.com/u/76239030?v=4";
pub const DEFAULT_AGENT_AVATAR: &str =
    "https://cube.elemecdn.com/0/88/03b0d39583f48206768a7534e55bcpng.png";

/// Display and pricing settings for the `Normalizer`.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizerConfig {
    pub cost_per_million_tokens: f64,
    pub user_avatar: String,
    pub agent_avatar: String,
    /// Offset timestamps are displayed in.
    pub utc_offset: FixedOffset,
    /// Characters kept in event summary previews.
    pub preview_chars: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            cost_per_million_tokens: DEFAULT_COST_PER_MILLION_TOKENS,
            user_avatar: DEFAULT_USER_AVATAR.to_string(),
            agent_avatar: DEFAULT_AGENT_AVATAR.to_string(),
            utc_offset: Utc.fix(),
            preview_chars: 80,
        }
    }
}

impl NormalizerConfig {
    /// Defaults overridden by `CHATFLOW_COST_PER_MILLION_TOKENS`,
    /// `CHATFLOW_USER_AVATAR`, `CHATFLOW_AGENT_AVATAR` and
    /// `CHATFLOW_UTC_OFFSET_MINUTES`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(rate) = env_parse::<f64>("CHATFLOW_COST_PER_MILLION_TOKENS")? {
            config = config.cost_per_million_tokens(rate);
        }
        if let Some(avatar) = env_string("CHATFLOW_USER_AVATAR") {
            config.user_avatar = avatar;
        }
        if let Some(avatar) = env_string("CHATFLOW_AGENT_AVATAR") {
            config.agent_avatar = avatar;
        }
        if let Some(minutes) = env_parse::<i32>("CHATFLOW_UTC_OFFSET_MINUTES")? {
            config = config.utc_offset_minutes(minutes)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn cost_per_million_tokens(mut self, rate: f64) -> Self {
        self.cost_per_million_tokens = rate;
        self
    }

    pub fn utc_offset_minutes(mut self, minutes: i32) -> Result<Self, ConfigError> {
        self.utc_offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::Invalid(format!("UTC offset out of range: {minutes} minutes")))?;
        Ok(self)
    }

    pub fn preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cost_per_million_tokens.is_finite() || self.cost_per_million_tokens < 0.0 {
            return Err(ConfigError::Invalid(
                "cost per million tokens must be a non-negative number".into(),
            ));
        }
        if self.preview_chars == 0 {
            return Err(ConfigError::Invalid(
                "preview length must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
