//! Telegram transport settings.

use channel_gate_core::config::GateSettings;
use config::ConfigError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: String,
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        channel_gate_core::config::build_config()?.try_deserialize()
    }
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Gate settings shared with the core.
    pub gate: Arc<GateSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(gate: GateSettings, telegram: TelegramSettings) -> Self {
        Self {
            gate: Arc::new(gate),
            telegram: Arc::new(telegram),
        }
    }
}

/// Initial backoff for retried Bot API sends (milliseconds).
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for retried Bot API sends (milliseconds).
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Retries for Bot API sends after the first attempt.
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
