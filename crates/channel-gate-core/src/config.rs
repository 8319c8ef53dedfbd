//! Configuration and settings management
//!
//! Loads gate settings from config files and environment variables and
//! defines the verification constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Seconds a membership verdict stays fresh in the cache.
pub const MEMBERSHIP_CACHE_TTL_SECS: u64 = 30;
/// Maximum number of cached membership verdicts.
pub const MEMBERSHIP_CACHE_MAX_SIZE: u64 = 100_000;
/// Primary status lookups before falling back to the reachability probe.
pub const MEMBERSHIP_PRIMARY_ATTEMPTS: usize = 4;
/// Linear backoff step between primary lookups (2s, 4s, 6s).
pub const MEMBERSHIP_BACKOFF_STEP_SECS: u64 = 2;
/// Grace period before an "I joined" recheck.
pub const RECHECK_GRACE_SECS: u64 = 3;
/// Grace period before a forced recheck.
pub const FORCE_RECHECK_GRACE_SECS: u64 = 5;
/// Host used in generated deep links.
pub const DEFAULT_LINK_HOST: &str = "t.me";

/// Build the layered configuration source shared by all settings structs.
///
/// Sources, lowest priority first: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__`-prefixed environment, plain environment.
///
/// # Errors
///
/// Returns a `ConfigError` if a source cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, never checked in
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain UPPER_SNAKE_CASE variables map onto snake_case keys
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Reference to the gated channel: a numeric chat id or a public `@username`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    /// Numeric chat id (e.g. `-1001234567890`)
    Id(i64),
    /// Public username, always stored with the leading `@`
    Username(String),
}

impl ChannelRef {
    /// Parse a configured channel reference.
    ///
    /// ```
    /// use channel_gate_core::config::ChannelRef;
    ///
    /// assert_eq!(ChannelRef::parse("-100123"), ChannelRef::Id(-100_123));
    /// assert_eq!(ChannelRef::parse("news"), ChannelRef::Username("@news".into()));
    /// ```
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(id) = raw.parse::<i64>() {
            return Self::Id(id);
        }
        let name = raw.trim_start_matches('@');
        Self::Username(format!("@{name}"))
    }

    /// Human-readable label used in user-facing texts.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Id(id) => id.to_string(),
            Self::Username(name) => name.clone(),
        }
    }
}

/// Gate settings loaded from the layered configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GateSettings {
    /// Channel whose membership grants access (`@username` or numeric id)
    pub gated_channel: String,
    /// Explicit invite link; derived from the username when absent
    pub gated_channel_url: Option<String>,
    /// Private channel whose media posts are registered
    pub content_channel_id: i64,
    /// Bot username used in deep links
    pub bot_username: String,
    /// Host used in deep links
    #[serde(default = "default_link_host")]
    pub link_host: String,
    /// Where users are sent after a failed forced recheck
    pub support_url: Option<String>,

    /// Membership cache freshness window
    #[serde(default = "default_cache_ttl")]
    pub membership_cache_ttl_secs: u64,
    /// Membership cache capacity
    #[serde(default = "default_cache_max_size")]
    pub membership_cache_max_size: u64,
    /// Primary status lookups before the fallback probe
    #[serde(default = "default_primary_attempts")]
    pub membership_primary_attempts: usize,
    /// Linear backoff step between primary lookups
    #[serde(default = "default_backoff_step")]
    pub membership_backoff_step_secs: u64,
    /// Grace period before an "I joined" recheck
    #[serde(default = "default_recheck_grace")]
    pub recheck_grace_secs: u64,
    /// Grace period before a forced recheck
    #[serde(default = "default_force_recheck_grace")]
    pub force_recheck_grace_secs: u64,
}

fn default_link_host() -> String {
    DEFAULT_LINK_HOST.to_string()
}

const fn default_cache_ttl() -> u64 {
    MEMBERSHIP_CACHE_TTL_SECS
}

const fn default_cache_max_size() -> u64 {
    MEMBERSHIP_CACHE_MAX_SIZE
}

const fn default_primary_attempts() -> usize {
    MEMBERSHIP_PRIMARY_ATTEMPTS
}

const fn default_backoff_step() -> u64 {
    MEMBERSHIP_BACKOFF_STEP_SECS
}

const fn default_recheck_grace() -> u64 {
    RECHECK_GRACE_SECS
}

const fn default_force_recheck_grace() -> u64 {
    FORCE_RECHECK_GRACE_SECS
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            gated_channel: String::new(),
            gated_channel_url: None,
            content_channel_id: 0,
            bot_username: String::new(),
            link_host: default_link_host(),
            support_url: None,
            membership_cache_ttl_secs: MEMBERSHIP_CACHE_TTL_SECS,
            membership_cache_max_size: MEMBERSHIP_CACHE_MAX_SIZE,
            membership_primary_attempts: MEMBERSHIP_PRIMARY_ATTEMPTS,
            membership_backoff_step_secs: MEMBERSHIP_BACKOFF_STEP_SECS,
            recheck_grace_secs: RECHECK_GRACE_SECS,
            force_recheck_grace_secs: FORCE_RECHECK_GRACE_SECS,
        }
    }
}

impl GateSettings {
    /// Load settings from config files and environment.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use channel_gate_core::config::GateSettings;
    ///
    /// let settings = GateSettings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading or deserialization fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Parsed gated channel reference.
    #[must_use]
    pub fn gated_channel(&self) -> ChannelRef {
        ChannelRef::parse(&self.gated_channel)
    }

    /// Invite link for the gated channel, if one can be produced.
    #[must_use]
    pub fn join_url(&self) -> Option<String> {
        if let Some(url) = self.gated_channel_url.as_ref().filter(|u| !u.is_empty()) {
            return Some(url.clone());
        }
        match self.gated_channel() {
            ChannelRef::Username(name) => Some(format!(
                "https://{}/{}",
                self.link_host,
                name.trim_start_matches('@')
            )),
            ChannelRef::Id(_) => None,
        }
    }

    /// Backoff step between primary lookups.
    #[must_use]
    pub const fn backoff_step(&self) -> Duration {
        Duration::from_secs(self.membership_backoff_step_secs)
    }

    /// Grace period before an "I joined" recheck.
    #[must_use]
    pub const fn recheck_grace(&self) -> Duration {
        Duration::from_secs(self.recheck_grace_secs)
    }

    /// Grace period before a forced recheck.
    #[must_use]
    pub const fn force_recheck_grace(&self) -> Duration {
        Duration::from_secs(self.force_recheck_grace_secs)
    }
}
