//! Deep-link and callback payload codecs.
//!
//! Formats here are already deployed in shared links and live keyboards, so
//! they must stay byte-compatible: `?start=img<id>`, `check_membership_<id>`
//! and `force_check_<id>`.

use crate::gateway::AttemptKind;
use crate::registry::AssetId;

/// Prefix of the `/start` payload that requests an asset.
pub const START_PAYLOAD_PREFIX: &str = "img";
/// Callback data prefix of the "I joined, check again" button.
pub const RECHECK_CALLBACK_PREFIX: &str = "check_membership_";
/// Callback data prefix of the "Force refresh" button.
pub const FORCE_RECHECK_CALLBACK_PREFIX: &str = "force_check_";

/// Build the shareable deep link for an asset.
///
/// ```
/// use channel_gate_core::link::deep_link;
///
/// let id = "12".parse().expect("valid id");
/// assert_eq!(
///     deep_link("t.me", "@study_bot", id),
///     "https://t.me/study_bot?start=img12"
/// );
/// ```
#[must_use]
pub fn deep_link(host: &str, bot_username: &str, id: AssetId) -> String {
    format!(
        "https://{host}/{}?start={START_PAYLOAD_PREFIX}{id}",
        bot_username.trim_start_matches('@')
    )
}

/// Interpretation of a `/start` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPayload {
    /// Plain `/start` or an unrelated payload
    Greeting,
    /// A well-formed asset request
    Asset(AssetId),
    /// `img` prefix followed by something that is not an asset id
    Malformed(String),
}

/// Parse the argument of `/start`.
#[must_use]
pub fn parse_start_payload(payload: &str) -> StartPayload {
    let payload = payload.trim();
    match payload.strip_prefix(START_PAYLOAD_PREFIX) {
        Some(raw) => raw
            .parse::<AssetId>()
            .map_or_else(|_| StartPayload::Malformed(raw.to_string()), StartPayload::Asset),
        None => StartPayload::Greeting,
    }
}

/// Recheck button pressed by a challenged user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// "I joined, check again"
    Recheck(AssetId),
    /// "Force refresh"
    ForceRecheck(AssetId),
}

impl CallbackAction {
    /// Decode callback data; foreign data yields `None`.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(raw) = data.strip_prefix(RECHECK_CALLBACK_PREFIX) {
            return raw.parse().ok().map(Self::Recheck);
        }
        if let Some(raw) = data.strip_prefix(FORCE_RECHECK_CALLBACK_PREFIX) {
            return raw.parse().ok().map(Self::ForceRecheck);
        }
        None
    }

    /// Encode as callback data.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Recheck(id) => format!("{RECHECK_CALLBACK_PREFIX}{id}"),
            Self::ForceRecheck(id) => format!("{FORCE_RECHECK_CALLBACK_PREFIX}{id}"),
        }
    }

    /// Requested asset.
    #[must_use]
    pub const fn asset_id(&self) -> AssetId {
        match self {
            Self::Recheck(id) | Self::ForceRecheck(id) => *id,
        }
    }

    /// Attempt kind this button triggers.
    #[must_use]
    pub const fn attempt(&self) -> AttemptKind {
        match self {
            Self::Recheck(_) => AttemptKind::Recheck,
            Self::ForceRecheck(_) => AttemptKind::ForceRecheck,
        }
    }
}
