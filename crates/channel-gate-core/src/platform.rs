//! Narrow interfaces onto the messaging platform.
//!
//! The core never talks to a bot API directly. A transport adapter implements
//! [`MembershipApi`] for verification and [`DeliveryApi`] for everything the
//! user sees.

use crate::gateway::AttemptKind;
use crate::registry::{AssetHandle, AssetId, MediaKind};
use async_trait::async_trait;
use thiserror::Error;

/// Failure of a platform call, classified by how the core must react.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The platform cannot resolve the user; never retried
    #[error("User not found")]
    UserNotFound,
    /// The bot itself lacks access to the chat; a configuration problem
    #[error("Bot has no access: {0}")]
    NoAccess(String),
    /// Rate limit, timeout, malformed response and anything else
    #[error("Transient platform error: {0}")]
    Transient(String),
}

impl PlatformError {
    /// Whether retrying the same call can help.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Membership status reported by the platform for the gated channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMemberStatus {
    /// Channel creator
    Owner,
    /// Channel administrator
    Administrator,
    /// Regular subscriber
    Member,
    /// Restricted member
    Restricted,
    /// Not in the channel
    Left,
    /// Removed and banned
    Banned,
}

impl ChatMemberStatus {
    /// Whether this status grants access to gated media.
    #[must_use]
    pub const fn grants_access(self) -> bool {
        matches!(self, Self::Owner | Self::Administrator | Self::Member)
    }
}

/// User-facing message the adapter renders in its own format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Greeting for a plain `/start`
    Welcome,
    /// Membership could not be confirmed; offers join and recheck actions
    Challenge {
        /// Asset the user asked for
        asset_id: AssetId,
        /// Attempt that produced the challenge
        after: AttemptKind,
    },
    /// A recheck is in progress
    Checking {
        /// Recheck flavour
        attempt: AttemptKind,
    },
    /// Membership confirmed after a recheck; media follows
    Verified {
        /// Recheck flavour
        attempt: AttemptKind,
    },
    /// Forced recheck failed; only join and support are offered
    Exhausted {
        /// Asset the user asked for
        asset_id: AssetId,
        /// Shown so the user can quote it to support
        user_id: i64,
    },
    /// Requested asset is unknown or was lost on restart
    NotFound,
    /// Media send failed after a successful verification
    DeliveryFailed,
    /// Link announcement posted back to the content channel
    LinkIssued {
        /// Newly registered asset
        handle: AssetHandle,
        /// Shareable deep link
        link: String,
        /// Local time of registration, `HH:MM:SS`
        issued_at: String,
    },
}

/// Calls used to verify membership in the gated channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipApi: Send + Sync {
    /// Status of `user_id` in the gated channel.
    async fn get_chat_member_status(&self, user_id: i64) -> Result<ChatMemberStatus, PlatformError>;

    /// Send a silent throwaway direct message; returns its message id.
    async fn send_transient_message(&self, user_id: i64) -> Result<i32, PlatformError>;

    /// Delete a message.
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), PlatformError>;
}

/// Calls used to answer users.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryApi: Send + Sync {
    /// Re-send a registered media item.
    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        remote_ref: &str,
    ) -> Result<(), PlatformError>;

    /// Send a notice as a new message; returns its message id.
    async fn send_notice(&self, chat_id: i64, notice: Notice) -> Result<i32, PlatformError>;

    /// Replace the content of an earlier message with a notice.
    async fn edit_notice(
        &self,
        chat_id: i64,
        message_id: i32,
        notice: Notice,
    ) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_granting_statuses() {
        assert!(ChatMemberStatus::Owner.grants_access());
        assert!(ChatMemberStatus::Administrator.grants_access());
        assert!(ChatMemberStatus::Member.grants_access());
        assert!(!ChatMemberStatus::Restricted.grants_access());
        assert!(!ChatMemberStatus::Left.grants_access());
        assert!(!ChatMemberStatus::Banned.grants_access());
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(PlatformError::Transient("timeout".into()).is_transient());
        assert!(!PlatformError::UserNotFound.is_transient());
        assert!(!PlatformError::NoAccess("kicked".into()).is_transient());
    }
}
