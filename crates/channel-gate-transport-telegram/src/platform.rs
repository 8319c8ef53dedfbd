//! Bot API implementation of the core platform traits.

use crate::bot::resilient::{edit_message_resilient, send_message_resilient};
use crate::bot::views::{media_caption, GateView};
use async_trait::async_trait;
use channel_gate_core::config::{ChannelRef, GateSettings};
use channel_gate_core::platform::{
    ChatMemberStatus, DeliveryApi, MembershipApi, Notice, PlatformError,
};
use channel_gate_core::registry::MediaKind;
use teloxide::prelude::*;
use teloxide::types::{Chat, ChatMemberKind, FileId, InputFile, MessageId, Recipient};
use teloxide::RequestError;
use tracing::debug;

/// Text of the throwaway reachability probe.
const PROBE_TEXT: &str = "⚡ Verifying access...";

/// Bot's view of the gated channel, as reported by `/testchannel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelProbe {
    /// Configured channel label
    pub label: String,
    /// Channel title, when the chat has one
    pub title: Option<String>,
    /// Chat type: `channel`, `supergroup`, ...
    pub chat_kind: &'static str,
    /// Resolved chat id
    pub chat_id: i64,
    /// Subscriber count
    pub member_count: u32,
    /// Number of administrators
    pub admin_count: usize,
    /// Whether the bot itself is an administrator
    pub bot_is_admin: bool,
}

/// Telegram adapter bound to one gated channel.
pub struct TelegramPlatform {
    bot: Bot,
    gated_channel: Recipient,
    channel_label: String,
    view: GateView,
}

impl TelegramPlatform {
    /// Create an adapter for the configured gated channel.
    #[must_use]
    pub fn new(bot: Bot, settings: &GateSettings) -> Self {
        let channel = settings.gated_channel();
        Self {
            bot,
            gated_channel: recipient_for(&channel),
            channel_label: channel.label(),
            view: GateView::from_settings(settings),
        }
    }

    /// View used to render notices.
    #[must_use]
    pub const fn view(&self) -> &GateView {
        &self.view
    }

    /// Inspect the gated channel from the bot's point of view.
    ///
    /// # Errors
    ///
    /// Returns the Bot API error when the channel cannot be read.
    pub async fn probe_gated_channel(&self) -> Result<ChannelProbe, RequestError> {
        let chat = self.bot.get_chat(self.gated_channel.clone()).await?;
        let admins = self
            .bot
            .get_chat_administrators(self.gated_channel.clone())
            .await?;
        let me = self.bot.get_me().await?;
        let member_count = self
            .bot
            .get_chat_member_count(self.gated_channel.clone())
            .await?;

        Ok(ChannelProbe {
            label: self.channel_label.clone(),
            title: chat.title().map(str::to_string),
            chat_kind: chat_kind(&chat),
            chat_id: chat.id.0,
            member_count,
            admin_count: admins.len(),
            bot_is_admin: admins.iter().any(|admin| admin.user.id == me.user.id),
        })
    }
}

#[async_trait]
impl MembershipApi for TelegramPlatform {
    async fn get_chat_member_status(&self, user_id: i64) -> Result<ChatMemberStatus, PlatformError> {
        let member = self
            .bot
            .get_chat_member(self.gated_channel.clone(), UserId(user_id.cast_unsigned()))
            .await
            .map_err(|e| classify_request_error(&e))?;
        let status = member_status(&member.kind);
        debug!(user_id, ?status, "Fetched chat member status");
        Ok(status)
    }

    async fn send_transient_message(&self, user_id: i64) -> Result<i32, PlatformError> {
        let msg = self
            .bot
            .send_message(ChatId(user_id), PROBE_TEXT)
            .disable_notification(true)
            .await
            .map_err(|e| classify_request_error(&e))?;
        Ok(msg.id.0)
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<(), PlatformError> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .map(|_| ())
            .map_err(|e| classify_request_error(&e))
    }
}

#[async_trait]
impl DeliveryApi for TelegramPlatform {
    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        remote_ref: &str,
    ) -> Result<(), PlatformError> {
        let file = InputFile::file_id(FileId(remote_ref.to_owned()));
        let caption = media_caption(kind);
        let sent = match kind {
            MediaKind::Photo => self
                .bot
                .send_photo(ChatId(chat_id), file)
                .caption(caption)
                .await,
            MediaKind::Video => self
                .bot
                .send_video(ChatId(chat_id), file)
                .caption(caption)
                .await,
        };
        sent.map(|_| ()).map_err(|e| classify_request_error(&e))
    }

    async fn send_notice(&self, chat_id: i64, notice: Notice) -> Result<i32, PlatformError> {
        let rendered = self.view.render(&notice);
        send_message_resilient(&self.bot, ChatId(chat_id), rendered.text, rendered.keyboard)
            .await
            .map(|msg| msg.id.0)
            .map_err(|e| classify_request_error(&e))
    }

    async fn edit_notice(
        &self,
        chat_id: i64,
        message_id: i32,
        notice: Notice,
    ) -> Result<(), PlatformError> {
        let rendered = self.view.render(&notice);
        edit_message_resilient(
            &self.bot,
            ChatId(chat_id),
            MessageId(message_id),
            rendered.text,
            rendered.keyboard,
        )
        .await
        .map(|_| ())
        .map_err(|e| classify_request_error(&e))
    }
}

/// Bot API recipient for a configured channel reference.
#[must_use]
pub fn recipient_for(channel: &ChannelRef) -> Recipient {
    match channel {
        ChannelRef::Id(id) => Recipient::Id(ChatId(*id)),
        ChannelRef::Username(name) => Recipient::ChannelUsername(name.clone()),
    }
}

/// Short name of a chat's type.
#[must_use]
pub fn chat_kind(chat: &Chat) -> &'static str {
    if chat.is_private() {
        "private"
    } else if chat.is_group() {
        "group"
    } else if chat.is_supergroup() {
        "supergroup"
    } else {
        "channel"
    }
}

/// Map a Bot API member kind onto the core status.
#[must_use]
pub fn member_status(kind: &ChatMemberKind) -> ChatMemberStatus {
    if kind.is_owner() {
        ChatMemberStatus::Owner
    } else if kind.is_administrator() {
        ChatMemberStatus::Administrator
    } else if kind.is_member() {
        ChatMemberStatus::Member
    } else if kind.is_restricted() {
        ChatMemberStatus::Restricted
    } else if kind.is_banned() {
        ChatMemberStatus::Banned
    } else {
        ChatMemberStatus::Left
    }
}

/// Classify a Bot API failure for the core.
#[must_use]
pub fn classify_request_error(error: &RequestError) -> PlatformError {
    match error {
        RequestError::Api(api) => classify_api_message(&api.to_string()),
        other => PlatformError::Transient(other.to_string()),
    }
}

/// Classify a Bot API error description.
///
/// ```
/// use channel_gate_core::platform::PlatformError;
/// use channel_gate_transport_telegram::platform::classify_api_message;
///
/// assert_eq!(
///     classify_api_message("Bad Request: user not found"),
///     PlatformError::UserNotFound
/// );
/// ```
#[must_use]
pub fn classify_api_message(message: &str) -> PlatformError {
    const USER_NOT_FOUND: [&str; 2] = ["user not found", "participant_id_invalid"];
    const NO_ACCESS: [&str; 5] = [
        "forbidden",
        "chat not found",
        "kicked",
        "member list is inaccessible",
        "not enough rights",
    ];

    let lower = message.to_lowercase();
    if USER_NOT_FOUND.iter().any(|needle| lower.contains(needle)) {
        PlatformError::UserNotFound
    } else if NO_ACCESS.iter().any(|needle| lower.contains(needle)) {
        PlatformError::NoAccess(message.to_string())
    } else {
        PlatformError::Transient(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_not_found_is_final() {
        assert_eq!(
            classify_api_message("Bad Request: USER NOT FOUND"),
            PlatformError::UserNotFound
        );
        assert_eq!(
            classify_api_message("Bad Request: PARTICIPANT_ID_INVALID"),
            PlatformError::UserNotFound
        );
    }

    #[test]
    fn test_access_problems_are_misconfiguration() {
        for message in [
            "Forbidden: bot is not a member of the channel chat",
            "Bad Request: chat not found",
            "Forbidden: bot was kicked from the channel chat",
            "Bad Request: member list is inaccessible",
            "Bad Request: not enough rights to get chat members",
        ] {
            assert!(
                matches!(classify_api_message(message), PlatformError::NoAccess(_)),
                "{message}"
            );
        }
    }

    #[test]
    fn test_everything_else_is_transient() {
        for message in [
            "Too Many Requests: retry after 5",
            "Internal Server Error",
            "Bad Gateway",
        ] {
            assert!(classify_api_message(message).is_transient(), "{message}");
        }
    }

    #[test]
    fn test_non_api_failures_are_transient() {
        let io = RequestError::Io(std::io::Error::other("connection reset").into());
        assert!(classify_request_error(&io).is_transient());

        let api = RequestError::Api(teloxide::ApiError::UserNotFound);
        assert_eq!(classify_request_error(&api), PlatformError::UserNotFound);
    }

    #[test]
    fn test_recipient_follows_channel_ref() {
        assert_eq!(
            recipient_for(&ChannelRef::Id(-100_123)),
            Recipient::Id(ChatId(-100_123))
        );
        assert_eq!(
            recipient_for(&ChannelRef::Username("@news".into())),
            Recipient::ChannelUsername("@news".into())
        );
    }
}
