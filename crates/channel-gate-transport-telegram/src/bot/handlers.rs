use crate::bot::resilient::send_message_resilient;
use crate::bot::views::{DebugContext, GateView};
use crate::platform::{chat_kind, TelegramPlatform};
use anyhow::Result;
use channel_gate_core::gateway::{AccessGateway, CallbackRequest};
use channel_gate_core::registry::MediaKind;
use std::sync::Arc;
use teloxide::{
    prelude::*,
    types::CallbackQuery,
    utils::command::BotCommands,
};
use tracing::{debug, info, warn};

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Greet, or open a content link when a payload is present
    #[command(description = "Start the bot or open a content link.")]
    Start(String),
    /// Show chat, user and gate diagnostics
    #[command(description = "Show diagnostic information.")]
    Debug,
    /// Check the bot's access to the gated channel
    #[command(description = "Test access to the gated channel.")]
    TestChannel,
    /// Drop every cached membership verdict
    #[command(description = "Clear the membership cache.")]
    ClearCache,
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

fn get_user_name(msg: &Message) -> String {
    msg.from
        .as_ref()
        .and_then(|u| u.username.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Extract the registrable media of a channel post.
///
/// Photos use their largest size. Posts without a photo or video yield
/// no kind.
#[must_use]
pub fn extract_media(msg: &Message) -> (Option<MediaKind>, String) {
    if let Some(photo) = msg.photo().and_then(<[_]>::last) {
        return (Some(MediaKind::Photo), photo.file.id.0.clone());
    }
    if let Some(video) = msg.video() {
        return (Some(MediaKind::Video), video.file.id.0.clone());
    }
    (None, String::new())
}

/// Handle `/start` with its optional payload.
pub async fn start(msg: Message, payload: String, gateway: Arc<AccessGateway>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!(
        "Start command from user {} (@{}) with payload {:?}",
        user_id,
        get_user_name(&msg),
        payload
    );

    let outcome = gateway.handle_start(user_id, msg.chat.id.0, &payload).await;
    debug!(user_id, ?outcome, "Start handled");
    Ok(())
}

/// Handle `/debug`.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn debug_info(
    bot: Bot,
    msg: Message,
    gateway: Arc<AccessGateway>,
    platform: Arc<TelegramPlatform>,
) -> Result<()> {
    let ctx = DebugContext {
        chat_id: msg.chat.id.0,
        chat_kind: chat_kind(&msg.chat),
        chat_title: msg.chat.title().map(str::to_string),
        user_id: get_user_id_safe(&msg),
        username: msg.from.as_ref().and_then(|u| u.username.clone()),
        first_name: msg
            .from
            .as_ref()
            .map(|u| u.first_name.clone())
            .unwrap_or_default(),
    };

    // Live membership checks only make sense for the user's own chat
    let snapshot = gateway.diagnostics(ctx.user_id, msg.chat.is_private()).await;
    let text = platform.view().diagnostics_text(&ctx, &snapshot);
    send_message_resilient(&bot, msg.chat.id, text, None).await?;
    Ok(())
}

/// Handle `/testchannel`.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn test_channel(bot: Bot, msg: Message, platform: Arc<TelegramPlatform>) -> Result<()> {
    let text = match platform.probe_gated_channel().await {
        Ok(probe) => {
            info!(?probe, "Gated channel access test passed");
            GateView::channel_probe_text(&probe)
        }
        Err(e) => {
            warn!("Gated channel access test failed: {e}");
            platform.view().channel_probe_failed(&e.to_string())
        }
    };
    send_message_resilient(&bot, msg.chat.id, text, None).await?;
    Ok(())
}

/// Handle `/clearcache`.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn clear_cache(bot: Bot, msg: Message, gateway: Arc<AccessGateway>) -> Result<()> {
    let removed = gateway.clear_cache().await;
    send_message_resilient(&bot, msg.chat.id, GateView::cache_cleared(removed), None).await?;
    Ok(())
}

/// Handle a pressed recheck button.
///
/// The query is answered before the (slow) recheck so the client stops
/// its spinner.
///
/// # Errors
///
/// Currently infallible; kept fallible to match the other handlers.
pub async fn handle_recheck_callback(
    bot: Bot,
    q: CallbackQuery,
    gateway: Arc<AccessGateway>,
) -> Result<()> {
    let _ = bot.answer_callback_query(q.id.clone()).await;

    let Some(data) = q.data.clone() else {
        return Ok(());
    };
    let Some(chat_id) = q.message.as_ref().map(|m| m.chat().id) else {
        warn!("Callback message missing chat id");
        return Ok(());
    };

    let request = CallbackRequest {
        user_id: q.from.id.0.cast_signed(),
        chat_id: chat_id.0,
        message_id: q.message.as_ref().map(|m| m.id().0),
        data,
    };
    let outcome = gateway.handle_callback(request).await;
    debug!(?outcome, "Callback handled");
    Ok(())
}

/// Register media posted in the content channel.
///
/// # Errors
///
/// Currently infallible; kept fallible to match the other handlers.
pub async fn handle_channel_post(msg: Message, gateway: Arc<AccessGateway>) -> Result<()> {
    let (kind, remote_ref) = extract_media(&msg);
    if let Some(handle) = gateway.publish_post(msg.chat.id.0, kind, remote_ref).await {
        info!(asset_id = %handle.id, "Channel post registered");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn channel_post(media: serde_json::Value) -> Message {
        let mut post = json!({
            "message_id": 10,
            "date": 1,
            "chat": { "id": -100_555, "type": "channel", "title": "Content" }
        });
        if let (Some(post), Some(media)) = (post.as_object_mut(), media.as_object()) {
            post.extend(media.clone());
        }
        serde_json::from_value(post).expect("deserialize channel post")
    }

    #[test]
    fn test_extract_media_picks_largest_photo() {
        let msg = channel_post(json!({
            "photo": [
                { "file_id": "small", "file_unique_id": "s", "width": 90, "height": 90, "file_size": 100 },
                { "file_id": "medium", "file_unique_id": "m", "width": 320, "height": 320, "file_size": 1000 },
                { "file_id": "large", "file_unique_id": "l", "width": 1280, "height": 1280, "file_size": 9000 }
            ]
        }));

        assert_eq!(
            extract_media(&msg),
            (Some(MediaKind::Photo), "large".to_string())
        );
    }

    #[test]
    fn test_extract_media_without_media() {
        let msg = channel_post(json!({ "text": "announcement" }));

        assert_eq!(extract_media(&msg), (None, String::new()));
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(
            Command::parse("/start img12", "gate_bot").ok(),
            Some(Command::Start("img12".to_string()))
        );
        assert_eq!(
            Command::parse("/testchannel", "gate_bot").ok(),
            Some(Command::TestChannel)
        );
        assert_eq!(
            Command::parse("/clearcache", "gate_bot").ok(),
            Some(Command::ClearCache)
        );
        assert!(Command::parse("/unknown", "gate_bot").is_err());
    }
}
