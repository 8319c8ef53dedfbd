//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Network failures and flood-control responses are retried with exponential
//! backoff and jitter. API errors are returned as-is so the caller can
//! classify them.
//!
//! # Usage
//!
//! ```ignore
//! use channel_gate_transport_telegram::bot::resilient::send_message_resilient;
//!
//! let msg = send_message_resilient(&bot, chat_id, "Hello!", None).await?;
//! ```

use crate::config::{
    TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
};
use std::future::Future;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, Message, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

/// Whether a failed Bot API call is worth repeating.
#[must_use]
pub const fn is_retryable(error: &RequestError) -> bool {
    matches!(
        error,
        RequestError::Network(_) | RequestError::RetryAfter(_) | RequestError::Io(_)
    )
}

/// Retry a Telegram API operation with exponential backoff.
///
/// - Initial delay: 500ms
/// - Max delay: 4s
/// - Max retries: 3 (constants in `config.rs`)
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-retryable error.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter) // Add jitter to prevent thundering herd
        .take(TELEGRAM_API_MAX_RETRIES);

    RetryIf::spawn(retry_strategy, operation, is_retryable)
        .await
        .map_err(|e| {
            warn!("Telegram API operation failed: {e}");
            e
        })
}

/// Send an HTML message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the Bot API error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<Message, RequestError> {
    let text = text.into();
    retry_telegram_operation(|| async {
        let mut req = bot
            .send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = keyboard.clone() {
            req = req.reply_markup(markup);
        }
        req.await
    })
    .await
}

/// Edit an HTML message with automatic retry on network failures.
///
/// Returns `Ok(None)` when Telegram reports the message as not modified.
///
/// # Errors
///
/// Returns the Bot API error after all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: impl Into<String>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<Option<Message>, RequestError> {
    let text = text.into();
    let edited = retry_telegram_operation(|| async {
        let mut req = bot
            .edit_message_text(chat_id, msg_id, text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(markup) = keyboard.clone() {
            req = req.reply_markup(markup);
        }
        req.await
    })
    .await;

    match edited {
        Ok(msg) => Ok(Some(msg)),
        Err(RequestError::Api(ApiError::MessageNotModified)) => {
            debug!("Message update skipped: message is not modified");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
