#![deny(missing_docs)]
//! Telegram transport adapter for Channel Gate.

/// Telegram-specific bot implementation.
pub mod bot;
/// Telegram transport configuration.
pub mod config;
/// Platform trait implementations over the Bot API.
pub mod platform;
/// Telegram runtime entrypoint.
pub mod runner;
