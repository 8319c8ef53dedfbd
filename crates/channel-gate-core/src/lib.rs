#![deny(missing_docs)]
//! Channel Gate core library.
//!
//! Membership verification, media registry and access orchestration for a
//! bot that releases media only to members of a gated channel.

/// Configuration management.
pub mod config;
/// Access orchestration for deep links and recheck buttons.
pub mod gateway;
/// Deep-link and callback payload codecs.
pub mod link;
/// Membership oracle and its cache.
pub mod membership;
/// Narrow interfaces onto the messaging platform.
pub mod platform;
/// Media handle registry.
pub mod registry;

#[cfg(test)]
pub mod testing;
