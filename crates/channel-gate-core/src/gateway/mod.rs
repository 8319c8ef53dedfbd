//! Access gateway
//!
//! Turns deep-link clicks and recheck buttons into membership checks and
//! media deliveries. No per-user state is kept: every invocation is driven
//! by the payload the user acted on, so a user can cycle between the
//! challenge and a recheck indefinitely.

/// Operator diagnostics.
pub mod diagnostics;

pub use diagnostics::{Diagnostics, LiveCheck};

use crate::config::GateSettings;
use crate::link::{deep_link, parse_start_payload, CallbackAction, StartPayload};
use crate::membership::MembershipOracle;
use crate::platform::{DeliveryApi, Notice};
use crate::registry::{AssetHandle, AssetId, MediaKind, MediaStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How an access request was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    /// Fresh deep-link click
    Initial,
    /// "I joined, check again"
    Recheck,
    /// "Force refresh"
    ForceRecheck,
}

/// Result of one gateway invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    /// Plain `/start`, greeting shown
    Welcome,
    /// Media sent
    Delivered(AssetId),
    /// Membership not confirmed; recheck actions offered
    Challenged(AssetId),
    /// Forced recheck failed; only support is offered
    Exhausted(AssetId),
    /// Asset unknown or lost on restart
    NotFound,
    /// Verified, but sending the media failed
    DeliveryFailed(AssetId),
    /// Callback data that does not belong to the gateway
    Ignored,
}

/// A pressed inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRequest {
    /// User who pressed the button
    pub user_id: i64,
    /// Chat the button lives in
    pub chat_id: i64,
    /// Message carrying the button, if still accessible
    pub message_id: Option<i32>,
    /// Raw callback data
    pub data: String,
}

/// Orchestrates membership checks and deliveries.
pub struct AccessGateway {
    oracle: Arc<MembershipOracle>,
    registry: Arc<dyn MediaStore>,
    delivery: Arc<dyn DeliveryApi>,
    settings: Arc<GateSettings>,
}

impl AccessGateway {
    /// Create a gateway.
    #[must_use]
    pub fn new(
        oracle: Arc<MembershipOracle>,
        registry: Arc<dyn MediaStore>,
        delivery: Arc<dyn DeliveryApi>,
        settings: Arc<GateSettings>,
    ) -> Self {
        Self {
            oracle,
            registry,
            delivery,
            settings,
        }
    }

    /// Handle `/start` with its (possibly empty) payload.
    pub async fn handle_start(&self, user_id: i64, chat_id: i64, payload: &str) -> AccessOutcome {
        match parse_start_payload(payload) {
            StartPayload::Greeting => {
                self.notify(chat_id, Notice::Welcome).await;
                AccessOutcome::Welcome
            }
            StartPayload::Malformed(raw) => {
                info!(user_id, payload = %raw, "Malformed media request");
                self.notify(chat_id, Notice::NotFound).await;
                AccessOutcome::NotFound
            }
            StartPayload::Asset(asset_id) => self.request_asset(user_id, chat_id, asset_id).await,
        }
    }

    async fn request_asset(&self, user_id: i64, chat_id: i64, asset_id: AssetId) -> AccessOutcome {
        info!(user_id, %asset_id, "Media request");

        // A fresh click always wants a true recheck, not a stale verdict
        self.oracle.force_refresh(user_id).await;
        if self.oracle.is_member(user_id).await {
            info!(user_id, "User verified as member, sending content");
            return self.deliver(chat_id, asset_id).await;
        }

        self.notify(
            chat_id,
            Notice::Challenge {
                asset_id,
                after: AttemptKind::Initial,
            },
        )
        .await;
        AccessOutcome::Challenged(asset_id)
    }

    /// Handle a pressed recheck button.
    pub async fn handle_callback(&self, request: CallbackRequest) -> AccessOutcome {
        let Some(action) = CallbackAction::parse(&request.data) else {
            debug!(data = %request.data, "Ignoring foreign callback data");
            return AccessOutcome::Ignored;
        };
        let attempt = action.attempt();
        let asset_id = action.asset_id();
        let user_id = request.user_id;

        info!(user_id, %asset_id, ?attempt, "Rechecking membership");
        self.show(&request, Notice::Checking { attempt }).await;

        // Let the platform propagate a fresh join before asking again
        tokio::time::sleep(self.grace_period(attempt)).await;
        self.oracle.force_refresh(user_id).await;

        if self.oracle.is_member(user_id).await {
            self.show(&request, Notice::Verified { attempt }).await;
            return self.deliver(request.chat_id, asset_id).await;
        }

        if attempt == AttemptKind::ForceRecheck {
            self.show(&request, Notice::Exhausted { asset_id, user_id })
                .await;
            AccessOutcome::Exhausted(asset_id)
        } else {
            self.show(
                &request,
                Notice::Challenge {
                    asset_id,
                    after: attempt,
                },
            )
            .await;
            AccessOutcome::Challenged(asset_id)
        }
    }

    /// Send a registered asset to `chat_id`.
    pub async fn deliver(&self, chat_id: i64, asset_id: AssetId) -> AccessOutcome {
        let Some(handle) = self.registry.lookup(asset_id).await else {
            info!(%asset_id, "Content not found");
            self.notify(chat_id, Notice::NotFound).await;
            return AccessOutcome::NotFound;
        };

        match self
            .delivery
            .send_media(chat_id, handle.kind, &handle.remote_ref)
            .await
        {
            Ok(()) => {
                info!(%asset_id, kind = handle.kind.as_str(), chat_id, "Sent media");
                AccessOutcome::Delivered(asset_id)
            }
            Err(e) => {
                error!(%asset_id, chat_id, error = %e, "Error sending media");
                self.notify(chat_id, Notice::DeliveryFailed).await;
                AccessOutcome::DeliveryFailed(asset_id)
            }
        }
    }

    /// Register a channel post and announce its deep link back to the
    /// channel. Posts from other chats or without media are ignored.
    pub async fn publish_post(
        &self,
        channel_id: i64,
        kind: Option<MediaKind>,
        remote_ref: String,
    ) -> Option<AssetHandle> {
        let handle = self.registry.ingest(channel_id, kind, remote_ref).await?;
        let link = deep_link(
            &self.settings.link_host,
            &self.settings.bot_username,
            handle.id,
        );
        info!(asset_id = %handle.id, %link, "Generated link");

        let issued_at = chrono::Local::now().format("%H:%M:%S").to_string();
        self.notify(
            channel_id,
            Notice::LinkIssued {
                handle: handle.clone(),
                link,
                issued_at,
            },
        )
        .await;
        Some(handle)
    }

    fn grace_period(&self, attempt: AttemptKind) -> Duration {
        match attempt {
            AttemptKind::ForceRecheck => self.settings.force_recheck_grace(),
            AttemptKind::Initial | AttemptKind::Recheck => self.settings.recheck_grace(),
        }
    }

    async fn notify(&self, chat_id: i64, notice: Notice) {
        if let Err(e) = self.delivery.send_notice(chat_id, notice).await {
            warn!(chat_id, error = %e, "Failed to send notice");
        }
    }

    /// Edit the button's message in place, or send a new one when the
    /// original is gone.
    async fn show(&self, request: &CallbackRequest, notice: Notice) {
        if let Some(message_id) = request.message_id {
            match self
                .delivery
                .edit_notice(request.chat_id, message_id, notice.clone())
                .await
            {
                Ok(()) => return,
                Err(e) => {
                    warn!(chat_id = request.chat_id, error = %e, "Edit failed, sending new message");
                }
            }
        }
        self.notify(request.chat_id, notice).await;
    }
}
