use super::AccessGateway;
use crate::membership::{CacheEntry, MembershipStatus};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Result of a live membership check made for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveCheck {
    /// Fail-closed status
    pub status: MembershipStatus,
    /// Wall time the check took, including retries
    pub elapsed: Duration,
}

/// Snapshot of the gateway's state for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    /// Registered assets
    pub registry_size: usize,
    /// Stored membership verdicts, fresh or stale
    pub cache_size: usize,
    /// Lookups denied because the bot cannot see the gated channel
    pub misconfigured_lookups: u64,
    /// Live check for the requesting user, when asked for
    pub live_check: Option<LiveCheck>,
    /// Stored verdict for the requesting user
    pub cached: Option<CacheEntry>,
}

impl AccessGateway {
    /// Collect a diagnostics snapshot for `user_id`.
    ///
    /// With `live_check` the user's membership is resolved first (through
    /// the cache), so `cached` reflects the verdict it produced.
    pub async fn diagnostics(&self, user_id: i64, live_check: bool) -> Diagnostics {
        let live_check = if live_check {
            let started = Instant::now();
            let status = self.oracle.resolve(user_id).await;
            Some(LiveCheck {
                status,
                elapsed: started.elapsed(),
            })
        } else {
            None
        };

        let store = self.oracle.store();
        Diagnostics {
            registry_size: self.registry.size().await,
            cache_size: store.size().await,
            misconfigured_lookups: self.oracle.misconfigured_count(),
            live_check,
            cached: store.peek(user_id).await,
        }
    }

    /// Drop every cached membership verdict; returns how many were removed.
    pub async fn clear_cache(&self) -> usize {
        let removed = self.oracle.store().clear().await;
        info!(removed, "Membership cache cleared by operator");
        removed
    }
}
