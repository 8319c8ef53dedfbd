//! Membership oracle
//!
//! Resolution order on a cache miss:
//!
//! 1. Primary: up to `attempts` status lookups. Explicit statuses and
//!    non-retryable errors short-circuit; transient errors back off linearly
//!    (`step`, `2*step`, ...) with no wait after the last attempt.
//! 2. Fallback: a silent throwaway DM that is deleted right away, as a
//!    reachability probe, followed by one last status lookup.
//!
//! Every verdict is written back to the store before returning.

use super::cache::MembershipStore;
use super::MembershipStatus;
use crate::config::GateSettings;
use crate::platform::{ChatMemberStatus, MembershipApi, PlatformError};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tracing::{error, info, warn};

/// Attempt budget and backoff step of the primary strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Primary lookups before falling back (at least one is always made)
    pub attempts: usize,
    /// Linear backoff step
    pub step: Duration,
}

impl RetryPolicy {
    /// Build from settings.
    #[must_use]
    pub const fn from_settings(settings: &GateSettings) -> Self {
        Self {
            attempts: settings.membership_primary_attempts,
            step: settings.backoff_step(),
        }
    }

    /// Waits between consecutive attempts: `step, 2*step, ...`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let step = self.step;
        let waits = u32::try_from(self.attempts.saturating_sub(1)).unwrap_or(u32::MAX);
        (1..=waits).map(move |n| step.saturating_mul(n))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&GateSettings::default())
    }
}

/// Which path produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictSource {
    /// Served from the store, no remote calls
    Cache,
    /// Decided by the primary lookup
    Primary {
        /// Lookups made
        attempts: usize,
    },
    /// The bot cannot see the gated channel; denied without retrying
    Misconfigured,
    /// Decided (or given up) by the fallback probe
    Fallback {
        /// Primary lookups made before falling back
        attempts: usize,
        /// Whether the probe DM went through
        reachable: bool,
    },
}

/// Detailed result of one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Raw status; may be `Unknown`
    pub status: MembershipStatus,
    /// Path that produced it
    pub source: VerdictSource,
}

/// Cached, retried, fail-closed membership check for the gated channel.
pub struct MembershipOracle {
    api: Arc<dyn MembershipApi>,
    store: Arc<dyn MembershipStore>,
    policy: RetryPolicy,
    misconfigured: AtomicU64,
}

impl MembershipOracle {
    /// Create an oracle over the given API and verdict store.
    #[must_use]
    pub fn new(
        api: Arc<dyn MembershipApi>,
        store: Arc<dyn MembershipStore>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            api,
            store,
            policy,
            misconfigured: AtomicU64::new(0),
        }
    }

    /// Verdict store backing this oracle.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn MembershipStore> {
        &self.store
    }

    /// Number of lookups denied because the bot could not access the
    /// gated channel. Non-zero means the deployment is misconfigured.
    #[must_use]
    pub fn misconfigured_count(&self) -> u64 {
        self.misconfigured.load(Ordering::Relaxed)
    }

    /// Fail-closed membership status; never `Unknown`.
    pub async fn resolve(&self, user_id: i64) -> MembershipStatus {
        self.verify(user_id).await.status.collapse()
    }

    /// Whether the user may access gated media.
    pub async fn is_member(&self, user_id: i64) -> bool {
        self.resolve(user_id).await.is_member()
    }

    /// Drop the cached verdict so the next check goes remote.
    pub async fn force_refresh(&self, user_id: i64) {
        self.store.invalidate(user_id).await;
        info!(user_id, "Cleared membership cache for user");
    }

    /// Resolve with full detail, consulting the store first.
    pub async fn verify(&self, user_id: i64) -> Verdict {
        if let Some(is_member) = self.store.get(user_id).await {
            return Verdict {
                status: MembershipStatus::from_bool(is_member),
                source: VerdictSource::Cache,
            };
        }

        info!(user_id, "Starting membership check");
        let verdict = self.verify_remote(user_id).await;
        self.store.put(user_id, verdict.status.is_member()).await;
        info!(
            user_id,
            status = ?verdict.status,
            source = ?verdict.source,
            "Membership check finished"
        );
        verdict
    }

    async fn verify_remote(&self, user_id: i64) -> Verdict {
        let attempts = AtomicUsize::new(0);
        let primary = RetryIf::spawn(
            self.policy.delays(),
            || {
                attempts.fetch_add(1, Ordering::Relaxed);
                self.api.get_chat_member_status(user_id)
            },
            |e: &PlatformError| {
                if e.is_transient() {
                    warn!(
                        user_id,
                        attempt = attempts.load(Ordering::Relaxed),
                        error = %e,
                        "Membership lookup failed, retrying"
                    );
                }
                e.is_transient()
            },
        )
        .await;
        let attempts = attempts.into_inner();

        match primary {
            Ok(status) => Verdict {
                status: status_verdict(status),
                source: VerdictSource::Primary { attempts },
            },
            Err(PlatformError::UserNotFound) => {
                error!(user_id, "User not found by the platform");
                Verdict {
                    status: MembershipStatus::NotMember,
                    source: VerdictSource::Primary { attempts },
                }
            }
            Err(PlatformError::NoAccess(reason)) => {
                self.misconfigured.fetch_add(1, Ordering::Relaxed);
                error!(
                    user_id,
                    %reason,
                    "Bot cannot access the gated channel, denying"
                );
                Verdict {
                    status: MembershipStatus::NotMember,
                    source: VerdictSource::Misconfigured,
                }
            }
            Err(PlatformError::Transient(reason)) => {
                warn!(
                    user_id,
                    attempts,
                    %reason,
                    "Primary membership lookup exhausted, trying fallback"
                );
                self.verify_fallback(user_id, attempts).await
            }
        }
    }

    async fn verify_fallback(&self, user_id: i64, attempts: usize) -> Verdict {
        let unreachable = Verdict {
            status: MembershipStatus::Unknown,
            source: VerdictSource::Fallback {
                attempts,
                reachable: false,
            },
        };

        let message_id = match self.api.send_transient_message(user_id).await {
            Ok(id) => id,
            Err(e) => {
                error!(user_id, error = %e, "Fallback probe failed");
                return unreachable;
            }
        };
        if let Err(e) = self.api.delete_message(user_id, message_id).await {
            error!(user_id, error = %e, "Fallback probe cleanup failed");
            return unreachable;
        }

        let status = match self.api.get_chat_member_status(user_id).await {
            Ok(status) => status_verdict(status),
            Err(e) => {
                warn!(user_id, error = %e, "Final membership lookup failed, denying");
                MembershipStatus::Unknown
            }
        };

        Verdict {
            status,
            source: VerdictSource::Fallback {
                attempts,
                reachable: true,
            },
        }
    }
}

const fn status_verdict(status: ChatMemberStatus) -> MembershipStatus {
    MembershipStatus::from_bool(status.grants_access())
}
