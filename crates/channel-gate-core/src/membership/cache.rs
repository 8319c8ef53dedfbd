//! Membership verdict cache
//!
//! Keeps the last verdict per user so repeated clicks within the freshness
//! window do not hit the remote API. Freshness is checked on read against a
//! tokio [`Instant`]; moka only bounds memory.

use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// A cached verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    /// Telegram user ID
    pub user_id: i64,
    /// Cached verdict
    pub is_member: bool,
    /// When the verdict was resolved
    pub observed_at: Instant,
}

impl CacheEntry {
    /// Time since the verdict was resolved.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.observed_at.elapsed()
    }
}

/// Storage for membership verdicts.
///
/// Implementations must be internally synchronized; concurrent calls for
/// different users must not interfere.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Fresh verdict for the user, if any.
    async fn get(&self, user_id: i64) -> Option<bool>;

    /// Insert or overwrite the verdict, stamped with the current time.
    async fn put(&self, user_id: i64, is_member: bool);

    /// Drop the verdict for one user. No-op when absent.
    async fn invalidate(&self, user_id: i64);

    /// Drop every verdict; returns how many were removed.
    async fn clear(&self) -> usize;

    /// Number of stored verdicts, fresh or stale.
    async fn size(&self) -> usize;

    /// Stored entry regardless of freshness.
    async fn peek(&self, user_id: i64) -> Option<CacheEntry>;
}

/// Moka-backed [`MembershipStore`].
#[derive(Clone)]
pub struct MembershipCache {
    /// Moka cache storing `user_id -> entry`
    entries: Cache<i64, CacheEntry>,
    /// Freshness window
    ttl: Duration,
}

impl MembershipCache {
    /// Creates a cache with the given freshness window and capacity.
    ///
    /// # Examples
    ///
    /// ```
    /// use channel_gate_core::membership::MembershipCache;
    ///
    /// let cache = MembershipCache::new(
    ///     30,      // verdicts stay fresh for 30 seconds
    ///     100_000  // max entries
    /// );
    /// ```
    #[must_use]
    pub fn new(ttl_secs: u64, max_capacity: u64) -> Self {
        // No moka expiry: stale verdicts stay visible to `peek` and `size`
        Self {
            entries: Cache::builder().max_capacity(max_capacity).build(),
            ttl: Duration::from_secs(ttl_secs),
        }
    }
}

#[async_trait]
impl MembershipStore for MembershipCache {
    async fn get(&self, user_id: i64) -> Option<bool> {
        let entry = self.entries.get(&user_id).await?;
        if entry.age() >= self.ttl {
            return None;
        }
        debug!(
            user_id,
            is_member = entry.is_member,
            "Using cached membership result"
        );
        Some(entry.is_member)
    }

    async fn put(&self, user_id: i64, is_member: bool) {
        let entry = CacheEntry {
            user_id,
            is_member,
            observed_at: Instant::now(),
        };
        self.entries.insert(user_id, entry).await;
    }

    async fn invalidate(&self, user_id: i64) {
        self.entries.invalidate(&user_id).await;
        debug!(user_id, "Cleared membership cache entry");
    }

    async fn clear(&self) -> usize {
        let keys: Vec<i64> = self.entries.iter().map(|(key, _)| *key).collect();
        for key in &keys {
            self.entries.invalidate(key).await;
        }
        info!("Cleared {} membership cache entries", keys.len());
        keys.len()
    }

    async fn size(&self) -> usize {
        self.entries.iter().count()
    }

    async fn peek(&self, user_id: i64) -> Option<CacheEntry> {
        self.entries.get(&user_id).await
    }
}
