//! Media handle registry
//!
//! Maps short sequential ids to the platform references of media posted in
//! the content channel. In-memory only: a restart forgets every asset and
//! every previously issued link.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Opaque registry key carried in deep links.
///
/// Always a positive decimal without leading zeros, so `img01` does not
/// resolve to the asset behind `img1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(u64);

/// Rejected asset id text
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid asset id: {0:?}")]
pub struct InvalidAssetId(pub String);

impl AssetId {
    /// Wrap a raw id. Zero is never assigned and is rejected.
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AssetId {
    type Err = InvalidAssetId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = !s.is_empty()
            && !s.starts_with('0')
            && s.bytes().all(|b| b.is_ascii_digit());
        if !canonical {
            return Err(InvalidAssetId(s.to_string()));
        }
        s.parse::<u64>()
            .ok()
            .and_then(Self::new)
            .ok_or_else(|| InvalidAssetId(s.to_string()))
    }
}

/// Kind of registered media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Still image
    Photo,
    /// Video clip
    Video,
}

impl MediaKind {
    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }
}

/// A registered asset. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHandle {
    /// Registry key
    pub id: AssetId,
    /// Media kind
    pub kind: MediaKind,
    /// Platform reference used to re-send the media; never interpreted here
    pub remote_ref: String,
}

/// Storage for asset handles.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Register a new asset and return its handle with the next sequential id.
    async fn register(&self, kind: MediaKind, remote_ref: String) -> AssetHandle;

    /// Register a channel post if it comes from the content channel and
    /// carries supported media. Anything else is ignored.
    async fn ingest(
        &self,
        channel_id: i64,
        kind: Option<MediaKind>,
        remote_ref: String,
    ) -> Option<AssetHandle>;

    /// Look up an asset by id.
    async fn lookup(&self, id: AssetId) -> Option<AssetHandle>;

    /// Number of registered assets.
    async fn size(&self) -> usize;
}

/// In-memory, append-only registry.
pub struct MediaRegistry {
    content_channel_id: i64,
    assets: RwLock<Vec<AssetHandle>>,
}

impl MediaRegistry {
    /// Create an empty registry accepting posts from `content_channel_id`.
    #[must_use]
    pub fn new(content_channel_id: i64) -> Self {
        Self {
            content_channel_id,
            assets: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MediaStore for MediaRegistry {
    async fn register(&self, kind: MediaKind, remote_ref: String) -> AssetHandle {
        let mut assets = self.assets.write().await;
        // Ids are positions + 1, assigned under the write lock
        let next = assets.len() as u64 + 1;
        let handle = AssetHandle {
            id: AssetId(next),
            kind,
            remote_ref,
        };
        assets.push(handle.clone());
        info!(asset_id = %handle.id, kind = kind.as_str(), "Registered media");
        handle
    }

    async fn ingest(
        &self,
        channel_id: i64,
        kind: Option<MediaKind>,
        remote_ref: String,
    ) -> Option<AssetHandle> {
        if channel_id != self.content_channel_id {
            warn!(channel_id, "Received media from unexpected chat, ignoring");
            return None;
        }
        let Some(kind) = kind else {
            warn!(channel_id, "Received unsupported post type, ignoring");
            return None;
        };
        Some(self.register(kind, remote_ref).await)
    }

    async fn lookup(&self, id: AssetId) -> Option<AssetHandle> {
        let index = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.assets.read().await.get(index).cloned()
    }

    async fn size(&self) -> usize {
        self.assets.read().await.len()
    }
}
