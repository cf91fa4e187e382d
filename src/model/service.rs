//! Capability interface over the remote music service

use async_trait::async_trait;
use thiserror::Error;

use super::types::{
    ArtistSummary, DeviceInfo, DeviceRef, ItemPage, PlaybackSnapshot, RepeatMode, TrackRef,
};

/// Failure reported by a [`RemoteMusicService`] call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The service answered with a recognised error status
    /// (rate limiting, expired auth, no active device, ...)
    #[error("Spotify API error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Anything else: transport faults, malformed responses, bad ids
    #[error("{0}")]
    Unexpected(String),
}

impl RemoteError {
    pub fn is_service_error(&self) -> bool {
        matches!(self, Self::Service { .. })
    }

    /// Human readable text for the console
    pub fn describe(&self) -> String {
        match self {
            Self::Service { status: 404, .. } => {
                "No active device found. Start playing on Spotify and try again.".to_string()
            }
            Self::Service { status: 403, .. } => {
                "Action forbidden. Check your Spotify Premium status.".to_string()
            }
            Self::Service { status: 401, .. } => {
                "Authentication expired. Please restart the app.".to_string()
            }
            Self::Service { status: 429, .. } => "Rate limited. Please wait a moment.".to_string(),
            other => other.to_string(),
        }
    }
}

/// The subset of the Spotify Web API this program relies on.
///
/// Every call is awaited on its own; implementations are free to refresh
/// tokens internally but must not retry, retry policy lives in the
/// playback supervisor.
#[async_trait]
pub trait RemoteMusicService: Send + Sync {
    /// Display name of the authorised user
    async fn current_user(&self) -> Result<String, RemoteError>;

    async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<ArtistSummary>, RemoteError>;

    async fn artist_top_tracks(&self, artist_id: &str) -> Result<Vec<TrackRef>, RemoteError>;

    async fn artist_albums(
        &self,
        artist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<ItemPage<String>, RemoteError>;

    async fn album_tracks(
        &self,
        album_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<ItemPage<TrackRef>, RemoteError>;

    async fn devices(&self) -> Result<Vec<DeviceInfo>, RemoteError>;

    /// `None` when nothing is loaded on any device
    async fn current_playback(&self) -> Result<Option<PlaybackSnapshot>, RemoteError>;

    async fn start_playback(&self, device: &DeviceRef, tracks: &[TrackRef]) -> Result<(), RemoteError>;

    async fn set_repeat(&self, device: &DeviceRef, mode: RepeatMode) -> Result<(), RemoteError>;

    async fn set_shuffle(&self, device: &DeviceRef, enabled: bool) -> Result<(), RemoteError>;
}
