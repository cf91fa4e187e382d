//! Model module - data types and the remote service boundary
//!
//! - `types`: track/device identifiers, playback snapshots and their classification
//! - `service`: the `RemoteMusicService` capability and its error type
//! - `spotify_client`: rspotify-backed implementation of the capability

mod types;
mod service;
mod spotify_client;

#[cfg(test)]
pub(crate) mod fake;

pub use types::{
    ArtistSummary, DeviceInfo, DeviceRef, ItemPage, NowPlaying, PlaybackObservation,
    PlaybackSnapshot, RepeatMode, TrackRef, TrackSet,
};

pub use service::{RemoteError, RemoteMusicService};

pub use spotify_client::SpotifyClient;
