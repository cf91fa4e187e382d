//! Core type definitions shared by the resolver and the supervisor

use std::collections::HashSet;
use std::fmt;

use rand::seq::SliceRandom;
use rand::thread_rng;

/// Opaque identifier of a playable track (a `spotify:track:...` URI)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TrackRef(String);

impl TrackRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, duplicate-free set of tracks built once per session.
///
/// The first occurrence of an identifier wins. The set is read-only once
/// built; restarts shuffle a working copy via [`TrackSet::shuffled_batch`].
#[derive(Clone, Debug, Default)]
pub struct TrackSet {
    tracks: Vec<TrackRef>,
}

impl TrackSet {
    pub fn from_refs<I>(refs: I) -> Self
    where
        I: IntoIterator<Item = TrackRef>,
    {
        let mut seen = HashSet::new();
        let tracks = refs
            .into_iter()
            .filter(|track| seen.insert(track.clone()))
            .collect();
        Self { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn as_slice(&self) -> &[TrackRef] {
        &self.tracks
    }

    /// Independent random permutation of the whole set, cut to `limit` entries
    pub fn shuffled_batch(&self, limit: usize) -> Vec<TrackRef> {
        let mut working = self.tracks.clone();
        working.shuffle(&mut thread_rng());
        working.truncate(limit);
        working
    }
}

/// Identifier of the remote output device chosen at session start
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceRef(String);

impl DeviceRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An artist search hit
#[derive(Clone, Debug)]
pub struct ArtistSummary {
    pub id: String,
    pub name: String,
    pub followers: u32,
    pub genres: Vec<String>,
}

/// Information about a Spotify playback device
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}

/// Repeat mode state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepeatMode {
    Off,
    Context,
    Track,
}

/// One page of a paginated listing
#[derive(Clone, Debug)]
pub struct ItemPage<T> {
    pub items: Vec<T>,
    /// Offset of the following page, `None` on the last page
    pub next_offset: Option<u32>,
}

/// The item reported as currently loaded on the remote player
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NowPlaying {
    pub id: Option<String>,
    pub name: String,
    pub artists: Vec<String>,
}

impl NowPlaying {
    /// Key used for change detection. Items without an id (local files)
    /// fall back to their name.
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }

    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }
}

/// Raw remote playback snapshot
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub item: Option<NowPlaying>,
}

/// Classified playback state for one poll
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlaybackObservation {
    Playing(NowPlaying),
    Paused,
    Absent,
}

impl PlaybackObservation {
    pub fn classify(snapshot: Option<&PlaybackSnapshot>) -> Self {
        match snapshot {
            Some(PlaybackSnapshot {
                is_playing: true,
                item: Some(item),
            }) => Self::Playing(item.clone()),
            Some(PlaybackSnapshot { item: Some(_), .. }) => Self::Paused,
            _ => Self::Absent,
        }
    }
}
