//! Scripted in-memory `RemoteMusicService` used by the unit tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::service::{RemoteError, RemoteMusicService};
use super::types::{
    ArtistSummary, DeviceInfo, DeviceRef, ItemPage, NowPlaying, PlaybackSnapshot, RepeatMode, TrackRef,
};

/// A remote call as seen by the fake
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Search(String),
    TopTracks(String),
    Albums { offset: u32, limit: u32 },
    AlbumTracks { album: String, offset: u32, limit: u32 },
    Devices,
    CurrentPlayback,
    Start { device: String, tracks: Vec<TrackRef> },
    Repeat(RepeatMode),
    Shuffle(bool),
}

impl Call {
    pub fn is_command(&self) -> bool {
        matches!(self, Call::Start { .. } | Call::Repeat(_) | Call::Shuffle(_))
    }
}

type PlaybackResult = Result<Option<PlaybackSnapshot>, RemoteError>;
type InterruptHook = (fn(&Call) -> bool, CancellationToken);

#[derive(Default)]
pub struct FakeService {
    pub artists: Vec<ArtistSummary>,
    pub top_tracks: Vec<TrackRef>,
    pub albums: Vec<(String, Vec<TrackRef>)>,
    pub devices: Vec<DeviceInfo>,
    pub fail_album_tracks: bool,
    playback_script: Mutex<VecDeque<PlaybackResult>>,
    playback_fallback: Mutex<Option<PlaybackResult>>,
    start_failures: Mutex<usize>,
    interrupt: Mutex<Option<InterruptHook>>,
    calls: Mutex<Vec<Call>>,
}

pub fn tracks(ids: &[&str]) -> Vec<TrackRef> {
    ids.iter().map(|id| TrackRef::new(format!("spotify:track:{}", id))).collect()
}

pub fn playing(id: &str) -> PlaybackResult {
    Ok(Some(PlaybackSnapshot {
        is_playing: true,
        item: Some(NowPlaying {
            id: Some(id.to_string()),
            name: format!("Song {}", id),
            artists: vec!["Test Artist".to_string()],
        }),
    }))
}

pub fn paused(id: &str) -> PlaybackResult {
    Ok(Some(PlaybackSnapshot {
        is_playing: false,
        item: Some(NowPlaying {
            id: Some(id.to_string()),
            name: format!("Song {}", id),
            artists: vec!["Test Artist".to_string()],
        }),
    }))
}

pub fn absent() -> PlaybackResult {
    Ok(None)
}

pub fn rate_limited() -> PlaybackResult {
    Err(RemoteError::Service { status: 429, message: "Too Many Requests".to_string() })
}

pub fn transport_failure() -> PlaybackResult {
    Err(RemoteError::Unexpected("connection reset by peer".to_string()))
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue playback snapshots returned by successive polls
    pub fn script_playback(&self, responses: impl IntoIterator<Item = PlaybackResult>) {
        self.playback_script.lock().unwrap().extend(responses);
    }

    /// Response once the script runs out (defaults to "nothing loaded")
    pub fn set_playback_fallback(&self, response: PlaybackResult) {
        *self.playback_fallback.lock().unwrap() = Some(response);
    }

    pub fn fail_next_starts(&self, count: usize) {
        *self.start_failures.lock().unwrap() = count;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_command).collect()
    }

    /// Cancel `token` while the first call matching `trigger` is in flight.
    /// The call still completes normally once polled again.
    pub fn interrupt_on(&self, trigger: fn(&Call) -> bool, token: CancellationToken) {
        *self.interrupt.lock().unwrap() = Some((trigger, token));
    }

    async fn record(&self, call: Call) {
        let fired = {
            let mut hook = self.interrupt.lock().unwrap();
            if hook.as_ref().is_some_and(|(trigger, _)| trigger(&call)) {
                hook.take().map(|(_, token)| token)
            } else {
                None
            }
        };
        self.calls.lock().unwrap().push(call);
        if let Some(token) = fired {
            token.cancel();
            tokio::task::yield_now().await;
        }
    }
}

fn page<T: Clone>(all: &[T], offset: u32, limit: u32) -> ItemPage<T> {
    let start = (offset as usize).min(all.len());
    let end = (start + limit as usize).min(all.len());
    ItemPage {
        items: all[start..end].to_vec(),
        next_offset: (end < all.len()).then_some(end as u32),
    }
}

#[async_trait]
impl RemoteMusicService for FakeService {
    async fn current_user(&self) -> Result<String, RemoteError> {
        Ok("tester".to_string())
    }

    async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<ArtistSummary>, RemoteError> {
        self.record(Call::Search(query.to_string())).await;
        Ok(self.artists.iter().take(limit as usize).cloned().collect())
    }

    async fn artist_top_tracks(&self, artist_id: &str) -> Result<Vec<TrackRef>, RemoteError> {
        self.record(Call::TopTracks(artist_id.to_string())).await;
        Ok(self.top_tracks.clone())
    }

    async fn artist_albums(
        &self,
        _artist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<ItemPage<String>, RemoteError> {
        self.record(Call::Albums { offset, limit }).await;
        let ids: Vec<String> = self.albums.iter().map(|(id, _)| id.clone()).collect();
        Ok(page(&ids, offset, limit))
    }

    async fn album_tracks(
        &self,
        album_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<ItemPage<TrackRef>, RemoteError> {
        self.record(Call::AlbumTracks { album: album_id.to_string(), offset, limit }).await;
        if self.fail_album_tracks {
            return Err(RemoteError::Service { status: 502, message: "Bad Gateway".to_string() });
        }
        let tracks = self
            .albums
            .iter()
            .find(|(id, _)| id == album_id)
            .map(|(_, tracks)| tracks.clone())
            .unwrap_or_default();
        Ok(page(&tracks, offset, limit))
    }

    async fn devices(&self) -> Result<Vec<DeviceInfo>, RemoteError> {
        self.record(Call::Devices).await;
        Ok(self.devices.clone())
    }

    async fn current_playback(&self) -> Result<Option<PlaybackSnapshot>, RemoteError> {
        self.record(Call::CurrentPlayback).await;
        let scripted = self.playback_script.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => self.playback_fallback.lock().unwrap().clone().unwrap_or(Ok(None)),
        }
    }

    async fn start_playback(&self, device: &DeviceRef, tracks: &[TrackRef]) -> Result<(), RemoteError> {
        self.record(Call::Start { device: device.to_string(), tracks: tracks.to_vec() }).await;
        let mut failures = self.start_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(RemoteError::Service { status: 404, message: "Not Found".to_string() });
        }
        Ok(())
    }

    async fn set_repeat(&self, _device: &DeviceRef, mode: RepeatMode) -> Result<(), RemoteError> {
        self.record(Call::Repeat(mode)).await;
        Ok(())
    }

    async fn set_shuffle(&self, _device: &DeviceRef, enabled: bool) -> Result<(), RemoteError> {
        self.record(Call::Shuffle(enabled)).await;
        Ok(())
    }
}
