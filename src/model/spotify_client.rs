//! Spotify Web API implementation of [`RemoteMusicService`]

use std::sync::Arc;

use async_trait::async_trait;
use rspotify::{
    http::HttpError,
    model::{
        AlbumId, AlbumType, ArtistId, Market, PlayableId, PlayableItem, RepeatState, SearchResult, SearchType, TrackId,
    },
    prelude::*,
    AuthCodeSpotify, ClientError,
};

use crate::{log_api_request, log_api_result};
use super::service::{RemoteError, RemoteMusicService};
use super::types::{
    ArtistSummary, DeviceInfo, DeviceRef, ItemPage, NowPlaying, PlaybackSnapshot, RepeatMode, TrackRef,
};

impl From<ClientError> for RemoteError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Http(http) => match *http {
                HttpError::StatusCode(response) => {
                    let status = response.status();
                    RemoteError::Service {
                        status: status.as_u16(),
                        message: status.canonical_reason().unwrap_or("Unknown status").to_string(),
                    }
                }
                other => RemoteError::Unexpected(other.to_string()),
            },
            other => RemoteError::Unexpected(other.to_string()),
        }
    }
}

impl From<RepeatMode> for RepeatState {
    fn from(mode: RepeatMode) -> Self {
        match mode {
            RepeatMode::Off => RepeatState::Off,
            RepeatMode::Context => RepeatState::Context,
            RepeatMode::Track => RepeatState::Track,
        }
    }
}

impl From<RepeatState> for RepeatMode {
    fn from(state: RepeatState) -> Self {
        match state {
            RepeatState::Off => RepeatMode::Off,
            RepeatState::Context => RepeatMode::Context,
            RepeatState::Track => RepeatMode::Track,
        }
    }
}

fn bad_id(error: impl std::fmt::Display) -> RemoteError {
    RemoteError::Unexpected(format!("Invalid Spotify id: {}", error))
}

/// rspotify-backed client. Token refresh is handled by rspotify itself.
#[derive(Clone)]
pub struct SpotifyClient {
    client: Arc<AuthCodeSpotify>,
}

impl SpotifyClient {
    pub fn new(client: AuthCodeSpotify) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl RemoteMusicService for SpotifyClient {
    async fn current_user(&self) -> Result<String, RemoteError> {
        log_api_request!("current_user");
        let user = self.client.me().await;
        log_api_result!("current_user", user);
        let user = user?;
        Ok(user.display_name.unwrap_or_else(|| user.id.id().to_string()))
    }

    async fn search_artists(&self, query: &str, limit: u32) -> Result<Vec<ArtistSummary>, RemoteError> {
        log_api_request!("search_artists", query, limit);
        let result = self
            .client
            .search(query, SearchType::Artist, None, None, Some(limit), None)
            .await;
        log_api_result!("search_artists", result);

        let artists = match result? {
            SearchResult::Artists(page) => page
                .items
                .into_iter()
                .map(|artist| ArtistSummary {
                    id: artist.id.id().to_string(),
                    name: artist.name,
                    followers: artist.followers.total,
                    genres: artist.genres,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(artists)
    }

    async fn artist_top_tracks(&self, artist_id: &str) -> Result<Vec<TrackRef>, RemoteError> {
        log_api_request!("artist_top_tracks", artist_id);
        let id = ArtistId::from_id(artist_id).map_err(bad_id)?;
        // FromToken uses the account's country
        let result = self.client.artist_top_tracks(id, Some(Market::FromToken)).await;
        log_api_result!("artist_top_tracks", result);

        Ok(result?
            .into_iter()
            .filter_map(|track| track.id.map(|id| TrackRef::new(id.uri())))
            .collect())
    }

    async fn artist_albums(
        &self,
        artist_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<ItemPage<String>, RemoteError> {
        log_api_request!("artist_albums", artist_id, offset, limit);
        let id = ArtistId::from_id(artist_id).map_err(bad_id)?;
        let result = self
            .client
            .artist_albums_manual(id, None::<AlbumType>, None, Some(limit), Some(offset))
            .await;
        log_api_result!("artist_albums", result);

        let page = result?;
        let next_offset = page.next.as_ref().map(|_| offset + page.items.len() as u32);
        let items = page
            .items
            .into_iter()
            .filter_map(|album| album.id.map(|id| id.id().to_string()))
            .collect();
        Ok(ItemPage { items, next_offset })
    }

    async fn album_tracks(
        &self,
        album_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<ItemPage<TrackRef>, RemoteError> {
        log_api_request!("album_tracks", album_id, offset, limit);
        let id = AlbumId::from_id(album_id).map_err(bad_id)?;
        let result = self
            .client
            .album_track_manual(id, None, Some(limit), Some(offset))
            .await;
        log_api_result!("album_tracks", result);

        let page = result?;
        let next_offset = page.next.as_ref().map(|_| offset + page.items.len() as u32);
        // Local tracks have no id and cannot be queued
        let items = page
            .items
            .into_iter()
            .filter_map(|track| track.id.map(|id| TrackRef::new(id.uri())))
            .collect();
        Ok(ItemPage { items, next_offset })
    }

    async fn devices(&self) -> Result<Vec<DeviceInfo>, RemoteError> {
        log_api_request!("devices");
        let result = self.client.device().await;
        log_api_result!("devices", result);

        let devices: Vec<DeviceInfo> = result?
            .into_iter()
            .filter_map(|d| {
                d.id.map(|id| DeviceInfo {
                    id,
                    name: d.name,
                    is_active: d.is_active,
                })
            })
            .collect();
        tracing::debug!(count = devices.len(), "Found devices");
        Ok(devices)
    }

    async fn current_playback(&self) -> Result<Option<PlaybackSnapshot>, RemoteError> {
        log_api_request!("current_playback");
        let result = self.client.current_playback(None, None::<Vec<_>>).await;
        log_api_result!("current_playback", result);

        Ok(result?.map(|playback| {
            let item = match playback.item {
                Some(PlayableItem::Track(track)) => Some(NowPlaying {
                    id: track.id.map(|id| id.id().to_string()),
                    name: track.name,
                    artists: track.artists.into_iter().map(|a| a.name).collect(),
                }),
                Some(PlayableItem::Episode(episode)) => Some(NowPlaying {
                    id: Some(episode.id.id().to_string()),
                    name: episode.name,
                    artists: vec![episode.show.name],
                }),
                _ => None,
            };
            tracing::trace!(
                is_playing = playback.is_playing,
                repeat = ?RepeatMode::from(playback.repeat_state),
                shuffle = playback.shuffle_state,
                device = %playback.device.name,
                "Got playback state"
            );
            PlaybackSnapshot {
                is_playing: playback.is_playing,
                item,
            }
        }))
    }

    async fn start_playback(&self, device: &DeviceRef, tracks: &[TrackRef]) -> Result<(), RemoteError> {
        log_api_request!("start_playback", device_id = %device, count = tracks.len());
        let ids = tracks
            .iter()
            .map(|track| TrackId::from_uri(track.as_str()).map(PlayableId::Track))
            .collect::<Result<Vec<_>, _>>()
            .map_err(bad_id)?;

        let result = self
            .client
            .start_uris_playback(ids, Some(device.as_str()), None, None)
            .await;
        log_api_result!("start_playback", result);
        Ok(result?)
    }

    async fn set_repeat(&self, device: &DeviceRef, mode: RepeatMode) -> Result<(), RemoteError> {
        log_api_request!("set_repeat", device_id = %device, mode = ?mode);
        let result = self.client.repeat(mode.into(), Some(device.as_str())).await;
        log_api_result!("set_repeat", result);
        Ok(result?)
    }

    async fn set_shuffle(&self, device: &DeviceRef, enabled: bool) -> Result<(), RemoteError> {
        log_api_request!("set_shuffle", device_id = %device, enabled);
        let result = self.client.shuffle(enabled, Some(device.as_str())).await;
        log_api_result!("set_shuffle", result);
        Ok(result?)
    }
}
