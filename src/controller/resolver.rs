//! Catalog resolution: artist id -> deduplicated track set

use crate::model::{RemoteError, RemoteMusicService, TrackRef, TrackSet};

/// Collect the artist's top tracks followed by every track of every album
/// credited to the artist, in encounter order.
///
/// Failures are returned as-is; resolution is a one-shot step and is never
/// retried.
pub async fn resolve_tracks(
    service: &dyn RemoteMusicService,
    artist_id: &str,
    album_page_size: u32,
) -> Result<TrackSet, RemoteError> {
    let mut collected = service.artist_top_tracks(artist_id).await?;
    let top_count = collected.len();

    let album_ids = artist_album_ids(service, artist_id, album_page_size).await?;
    for album_id in &album_ids {
        collected.extend(album_tracks(service, album_id, album_page_size).await?);
    }

    let set = TrackSet::from_refs(collected);
    tracing::info!(
        artist_id,
        top_tracks = top_count,
        albums = album_ids.len(),
        unique_tracks = set.len(),
        "Resolved artist catalog"
    );
    Ok(set)
}

async fn artist_album_ids(
    service: &dyn RemoteMusicService,
    artist_id: &str,
    page_size: u32,
) -> Result<Vec<String>, RemoteError> {
    let mut ids = Vec::new();
    let mut offset = 0;
    loop {
        let page = service.artist_albums(artist_id, offset, page_size).await?;
        ids.extend(page.items);
        match page.next_offset {
            Some(next) if next > offset => offset = next,
            _ => break,
        }
    }
    Ok(ids)
}

async fn album_tracks(
    service: &dyn RemoteMusicService,
    album_id: &str,
    page_size: u32,
) -> Result<Vec<TrackRef>, RemoteError> {
    let mut tracks = Vec::new();
    let mut offset = 0;
    loop {
        let page = service.album_tracks(album_id, offset, page_size).await?;
        tracks.extend(page.items);
        match page.next_offset {
            Some(next) if next > offset => offset = next,
            _ => break,
        }
    }
    Ok(tracks)
}
