use std::fs;

use anyhow::{Context, Result};
use rspotify::{prelude::*, AuthCodeSpotify, Config, Credentials, OAuth};

use crate::config::AppConfig;

pub const SCOPES: &str = "user-read-playback-state user-modify-playback-state user-read-currently-playing";

/// Build an authorised rspotify client.
///
/// A cached token is reused (and refreshed if expired); otherwise the
/// authorize URL is opened in the browser and the redirect URL is read from
/// the terminal.
pub async fn authorize(config: &AppConfig) -> Result<AuthCodeSpotify> {
    if let Some(parent) = config.token_cache_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create token cache directory {}", parent.display()))?;
        }
    }

    let credentials = Credentials::new(&config.client_id, &config.client_secret);
    let oauth = OAuth {
        redirect_uri: config.redirect_uri.clone(),
        scopes: SCOPES.split_whitespace().map(|s| s.to_string()).collect(),
        ..Default::default()
    };
    let spotify = AuthCodeSpotify::with_config(
        credentials,
        oauth,
        Config {
            token_cached: true,
            token_refreshing: true,
            cache_path: config.token_cache_path.clone(),
            ..Default::default()
        },
    );
    tracing::debug!(cache = %config.token_cache_path.display(), "rspotify client initialized");

    let url = spotify.get_authorize_url(false)?;
    spotify
        .prompt_for_token(&url)
        .await
        .context("Spotify authorization failed")?;
    tracing::info!("Spotify authorization completed");

    Ok(spotify)
}
