mod auth;
mod config;
mod controller;
mod logging;
mod model;

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;

use config::AppConfig;
use controller::{spawn_interrupt_listener, spawn_stdin_reader, Session, TokioScheduler};
use model::{RemoteMusicService, SpotifyClient};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = logging::init_logging() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== Spotify Continuous Player Starting ===");

    let rule = "=".repeat(60);
    println!("{}\nSpotify Continuous Player\n{}\n", rule, rule);

    // Step 1: Configuration
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Configuration invalid");
            println!("Error: Spotify API credentials not configured.");
            println!("{}", e);
            println!(
                "Set {} and {} or add them to {}.",
                config::CLIENT_ID_ENV,
                config::CLIENT_SECRET_ENV,
                config::DEFAULT_CONFIG_FILE
            );
            return ExitCode::FAILURE;
        }
    };

    // Step 2: Authenticate with rspotify
    let spotify = match auth::authorize(&config).await {
        Ok(client) => SpotifyClient::new(client),
        Err(e) => {
            tracing::error!(error = ?e, "Spotify authorization failed");
            println!("Failed to connect to Spotify: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match spotify.current_user().await {
        Ok(user) => {
            tracing::info!(user = %user, "rspotify authorized successfully");
            println!("Connected to Spotify successfully.");
        }
        Err(e) => {
            tracing::error!(error = %e, "rspotify authentication failed");
            println!("Failed to connect to Spotify: {}", e.describe());
            return ExitCode::FAILURE;
        }
    }

    // Step 3: Interactive session, stopped by Ctrl+C
    let token = CancellationToken::new();
    spawn_interrupt_listener(token.clone());
    let scheduler = TokioScheduler::new(token);

    let mut session = Session::new(&spotify, &scheduler, config.session_settings(), spawn_stdin_reader());
    let code = match session.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = ?e, "Session ended with an error");
            println!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    };

    tracing::info!("Spotify Continuous Player shutting down");
    code
}
