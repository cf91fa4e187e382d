//! Playback supervisor
//!
//! Polls the remote player, prints track changes and restarts playback with
//! a fresh shuffle whenever the player reports it is paused or idle. Remote
//! failures are absorbed with a longer back-off until too many happen in a
//! row.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::model::{
    DeviceRef, NowPlaying, PlaybackObservation, RemoteError, RemoteMusicService, RepeatMode, TrackSet,
};
use super::scheduler::Scheduler;

/// Largest batch the start-playback endpoint accepts
pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub max_consecutive_errors: u32,
    pub batch_size: usize,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            error_backoff: Duration::from_secs(60),
            max_consecutive_errors: 5,
            batch_size: MAX_BATCH_SIZE,
        }
    }
}

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("cannot supervise an empty track set")]
    EmptyTrackSet,

    #[error("initial playback start failed: {0}")]
    StartFailed(#[source] RemoteError),

    #[error("too many consecutive errors ({attempts}), last: {last}")]
    TooManyErrors {
        attempts: u32,
        #[source]
        last: RemoteError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartReason {
    Paused,
    Absent,
}

/// Notifications published while supervising
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SupervisorEvent {
    PlaybackStarted { queued: usize },
    NowPlaying(NowPlaying),
    Restarting(RestartReason),
    CycleFailed { attempt: u32, max: u32, error: RemoteError },
    ShuttingDown,
    GaveUp { attempts: u32, error: RemoteError },
}

impl fmt::Display for SupervisorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlaybackStarted { queued } => write!(f, "Playback started successfully ({} tracks queued).", queued),
            Self::NowPlaying(item) => write!(f, "Now playing: {} - {}", item.name, item.artist_line()),
            Self::Restarting(RestartReason::Paused) => f.write_str("Playback paused, restarting..."),
            Self::Restarting(RestartReason::Absent) => f.write_str("No playback detected, starting..."),
            Self::CycleFailed { attempt, max, error } if error.is_service_error() => {
                write!(f, "Spotify error (attempt {}/{}): {}", attempt, max, error.describe())
            }
            Self::CycleFailed { attempt, max, error } => {
                write!(f, "Unexpected error (attempt {}/{}): {}", attempt, max, error.describe())
            }
            Self::ShuttingDown => f.write_str("Stopping playback monitor..."),
            Self::GaveUp { error, .. } => write!(f, "Too many errors, stopping: {}", error.describe()),
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<SupervisorEvent>;

/// Loop bookkeeping, owned by the supervisor alone
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SupervisorState {
    pub last_track: Option<String>,
    pub consecutive_errors: u32,
}

impl SupervisorState {
    fn record_success(&mut self) {
        self.consecutive_errors = 0;
    }

    fn record_failure(&mut self) -> u32 {
        self.consecutive_errors += 1;
        self.consecutive_errors
    }
}

/// What a successful poll cycle did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    TrackChanged,
    Unchanged,
    Restarted(RestartReason),
}

/// Shuffle the set, queue at most `batch_size` tracks on `device`, then turn
/// on context repeat and shuffle. Stops at the first failing call.
pub async fn restart_playback(
    service: &dyn RemoteMusicService,
    tracks: &TrackSet,
    device: &DeviceRef,
    batch_size: usize,
) -> Result<usize, RemoteError> {
    let batch = tracks.shuffled_batch(batch_size.min(MAX_BATCH_SIZE));
    tracing::info!(device_id = %device, queued = batch.len(), total = tracks.len(), "Restarting playback");

    service.start_playback(device, &batch).await?;
    service.set_repeat(device, RepeatMode::Context).await?;
    service.set_shuffle(device, true).await?;
    Ok(batch.len())
}

pub struct PlaybackSupervisor<'a> {
    service: &'a dyn RemoteMusicService,
    scheduler: &'a dyn Scheduler,
    tracks: &'a TrackSet,
    device: DeviceRef,
    settings: SupervisorSettings,
    events: EventSender,
    state: SupervisorState,
}

impl<'a> PlaybackSupervisor<'a> {
    pub fn new(
        service: &'a dyn RemoteMusicService,
        scheduler: &'a dyn Scheduler,
        tracks: &'a TrackSet,
        device: DeviceRef,
        settings: SupervisorSettings,
        events: EventSender,
    ) -> Result<Self, SupervisorError> {
        if tracks.is_empty() {
            return Err(SupervisorError::EmptyTrackSet);
        }
        Ok(Self {
            service,
            scheduler,
            tracks,
            device,
            settings,
            events,
            state: SupervisorState::default(),
        })
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    /// Initial playback start. Must succeed before [`run`](Self::run).
    pub async fn start(&mut self) -> Result<(), SupervisorError> {
        match self.restart().await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, "Initial playback start failed");
                Err(SupervisorError::StartFailed(e))
            }
        }
    }

    /// Supervise until the scheduler's token is cancelled (`Ok`) or the
    /// consecutive error limit is exceeded (`Err`).
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        let token = self.scheduler.token().clone();
        tracing::info!(device_id = %self.device, tracks = self.tracks.len(), "Playback supervisor running");

        loop {
            let polled = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = self.poll_cycle() => Some(result),
            };
            let Some(result) = polled else {
                self.shut_down();
                return Ok(());
            };

            let delay = self.settle(result)?;

            let slept = tokio::select! {
                biased;
                _ = token.cancelled() => false,
                _ = self.scheduler.sleep(delay) => true,
            };
            if !slept {
                self.shut_down();
                return Ok(());
            }
        }
    }

    /// Update the error counter for a finished cycle and pick the next delay
    fn settle(&mut self, result: Result<CycleOutcome, RemoteError>) -> Result<Duration, SupervisorError> {
        match result {
            Ok(outcome) => {
                tracing::trace!(?outcome, "Poll cycle finished");
                self.state.record_success();
                Ok(self.settings.poll_interval)
            }
            Err(error) => {
                let attempts = self.state.record_failure();
                let max = self.settings.max_consecutive_errors;
                if attempts > max {
                    tracing::error!(attempts, error = %error, "Too many consecutive errors, giving up");
                    self.emit(SupervisorEvent::GaveUp { attempts, error: error.clone() });
                    return Err(SupervisorError::TooManyErrors { attempts, last: error });
                }
                tracing::warn!(
                    attempt = attempts,
                    max,
                    delay_secs = self.settings.error_backoff.as_secs(),
                    error = %error,
                    "Poll cycle failed"
                );
                self.emit(SupervisorEvent::CycleFailed { attempt: attempts, max, error });
                Ok(self.settings.error_backoff)
            }
        }
    }

    async fn poll_cycle(&mut self) -> Result<CycleOutcome, RemoteError> {
        let snapshot = self.service.current_playback().await?;

        match PlaybackObservation::classify(snapshot.as_ref()) {
            PlaybackObservation::Playing(item) => {
                if self.state.last_track.as_deref() == Some(item.key()) {
                    return Ok(CycleOutcome::Unchanged);
                }
                tracing::info!(track = %item.name, track_id = item.key(), "Now playing");
                self.state.last_track = Some(item.key().to_string());
                self.emit(SupervisorEvent::NowPlaying(item));
                Ok(CycleOutcome::TrackChanged)
            }
            PlaybackObservation::Paused => {
                self.emit(SupervisorEvent::Restarting(RestartReason::Paused));
                self.restart().await?;
                Ok(CycleOutcome::Restarted(RestartReason::Paused))
            }
            PlaybackObservation::Absent => {
                self.emit(SupervisorEvent::Restarting(RestartReason::Absent));
                self.restart().await?;
                Ok(CycleOutcome::Restarted(RestartReason::Absent))
            }
        }
    }

    async fn restart(&self) -> Result<(), RemoteError> {
        let queued = restart_playback(self.service, self.tracks, &self.device, self.settings.batch_size).await?;
        self.emit(SupervisorEvent::PlaybackStarted { queued });
        Ok(())
    }

    fn shut_down(&self) {
        tracing::info!("Playback supervisor stopping");
        self.emit(SupervisorEvent::ShuttingDown);
    }

    fn emit(&self, event: SupervisorEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}
