//! Timer and cancellation used to pace the playback supervisor

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Paces a long-running loop.
///
/// `token()` is the interrupt signal: once cancelled, loops stop at their
/// next await point.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn sleep(&self, duration: Duration);

    fn token(&self) -> &CancellationToken;
}

/// Wall-clock scheduler backed by `tokio::time`
pub struct TokioScheduler {
    token: CancellationToken,
}

impl TokioScheduler {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Cancel `token` on the first Ctrl+C
pub fn spawn_interrupt_listener(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received");
                token.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });
}
