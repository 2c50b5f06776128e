//! Minimum spacing between request dispatches.

use std::time::Duration;

use tokio::time::Instant;

/// Gates dispatches so consecutive starts are at least `spacing` apart.
///
/// The first call never waits.
#[derive(Debug)]
pub struct RequestPacer {
    spacing: Duration,
    next_allowed: Option<Instant>,
}

impl RequestPacer {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_allowed: None,
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Time left before the next dispatch may start.
    pub fn remaining(&self) -> Duration {
        self.next_allowed
            .map(|at| at.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Waits until a dispatch may start, without claiming the slot.
    pub async fn wait(&self) {
        if let Some(at) = self.next_allowed {
            tokio::time::sleep_until(at).await;
        }
    }

    /// Marks a dispatch as started now.
    pub fn claim(&mut self) {
        self.next_allowed = Some(Instant::now() + self.spacing);
    }

    /// Waits for the next slot and claims it.
    pub async fn ready(&mut self) {
        self.wait().await;
        self.claim();
    }
}
