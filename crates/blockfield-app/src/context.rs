//! Application context.

use std::time::{Duration, Instant};

/// State the runner shares with the application.
#[derive(Debug)]
pub struct AppContext {
    /// Application title.
    pub title: String,
    /// Frames completed so far.
    pub frame_count: u64,
    /// World ticks completed so far.
    pub tick_count: u64,
    /// Fixed world step.
    pub tick_interval: Duration,
    pub(crate) started: Instant,
}

impl AppContext {
    pub(crate) fn new(title: String, tick_interval: Duration) -> Self {
        Self {
            title,
            frame_count: 0,
            tick_count: 0,
            tick_interval,
            started: Instant::now(),
        }
    }

    /// Wall-clock time since the loop was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
