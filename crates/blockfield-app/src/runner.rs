//! Application runner and frame loop.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::bail;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::ClientApp;
use crate::context::AppContext;

/// World ticks allowed in a single frame before the backlog is dropped.
const MAX_TICKS_PER_FRAME: u32 = 8;

/// Application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Application title, used in logs.
    pub title: String,
    /// Target frames per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Fixed world tick rate.
    pub ticks_per_second: u32,
    /// Stop after this many frames (None runs until the app asks to exit).
    pub max_frames: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Blockfield".to_string(),
            target_fps: Some(60),
            ticks_per_second: 5,
            max_frames: None,
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the target FPS.
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Run frames back to back.
    pub fn with_unlimited_fps(mut self) -> Self {
        self.target_fps = None;
        self
    }

    /// Set the world tick rate.
    pub fn with_ticks_per_second(mut self, ticks: u32) -> Self {
        self.ticks_per_second = ticks;
        self
    }

    /// Stop after `frames` frames.
    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.ticks_per_second.max(1)))
    }
}

/// Install the global `tracing` subscriber, filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a subscriber is already installed.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

/// Run a ClientApp with the given configuration.
///
/// Initializes logging, runs frames until the app asks to exit or the frame
/// limit is reached, then cleans up. The first frame error stops the loop
/// and is returned.
pub fn run_app<A: ClientApp>(config: AppConfig) -> anyhow::Result<()> {
    init_logging();
    info!("{} starting...", config.title);

    let mut frame_loop = FrameLoop::<A>::new(config)?;
    let result = frame_loop.run();
    frame_loop.cleanup();
    result
}

/// Drives one [`ClientApp`].
pub struct FrameLoop<A: ClientApp> {
    ctx: AppContext,
    app: A,
    target_frame_time: Option<Duration>,
    max_frames: Option<u64>,
    tick_accumulator: Duration,
    last_frame_time: Instant,
    halted: bool,
    cleaned_up: bool,
    // FPS tracking
    min_fps: f64,
    max_fps: f64,
    fps_sum: f64,
}

impl<A: ClientApp> FrameLoop<A> {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        if config.ticks_per_second == 0 {
            bail!("ticks_per_second must be positive");
        }
        let tick_interval = config.tick_interval();
        let mut ctx = AppContext::new(config.title, tick_interval);
        let app = A::init(&mut ctx)?;

        Ok(Self {
            ctx,
            app,
            target_frame_time: config
                .target_fps
                .filter(|&fps| fps > 0)
                .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps))),
            max_frames: config.max_frames,
            // The first frame ticks right away.
            tick_accumulator: tick_interval,
            last_frame_time: Instant::now(),
            halted: false,
            cleaned_up: false,
            min_fps: f64::MAX,
            max_fps: 0.0,
            fps_sum: 0.0,
        })
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    fn finished(&self) -> bool {
        self.max_frames
            .is_some_and(|max| self.ctx.frame_count >= max)
            || self.app.should_exit(&self.ctx)
    }

    /// Run frames with real time until done.
    pub fn run(&mut self) -> anyhow::Result<()> {
        while !self.finished() {
            let frame_start = Instant::now();
            let dt = frame_start.duration_since(self.last_frame_time);
            self.last_frame_time = frame_start;

            self.step(dt)?;

            // Frame pacing
            if let Some(target) = self.target_frame_time {
                let elapsed = frame_start.elapsed();
                if elapsed < target {
                    thread::sleep(target - elapsed);
                }
            }
        }
        Ok(())
    }

    /// Run one frame as if `dt` had passed since the previous one.
    ///
    /// After an error every further call fails without touching the app.
    pub fn step(&mut self, dt: Duration) -> anyhow::Result<()> {
        if self.halted {
            bail!("frame loop halted after an earlier error");
        }
        if let Err(e) = self.frame(dt) {
            self.halted = true;
            error!("Frame {} failed, halting: {e:#}", self.ctx.frame_count);
            return Err(e);
        }
        Ok(())
    }

    fn frame(&mut self, dt: Duration) -> anyhow::Result<()> {
        self.tick_accumulator += dt;
        let mut ticks = 0;
        while self.tick_accumulator >= self.ctx.tick_interval {
            if ticks == MAX_TICKS_PER_FRAME {
                warn!(
                    "World fell {:?} behind, dropping backlog",
                    self.tick_accumulator
                );
                self.tick_accumulator = Duration::ZERO;
                break;
            }
            self.tick_accumulator -= self.ctx.tick_interval;
            self.app.tick(&self.ctx)?;
            self.ctx.tick_count += 1;
            ticks += 1;
        }

        let dt = dt.as_secs_f32();
        if dt > 0.0 {
            let fps = 1.0 / f64::from(dt);
            self.min_fps = self.min_fps.min(fps);
            self.max_fps = self.max_fps.max(fps);
            self.fps_sum += fps;
        }

        self.app.update(&self.ctx, dt)?;
        self.app.render(&self.ctx)?;
        self.ctx.frame_count += 1;
        Ok(())
    }

    /// Print statistics and let the app release its resources. Runs once.
    pub fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;

        if self.ctx.frame_count > 0 && self.fps_sum > 0.0 {
            let avg_fps = self.fps_sum / self.ctx.frame_count as f64;
            info!("FPS Statistics:");
            info!("  Min: {:.1}", self.min_fps);
            info!("  Max: {:.1}", self.max_fps);
            info!("  Avg: {:.1}", avg_fps);
        }
        info!(
            "  Total frames: {}, world ticks: {}",
            self.ctx.frame_count, self.ctx.tick_count
        );

        self.app.cleanup(&mut self.ctx);
        info!("Cleanup complete");
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[derive(Default)]
    struct Counter {
        ticks: u64,
        updates: u64,
        renders: u64,
        cleaned: bool,
    }

    impl ClientApp for Counter {
        fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
            Ok(Self::default())
        }

        fn tick(&mut self, _ctx: &AppContext) -> anyhow::Result<()> {
            self.ticks += 1;
            Ok(())
        }

        fn update(&mut self, _ctx: &AppContext, _dt: f32) -> anyhow::Result<()> {
            self.updates += 1;
            Ok(())
        }

        fn render(&mut self, _ctx: &AppContext) -> anyhow::Result<()> {
            self.renders += 1;
            Ok(())
        }

        fn cleanup(&mut self, _ctx: &mut AppContext) {
            self.cleaned = true;
        }
    }

    /// Fails while rendering its third frame.
    #[derive(Default)]
    struct Faulty {
        renders: u64,
    }

    impl ClientApp for Faulty {
        fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
            Ok(Self::default())
        }

        fn tick(&mut self, _ctx: &AppContext) -> anyhow::Result<()> {
            Ok(())
        }

        fn render(&mut self, ctx: &AppContext) -> anyhow::Result<()> {
            if ctx.frame_count == 2 {
                return Err(anyhow!("corrupt payload"));
            }
            self.renders += 1;
            Ok(())
        }
    }

    fn config() -> AppConfig {
        AppConfig::new("test").with_unlimited_fps().with_ticks_per_second(5)
    }

    #[test]
    fn ticks_follow_world_rate() {
        let mut frame_loop = FrameLoop::<Counter>::new(config()).unwrap();

        frame_loop.step(Duration::ZERO).unwrap();
        assert_eq!(frame_loop.app().ticks, 1);

        for _ in 0..4 {
            frame_loop.step(Duration::from_millis(100)).unwrap();
        }
        assert_eq!(frame_loop.app().ticks, 3);
        assert_eq!(frame_loop.app().renders, 5);
        assert_eq!(frame_loop.context().tick_count, 3);
        assert_eq!(frame_loop.context().frame_count, 5);
    }

    #[test]
    fn long_stall_drops_backlog() {
        let mut frame_loop = FrameLoop::<Counter>::new(config()).unwrap();
        frame_loop.step(Duration::from_secs(60)).unwrap();
        assert_eq!(frame_loop.app().ticks, u64::from(MAX_TICKS_PER_FRAME));

        frame_loop.step(Duration::from_millis(10)).unwrap();
        assert_eq!(frame_loop.app().ticks, u64::from(MAX_TICKS_PER_FRAME));
    }

    #[test]
    fn first_error_halts_for_good() {
        let mut frame_loop = FrameLoop::<Faulty>::new(config()).unwrap();
        frame_loop.step(Duration::ZERO).unwrap();
        frame_loop.step(Duration::ZERO).unwrap();

        let err = frame_loop.step(Duration::ZERO).unwrap_err();
        assert_eq!(err.to_string(), "corrupt payload");
        assert!(frame_loop.is_halted());

        assert!(frame_loop.step(Duration::ZERO).is_err());
        assert_eq!(frame_loop.app().renders, 2);
        assert_eq!(frame_loop.context().frame_count, 2);
    }

    #[test]
    fn run_stops_at_frame_limit() {
        let mut frame_loop = FrameLoop::<Counter>::new(config().with_max_frames(3)).unwrap();
        frame_loop.run().unwrap();
        assert_eq!(frame_loop.app().renders, 3);

        frame_loop.cleanup();
        frame_loop.cleanup();
        assert!(frame_loop.app().cleaned);
    }

    #[test]
    fn run_app_surfaces_frame_errors() {
        let result = run_app::<Faulty>(config().with_max_frames(10));
        assert!(result.is_err());
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        assert!(FrameLoop::<Counter>::new(config().with_ticks_per_second(0)).is_err());
    }
}
