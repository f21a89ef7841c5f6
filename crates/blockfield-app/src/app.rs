//! `ClientApp` trait definition.

use crate::context::AppContext;

/// Trait for Blockfield clients.
///
/// The runner owns timing: it calls [`tick`](Self::tick) at the configured
/// world rate and [`update`](Self::update)/[`render`](Self::render) once per
/// frame. Any error returned from these stops the loop for good.
pub trait ClientApp: Sized {
    /// Initialize the application.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Advance the world by one fixed step.
    fn tick(&mut self, ctx: &AppContext) -> anyhow::Result<()>;

    /// Per-frame work before rendering.
    ///
    /// `dt` is the time since the previous frame in seconds.
    #[allow(unused_variables)]
    fn update(&mut self, ctx: &AppContext, dt: f32) -> anyhow::Result<()> {
        Ok(())
    }

    /// Draw a frame.
    fn render(&mut self, ctx: &AppContext) -> anyhow::Result<()>;

    /// Checked after every frame.
    #[allow(unused_variables)]
    fn should_exit(&self, ctx: &AppContext) -> bool {
        false
    }

    /// Cleanup resources before shutdown.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
