//! Frame loop framework for Blockfield clients.
//!
//! This crate handles the boilerplate around a client:
//! - Logging setup
//! - Fixed-rate world ticks, decoupled from the frame rate
//! - Frame pacing
//! - Halting on the first frame error
//!
//! # Example
//!
//! ```no_run
//! use blockfield_app::{run_app, AppConfig, AppContext, ClientApp};
//!
//! struct MyApp;
//!
//! impl ClientApp for MyApp {
//!     fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
//!         Ok(MyApp)
//!     }
//!
//!     fn tick(&mut self, _ctx: &AppContext) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//!
//!     fn render(&mut self, _ctx: &AppContext) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app::<MyApp>(AppConfig::default().with_max_frames(100))
//! }
//! ```

mod app;
mod context;
mod runner;

pub use app::ClientApp;
pub use context::AppContext;
pub use runner::{init_logging, run_app, AppConfig, FrameLoop};
