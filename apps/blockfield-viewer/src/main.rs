//! Blockfield Demo Viewer
//!
//! Streams procedurally generated terrain around a walking viewpoint and
//! keeps the surface mesh of every loaded chunk up to date. Geometry goes to
//! an in-memory scene, so the viewer runs without a window and logs what it
//! would draw.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p blockfield-viewer -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--seed <N>`: World generation seed
//! - `--simulation-distance <N>`: Chunk ring radius that is generated (default: 3)
//! - `--render-distance <N>`: Chunk ring radius that gets geometry (default: 2)
//! - `--frames <N>`: Stop after N frames (default: 600)
//! - `--config <PATH>`: TOML world config; flags override its values
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use blockfield_app::{run_app, AppConfig};

use crate::app::{Viewer, ViewerOptions};

const TARGET_FPS: u32 = 60;

fn main() -> anyhow::Result<()> {
    // Check for help flag before starting the app
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    let options = ViewerOptions::from_args();
    run_app::<Viewer>(
        AppConfig::new("Blockfield - Streaming Demo")
            .with_target_fps(TARGET_FPS)
            .with_max_frames(options.frames),
    )
}

fn print_help() {
    eprintln!(
        "Blockfield Demo Viewer

USAGE:
    cargo run -p blockfield-viewer -- [OPTIONS]

WORLD OPTIONS:
    --seed <N>                  World generation seed (default: 0)
    --simulation-distance <N>   Chunk ring radius that is generated (default: 3)
    --render-distance <N>       Chunk ring radius that gets geometry (default: 2)
    --config <PATH>             TOML world config; flags override its values

RUN OPTIONS:
    --frames <N>                Stop after N frames (default: 600)

OTHER:
    -h, --help                  Print this help message

EXAMPLES:
    # Default world
    cargo run -p blockfield-viewer

    # Wider simulation ring, short run
    cargo run -p blockfield-viewer -- --simulation-distance 5 --frames 120

    # Verbose streaming logs
    RUST_LOG=blockfield_world=debug cargo run -p blockfield-viewer"
    );
}
