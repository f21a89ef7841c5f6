//! Viewer application: a viewpoint wandering over streamed terrain.

use std::path::PathBuf;
use std::sync::Arc;

use blockfield_app::{AppContext, ClientApp};
use blockfield_core::{BlockId, BlockPos};
use blockfield_world::{
    BlockRegistry, HeadlessBackend, Level, SequentialAtlas, StreamMode, WorldClient, WorldConfig,
};
use glam::Vec3;
use tracing::{debug, info};

/// Walking speed in blocks per second.
const WALK_SPEED: f32 = 6.0;
/// Turn rate in radians per second.
const TURN_RATE: f32 = 0.15;
/// Eye height above the ground.
const EYE_HEIGHT: f32 = 1.6;
/// World ticks between status lines.
const REPORT_EVERY: u64 = 25;
/// World ticks between trail markers.
const MARKER_EVERY: u64 = 10;

/// Command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerOptions {
    pub seed: Option<u64>,
    pub simulation_distance: Option<u32>,
    pub render_distance: Option<u32>,
    pub frames: u64,
    pub config: Option<PathBuf>,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            seed: None,
            simulation_distance: None,
            render_distance: None,
            frames: 600,
            config: None,
        }
    }
}

impl ViewerOptions {
    /// Parse options from command line arguments.
    pub fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::parse(&args)
    }

    /// Parse `args`, skipping the program name. Unknown flags and
    /// unparsable values are ignored.
    pub fn parse(args: &[String]) -> Self {
        let mut options = Self::default();

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1);
            let consumed = match (args[i].as_str(), value) {
                ("--seed", Some(v)) => v.parse().map(|v| options.seed = Some(v)).is_ok(),
                ("--simulation-distance", Some(v)) => v
                    .parse()
                    .map(|v| options.simulation_distance = Some(v))
                    .is_ok(),
                ("--render-distance", Some(v)) => v
                    .parse()
                    .map(|v| options.render_distance = Some(v))
                    .is_ok(),
                ("--frames", Some(v)) => v.parse().map(|v| options.frames = v).is_ok(),
                ("--config", Some(v)) => {
                    options.config = Some(PathBuf::from(v));
                    true
                }
                _ => false,
            };
            i += if consumed { 2 } else { 1 };
        }

        options
    }

    /// Defaults, then the config file, then flags.
    pub fn world_config(&self) -> anyhow::Result<WorldConfig> {
        let mut config = match &self.config {
            Some(path) => WorldConfig::load(path)?,
            None => WorldConfig::default(),
        };
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(distance) = self.simulation_distance {
            config = config.with_simulation_distance(distance);
        }
        if let Some(distance) = self.render_distance {
            config = config.with_render_distance(distance);
        }
        Ok(config)
    }
}

/// Viewer application state.
pub struct Viewer {
    client: WorldClient,
    /// Shared view of the scene the level renders into.
    scene: HeadlessBackend,
    viewpoint: Vec3,
    heading: f32,
    markers: u64,
}

impl Viewer {
    /// Highest solid block in the column, if any.
    fn ground_height(level: &Level, x: i32, z: i32) -> Option<i32> {
        let bounds = level.bounds();
        (bounds.min_height..bounds.max_height())
            .rev()
            .find(|&y| level.is_solid(BlockPos::new(x, y, z)))
    }

    /// Drop a dirt block on the ground under the viewpoint.
    fn place_marker(&mut self) -> anyhow::Result<()> {
        let feet = BlockPos::containing(self.viewpoint);
        let level = self.client.level_mut();
        let Some(ground) = Self::ground_height(level, feet.x, feet.z) else {
            return Ok(());
        };
        let marker = BlockPos::new(feet.x, ground + 1, feet.z);
        if level.bounds().contains(marker.y) {
            level.set_block(marker, BlockId::DIRT)?;
            self.markers += 1;
            debug!("Placed marker at {}", marker);
        }
        Ok(())
    }

    fn report(&self, ctx: &AppContext) {
        let level = self.client.level();
        let stats = level.stats();
        let progress = level.progress();
        let scene = self.scene.stats();
        info!(
            "t={:.1}s mode={:?} chunks known={} loaded={} dirty={} planes={} drawn={} progress={}/{}",
            ctx.elapsed().as_secs_f32(),
            level.mode(),
            stats.known_chunks,
            stats.loaded_chunks,
            stats.dirty_chunks,
            stats.planes,
            self.scene.visible_instance_count(),
            progress.generated,
            progress.expected,
        );
        debug!("Scene: {:?}", scene);
    }
}

impl ClientApp for Viewer {
    fn init(_ctx: &mut AppContext) -> anyhow::Result<Self> {
        let options = ViewerOptions::from_args();
        let config = options.world_config()?;
        info!(
            "World config: seed={} simulate={} render={} depth={}",
            config.seed, config.simulation_distance, config.render_distance, config.chunk_depth
        );

        let registry = Arc::new(BlockRegistry::standard(&mut SequentialAtlas::new())?);
        info!("Registered {} block kinds", registry.len());

        let scene = HeadlessBackend::new();
        let viewpoint = Vec3::new(8.0, config.height_range().max_height() as f32, 8.0);
        let client = WorldClient::start(config, registry, Box::new(scene.clone()))?;

        Ok(Self {
            client,
            scene,
            viewpoint,
            heading: 0.0,
            markers: 0,
        })
    }

    fn tick(&mut self, ctx: &AppContext) -> anyhow::Result<()> {
        self.client.tick(self.viewpoint)?;

        if self.client.level().mode() == StreamMode::Rendering
            && ctx.tick_count % MARKER_EVERY == 0
        {
            self.place_marker()?;
        }
        if ctx.tick_count % REPORT_EVERY == 0 {
            self.report(ctx);
        }
        Ok(())
    }

    fn update(&mut self, _ctx: &AppContext, dt: f32) -> anyhow::Result<()> {
        self.client.pump()?;

        // Stand still until the simulation ring is ready.
        if self.client.level().mode() != StreamMode::Rendering {
            return Ok(());
        }

        self.heading += TURN_RATE * dt;
        let forward = Vec3::new(self.heading.cos(), 0.0, self.heading.sin());
        self.viewpoint += forward * WALK_SPEED * dt;

        let feet = BlockPos::containing(self.viewpoint);
        if let Some(ground) = Self::ground_height(self.client.level(), feet.x, feet.z) {
            self.viewpoint.y = ground as f32 + 1.0 + EYE_HEIGHT;
        }
        Ok(())
    }

    fn render(&mut self, _ctx: &AppContext) -> anyhow::Result<()> {
        let rebuilt = self.client.frame();
        if rebuilt > 0 {
            debug!(
                "Rebuilt {} chunk meshes, {} faces drawn",
                rebuilt,
                self.scene.visible_instance_count()
            );
        }
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut AppContext) {
        self.report(ctx);
        info!(
            "Walked to ({:.1}, {:.1}, {:.1}), placed {} markers",
            self.viewpoint.x, self.viewpoint.y, self.viewpoint.z, self.markers
        );
        self.client.shutdown();
    }
}
