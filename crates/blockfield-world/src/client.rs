//! Consumer side of the stream: a [`Level`] wired to a producer thread.

use std::collections::VecDeque;
use std::sync::Arc;

use blockfield_core::{BlockPos, Result};
use glam::Vec3;
use tracing::{debug, info, trace};

use crate::backend::RenderBackend;
use crate::config::WorldConfig;
use crate::level::Level;
use crate::protocol::ConsumerMessage;
use crate::registry::BlockRegistry;
use crate::streaming::ProducerHandle;

/// Owns the level and the producer and shuttles messages between them.
pub struct WorldClient {
    level: Level,
    producer: ProducerHandle,
    /// Messages the producer channel had no room for yet.
    outbox: VecDeque<ConsumerMessage>,
}

impl WorldClient {
    /// Validate `config`, spawn the producer and announce the distances.
    pub fn start(
        mut config: WorldConfig,
        registry: Arc<BlockRegistry>,
        backend: Box<dyn RenderBackend>,
    ) -> Result<Self> {
        config.validate()?;
        let level = Level::new(registry, backend, config.height_range());
        let producer = ProducerHandle::spawn(&config);
        info!(
            "World client started: seed {}, simulate {}, render {}",
            config.seed, config.simulation_distance, config.render_distance
        );
        Ok(Self::with_producer(
            level,
            producer,
            config.simulation_distance,
            config.render_distance,
        ))
    }

    /// Wire an existing level and producer.
    pub fn with_producer(
        level: Level,
        producer: ProducerHandle,
        simulation_distance: u32,
        render_distance: u32,
    ) -> Self {
        let mut client = Self {
            level,
            producer,
            outbox: VecDeque::new(),
        };
        client.queue(ConsumerMessage::Distances {
            simulation_distance,
            render_distance,
        });
        client.flush();
        client
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn level_mut(&mut self) -> &mut Level {
        &mut self.level
    }

    /// Messages waiting for room in the producer channel.
    pub fn pending_requests(&self) -> usize {
        self.outbox.len()
    }

    /// Apply everything the producer has sent so far.
    ///
    /// A payload the level cannot decode, or a producer that went away, is
    /// returned as an error.
    pub fn pump(&mut self) -> Result<usize> {
        self.flush();

        let mut handled = 0;
        while let Some(message) = self.producer.try_recv()? {
            trace!("Consumer received {}", message.kind());
            if let Some(reply) = self.level.handle_message(message)? {
                self.queue(reply);
            }
            handled += 1;
        }

        self.flush();
        Ok(handled)
    }

    /// Report the viewpoint once per world tick.
    pub fn tick(&mut self, viewpoint: Vec3) -> Result<()> {
        let pos = BlockPos::try_containing(viewpoint)?;
        if let Some(update) = self.level.manage_chunks(pos) {
            debug!("Viewpoint moved to chunk {}", pos.chunk_pos());
            self.queue(update);
        }
        self.flush();
        Ok(())
    }

    /// Rebuild dirty geometry before drawing.
    pub fn frame(&mut self) -> usize {
        self.level.recompute_dirty()
    }

    /// Only the newest center matters, so a queued update replaces a stale one.
    fn queue(&mut self, message: ConsumerMessage) {
        if matches!(message, ConsumerMessage::Update { .. }) {
            self.outbox
                .retain(|queued| !matches!(queued, ConsumerMessage::Update { .. }));
        }
        self.outbox.push_back(message);
    }

    fn flush(&mut self) {
        while let Some(message) = self.outbox.pop_front() {
            if let Err(message) = self.producer.send(message) {
                self.outbox.push_front(message);
                break;
            }
        }
    }

    /// Stop the producer. The level stays usable.
    pub fn shutdown(&mut self) {
        self.producer.shutdown();
        info!("World client stopped");
    }
}

impl std::fmt::Debug for WorldClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldClient")
            .field("level", &self.level)
            .field("outbox", &self.outbox.len())
            .finish_non_exhaustive()
    }
}
