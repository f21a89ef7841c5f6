//! Chunk producer: ring scheduling around the viewpoint and the worker thread.
//!
//! The producer never sees consumer-side edits. It only knows which chunks it
//! has generated, which ones are queued, and what the consumer last reported
//! as loaded.

use std::collections::VecDeque;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use blockfield_core::{ChunkPos, Error, Result};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use hashbrown::HashSet;
use tracing::{debug, info, trace, warn};

use crate::codec::SerializedChunk;
use crate::config::WorldConfig;
use crate::generation::ChunkGenerator;
use crate::protocol::{ConsumerMessage, ProducerMessage};

/// Chunks around `center` in concentric Chebyshev rings, closest first.
///
/// Yields `(ring, pos)`; ring 0 is the center itself and ring `i` holds the
/// `8 * i` positions at Chebyshev distance exactly `i`.
pub fn rings(center: ChunkPos, radius: u32) -> impl Iterator<Item = (u32, ChunkPos)> {
    (0..=radius as i32).flat_map(move |ring| {
        (-ring..=ring).flat_map(move |dx| {
            (-ring..=ring)
                .filter(move |dz| dx.abs() == ring || dz.abs() == ring)
                .map(move |dz| (ring as u32, center.relative(dx, dz)))
        })
    })
}

/// Queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedChunk {
    pub pos: ChunkPos,
    /// Inside the render distance.
    pub render: bool,
}

/// Producer state machine.
pub struct ChunkLoader {
    generator: ChunkGenerator,
    simulation_distance: u32,
    render_distance: u32,
    render_enabled: bool,
    center: Option<ChunkPos>,
    queue: VecDeque<QueuedChunk>,
    queued: HashSet<ChunkPos>,
    generated: HashSet<ChunkPos>,
    /// Chunks told to load and not told to unload since. Covers loads the
    /// consumer has not applied yet when it reports its loaded set.
    shown: HashSet<ChunkPos>,
}

impl ChunkLoader {
    pub fn new(generator: ChunkGenerator, simulation_distance: u32, render_distance: u32) -> Self {
        Self {
            generator,
            simulation_distance,
            render_distance: render_distance.min(simulation_distance),
            render_enabled: false,
            center: None,
            queue: VecDeque::new(),
            queued: HashSet::new(),
            generated: HashSet::new(),
            shown: HashSet::new(),
        }
    }

    /// Loader with noise terrain described by `config`.
    pub fn from_config(config: &WorldConfig) -> Self {
        let generator =
            ChunkGenerator::noise(config.seed, config.terrain.clone(), config.height_range());
        Self::new(
            generator,
            config.simulation_distance,
            config.render_distance,
        )
    }

    pub const fn simulation_distance(&self) -> u32 {
        self.simulation_distance
    }

    pub const fn render_distance(&self) -> u32 {
        self.render_distance
    }

    pub const fn is_render_enabled(&self) -> bool {
        self.render_enabled
    }

    pub const fn center(&self) -> Option<ChunkPos> {
        self.center
    }

    /// Entries still waiting for a tick, in pop order.
    pub fn queued(&self) -> impl Iterator<Item = &QueuedChunk> {
        self.queue.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn generated_count(&self) -> usize {
        self.generated.len()
    }

    pub fn is_generated(&self, pos: ChunkPos) -> bool {
        self.generated.contains(&pos)
    }

    /// Whether a `load` went out for `pos` with no `unload` after it.
    pub fn is_shown(&self, pos: ChunkPos) -> bool {
        self.shown.contains(&pos)
    }

    pub fn set_distances(&mut self, simulation_distance: u32, render_distance: u32) {
        if render_distance > simulation_distance {
            warn!(
                "Render distance {} exceeds simulation distance {}, clamping",
                render_distance, simulation_distance
            );
        }
        self.simulation_distance = simulation_distance;
        self.render_distance = render_distance.min(simulation_distance);
        debug!(
            "Distances set: simulate {}, render {}",
            self.simulation_distance, self.render_distance
        );
    }

    /// Apply one consumer message and return what must be sent right away.
    pub fn handle(&mut self, message: ConsumerMessage) -> Vec<ProducerMessage> {
        match message {
            ConsumerMessage::Distances {
                simulation_distance,
                render_distance,
            } => {
                self.set_distances(simulation_distance, render_distance);
                Vec::new()
            }
            ConsumerMessage::Update { pos, loaded_chunks } => self.update(pos, &loaded_chunks),
            ConsumerMessage::StartRender => {
                self.start_render();
                Vec::new()
            }
        }
    }

    /// Re-center the queue.
    ///
    /// Loaded chunks that left the render distance are unloaded immediately and
    /// dropped from the queue. Loaded means reported by the consumer or sent a
    /// `load` that may still be in flight. The queue is rebuilt in ring order; chunks that
    /// are loaded, or generated with nothing left to do, are skipped. While
    /// rendering is not enabled, the expected chunk count is re-announced.
    pub fn update(&mut self, center: ChunkPos, loaded: &[ChunkPos]) -> Vec<ProducerMessage> {
        let mut out = Vec::new();
        self.center = Some(center);

        let reported: HashSet<ChunkPos> = loaded.iter().copied().collect();
        let mut in_flight: Vec<ChunkPos> = self
            .shown
            .iter()
            .filter(|pos| !reported.contains(*pos))
            .copied()
            .collect();
        in_flight.sort_unstable();

        let mut still_loaded = HashSet::with_capacity(loaded.len() + in_flight.len());
        for &pos in loaded.iter().chain(&in_flight) {
            if pos.chebyshev_distance(center) > self.render_distance {
                self.dequeue(pos);
                out.push(ProducerMessage::Unload { x: pos.x, z: pos.z });
            } else {
                still_loaded.insert(pos);
            }
        }

        self.shown.clone_from(&still_loaded);

        self.queue.clear();
        self.queued.clear();
        let mut ungenerated = 0;
        for (ring, pos) in rings(center, self.simulation_distance) {
            let render = ring <= self.render_distance;
            if still_loaded.contains(&pos) {
                continue;
            }
            let generated = self.generated.contains(&pos);
            if generated && !(render && self.render_enabled) {
                continue;
            }
            if !generated {
                ungenerated += 1;
            }
            self.enqueue(QueuedChunk { pos, render });
        }

        debug!(
            "Center {}: {} queued, {} unloaded",
            center,
            self.queue.len(),
            out.len()
        );

        if !self.render_enabled {
            out.push(ProducerMessage::ToSimulate(self.generated.len() + ungenerated));
        }
        out
    }

    fn enqueue(&mut self, entry: QueuedChunk) -> bool {
        if !self.queued.insert(entry.pos) {
            return false;
        }
        self.queue.push_back(entry);
        true
    }

    /// Drop a queued position. Unqueued positions are ignored.
    pub fn dequeue(&mut self, pos: ChunkPos) -> bool {
        if !self.queued.remove(&pos) {
            return false;
        }
        self.queue.retain(|entry| entry.pos != pos);
        true
    }

    /// Enable rendering and drop pending simulate-only work.
    pub fn start_render(&mut self) {
        self.render_enabled = true;
        self.queue.retain(|entry| entry.render);
        self.queued = self.queue.iter().map(|entry| entry.pos).collect();
        info!(
            "Render enabled, {} chunks pending",
            self.queue.len()
        );
    }

    /// Pop one entry: generate it if new, then load it if it is to be shown.
    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn tick(&mut self) -> Vec<ProducerMessage> {
        let Some(entry) = self.queue.pop_front() else {
            return Vec::new();
        };
        self.queued.remove(&entry.pos);

        let mut out = Vec::with_capacity(2);
        let ChunkPos { x, z } = entry.pos;
        if self.generated.insert(entry.pos) {
            let grid = self.generator.generate(entry.pos);
            trace!("Generated chunk {} with {} blocks", entry.pos, grid.len());
            out.push(ProducerMessage::Generate {
                x,
                z,
                chunk: SerializedChunk::encode(&grid),
            });
        }
        if entry.render && self.render_enabled {
            self.shown.insert(entry.pos);
            out.push(ProducerMessage::Load { x, z });
        }
        out
    }
}

impl std::fmt::Debug for ChunkLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkLoader")
            .field("simulation_distance", &self.simulation_distance)
            .field("render_distance", &self.render_distance)
            .field("render_enabled", &self.render_enabled)
            .field("center", &self.center)
            .field("pending", &self.queue.len())
            .field("generated", &self.generated.len())
            .field("shown", &self.shown.len())
            .finish_non_exhaustive()
    }
}

/// Handle to the producer thread.
///
/// Dropping the handle disconnects both channels and joins the thread.
pub struct ProducerHandle {
    request_tx: Option<Sender<ConsumerMessage>>,
    event_rx: Option<Receiver<ProducerMessage>>,
    thread: Option<JoinHandle<()>>,
}

impl ProducerHandle {
    /// Spawn a producer for `config`.
    pub fn spawn(config: &WorldConfig) -> Self {
        Self::spawn_with(
            ChunkLoader::from_config(config),
            config.queue_interval(),
            config.consumer_channel_capacity,
            config.producer_channel_capacity,
        )
    }

    /// Spawn a producer around an existing loader.
    pub fn spawn_with(
        loader: ChunkLoader,
        interval: Duration,
        request_capacity: usize,
        event_capacity: usize,
    ) -> Self {
        let (request_tx, request_rx) = channel::bounded::<ConsumerMessage>(request_capacity);
        let (event_tx, event_rx) = channel::bounded::<ProducerMessage>(event_capacity);

        let thread = thread::Builder::new()
            .name("chunk-producer".to_string())
            .spawn(move || {
                Self::producer_loop(loader, interval, request_rx, event_tx);
            })
            .expect("Failed to spawn chunk producer thread");

        Self {
            request_tx: Some(request_tx),
            event_rx: Some(event_rx),
            thread: Some(thread),
        }
    }

    /// Interleave consumer requests with queue ticks until either side hangs up.
    fn producer_loop(
        mut loader: ChunkLoader,
        interval: Duration,
        request_rx: Receiver<ConsumerMessage>,
        event_tx: Sender<ProducerMessage>,
    ) {
        info!("Chunk producer started");
        if event_tx.send(ProducerMessage::Ready).is_err() {
            return;
        }

        let ticker = channel::tick(interval);
        'run: loop {
            let out = crossbeam::select! {
                recv(request_rx) -> request => request.ok().map(|message| {
                    trace!("Producer received {}", message.kind());
                    loader.handle(message)
                }),
                recv(ticker) -> _ => Some(loader.tick()),
            };
            let Some(out) = out else {
                break;
            };

            for message in out {
                // Blocks only when the consumer lags a full channel behind.
                if event_tx.send(message).is_err() {
                    break 'run;
                }
            }
        }

        info!(
            "Chunk producer stopped after generating {} chunks",
            loader.generated_count()
        );
    }

    /// Queue a message for the producer without blocking.
    ///
    /// Hands the message back if the channel is full or gone.
    pub fn send(&self, message: ConsumerMessage) -> std::result::Result<(), ConsumerMessage> {
        match &self.request_tx {
            Some(tx) => tx.try_send(message).map_err(|e| e.into_inner()),
            None => Err(message),
        }
    }

    /// Next producer message, if one is waiting.
    pub fn try_recv(&self) -> Result<Option<ProducerMessage>> {
        let Some(rx) = &self.event_rx else {
            return Err(Error::Disconnected("chunk producer"));
        };
        match rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::Disconnected("chunk producer")),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Disconnect and wait for the thread to finish.
    pub fn shutdown(&mut self) {
        self.request_tx.take();
        self.event_rx.take();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Chunk producer thread panicked");
            }
        }
    }
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
