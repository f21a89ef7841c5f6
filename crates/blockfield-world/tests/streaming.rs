//! End-to-end streaming between a producer thread and a consumer level.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use blockfield_core::{BlockId, BlockPos, ChunkPos, Direction};
use blockfield_world::{
    BlockRegistry, BlockWorld, ChunkGenerator, ChunkLoader, ConsumerMessage, FlatTerrain,
    HeadlessBackend, HeightRange, Level, LevelSnapshot, ProducerHandle, ProducerMessage,
    SequentialAtlas, StreamMode, WorldClient, WorldConfig,
};
use glam::Vec3;

const BOUNDS: HeightRange = HeightRange::new(0, 8);

fn registry() -> Arc<BlockRegistry> {
    Arc::new(BlockRegistry::standard(&mut SequentialAtlas::new()).unwrap())
}

fn loader(simulation: u32, render: u32) -> ChunkLoader {
    let generator = ChunkGenerator::new(
        Box::new(FlatTerrain {
            height: 3,
            surface: BlockId::GRASS_BLOCK,
        }),
        BOUNDS,
        1,
    );
    ChunkLoader::new(generator, simulation, render)
}

fn producer(simulation: u32, render: u32) -> ProducerHandle {
    ProducerHandle::spawn_with(
        loader(simulation, render),
        Duration::from_millis(1),
        16,
        256,
    )
}

/// Drive the protocol by hand: pump producer messages into the level and
/// forward its replies, reporting the viewpoint each round.
fn drive(
    level: &mut Level,
    producer: &ProducerHandle,
    viewpoint: BlockPos,
    log: &mut Vec<ProducerMessage>,
    mut done: impl FnMut(&Level) -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done(level) {
        assert!(Instant::now() < deadline, "timed out: {level:?}");
        while let Some(message) = producer.try_recv().unwrap() {
            log.push(message.clone());
            if let Some(reply) = level.handle_message(message).unwrap() {
                producer.send(reply).unwrap();
            }
        }
        if let Some(update) = level.manage_chunks(viewpoint) {
            producer.send(update).unwrap();
        }
        level.recompute_dirty();
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn simulate_then_render() {
    let backend = HeadlessBackend::new();
    let mut level = Level::new(registry(), Box::new(backend.clone()), BOUNDS);
    let producer = producer(2, 1);
    producer
        .send(ConsumerMessage::Distances {
            simulation_distance: 2,
            render_distance: 1,
        })
        .unwrap();

    let mut log = Vec::new();
    drive(&mut level, &producer, BlockPos::new(3, 5, 3), &mut log, |l| {
        l.stats().loaded_chunks == 9
    });

    assert_eq!(log[0], ProducerMessage::Ready);
    assert_eq!(log[1], ProducerMessage::ToSimulate(25));
    assert_eq!(level.mode(), StreamMode::Rendering);

    // Each chunk is generated once, and always before its load.
    let mut generated = Vec::new();
    for message in &log {
        match message {
            ProducerMessage::Generate { x, z, .. } => {
                let pos = ChunkPos::new(*x, *z);
                assert!(!generated.contains(&pos), "{pos} generated twice");
                generated.push(pos);
            }
            ProducerMessage::Load { x, z } => {
                assert!(generated.contains(&ChunkPos::new(*x, *z)));
            }
            _ => {}
        }
    }
    assert_eq!(generated.len(), 25);

    // Every rendered chunk's batch holds exactly its visible faces.
    for pos in level.loaded_chunks() {
        let chunk = level.chunk(pos).unwrap();
        assert_eq!(backend.visible_instances(pos).len(), chunk.planes());
    }
}

#[test]
fn streamed_terrain_is_stitched_and_editable() {
    let backend = HeadlessBackend::new();
    let mut level = Level::new(registry(), Box::new(backend.clone()), BOUNDS);
    let producer = producer(1, 1);

    let mut log = Vec::new();
    drive(&mut level, &producer, BlockPos::new(0, 5, 0), &mut log, |l| {
        l.stats().loaded_chunks == 9
    });

    // Seams between streamed chunks hide the faces that touch.
    let west = BlockPos::new(15, 1, 4);
    let east = BlockPos::new(16, 1, 4);
    assert!(!level.get_block(west).is_face_visible(Direction::East));
    assert!(!level.get_block(east).is_face_visible(Direction::West));
    // Outer walls of the 3 x 3 area stay open.
    assert!(level
        .get_block(BlockPos::new(-16, 1, 4))
        .is_face_visible(Direction::West));

    // Dig a hole across the seam and check both chunks react.
    level.set_block(east, BlockId::AIR).unwrap();
    assert!(level.get_block(west).is_face_visible(Direction::East));
    assert!(level.is_dirty(ChunkPos::new(0, 0)));
    assert!(level.is_dirty(ChunkPos::new(1, 0)));
    assert_eq!(level.recompute_dirty(), 2);
    for pos in [ChunkPos::new(0, 0), ChunkPos::new(1, 0)] {
        let chunk = level.chunk(pos).unwrap();
        assert_eq!(backend.visible_instances(pos).len(), chunk.planes());
    }

    // Snapshots carry the edit.
    let bytes = level.snapshot().to_bytes().unwrap();
    let restored = Level::restore(
        &LevelSnapshot::from_bytes(&bytes).unwrap(),
        registry(),
        Box::new(HeadlessBackend::new()),
    )
    .unwrap();
    assert!(restored.get_block(east).is_air());
    assert_eq!(restored.block_at(west), BlockId::DIRT);
    assert_eq!(restored.stats().planes, level.stats().planes);
}

/// Apply producer messages in order, feeding replies straight back.
fn deliver(level: &mut Level, loader: &mut ChunkLoader, messages: Vec<ProducerMessage>) {
    let mut pending: VecDeque<ProducerMessage> = messages.into();
    while let Some(message) = pending.pop_front() {
        if let Some(reply) = level.handle_message(message).unwrap() {
            pending.extend(loader.handle(reply));
        }
    }
}

#[test]
fn recentering_while_a_load_is_in_flight() {
    let backend = HeadlessBackend::new();
    let mut level = Level::new(registry(), Box::new(backend.clone()), BOUNDS);
    let mut loader = loader(1, 1);
    loader.start_render();

    let first = level.manage_chunks(BlockPos::new(0, 5, 0)).unwrap();
    let out = loader.handle(first);
    deliver(&mut level, &mut loader, out);
    let in_flight = loader.tick();
    assert!(in_flight.contains(&ProducerMessage::Load { x: 0, z: 0 }));

    // The viewpoint jumps away before the load is applied.
    let moved = level.manage_chunks(BlockPos::new(5 * 16 + 3, 5, 3)).unwrap();
    let replies = loader.handle(moved);
    deliver(&mut level, &mut loader, in_flight);
    deliver(&mut level, &mut loader, replies);
    while loader.pending_count() > 0 {
        let out = loader.tick();
        deliver(&mut level, &mut loader, out);
    }
    level.recompute_dirty();

    let center = ChunkPos::new(5, 0);
    assert!(!level.is_loaded(ChunkPos::new(0, 0)));
    assert!(!backend.is_attached(ChunkPos::new(0, 0)));
    assert_eq!(level.loaded_chunks().len(), 9);
    for pos in level.loaded_chunks() {
        assert!(pos.chebyshev_distance(center) <= 1, "{pos} still loaded");
    }
}

#[test]
fn world_client_runs_from_config() {
    let config = WorldConfig::default()
        .with_seed(7)
        .with_simulation_distance(1)
        .with_render_distance(1)
        .with_chunk_depth(24)
        .with_queue_interval_ms(1);
    let backend = HeadlessBackend::new();
    let mut client = WorldClient::start(config, registry(), Box::new(backend.clone())).unwrap();

    let viewpoint = Vec3::new(4.0, 30.0, 4.0);
    let deadline = Instant::now() + Duration::from_secs(20);
    while client.level().stats().loaded_chunks < 9 {
        assert!(Instant::now() < deadline, "timed out: {client:?}");
        client.pump().unwrap();
        client.tick(viewpoint).unwrap();
        client.frame();
        thread::sleep(Duration::from_millis(1));
    }

    let stats = client.level().stats();
    assert_eq!(stats.known_chunks, 9);
    assert!(stats.planes > 0);
    assert_eq!(backend.visible_instance_count(), stats.rendered_planes);
    client.shutdown();
}
