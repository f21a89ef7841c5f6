//! Seam between the face-mesh accumulator and whatever draws instances.
//!
//! The world only needs to create fixed-size instance batches, write single
//! instances into them and toggle their membership in the visible scene.

use std::cell::RefCell;
use std::rc::Rc;

use blockfield_core::ChunkPos;
use hashbrown::HashMap;

use crate::mesh::FaceInstance;

/// A fixed-capacity batch of face instances drawn in one call.
pub trait InstanceBatch {
    fn capacity(&self) -> usize;

    /// Overwrite one instance. Indices at or past capacity are ignored.
    fn set_instance_at(&mut self, index: usize, instance: &FaceInstance);

    /// Stop drawing one instance without resizing the batch.
    fn clear_instance_at(&mut self, index: usize);

    /// Ask the backend to re-upload the batch before the next draw.
    fn mark_dirty(&mut self);

    /// Add the batch to the visible scene.
    fn attach(&mut self);

    /// Remove the batch from the visible scene.
    fn detach(&mut self);
}

/// Creates instance batches.
pub trait RenderBackend {
    fn create_batch(&mut self, chunk: ChunkPos, capacity: usize) -> Box<dyn InstanceBatch>;
}

/// Counters kept by [`HeadlessBackend`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub batches_created: usize,
    pub live_batches: usize,
    pub attached_batches: usize,
    pub instance_writes: usize,
    pub instance_clears: usize,
    pub dirty_marks: usize,
}

#[derive(Debug, Default)]
struct BatchRecord {
    chunk: ChunkPos,
    attached: bool,
    instances: Vec<Option<FaceInstance>>,
}

#[derive(Debug, Default)]
struct Scene {
    next_id: u64,
    batches: HashMap<u64, BatchRecord>,
    stats: SceneStats,
}

/// Backend that keeps the scene in memory instead of drawing it.
///
/// Cloning shares the same scene, so a handle can be kept for inspection
/// after the backend itself has been handed to a level.
#[derive(Clone, Debug, Default)]
pub struct HeadlessBackend {
    scene: Rc<RefCell<Scene>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> SceneStats {
        let scene = self.scene.borrow();
        let mut stats = scene.stats;
        stats.live_batches = scene.batches.len();
        stats.attached_batches = scene.batches.values().filter(|b| b.attached).count();
        stats
    }

    /// Instances currently drawn for `chunk`, in batch order.
    pub fn visible_instances(&self, chunk: ChunkPos) -> Vec<FaceInstance> {
        self.scene
            .borrow()
            .batches
            .values()
            .filter(|b| b.attached && b.chunk == chunk)
            .flat_map(|b| b.instances.iter().flatten().copied())
            .collect()
    }

    pub fn is_attached(&self, chunk: ChunkPos) -> bool {
        self.scene
            .borrow()
            .batches
            .values()
            .any(|b| b.attached && b.chunk == chunk)
    }

    /// Total instances across attached batches.
    pub fn visible_instance_count(&self) -> usize {
        self.scene
            .borrow()
            .batches
            .values()
            .filter(|b| b.attached)
            .map(|b| b.instances.iter().flatten().count())
            .sum()
    }
}

impl RenderBackend for HeadlessBackend {
    fn create_batch(&mut self, chunk: ChunkPos, capacity: usize) -> Box<dyn InstanceBatch> {
        let mut scene = self.scene.borrow_mut();
        let id = scene.next_id;
        scene.next_id += 1;
        scene.stats.batches_created += 1;
        scene.batches.insert(
            id,
            BatchRecord {
                chunk,
                attached: false,
                instances: vec![None; capacity],
            },
        );

        Box::new(HeadlessBatch {
            id,
            capacity,
            scene: Rc::clone(&self.scene),
        })
    }
}

struct HeadlessBatch {
    id: u64,
    capacity: usize,
    scene: Rc<RefCell<Scene>>,
}

impl HeadlessBatch {
    fn with_record(&self, f: impl FnOnce(&mut BatchRecord, &mut SceneStats)) {
        let mut scene = self.scene.borrow_mut();
        let Scene { batches, stats, .. } = &mut *scene;
        if let Some(record) = batches.get_mut(&self.id) {
            f(record, stats);
        }
    }
}

impl InstanceBatch for HeadlessBatch {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn set_instance_at(&mut self, index: usize, instance: &FaceInstance) {
        self.with_record(|record, stats| {
            if let Some(slot) = record.instances.get_mut(index) {
                *slot = Some(*instance);
                stats.instance_writes += 1;
            }
        });
    }

    fn clear_instance_at(&mut self, index: usize) {
        self.with_record(|record, stats| {
            if let Some(slot) = record.instances.get_mut(index) {
                *slot = None;
                stats.instance_clears += 1;
            }
        });
    }

    fn mark_dirty(&mut self) {
        self.with_record(|_, stats| stats.dirty_marks += 1);
    }

    fn attach(&mut self) {
        self.with_record(|record, _| record.attached = true);
    }

    fn detach(&mut self) {
        self.with_record(|record, _| record.attached = false);
    }
}

impl Drop for HeadlessBatch {
    fn drop(&mut self) {
        self.scene.borrow_mut().batches.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use glam::Mat4;

    use super::*;
    use crate::registry::TextureId;

    #[test]
    fn dropped_batches_leave_the_scene() {
        let mut backend = HeadlessBackend::new();
        let chunk = ChunkPos::new(1, 1);
        let mut batch = backend.create_batch(chunk, 2);
        batch.set_instance_at(0, &FaceInstance::new(Mat4::IDENTITY, TextureId(3)));
        batch.set_instance_at(5, &FaceInstance::new(Mat4::IDENTITY, TextureId(3)));
        batch.attach();

        assert!(backend.is_attached(chunk));
        assert_eq!(backend.visible_instances(chunk).len(), 1);
        assert_eq!(backend.stats().instance_writes, 1);

        drop(batch);
        let stats = backend.stats();
        assert_eq!(stats.live_batches, 0);
        assert_eq!(stats.batches_created, 1);
        assert!(!backend.is_attached(chunk));
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut backend = HeadlessBackend::new();
        let mut batch = backend.create_batch(ChunkPos::new(0, 0), 3);
        batch.set_instance_at(1, &FaceInstance::new(Mat4::IDENTITY, TextureId(0)));
        batch.attach();
        batch.clear_instance_at(1);
        assert_eq!(batch.capacity(), 3);
        assert_eq!(backend.visible_instance_count(), 0);
    }
}
