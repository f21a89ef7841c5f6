//! Face geometry and the per-chunk face-mesh accumulator.

use std::f32::consts::{FRAC_PI_2, PI};
use std::fmt;

use blockfield_core::{BlockPos, ChunkPos, Direction};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

use crate::backend::{InstanceBatch, RenderBackend};
use crate::registry::TextureId;

/// One drawable face: a unit quad transform and its texture.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct FaceInstance {
    pub transform: Mat4,
    pub texture: TextureId,
    _padding: [u32; 3],
}

impl FaceInstance {
    pub const fn new(transform: Mat4, texture: TextureId) -> Self {
        Self {
            transform,
            texture,
            _padding: [0; 3],
        }
    }
}

/// Rotation taking the quad's +Z normal onto `dir`.
fn face_rotation(dir: Direction) -> Quat {
    match dir {
        Direction::South => Quat::IDENTITY,
        Direction::North => Quat::from_rotation_y(PI),
        Direction::East => Quat::from_rotation_y(FRAC_PI_2),
        Direction::West => Quat::from_rotation_y(-FRAC_PI_2),
        Direction::Up => Quat::from_rotation_x(-FRAC_PI_2),
        Direction::Down => Quat::from_rotation_x(FRAC_PI_2),
    }
}

/// Placement of the face of block `pos` pointing towards `dir`.
///
/// The unit quad lies in the XY plane facing +Z; it is rotated outward and
/// moved half a block from the block centre along `dir`.
pub fn face_transform(dir: Direction, pos: BlockPos) -> Mat4 {
    let centre = pos.to_vec3() + Vec3::splat(0.5) + dir.offset().as_vec3() * 0.5;
    Mat4::from_rotation_translation(face_rotation(dir), centre)
}

/// Maps a chunk's visible faces to slots of one instance batch.
///
/// Logical slots are handed out per visible face and may leave holes when
/// faces disappear. The live batch is packed: on every rebuild the occupied
/// slots are copied, in slot order, to consecutive batch indices. Between
/// rebuilds, writes to slots that already have a batch index go straight to
/// the batch; anything else waits for the next rebuild.
pub struct FaceMeshAccumulator {
    chunk: ChunkPos,
    slots: Vec<Option<FaceInstance>>,
    free: Vec<usize>,
    /// Set for slots currently on the free list.
    vacant: Vec<bool>,
    /// Batch index of each logical slot, valid for the current batch only.
    live: Vec<Option<usize>>,
    planes: usize,
    rendered_planes: usize,
    batch: Option<Box<dyn InstanceBatch>>,
    attached: bool,
    needs_recompute: bool,
}

impl FaceMeshAccumulator {
    pub fn new(chunk: ChunkPos) -> Self {
        Self {
            chunk,
            slots: Vec::new(),
            free: Vec::new(),
            vacant: Vec::new(),
            live: Vec::new(),
            planes: 0,
            rendered_planes: 0,
            batch: None,
            attached: false,
            needs_recompute: false,
        }
    }

    /// Number of visible faces the next batch must hold.
    #[inline]
    pub const fn planes(&self) -> usize {
        self.planes
    }

    /// Capacity of the current batch.
    #[inline]
    pub const fn rendered_planes(&self) -> usize {
        self.rendered_planes
    }

    #[inline]
    pub const fn is_attached(&self) -> bool {
        self.attached
    }

    #[inline]
    pub const fn needs_recompute(&self) -> bool {
        self.needs_recompute
    }

    pub fn instance_at(&self, slot: usize) -> Option<&FaceInstance> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Occupied slots in slot order.
    pub fn instances(&self) -> impl Iterator<Item = &FaceInstance> {
        self.slots.iter().flatten()
    }

    /// Reserve a slot for a newly visible face.
    pub fn allocate(&mut self) -> usize {
        self.planes += 1;
        self.needs_recompute = true;
        if let Some(slot) = self.free.pop() {
            self.vacant[slot] = false;
            return slot;
        }
        self.slots.push(None);
        self.vacant.push(false);
        self.live.push(None);
        self.slots.len() - 1
    }

    /// Release the slot of a face that is no longer visible.
    pub fn free(&mut self, slot: usize) {
        if self.vacant.get(slot).copied().unwrap_or(true) {
            return;
        }
        self.remove_matrix_at(slot);
        self.vacant[slot] = true;
        self.free.push(slot);
        self.planes = self.planes.saturating_sub(1);
        self.needs_recompute = true;
    }

    /// Store a face at `slot`, pushing it to the live batch when it already has a place there.
    pub fn set_matrix_at(&mut self, slot: usize, instance: FaceInstance) {
        let Some(entry) = self.slots.get_mut(slot) else {
            return;
        };
        *entry = Some(instance);

        match (self.live[slot], self.batch.as_mut()) {
            (Some(index), Some(batch)) => {
                batch.set_instance_at(index, &instance);
                batch.mark_dirty();
            }
            _ => self.needs_recompute = true,
        }
    }

    /// Clear `slot`. The live batch keeps its size; the instance just stops drawing.
    pub fn remove_matrix_at(&mut self, slot: usize) {
        let Some(entry) = self.slots.get_mut(slot) else {
            return;
        };
        *entry = None;

        if let Some(index) = self.live[slot].take() {
            if let Some(batch) = self.batch.as_mut() {
                batch.clear_instance_at(index);
                batch.mark_dirty();
            }
        }
    }

    /// Replace the live batch with one sized to [`planes`](Self::planes) and repack it.
    pub fn recompute_mesh(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(mut old) = self.batch.take() {
            if self.attached {
                old.detach();
            }
        }

        let mut batch = backend.create_batch(self.chunk, self.planes);
        let mut next = 0;
        for (slot, entry) in self.slots.iter().enumerate() {
            self.live[slot] = None;
            if let Some(instance) = entry {
                batch.set_instance_at(next, instance);
                self.live[slot] = Some(next);
                next += 1;
            }
        }

        batch.mark_dirty();
        if self.attached {
            batch.attach();
        }
        self.batch = Some(batch);
        self.rendered_planes = self.planes;
        self.needs_recompute = false;
    }

    /// Put the batch in the visible scene, rebuilding first if it is stale.
    pub fn add(&mut self, backend: &mut dyn RenderBackend) {
        if self.needs_recompute || self.batch.is_none() {
            self.recompute_mesh(backend);
        }
        if !self.attached {
            if let Some(batch) = self.batch.as_mut() {
                batch.attach();
            }
            self.attached = true;
        }
    }

    /// Take the batch out of the visible scene. Slots are kept.
    pub fn remove(&mut self) {
        if self.attached {
            if let Some(batch) = self.batch.as_mut() {
                batch.detach();
            }
            self.attached = false;
        }
    }
}

impl fmt::Debug for FaceMeshAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaceMeshAccumulator")
            .field("chunk", &self.chunk)
            .field("slots", &self.slots.len())
            .field("planes", &self.planes)
            .field("rendered_planes", &self.rendered_planes)
            .field("attached", &self.attached)
            .field("needs_recompute", &self.needs_recompute)
            .field("batch", &self.batch.as_ref().map(|_| "<InstanceBatch>"))
            .finish()
    }
}
