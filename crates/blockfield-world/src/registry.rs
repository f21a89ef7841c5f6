//! Block kind registry.
//!
//! The registry is a closed, ordered table built once at startup and shared
//! immutably (`Arc<BlockRegistry>`) by every component that needs kind or
//! texture lookups. Indices are assigned in registration order.

use std::fmt;

use blockfield_core::{BlockId, Direction, Error, Result};
use bytemuck::{Pod, Zeroable};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Opaque handle into a texture atlas.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct TextureId(pub u32);

impl TextureId {
    /// Placeholder for kinds that never render.
    pub const NONE: Self = Self(u32::MAX);
}

/// Maps texture names to atlas handles.
///
/// Stitching and UV mapping live behind this trait; the world only ever sees
/// the returned [`TextureId`].
pub trait TextureAtlas {
    fn lookup(&mut self, name: &str) -> TextureId;
}

/// In-memory atlas that hands out ids in first-seen order.
#[derive(Debug, Default)]
pub struct SequentialAtlas {
    ids: HashMap<String, TextureId>,
}

impl SequentialAtlas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct textures seen so far.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<TextureId> {
        self.ids.get(name).copied()
    }
}

impl TextureAtlas for SequentialAtlas {
    fn lookup(&mut self, name: &str) -> TextureId {
        let next = TextureId(self.ids.len() as u32);
        *self.ids.entry_ref(name).or_insert(next)
    }
}

/// How a kind's six faces are textured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextureLayout {
    /// Same texture on every face.
    Uniform(String),
    /// Distinct top and bottom, shared sides.
    TopSideBottom {
        top: String,
        side: String,
        bottom: String,
    },
}

impl TextureLayout {
    fn name_for(&self, dir: Direction) -> &str {
        match self {
            Self::Uniform(name) => name,
            Self::TopSideBottom { top, side, bottom } => match dir {
                Direction::Up => top,
                Direction::Down => bottom,
                _ => side,
            },
        }
    }
}

/// A registered block kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockKind {
    id: BlockId,
    name: String,
    solid: bool,
    textures: [TextureId; 6],
}

impl BlockKind {
    #[inline]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub const fn is_solid(&self) -> bool {
        self.solid
    }

    #[inline]
    pub const fn is_air(&self) -> bool {
        !self.solid
    }

    /// Texture shown on the face pointing towards `dir`.
    #[inline]
    pub const fn texture(&self, dir: Direction) -> TextureId {
        self.textures[dir.index()]
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

const TEXTURE_ROOT: &str = "blocks/";

fn texture_path(name: &str) -> String {
    format!("{TEXTURE_ROOT}{name}.png")
}

/// Builder collecting kinds before textures are resolved.
#[derive(Debug)]
pub struct RegistryBuilder {
    entries: Vec<(String, Option<TextureLayout>)>,
}

impl RegistryBuilder {
    /// Register a solid kind. Its index is the number of kinds registered before it.
    pub fn register(mut self, name: impl Into<String>, layout: TextureLayout) -> Self {
        self.entries.push((name.into(), Some(layout)));
        self
    }

    /// Register a kind textured with `blocks/<name>.png` on every face.
    pub fn register_full_cube(self, name: &str) -> Self {
        let layout = TextureLayout::Uniform(texture_path(name));
        self.register(name, layout)
    }

    /// Resolve every texture through `atlas` and freeze the table.
    pub fn build(self, atlas: &mut dyn TextureAtlas) -> Result<BlockRegistry> {
        if self.entries.len() > usize::from(u16::MAX) {
            return Err(Error::InvalidData(format!(
                "{} block kinds do not fit a 16-bit index",
                self.entries.len()
            )));
        }

        let mut kinds = Vec::with_capacity(self.entries.len());
        let mut by_name = HashMap::with_capacity(self.entries.len());
        for (index, (name, layout)) in self.entries.into_iter().enumerate() {
            let id = BlockId(index as u16);
            if by_name.insert(name.clone(), id).is_some() {
                return Err(Error::InvalidData(format!(
                    "block kind {name:?} registered twice"
                )));
            }
            let textures = match &layout {
                Some(layout) => Direction::ALL.map(|dir| atlas.lookup(layout.name_for(dir))),
                None => [TextureId::NONE; 6],
            };
            kinds.push(BlockKind {
                id,
                name,
                solid: layout.is_some(),
                textures,
            });
        }

        Ok(BlockRegistry { kinds, by_name })
    }
}

/// Closed, stable-indexed set of block kinds.
#[derive(Debug)]
pub struct BlockRegistry {
    kinds: Vec<BlockKind>,
    by_name: HashMap<String, BlockId>,
}

impl BlockRegistry {
    /// Start a registry. Index 0 is always `air`.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            entries: vec![("air".to_string(), None)],
        }
    }

    /// The default kinds: air, stone, grass_block, dirt.
    pub fn standard(atlas: &mut dyn TextureAtlas) -> Result<Self> {
        Self::builder()
            .register_full_cube("stone")
            .register(
                "grass_block",
                TextureLayout::TopSideBottom {
                    top: texture_path("grass_block_top"),
                    side: texture_path("grass_block_side"),
                    bottom: texture_path("dirt"),
                },
            )
            .register_full_cube("dirt")
            .build(atlas)
    }

    pub fn get(&self, id: BlockId) -> Option<&BlockKind> {
        self.kinds.get(id.index())
    }

    /// Like [`BlockRegistry::get`] but reports unknown ids as an error.
    pub fn kind(&self, id: BlockId) -> Result<&BlockKind> {
        self.get(id).ok_or(Error::UnknownBlock(id.0))
    }

    #[inline]
    pub fn contains(&self, id: BlockId) -> bool {
        id.index() < self.kinds.len()
    }

    pub fn by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    /// Texture for one face of a kind; [`TextureId::NONE`] for air or unknown ids.
    #[inline]
    pub fn texture(&self, id: BlockId, dir: Direction) -> TextureId {
        self.get(id).map_or(TextureId::NONE, |kind| kind.texture(dir))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockKind> {
        self.kinds.iter()
    }
}
