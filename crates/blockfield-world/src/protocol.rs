//! Messages exchanged between the chunk producer and the consuming level.
//!
//! Both directions are closed enums serialized as `{"type": ..., "data": ...}`
//! envelopes, so the same messages can cross a process boundary unchanged.

use blockfield_core::ChunkPos;
use serde::{Deserialize, Serialize};

use crate::codec::SerializedChunk;

/// Producer to consumer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ProducerMessage {
    /// The producer is running.
    Ready,
    /// Number of positions the consumer should expect before rendering starts.
    ToSimulate(usize),
    /// Terrain for a chunk that has never been sent before.
    Generate {
        x: i32,
        z: i32,
        chunk: SerializedChunk,
    },
    /// Attach a chunk's geometry to the visible scene.
    Load { x: i32, z: i32 },
    /// Detach a chunk's geometry.
    Unload { x: i32, z: i32 },
}

impl ProducerMessage {
    /// Chunk the message is about, if any.
    pub const fn chunk_pos(&self) -> Option<ChunkPos> {
        match *self {
            Self::Generate { x, z, .. } | Self::Load { x, z } | Self::Unload { x, z } => {
                Some(ChunkPos::new(x, z))
            }
            Self::Ready | Self::ToSimulate(_) => None,
        }
    }

    /// Short name used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::ToSimulate(_) => "to_simulate",
            Self::Generate { .. } => "generate",
            Self::Load { .. } => "load",
            Self::Unload { .. } => "unload",
        }
    }
}

/// Consumer to producer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ConsumerMessage {
    /// Ring radii, sent once at startup.
    Distances {
        simulation_distance: u32,
        render_distance: u32,
    },
    /// New viewpoint chunk plus the full set of currently loaded chunks.
    Update {
        pos: ChunkPos,
        loaded_chunks: Vec<ChunkPos>,
    },
    /// Switch from simulate-only to render-enabled.
    StartRender,
}

impl ConsumerMessage {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Distances { .. } => "distances",
            Self::Update { .. } => "update",
            Self::StartRender => "start_render",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn producer_envelopes() {
        assert_eq!(
            serde_json::to_value(ProducerMessage::Ready).unwrap(),
            json!({"type": "ready"})
        );
        assert_eq!(
            serde_json::to_value(ProducerMessage::ToSimulate(49)).unwrap(),
            json!({"type": "to_simulate", "data": 49})
        );
        assert_eq!(
            serde_json::to_value(ProducerMessage::Unload { x: -2, z: 5 }).unwrap(),
            json!({"type": "unload", "data": {"x": -2, "z": 5}})
        );
    }

    #[test]
    fn consumer_envelopes() {
        let update = ConsumerMessage::Update {
            pos: ChunkPos::new(0, 0),
            loaded_chunks: vec![ChunkPos::new(1, -1)],
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"type": "update", "data": {"pos": {"x": 0, "z": 0}, "loaded_chunks": [{"x": 1, "z": -1}]}})
        );
        assert_eq!(
            serde_json::to_value(ConsumerMessage::Distances {
                simulation_distance: 3,
                render_distance: 2
            })
            .unwrap(),
            json!({"type": "distances", "data": {"simulation_distance": 3, "render_distance": 2}})
        );

        let parsed: ConsumerMessage = serde_json::from_value(json!({"type": "start_render"})).unwrap();
        assert_eq!(parsed, ConsumerMessage::StartRender);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = serde_json::from_value::<ProducerMessage>(json!({"type": "explode", "data": null}));
        assert!(result.is_err());
    }

    #[test]
    fn generate_carries_position() {
        let msg = ProducerMessage::Generate {
            x: 3,
            z: -4,
            chunk: SerializedChunk {
                chunk_pos: ChunkPos::new(3, -4),
                blocks: Vec::new(),
            },
        };
        assert_eq!(msg.chunk_pos(), Some(ChunkPos::new(3, -4)));
        assert_eq!(msg.kind(), "generate");
        let back: ProducerMessage = serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(back, msg);
    }
}
