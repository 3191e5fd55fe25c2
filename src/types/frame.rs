//! Frame types flowing through the relay

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Class label given to every annotated bounding box.
pub const DEFAULT_OBJECT_CLASS: &str = "Object";

/// Raw frame as delivered by the messaging layer.
///
/// Ephemeral: it is consumed by the drain loop once dequeued.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// Transport topic the frame arrived on
    pub topic: String,

    /// Container bytes (header + body), shared without copying
    pub payload: Arc<[u8]>,
}

impl RawFrame {
    /// Create a new raw frame
    pub fn new(topic: impl Into<String>, payload: impl Into<Arc<[u8]>>) -> Self {
        Self { topic: topic.into(), payload: payload.into() }
    }
}

/// Axis-aligned object extent annotated in a frame header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub minx: f64,
    pub maxx: f64,
    pub miny: f64,
    pub maxy: f64,
    pub minz: f64,
    pub maxz: f64,
    #[serde(rename = "class")]
    pub class_name: String,
}

impl BoundingBox {
    /// Build a box from `minx maxx miny maxy minz maxz` values.
    pub fn from_extents(extents: [f64; 6]) -> Self {
        let [minx, maxx, miny, maxy, minz, maxz] = extents;
        Self { minx, maxx, miny, maxy, minz, maxz, class_name: DEFAULT_OBJECT_CLASS.to_string() }
    }
}

/// Compressed, normalized message delivered to visualization subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    /// Topic declared by the frame
    pub topic: String,
    /// Compressed UTF-8 JSON table
    pub payload: Vec<u8>,
    /// Bounding boxes carried by the frame header
    pub objects: Vec<BoundingBox>,
    /// Capture time in whole minutes
    pub time: String,
}
