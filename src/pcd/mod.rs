//! Point-cloud container decoding.
//!
//! A container frame is a text header followed by a body of ASCII or packed binary
//! rows. Decoding runs in three steps:
//!
//! 1. [`header::read_header`] parses the header into [`ContainerMetadata`]
//! 2. [`ContainerMetadata::layout`] flattens the field declarations into a [`FieldLayout`]
//! 3. [`body::decode_body`] materializes a [`PointTable`], then a packed `rgb`
//!    column is split into `red`, `green` and `blue`
//!
//! ```rust
//! use pcd_relay::pcd::{Terminator, decode_container};
//!
//! let frame = b"VERSION .7\nFIELDS x y z intensity\nSIZE 4 4 4 4\nTYPE F F F F\n\
//! COUNT 1 1 1 1\nWIDTH 1\nHEIGHT 1\nPOINTS 1\nDATA ascii\nTOPIC lidar/front\n\
//! Time 120000000\n1.00 2.00 3.00 50.00\n";
//!
//! let decoded = decode_container("fallback", frame, Terminator::TimeSentinel).unwrap();
//! assert_eq!(decoded.topic, "lidar/front");
//! assert_eq!(decoded.time_minute, "2");
//! assert_eq!(decoded.table.row_count(), 1);
//! ```

pub mod body;
pub mod header;
pub mod table;

pub use header::{ContainerMetadata, Encoding, HeaderParser, Terminator, parse_header, read_header};
pub use table::{PointTable, TableColumn, TableView, VertexView};

use tracing::debug;

use crate::Result;
use crate::types::{BoundingBox, RawFrame};

/// A fully decoded frame, ready to be serialized for clients.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub topic: String,
    /// Capture time in whole minutes, as a decimal string
    pub time_minute: String,
    pub table: PointTable,
    pub objects: Vec<BoundingBox>,
}

/// Decode a raw container.
///
/// `transport_topic` is used when the header declares no `TOPIC`.
pub fn decode_container(
    transport_topic: &str,
    payload: &[u8],
    terminator: Terminator,
) -> Result<DecodedFrame> {
    let (metadata, body_start) = read_header(payload, terminator)?;
    let layout = metadata.layout()?;

    let mut table = body::decode_body(&metadata, &layout, &payload[body_start..])?;
    let unpacked = table.unpack_rgb();

    debug!(
        rows = table.row_count(),
        columns = table.columns().len(),
        rgb_unpacked = unpacked,
        "Decoded container body"
    );

    let time_minute = metadata.time_minute().to_string();
    let topic = metadata.topic.unwrap_or_else(|| transport_topic.to_string());

    Ok(DecodedFrame { topic, time_minute, table, objects: metadata.objects })
}

/// Decode a frame received from the messaging layer.
pub fn decode_frame(frame: &RawFrame, terminator: Terminator) -> Result<DecodedFrame> {
    decode_container(&frame.topic, &frame.payload, terminator)
}
