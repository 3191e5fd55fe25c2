//! Core types for point-cloud frame representation.
//!
//! This module provides the foundational data structures shared by the decoder and
//! the ingestion bridge.
//!
//! ## Architecture
//!
//! - [`RawFrame`] is a frame exactly as the messaging layer delivered it
//! - [`FieldLayout`] is the flattened, ordered column layout of a point row
//! - [`ScalarType`] maps a declared `(TYPE, SIZE)` pair to a concrete scalar with size
//! - [`Scalar`] holds one decoded table cell
//! - [`OutboundEnvelope`] is the compressed message handed to subscribers
//!
//! ## Usage Example
//!
//! ```rust
//! use pcd_relay::types::{FieldKind, FieldLayout, Scalar, ScalarType};
//!
//! let layout = FieldLayout::build(
//!     &["x".to_string(), "y".to_string(), "z".to_string()],
//!     &[1, 1, 1],
//!     &[FieldKind::Float; 3],
//!     &[4, 4, 4],
//! ).unwrap();
//! assert_eq!(layout.row_width, 12);
//!
//! let data = 4500.0f32.to_le_bytes();
//! let value = ScalarType::Float32.read_le(&data, 0);
//! assert_eq!(value, Some(Scalar::Float32(4500.0)));
//! ```

mod frame;
mod layout;
mod scalar_data;
mod scalar_type;

// Re-export all public types
pub use frame::{BoundingBox, DEFAULT_OBJECT_CLASS, OutboundEnvelope, RawFrame};
pub use layout::{ColumnSpec, FieldLayout, MAX_COLUMNS};
pub use scalar_type::{FieldKind, Scalar, ScalarType};
