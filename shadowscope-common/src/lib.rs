//! # Shared Wire Definitions (Producer ↔ Viewer)
//!
//! Defines the byte-level vocabulary shared by every program that reads or
//! writes shadowscope trace data: the mixed-data stream and the constants
//! that fix record sizes, record tags and topology codes.
//!
//! ## Key Types
//!
//! - [`MixedDataInput`] / [`MixedDataOutput`] - typed stream traits
//! - [`MixedDataReader`] / [`MixedDataWriter`] - `Read`/`Write` adapters
//! - [`ByteOrder`] - endianness selected per stream, never per platform

pub mod stream;

pub use stream::{
    ByteOrder, MixedDataInput, MixedDataOutput, MixedDataReader, MixedDataWriter, StreamError,
};

// ============================================================================
// Record Tags
// ============================================================================

/// **Drawable Stream**: a single primitive record follows
pub const DRAWABLE_TAG_PRIMITIVE: u8 = 0;

/// **Drawable Stream**: a composite record (primitive list) follows
pub const DRAWABLE_TAG_COMPOSITE: u8 = 1;

/// **Drawable Stream**: a shadow record (statistical summary) follows
pub const DRAWABLE_TAG_SHADOW: u8 = 2;

// ============================================================================
// Topology Codes
// ============================================================================

/// Zero-duration point, one vertex
pub const TOPOLOGY_EVENT: i8 = 0;

/// Interval on one row, two vertices, nestable
pub const TOPOLOGY_STATE: i8 = 1;

/// Directed interval between two rows, two vertices
pub const TOPOLOGY_ARROW: i8 = 2;

// ============================================================================
// Fixed Record Sizes (bytes)
// ============================================================================

/// `f64` earliest + `f64` latest
pub const TIME_BOUNDING_BOX_BYTESIZE: usize = 16;

/// `f64` time + `i32` line id
pub const COORD_BYTESIZE: usize = 12;

/// `f32` inclusive ratio + `f32` exclusive ratio
pub const CATEGORY_RATIOS_BYTESIZE: usize = 8;

/// `i32` category index + ratios + `i64` drawable count
pub const CATEGORY_WEIGHT_BYTESIZE: usize = 4 + CATEGORY_RATIOS_BYTESIZE + 8;

/// Ratios + `i64` drawable count
pub const CATEGORY_SUMMARY_BYTESIZE: usize = CATEGORY_RATIOS_BYTESIZE + 8;

/// Packed ARGB `i32` + modifiable flag byte
pub const COLOR_ALPHA_BYTESIZE: usize = 5;

// ============================================================================
// Synthetic Category Indices
// ============================================================================

/// Preview category carried by shadows of state drawables
pub const SHADOW_STATE_INDEX: i32 = -1;

/// Preview category carried by shadows of arrow drawables
pub const SHADOW_ARROW_INDEX: i32 = -2;

/// Preview category carried by shadows of event drawables
pub const SHADOW_EVENT_INDEX: i32 = -3;

// ============================================================================
// Container File
// ============================================================================

/// Leading bytes of every container file
pub const CONTAINER_MAGIC: [u8; 4] = *b"SHSC";

/// Current container layout revision
pub const CONTAINER_VERSION: i16 = 1;
