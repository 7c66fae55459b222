//! Domain model for shadowscope
//!
//! This module contains the leaf types every drawable is built from:
//! - Time bounds and vertices with their total orders
//! - Categories, their weights and summaries
//! - The category resolution context
//! - Structured errors

pub mod category;
pub mod errors;
pub mod table;
pub mod time;

// Re-export common types for convenience
pub use category::{
    default_color, format_info_keys, palette_color, parse_info_keys, Category, CategoryRatios, CategorySummary,
    CategoryWeight, ColorAlpha, InfoType, Topology,
};
pub use errors::{CodecError, ConvertError, DrawableError, PyramidError};
pub use table::{CategoryBinding, CategoryState, CategoryTable};
pub use time::{
    Coord, TimeBoundingBox, TimeOrder, DECRE_FINALTIME_ORDER, DECRE_STARTTIME_ORDER,
    INCRE_FINALTIME_ORDER, INCRE_STARTTIME_ORDER,
};
