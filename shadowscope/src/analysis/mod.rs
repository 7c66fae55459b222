//! Analysis over decoded drawables
//!
//! This module contains the passes that run after decoding and before
//! anything is written or shown: causality validation, the multi-resolution
//! shadow pyramid and per-category statistics.

pub mod category_stats;
pub mod pyramid;
pub mod validation;

pub use category_stats::{analyze_categories, CategoryStatsRow, TraceSummary};
pub use pyramid::{Pyramid, PyramidConfig, ShadowBin, ShadowKey, DEFAULT_LEAF_BINS};
pub use validation::{validate_drawables, CausalityViolation, ValidationResult, ValidationWarning};
