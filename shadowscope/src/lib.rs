//! # shadowscope - Multi-Resolution Shadow Aggregation for Trace Timelines
//!
//! shadowscope turns raw timed drawables (events, states, arrows) into
//! shadows: statistical merges that carry, per category, how much of their
//! time span the category covers inclusively and exclusively of nested
//! states. A zoomed-out timeline draws one shadow where thousands of real
//! drawables would overlap on a pixel.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │  Chrome trace    │────▶│    Drawables     │────▶│  Shadow pyramid  │
//! │  (convert)       │     │  (drawable)      │     │  (analysis)      │
//! └──────────────────┘     └────────┬─────────┘     └────────┬─────────┘
//!                                   │                        │
//!                                   ▼                        ▼
//!                          ┌──────────────────┐     ┌──────────────────┐
//!                          │    Container     │◀────│ Category summary │
//!                          │  (export)        │     │  (domain table)  │
//!                          └──────────────────┘     └──────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`domain`]: time bounds, vertices, categories, weights, the category
//!   resolution table and error types
//! - [`drawable`]: primitives, composites and shadows, the merge engine and
//!   nesting exclusion
//! - [`codec`]: symmetric binary encoding over mixed-data streams
//! - [`analysis`]: causality validation, the shadow pyramid and per-category
//!   statistics
//! - [`convert`]: Chrome Trace Event JSON import
//! - [`export`]: the container file
//! - [`cli`]: command-line argument parsing
//!
//! ## Key Concepts
//!
//! - **Inclusive ratio**: a category's share of a shadow's duration,
//!   counting time spent in states nested inside it
//! - **Exclusive ratio**: the same share with nested time removed
//! - **Nesting**: a state strictly inside another state on the same rows;
//!   only states nest, events and arrows never do
//! - **Placeholder**: `UnknownType-<index>`, synthesized when a drawable
//!   names a category the table lacks

pub mod analysis;
pub mod cli;
pub mod codec;
pub mod convert;
pub mod domain;
pub mod drawable;
pub mod export;
