//! Per-category statistics for summary output.
//!
//! Turns the running summaries a [`CategoryTable`] accumulated (or loaded
//! from a container) into rows ranked by how much of the trace each
//! category covers.
//!
//! # Display
//!
//! ```text
//! CATEGORY            INCL     EXCL    COUNT
//! MPI_Send           42.3%    40.1%     1200
//! compute            18.7%    18.7%      310
//! ```

// Percentages and shares convert counts to f64
#![allow(clippy::cast_precision_loss)]

use serde::Serialize;

use crate::domain::{CategoryTable, TimeBoundingBox};
use crate::drawable::Drawable;

/// One category's share of the trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStatsRow {
    pub index: i32,
    pub name: String,
    pub topology: String,

    /// Share of the trace window including nested time; overlapping
    /// drawables can push it past 1.0
    pub inclusive_ratio: f64,

    /// Share of the trace window excluding nested time
    pub exclusive_ratio: f64,

    /// Real drawables of this category
    pub count: i64,

    /// Share of all real drawables (0.0 - 100.0)
    pub percentage: f64,
}

/// Everything the `summary` command reports about a container
#[derive(Debug, Clone, Serialize)]
pub struct TraceSummary {
    pub earliest: f64,
    pub latest: f64,
    pub real_drawables: usize,
    pub shadows: usize,
    pub categories: Vec<CategoryStatsRow>,
}

impl TraceSummary {
    #[must_use]
    pub fn new(drawables: &[Drawable], table: &CategoryTable) -> Self {
        let mut window = TimeBoundingBox::empty();
        let mut shadows = 0;
        for drawable in drawables {
            window.affect_time_bounds(drawable.tbox());
            if drawable.is_shadow() {
                shadows += 1;
            }
        }
        let (earliest, latest) = if window.is_empty() { (0.0, 0.0) } else { (window.earliest(), window.latest()) };
        Self {
            earliest,
            latest,
            real_drawables: drawables.len() - shadows,
            shadows,
            categories: analyze_categories(table),
        }
    }
}

/// Rank every used, non-preview category by inclusive ratio (largest first)
#[must_use]
pub fn analyze_categories(table: &CategoryTable) -> Vec<CategoryStatsRow> {
    let categories = table.used_categories();
    let total: i64 = categories.iter().map(|category| category.summary.num_real_objs).sum();

    let mut rows: Vec<CategoryStatsRow> = categories
        .into_iter()
        .map(|category| {
            let summary = category.summary;
            let percentage =
                if total > 0 { (summary.num_real_objs as f64 / total as f64) * 100.0 } else { 0.0 };
            CategoryStatsRow {
                index: category.index,
                name: category.name,
                topology: category.topology.to_string(),
                inclusive_ratio: f64::from(summary.ratios.inclusive),
                exclusive_ratio: f64::from(summary.ratios.exclusive),
                count: summary.num_real_objs,
                percentage,
            }
        })
        .collect();

    // stable, so equal ratios stay in index order
    rows.sort_by(|a, b| b.inclusive_ratio.total_cmp(&a.inclusive_ratio));
    rows
}
