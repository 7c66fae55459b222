//! Multi-resolution shadow pyramid
//!
//! The trace window is split into `leaf_bins` equal bins; every level above
//! halves the bin count until a single root bin spans the whole window.
//!
//! ## Data Flow
//!
//! ```text
//! real drawables ──► lowest bin that covers each one
//!                         │
//! level 0 (leaves)   finalize shadows
//!                         │
//! level k            own drawables + both children's shadows ──► finalize
//!                         │
//! root               shadows ──► CategoryTable summaries
//! ```
//!
//! Inside a bin, drawables are merged into one shadow per
//! [`ShadowKey`] (topology plus the rows of each vertex), so a zoomed-out
//! view draws one shadow per row pair instead of every drawable.

// Bin widths divide durations by bin counts
#![allow(clippy::cast_precision_loss)]

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use log::debug;

use crate::domain::{CategoryTable, DrawableError, PyramidError, TimeBoundingBox, Topology};
use crate::drawable::{Drawable, Shadow};

pub const DEFAULT_LEAF_BINS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidConfig {
    leaf_bins: usize,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self { leaf_bins: DEFAULT_LEAF_BINS }
    }
}

impl PyramidConfig {
    /// `leaf_bins` must be a power of two
    pub fn new(leaf_bins: usize) -> Result<Self, PyramidError> {
        if leaf_bins.is_power_of_two() {
            Ok(Self { leaf_bins })
        } else {
            Err(PyramidError::InvalidLeafBins(leaf_bins))
        }
    }

    #[must_use]
    pub fn leaf_bins(&self) -> usize {
        self.leaf_bins
    }
}

/// Which shadow of a bin a drawable is merged into
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ShadowKey {
    pub topology: Topology,
    pub lines: Vec<i32>,
}

impl ShadowKey {
    #[must_use]
    pub fn of(drawable: &Drawable) -> Self {
        Self { topology: drawable.topology(), lines: drawable.line_ids() }
    }
}

#[derive(Debug, Clone)]
pub struct ShadowBin {
    tbox: TimeBoundingBox,
    shadows: BTreeMap<ShadowKey, Shadow>,
    /// Drawables placed directly in this bin
    placed: usize,
}

impl ShadowBin {
    fn new(tbox: TimeBoundingBox) -> Self {
        Self { tbox, shadows: BTreeMap::new(), placed: 0 }
    }

    #[must_use]
    pub fn tbox(&self) -> &TimeBoundingBox {
        &self.tbox
    }

    pub fn shadows(&self) -> impl Iterator<Item = (&ShadowKey, &Shadow)> {
        self.shadows.iter()
    }

    #[must_use]
    pub fn shadow(&self, key: &ShadowKey) -> Option<&Shadow> {
        self.shadows.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shadows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shadows.is_empty()
    }

    #[must_use]
    pub fn placed(&self) -> usize {
        self.placed
    }

    fn place(&mut self, drawable: &Drawable) -> Result<(), DrawableError> {
        match self.shadows.entry(ShadowKey::of(drawable)) {
            Entry::Occupied(mut shadow) => shadow.get_mut().merge_with_drawable(drawable)?,
            Entry::Vacant(slot) => {
                slot.insert(Shadow::from_drawable(drawable));
            }
        }
        self.placed += 1;
        Ok(())
    }

    fn absorb(&mut self, child: &ShadowBin) -> Result<(), DrawableError> {
        for (key, shadow) in &child.shadows {
            self.shadows
                .entry(key.clone())
                .or_insert_with(|| Shadow::with_vertex_count(key.topology, key.lines.len()))
                .merge_with_shadow(shadow)?;
        }
        Ok(())
    }

    fn initialize(&mut self) {
        for shadow in self.shadows.values_mut() {
            shadow.initialize_map_of_category_weights();
        }
    }

    fn finalize(&mut self) {
        for shadow in self.shadows.values_mut() {
            shadow.finalize_map_of_category_weights();
        }
    }
}

/// Equal-width bins over `window`, flush with both of its ends
fn leaf_bounds(window: &TimeBoundingBox, count: usize) -> Vec<TimeBoundingBox> {
    let width = window.duration() / count as f64;
    (0..count)
        .map(|i| {
            let earliest = if i == 0 { window.earliest() } else { window.earliest() + width * i as f64 };
            let latest = if i + 1 == count { window.latest() } else { window.earliest() + width * (i + 1) as f64 };
            TimeBoundingBox::new(earliest, latest)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Pyramid {
    window: TimeBoundingBox,
    /// Leaves first, root last
    levels: Vec<Vec<ShadowBin>>,
}

impl Pyramid {
    /// Bin `drawables` and build finalized shadows on every level.
    ///
    /// # Panics
    ///
    /// Panics if `drawables` contains an unfinalized shadow.
    pub fn build(drawables: &[Drawable], config: &PyramidConfig) -> Result<Self, PyramidError> {
        let mut window = TimeBoundingBox::empty();
        for drawable in drawables {
            window.affect_time_bounds(drawable.tbox());
        }
        let leaf_count = if window.duration() > 0.0 { config.leaf_bins } else { 1 };
        let leaves = leaf_bounds(&window, leaf_count);

        let depth = leaf_count.trailing_zeros() as usize + 1;
        let mut levels: Vec<Vec<ShadowBin>> = (0..depth)
            .map(|level| {
                let span = 1usize << level;
                (0..leaf_count / span)
                    .map(|j| {
                        let first = &leaves[j * span];
                        let last = &leaves[(j + 1) * span - 1];
                        ShadowBin::new(TimeBoundingBox::new(first.earliest(), last.latest()))
                    })
                    .collect()
            })
            .collect();

        for drawable in drawables {
            let (level, bin) = Self::placement(&levels, drawable.tbox());
            levels[level][bin].place(drawable)?;
        }

        for level in 0..depth {
            if level > 0 {
                let (lower, upper) = levels.split_at_mut(level);
                let children = &lower[level - 1];
                for (j, bin) in upper[0].iter_mut().enumerate() {
                    bin.initialize();
                    for child in &children[2 * j..2 * j + 2] {
                        bin.absorb(child)?;
                    }
                }
            }
            for bin in &mut levels[level] {
                bin.finalize();
            }
            debug!(
                "Pyramid level {level}: {} bins, {} shadows, {} drawables placed",
                levels[level].len(),
                levels[level].iter().map(ShadowBin::len).sum::<usize>(),
                levels[level].iter().map(ShadowBin::placed).sum::<usize>(),
            );
        }

        Ok(Self { window, levels })
    }

    /// Lowest `(level, bin)` whose bin covers `tbox`
    fn placement(levels: &[Vec<ShadowBin>], tbox: &TimeBoundingBox) -> (usize, usize) {
        let leaves = &levels[0];
        let leaf = leaves
            .partition_point(|bin| bin.tbox.latest() <= tbox.earliest())
            .min(leaves.len() - 1);
        for (level, bins) in levels.iter().enumerate() {
            let bin = leaf >> level;
            if bins[bin].tbox.covers(tbox) {
                return (level, bin);
            }
        }
        (levels.len() - 1, 0)
    }

    #[must_use]
    pub fn window(&self) -> &TimeBoundingBox {
        &self.window
    }

    /// Number of levels, leaves included
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn level(&self, level: usize) -> &[ShadowBin] {
        self.levels.get(level).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn root(&self) -> &ShadowBin {
        &self.levels[self.levels.len() - 1][0]
    }

    /// Shadows of `level` whose bins overlap `view`
    pub fn visible_shadows<'a>(
        &'a self,
        level: usize,
        view: &'a TimeBoundingBox,
    ) -> impl Iterator<Item = &'a Shadow> + 'a {
        self.level(level)
            .iter()
            .filter(move |bin| bin.tbox.overlaps(view))
            .flat_map(|bin| bin.shadows.values())
    }

    /// Fold the root shadows into `table`'s running summaries, each scaled
    /// by its share of the whole window
    pub fn accumulate_summaries(&self, table: &mut CategoryTable) {
        let window_duration = self.window.duration();
        for shadow in self.root().shadows.values() {
            let scale = if window_duration > 0.0 { shadow.tbox().duration() / window_duration } else { 0.0 };
            table.accumulate_summary(shadow.weights(), scale);
        }
    }

    /// Every shadow, leaves first
    #[must_use]
    pub fn into_shadows(self) -> Vec<Shadow> {
        self.levels
            .into_iter()
            .flatten()
            .flat_map(|bin| bin.shadows.into_values())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{default_color, Category, Coord};
    use crate::drawable::Primitive;
    use std::sync::Arc;

    fn work() -> Arc<Category> {
        Arc::new(Category::new(0, "work", Topology::State, default_color("work")))
    }

    fn states(spans: &[(f64, f64, i32)]) -> Vec<Drawable> {
        let work = work();
        spans
            .iter()
            .map(|&(start, end, line)| Drawable::from(Primitive::state(&work, start, end, line)))
            .collect()
    }

    #[test]
    fn test_config_requires_power_of_two() {
        assert_eq!(PyramidConfig::default().leaf_bins(), DEFAULT_LEAF_BINS);
        assert!(PyramidConfig::new(8).is_ok());
        assert!(matches!(PyramidConfig::new(0), Err(PyramidError::InvalidLeafBins(0))));
        assert!(matches!(PyramidConfig::new(6), Err(PyramidError::InvalidLeafBins(6))));
    }

    #[test]
    fn test_levels_halve_up_to_root() {
        let drawables = states(&[(0.0, 1.0, 0), (7.0, 8.0, 0)]);
        let pyramid = Pyramid::build(&drawables, &PyramidConfig::new(4).unwrap()).unwrap();

        assert_eq!(pyramid.depth(), 3);
        assert_eq!(pyramid.level(0).len(), 4);
        assert_eq!(pyramid.level(1).len(), 2);
        assert_eq!(*pyramid.root().tbox(), TimeBoundingBox::new(0.0, 8.0));
        assert_eq!(*pyramid.level(0)[1].tbox(), TimeBoundingBox::new(2.0, 4.0));
    }

    #[test]
    fn test_drawables_land_in_lowest_covering_bin() {
        let drawables = states(&[(0.0, 1.0, 0), (1.5, 2.5, 0), (0.5, 7.5, 1), (6.0, 8.0, 0)]);
        let pyramid = Pyramid::build(&drawables, &PyramidConfig::new(4).unwrap()).unwrap();

        let placed = |level: usize| pyramid.level(level).iter().map(ShadowBin::placed).collect::<Vec<_>>();
        // bins of width 2: [1.5, 2.5] straddles a leaf boundary, [0.5, 7.5] needs the root
        assert_eq!(placed(0), vec![1, 0, 0, 1]);
        assert_eq!(placed(1), vec![1, 0]);
        assert_eq!(placed(2), vec![1]);
    }

    #[test]
    fn test_root_counts_every_drawable() {
        let drawables = states(&[(0.0, 1.0, 0), (1.5, 2.5, 0), (3.0, 4.0, 1), (6.0, 8.0, 0)]);
        let pyramid = Pyramid::build(&drawables, &PyramidConfig::new(4).unwrap()).unwrap();

        let root = pyramid.root();
        let total: i64 = root.shadows().map(|(_, shadow)| shadow.num_real_objs()).sum();
        assert_eq!(total, 4);
        assert_eq!(root.len(), 2);
        assert!(root.shadows().all(|(_, shadow)| shadow.is_finalized()));

        let row0 = root.shadow(&ShadowKey { topology: Topology::State, lines: vec![0, 0] }).unwrap();
        assert_eq!(row0.num_real_objs(), 3);
        assert_eq!(*row0.tbox(), TimeBoundingBox::new(0.0, 8.0));
        // 1 + 1 + 2 seconds of "work" over an 8 second shadow
        let weight = row0.weight(0).unwrap();
        assert!((weight.ratios.inclusive - 0.5).abs() < 1e-5);
        assert!((weight.ratios.exclusive - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_sparse_children_leave_outer_state_its_gaps() {
        let call = Arc::new(Category::new(1, "call", Topology::State, default_color("call")));
        let mut drawables = states(&[(0.0, 1000.0, 0)]);
        drawables.push(Drawable::from(Primitive::state(&call, 10.0, 20.0, 0)));
        drawables.push(Drawable::from(Primitive::state(&call, 300.0, 310.0, 0)));
        let pyramid = Pyramid::build(&drawables, &PyramidConfig::new(4).unwrap()).unwrap();

        let root = pyramid.root().shadow(&ShadowKey { topology: Topology::State, lines: vec![0] }).unwrap();
        let exclusive = |index| f64::from(root.weight(index).unwrap().ratios.exclusive);
        assert!((exclusive(0) - 0.98).abs() < 1e-5, "main kept {}", exclusive(0));
        assert!((exclusive(1) - 0.02).abs() < 1e-5);

        let exclusive_sum: f64 = root.weights().map(|w| f64::from(w.ratios.exclusive)).sum();
        assert!((exclusive_sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_summaries_scale_by_window_share() {
        let drawables = states(&[(0.0, 2.0, 0), (4.0, 8.0, 1)]);
        let pyramid = Pyramid::build(&drawables, &PyramidConfig::new(2).unwrap()).unwrap();
        let mut table = CategoryTable::new();
        table.insert((*work()).clone());
        table.resolve(0);
        pyramid.accumulate_summaries(&mut table);

        let summary = table.state(0).unwrap().summary;
        assert_eq!(summary.num_real_objs, 2);
        // 6 seconds of work over an 8 second window
        assert!((summary.ratios.inclusive - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_zero_length_window_has_one_bin() {
        let event = Arc::new(Category::new(1, "mark", Topology::Event, default_color("mark")));
        let drawables = vec![
            Drawable::from(Primitive::event(&event, 3.0, 0)),
            Drawable::from(Primitive::event(&event, 3.0, 0)),
        ];
        let pyramid = Pyramid::build(&drawables, &PyramidConfig::default()).unwrap();
        assert_eq!(pyramid.depth(), 1);
        let shadow = pyramid.root().shadow(&ShadowKey { topology: Topology::Event, lines: vec![0] }).unwrap();
        assert_eq!(shadow.num_real_objs(), 2);
        assert_eq!(shadow.vertices(), &[Coord::new(3.0, 0)]);
    }

    #[test]
    fn test_empty_input_builds_empty_root() {
        let pyramid = Pyramid::build(&[], &PyramidConfig::default()).unwrap();
        assert!(pyramid.root().is_empty());
        assert!(pyramid.into_shadows().is_empty());
    }

    #[test]
    fn test_visible_shadows_filter_by_bin() {
        let drawables = states(&[(0.0, 1.0, 0), (7.0, 8.0, 0)]);
        let pyramid = Pyramid::build(&drawables, &PyramidConfig::new(4).unwrap()).unwrap();
        let view = TimeBoundingBox::new(6.5, 7.5);
        let visible: Vec<&Shadow> = pyramid.visible_shadows(0, &view).collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(*visible[0].tbox(), TimeBoundingBox::new(7.0, 8.0));
    }
}
