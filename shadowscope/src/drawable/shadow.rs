//! Shadows: statistical summaries of many drawables
//!
//! A shadow starts out [unfinalized](Shadow::is_finalized): it keeps a light
//! record (category and bounds) of every real drawable folded into it, plus
//! the bounds and coverage of every child shadow merged in. Finalizing turns those records
//! into per-category inclusive/exclusive ratios and drops them, leaving state
//! proportional to the number of distinct categories.
//!
//! ## Invariants
//!
//! - Ratios are fractions of the shadow's current duration; every widening of
//!   the bounds rescales them by `old / new`
//! - Vertex times are the mean of everything folded in, weighted by each
//!   contribution's real object count
//! - Only finalized shadows are written or merged into other shadows
//! - Real drawables are only merged into unfinalized shadows

// Counts become weights in f64 averages
#![allow(clippy::cast_precision_loss)]

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::mem;

use shadowscope_common::{MixedDataInput, MixedDataOutput};

use super::composite::Composite;
use super::nesting::{nesting_exclusions, ChildShadow};
use super::primitive::Primitive;
use super::Drawable;
use crate::codec::{read_int_count, write_int_count, write_short_count, Decodable, Encodable};
use crate::domain::{
    CategoryBinding, CategoryTable, CategoryWeight, CodecError, Coord, DrawableError, TimeBoundingBox,
    Topology,
};

/// Transient state the renderer attaches to a shadow
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderHints {
    pub total_pixel_height: f64,
    pub selected_category: Option<i32>,
}

/// A real drawable as remembered by an unfinalized shadow
#[derive(Debug, Clone)]
struct Member {
    category: CategoryBinding,
    tbox: TimeBoundingBox,
}

#[derive(Debug, Clone, Default)]
struct Buckets {
    members: Vec<Member>,
    /// Members before this point are already in the weight map
    counted: usize,
    child_shadows: Vec<ChildShadow>,
}

#[derive(Debug, Clone)]
enum Phase {
    Unfinalized(Buckets),
    Finalized,
    InputLoaded,
}

#[derive(Debug, Clone)]
pub struct Shadow {
    category: CategoryBinding,
    topology: Topology,
    vertices: Vec<Coord>,
    tbox: TimeBoundingBox,
    num_real_objs: i64,
    weights: BTreeMap<i32, CategoryWeight>,
    phase: Phase,
    pub render: RenderHints,
}

impl Shadow {
    /// An empty shadow for drawables of `topology`
    #[must_use]
    pub fn new(topology: Topology) -> Self {
        Self::with_vertex_count(topology, topology.vertex_count())
    }

    #[must_use]
    pub fn with_vertex_count(topology: Topology, vertex_count: usize) -> Self {
        Self {
            category: CategoryBinding::unbound(topology.shadow_index()),
            topology,
            vertices: vec![Coord::new(0.0, 0); vertex_count],
            tbox: TimeBoundingBox::empty(),
            num_real_objs: 0,
            weights: BTreeMap::new(),
            phase: Phase::Unfinalized(Buckets::default()),
            render: RenderHints::default(),
        }
    }

    #[must_use]
    pub fn from_primitive(prime: &Primitive) -> Self {
        let mut shadow = Self::with_vertex_count(prime.topology(), prime.vertex_count());
        shadow.fold_real(prime.vertices(), prime.tbox(), prime.category());
        shadow
    }

    #[must_use]
    pub fn from_composite(composite: &Composite) -> Self {
        let mut shadow = Self::with_vertex_count(composite.topology(), 2);
        shadow.fold_real(&composite.outline(), composite.tbox(), composite.category());
        shadow
    }

    /// Start a shadow from any drawable.
    ///
    /// # Panics
    ///
    /// Panics if `drawable` is an unfinalized shadow.
    #[must_use]
    pub fn from_drawable(drawable: &Drawable) -> Self {
        match drawable {
            Drawable::Primitive(prime) => Self::from_primitive(prime),
            Drawable::Composite(composite) => Self::from_composite(composite),
            Drawable::Shadow(other) => {
                let mut shadow = Self::with_vertex_count(other.topology, other.vertices.len());
                shadow.fold_shadow(other);
                shadow
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The synthetic preview category shadows are drawn with
    #[must_use]
    pub fn category(&self) -> &CategoryBinding {
        &self.category
    }

    #[must_use]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    #[must_use]
    pub fn tbox(&self) -> &TimeBoundingBox {
        &self.tbox
    }

    #[must_use]
    pub fn vertices(&self) -> &[Coord] {
        &self.vertices
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn line_ids(&self) -> Vec<i32> {
        self.vertices.iter().map(|vertex| vertex.line_id).collect()
    }

    #[must_use]
    pub fn num_real_objs(&self) -> i64 {
        self.num_real_objs
    }

    /// Weights gathered so far, in category index order
    pub fn weights(&self) -> impl Iterator<Item = &CategoryWeight> {
        self.weights.values()
    }

    #[must_use]
    pub fn weight(&self, category_index: i32) -> Option<&CategoryWeight> {
        self.weights.get(&category_index)
    }

    /// Weights in write order: increasing inclusive ratio, then index
    #[must_use]
    pub fn sorted_weights(&self) -> Vec<&CategoryWeight> {
        let mut sorted: Vec<&CategoryWeight> = self.weights.values().collect();
        sorted.sort_by(|a, b| {
            a.ratios
                .inclusive
                .total_cmp(&b.ratios.inclusive)
                .then_with(|| a.category_index().cmp(&b.category_index()))
        });
        sorted
    }

    /// Finalized locally or loaded from a stream
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        !matches!(self.phase, Phase::Unfinalized(_))
    }

    #[must_use]
    pub fn is_input_loaded(&self) -> bool {
        matches!(self.phase, Phase::InputLoaded)
    }

    /// Real drawables remembered but not yet turned into weights
    #[must_use]
    pub fn pending_members(&self) -> usize {
        match &self.phase {
            Phase::Unfinalized(buckets) => buckets.members.len(),
            Phase::Finalized | Phase::InputLoaded => 0,
        }
    }

    /// Bounds are ordered and every averaged vertex lies within them
    #[must_use]
    pub fn is_time_ordered(&self) -> bool {
        self.tbox.is_time_ordered() && self.vertices.iter().all(|vertex| self.tbox.contains(vertex.time))
    }

    // =========================================================================
    // Merging
    // =========================================================================

    fn check_open(&self) -> Result<(), DrawableError> {
        if self.is_finalized() {
            Err(DrawableError::MergeIntoFinalized)
        } else {
            Ok(())
        }
    }

    fn check_vertex_count(&self, found: usize) -> Result<(), DrawableError> {
        if found == self.vertices.len() {
            Ok(())
        } else {
            Err(DrawableError::IncompatibleTopology { expected: self.vertices.len(), found })
        }
    }

    /// `part / whole`, zero when `whole` has no length
    fn fraction(part: f64, whole: f64) -> f64 {
        if whole > 0.0 {
            part / whole
        } else {
            0.0
        }
    }

    /// Weighted running mean of vertex times; an empty shadow also adopts
    /// the incoming rows
    fn blend_vertices(&mut self, incoming: &[Coord], weight: i64) {
        let adopt_lines = self.num_real_objs == 0;
        let old = self.num_real_objs as f64;
        let add = weight as f64;
        let total = old + add;
        for (vertex, other) in self.vertices.iter_mut().zip(incoming) {
            if adopt_lines {
                vertex.line_id = other.line_id;
            }
            vertex.time = if total > 0.0 {
                (vertex.time * old + other.time * add) / total
            } else {
                other.time
            };
        }
    }

    /// Widen the bounds, re-expressing every existing ratio against the
    /// new duration
    fn grow_bounds(&mut self, other: &TimeBoundingBox) {
        if self.tbox.is_empty() {
            self.tbox = *other;
            return;
        }
        let old_duration = self.tbox.duration();
        self.tbox.affect_time_bounds(other);
        let new_duration = self.tbox.duration();
        if new_duration > old_duration {
            let factor = Self::fraction(old_duration, new_duration);
            for weight in self.weights.values_mut() {
                weight.rescale(factor);
            }
        }
    }

    fn fold_real(&mut self, vertices: &[Coord], tbox: &TimeBoundingBox, category: &CategoryBinding) {
        self.blend_vertices(vertices, 1);
        self.grow_bounds(tbox);
        self.num_real_objs += 1;

        if let Phase::Unfinalized(buckets) = &mut self.phase {
            buckets.members.push(Member { category: category.clone(), tbox: *tbox });
        }
    }

    /// Share of the bounds claimed as exclusive time by the folded members
    fn exclusive_coverage(&self) -> f64 {
        self.weights.values().map(|weight| f64::from(weight.ratios.exclusive)).sum()
    }

    fn fold_shadow(&mut self, other: &Shadow) {
        assert!(
            other.is_finalized(),
            "shadow over {} must be finalized before it is merged",
            other.tbox
        );
        self.blend_vertices(&other.vertices, other.num_real_objs);
        self.grow_bounds(&other.tbox);

        let factor = Self::fraction(other.tbox.duration(), self.tbox.duration());
        for weight in other.weights.values() {
            match self.weights.entry(weight.category_index()) {
                Entry::Occupied(mut existing) => existing.get_mut().merge_scaled(weight, factor),
                Entry::Vacant(slot) => {
                    let mut fresh = weight.clone();
                    fresh.rescale(factor);
                    slot.insert(fresh);
                }
            }
        }
        self.num_real_objs += other.num_real_objs;

        let nestable = self.topology.is_nestable();
        if let Phase::Unfinalized(buckets) = &mut self.phase {
            if nestable {
                buckets.child_shadows.push(ChildShadow::new(other.tbox, other.exclusive_coverage()));
            }
        } else {
            self.phase = Phase::Finalized;
        }
    }

    /// Fold one real drawable in; the shadow must not be finalized yet
    pub fn merge_with_primitive(&mut self, prime: &Primitive) -> Result<(), DrawableError> {
        self.check_open()?;
        self.check_vertex_count(prime.vertex_count())?;
        self.fold_real(prime.vertices(), prime.tbox(), prime.category());
        Ok(())
    }

    /// Fold a composite in as one real drawable spanning its outline
    pub fn merge_with_composite(&mut self, composite: &Composite) -> Result<(), DrawableError> {
        self.check_open()?;
        self.check_vertex_count(2)?;
        self.fold_real(&composite.outline(), composite.tbox(), composite.category());
        Ok(())
    }

    /// Fold a finalized shadow in.
    ///
    /// # Panics
    ///
    /// Panics if `other` is still unfinalized: its pending members have no
    /// weights yet, so merging it would silently drop them.
    pub fn merge_with_shadow(&mut self, other: &Shadow) -> Result<(), DrawableError> {
        self.check_vertex_count(other.vertices.len())?;
        self.fold_shadow(other);
        Ok(())
    }

    pub fn merge_with_drawable(&mut self, drawable: &Drawable) -> Result<(), DrawableError> {
        match drawable {
            Drawable::Primitive(prime) => self.merge_with_primitive(prime),
            Drawable::Composite(composite) => self.merge_with_composite(composite),
            Drawable::Shadow(other) => self.merge_with_shadow(other),
        }
    }

    // =========================================================================
    // Weights
    // =========================================================================

    /// Add the inclusive ratio and count of every member not yet counted.
    ///
    /// Idempotent; members folded in later are picked up by the next call.
    pub fn initialize_map_of_category_weights(&mut self) {
        let duration = self.tbox.duration();
        if let Phase::Unfinalized(buckets) = &mut self.phase {
            for member in &buckets.members[buckets.counted..] {
                let weight = self
                    .weights
                    .entry(member.category.index())
                    .or_insert_with(|| CategoryWeight::new(member.category.clone(), 0.0, 0.0, 0));
                weight.add_inclusive_ratio(Self::fraction(member.tbox.duration(), duration));
                weight.add_drawable_count(1);
            }
            buckets.counted = buckets.members.len();
        }
    }

    /// Add exclusive ratios and drop the member records.
    ///
    /// For nestable shadows each member only contributes the part of its
    /// duration not covered by members nested inside it or by child shadows.
    pub fn finalize_map_of_category_weights(&mut self) {
        self.initialize_map_of_category_weights();
        let buckets = match mem::replace(&mut self.phase, Phase::Finalized) {
            Phase::Unfinalized(buckets) => buckets,
            other => {
                self.phase = other;
                return;
            }
        };

        let duration = self.tbox.duration();
        let exclusions: Vec<f64> = if self.topology.is_nestable() {
            let boxes: Vec<TimeBoundingBox> = buckets.members.iter().map(|member| member.tbox).collect();
            nesting_exclusions(&boxes, &buckets.child_shadows)
        } else {
            buckets.members.iter().map(|member| member.tbox.duration()).collect()
        };
        for (member, exclusion) in buckets.members.iter().zip(exclusions) {
            if let Some(weight) = self.weights.get_mut(&member.category.index()) {
                weight.add_exclusive_ratio(Self::fraction(exclusion, duration));
            }
        }
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub fn resolve_categories(&mut self, table: &mut CategoryTable) {
        self.category.resolve(table);
        for weight in self.weights.values_mut() {
            weight.category.resolve(table);
        }
        if let Phase::Unfinalized(buckets) = &mut self.phase {
            for member in &mut buckets.members {
                member.category.resolve(table);
            }
        }
    }

    pub fn release_categories(&mut self, table: &mut CategoryTable) {
        self.category.release(table);
        for weight in self.weights.values_mut() {
            weight.category.release(table);
        }
        if let Phase::Unfinalized(buckets) = &mut self.phase {
            for member in &mut buckets.members {
                member.category.release(table);
            }
        }
    }

    /// Number of weight records this shadow will write
    fn weight_count(&self) -> usize {
        match &self.phase {
            Phase::Unfinalized(buckets) => {
                let mut indices: BTreeSet<i32> = self.weights.keys().copied().collect();
                indices.extend(buckets.members.iter().map(|member| member.category.index()));
                indices.len()
            }
            Phase::Finalized | Phase::InputLoaded => self.weights.len(),
        }
    }

    #[must_use]
    pub fn header_byte_size(&self) -> usize {
        4 + 2 + self.vertices.len() * Coord::BYTESIZE + TimeBoundingBox::BYTESIZE + 8 + 4
    }
}

impl fmt::Display for Shadow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shadow[{}] {} objs={}", self.topology, self.tbox, self.num_real_objs)?;
        match &self.phase {
            Phase::Unfinalized(buckets) => write!(f, " pending={}", buckets.members.len())?,
            Phase::Finalized | Phase::InputLoaded => {}
        }
        for weight in self.sorted_weights() {
            write!(f, "\n  {weight}")?;
        }
        Ok(())
    }
}

impl Encodable for Shadow {
    fn byte_size(&self) -> usize {
        self.header_byte_size() + self.weight_count() * CategoryWeight::BYTESIZE
    }

    fn write_object<W: MixedDataOutput>(&self, out: &mut W) -> Result<(), CodecError> {
        if !self.is_finalized() {
            return Err(CodecError::UnfinalizedShadow {
                earliest: self.tbox.earliest(),
                latest: self.tbox.latest(),
            });
        }
        out.write_i32(self.category.index())?;
        write_short_count(out, self.vertices.len(), "vertex")?;
        for vertex in &self.vertices {
            vertex.write_object(out)?;
        }
        self.tbox.write_object(out)?;
        out.write_i64(self.num_real_objs)?;
        write_int_count(out, self.weights.len(), "category weight")?;
        for weight in self.sorted_weights() {
            weight.write_object(out)?;
        }
        Ok(())
    }
}

impl Decodable for Shadow {
    fn read_object<R: MixedDataInput>(input: &mut R) -> Result<Self, CodecError> {
        let index = input.read_i32()?;
        let vertex_count = input.read_i16()?;
        if vertex_count <= 0 {
            return Err(CodecError::InvalidVertexCount(vertex_count));
        }
        let vertices = (0..vertex_count)
            .map(|_| Coord::read_object(input))
            .collect::<Result<Vec<_>, _>>()?;
        let tbox = TimeBoundingBox::read_object(input)?;
        let num_real_objs = input.read_i64()?;

        let count = read_int_count(input)?;
        let mut weights: BTreeMap<i32, CategoryWeight> = BTreeMap::new();
        for _ in 0..count {
            let weight = CategoryWeight::read_object(input)?;
            match weights.entry(weight.category_index()) {
                Entry::Occupied(mut existing) => existing.get_mut().merge_scaled(&weight, 1.0),
                Entry::Vacant(slot) => {
                    slot.insert(weight);
                }
            }
        }

        let topology = Topology::from_shadow_index(index).unwrap_or_else(|| Topology::infer(vertices.len()));
        Ok(Self {
            category: CategoryBinding::unbound(index),
            topology,
            vertices,
            tbox,
            num_real_objs,
            weights,
            phase: Phase::InputLoaded,
            render: RenderHints::default(),
        })
    }
}
