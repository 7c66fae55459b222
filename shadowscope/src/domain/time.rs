//! Time bounds and vertices
//!
//! [`TimeBoundingBox`] is the closed interval every drawable occupies. Its
//! bounds only grow through the `affect_*` family while a drawable or
//! shadow is being assembled.

use std::cmp::Ordering;
use std::fmt;

use shadowscope_common::{MixedDataInput, MixedDataOutput, COORD_BYTESIZE, TIME_BOUNDING_BOX_BYTESIZE};

use crate::codec::{Decodable, Encodable};
use crate::domain::CodecError;

/// A vertex: a point in time on one timeline row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub time: f64,
    pub line_id: i32,
}

impl Coord {
    pub const BYTESIZE: usize = COORD_BYTESIZE;

    #[must_use]
    pub fn new(time: f64, line_id: i32) -> Self {
        Self { time, line_id }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.time, self.line_id)
    }
}

impl Encodable for Coord {
    fn byte_size(&self) -> usize {
        Self::BYTESIZE
    }

    fn write_object<W: MixedDataOutput>(&self, out: &mut W) -> Result<(), CodecError> {
        out.write_f64(self.time)?;
        out.write_i32(self.line_id)?;
        Ok(())
    }
}

impl Decodable for Coord {
    fn read_object<R: MixedDataInput>(input: &mut R) -> Result<Self, CodecError> {
        let time = input.read_f64()?;
        let line_id = input.read_i32()?;
        Ok(Self { time, line_id })
    }
}

/// Closed time interval `[earliest, latest]`.
///
/// The empty box is `(+inf, -inf)`; growing it by anything yields exactly
/// that thing's bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeBoundingBox {
    earliest: f64,
    latest: f64,
}

impl Default for TimeBoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl TimeBoundingBox {
    pub const BYTESIZE: usize = TIME_BOUNDING_BOX_BYTESIZE;

    #[must_use]
    pub fn new(earliest: f64, latest: f64) -> Self {
        Self { earliest, latest }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self { earliest: f64::INFINITY, latest: f64::NEG_INFINITY }
    }

    /// Smallest box holding every vertex time
    #[must_use]
    pub fn from_vertices(vertices: &[Coord]) -> Self {
        let mut tbox = Self::empty();
        tbox.affect_time_bounds_coords(vertices);
        tbox
    }

    pub fn reinitialize(&mut self) {
        *self = Self::empty();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.earliest > self.latest
    }

    #[must_use]
    pub fn earliest(&self) -> f64 {
        self.earliest
    }

    #[must_use]
    pub fn latest(&self) -> f64 {
        self.latest
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        self.latest - self.earliest
    }

    pub fn affect_earliest_time(&mut self, time: f64) {
        if time < self.earliest {
            self.earliest = time;
        }
    }

    pub fn affect_latest_time(&mut self, time: f64) {
        if time > self.latest {
            self.latest = time;
        }
    }

    pub fn affect_time_bounds(&mut self, other: &TimeBoundingBox) {
        self.affect_earliest_time(other.earliest);
        self.affect_latest_time(other.latest);
    }

    pub fn affect_time_bounds_coord(&mut self, vertex: &Coord) {
        self.affect_earliest_time(vertex.time);
        self.affect_latest_time(vertex.time);
    }

    pub fn affect_time_bounds_coords(&mut self, vertices: &[Coord]) {
        for vertex in vertices {
            self.affect_time_bounds_coord(vertex);
        }
    }

    /// Shrink away `other` when it sits flush against one end of `self`.
    ///
    /// Returns `false`, leaving `self` untouched, when `other` touches
    /// neither end or sticks out of `self`.
    pub fn remove(&mut self, other: &TimeBoundingBox) -> bool {
        if !self.covers(other) {
            return false;
        }
        if other.earliest == self.earliest {
            self.earliest = other.latest;
            true
        } else if other.latest == self.latest {
            self.latest = other.earliest;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn overlaps(&self, other: &TimeBoundingBox) -> bool {
        self.earliest <= other.latest && other.earliest <= self.latest
    }

    /// `other` lies within `self`; reflexive, so equal boxes cover each other
    #[must_use]
    pub fn covers(&self, other: &TimeBoundingBox) -> bool {
        self.earliest <= other.earliest && other.latest <= self.latest
    }

    #[must_use]
    pub fn disjoint(&self, other: &TimeBoundingBox) -> bool {
        !self.overlaps(other)
    }

    #[must_use]
    pub fn contains(&self, time: f64) -> bool {
        self.earliest <= time && time <= self.latest
    }

    #[must_use]
    pub fn intersection(&self, other: &TimeBoundingBox) -> Option<TimeBoundingBox> {
        if self.disjoint(other) {
            return None;
        }
        Some(TimeBoundingBox::new(
            self.earliest.max(other.earliest),
            self.latest.min(other.latest),
        ))
    }

    /// Overlap length, zero when disjoint
    #[must_use]
    pub fn intersection_duration(&self, other: &TimeBoundingBox) -> f64 {
        self.intersection(other).map_or(0.0, |overlap| overlap.duration())
    }

    #[must_use]
    pub fn is_time_ordered(&self) -> bool {
        self.earliest <= self.latest
    }
}

impl fmt::Display for TimeBoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.earliest, self.latest)
    }
}

impl Encodable for TimeBoundingBox {
    fn byte_size(&self) -> usize {
        Self::BYTESIZE
    }

    fn write_object<W: MixedDataOutput>(&self, out: &mut W) -> Result<(), CodecError> {
        out.write_f64(self.earliest)?;
        out.write_f64(self.latest)?;
        Ok(())
    }
}

impl Decodable for TimeBoundingBox {
    fn read_object<R: MixedDataInput>(input: &mut R) -> Result<Self, CodecError> {
        let earliest = input.read_f64()?;
        let latest = input.read_f64()?;
        Ok(Self { earliest, latest })
    }
}

/// Total orders over time boxes.
///
/// Each order breaks ties on the opposite bound, so boxes only compare
/// equal when both bounds match. The increasing/decreasing pairs are exact
/// inverses of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOrder {
    /// Start ascending, then end descending (outer interval first)
    IncreStartTime,
    /// Start descending, then end ascending
    DecreStartTime,
    /// End ascending, then start descending (inner interval first)
    IncreFinalTime,
    /// End descending, then start ascending
    DecreFinalTime,
}

pub const INCRE_STARTTIME_ORDER: TimeOrder = TimeOrder::IncreStartTime;
pub const DECRE_STARTTIME_ORDER: TimeOrder = TimeOrder::DecreStartTime;
pub const INCRE_FINALTIME_ORDER: TimeOrder = TimeOrder::IncreFinalTime;
pub const DECRE_FINALTIME_ORDER: TimeOrder = TimeOrder::DecreFinalTime;

impl TimeOrder {
    #[must_use]
    pub fn compare(self, a: &TimeBoundingBox, b: &TimeBoundingBox) -> Ordering {
        match self {
            TimeOrder::IncreStartTime => a
                .earliest
                .total_cmp(&b.earliest)
                .then_with(|| b.latest.total_cmp(&a.latest)),
            TimeOrder::DecreStartTime => TimeOrder::IncreStartTime.compare(b, a),
            TimeOrder::IncreFinalTime => a
                .latest
                .total_cmp(&b.latest)
                .then_with(|| b.earliest.total_cmp(&a.earliest)),
            TimeOrder::DecreFinalTime => TimeOrder::IncreFinalTime.compare(b, a),
        }
    }

    /// Stable sort, so equal boxes keep their arrival order
    pub fn sort<T>(self, items: &mut [T], tbox: impl Fn(&T) -> TimeBoundingBox) {
        items.sort_by(|a, b| self.compare(&tbox(a), &tbox(b)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::test_util::reencode;

    const ORDERS: [TimeOrder; 4] =
        [INCRE_STARTTIME_ORDER, DECRE_STARTTIME_ORDER, INCRE_FINALTIME_ORDER, DECRE_FINALTIME_ORDER];

    #[test]
    fn test_union_matches_min_max_in_any_order() {
        let times = [5.0, -2.5, 17.0, 3.25, 17.0, 0.0];
        let mut forward = TimeBoundingBox::empty();
        for &t in &times {
            forward.affect_time_bounds_coord(&Coord::new(t, 0));
        }
        let mut backward = TimeBoundingBox::empty();
        for &t in times.iter().rev() {
            backward.affect_earliest_time(t);
            backward.affect_latest_time(t);
        }
        assert_eq!(forward, TimeBoundingBox::new(-2.5, 17.0));
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_empty_box_grows_to_first_input() {
        let mut tbox = TimeBoundingBox::empty();
        assert!(tbox.is_empty());
        tbox.affect_time_bounds(&TimeBoundingBox::new(1.0, 2.0));
        assert_eq!(tbox, TimeBoundingBox::new(1.0, 2.0));
        tbox.affect_time_bounds(&TimeBoundingBox::empty());
        assert_eq!(tbox, TimeBoundingBox::new(1.0, 2.0));
        tbox.reinitialize();
        assert!(tbox.is_empty());
    }

    #[test]
    fn test_from_vertices() {
        let tbox = TimeBoundingBox::from_vertices(&[Coord::new(4.0, 1), Coord::new(1.0, 2)]);
        assert_eq!(tbox, TimeBoundingBox::new(1.0, 4.0));
    }

    #[test]
    fn test_relations() {
        let outer = TimeBoundingBox::new(0.0, 10.0);
        let inner = TimeBoundingBox::new(2.0, 3.0);
        let later = TimeBoundingBox::new(10.0, 12.0);
        let far = TimeBoundingBox::new(20.0, 30.0);

        assert!(outer.covers(&inner));
        assert!(!inner.covers(&outer));
        assert!(outer.covers(&outer));
        assert!(outer.overlaps(&later));
        assert!(outer.disjoint(&far));
        assert!(outer.contains(10.0));
        assert!(!outer.contains(10.5));
        assert_eq!(outer.intersection(&later), Some(TimeBoundingBox::new(10.0, 10.0)));
        assert_eq!(outer.intersection(&far), None);
        assert_eq!(outer.intersection_duration(&TimeBoundingBox::new(8.0, 15.0)), 2.0);
    }

    #[test]
    fn test_remove_flush_ends_only() {
        let mut tbox = TimeBoundingBox::new(0.0, 10.0);
        assert!(tbox.remove(&TimeBoundingBox::new(0.0, 4.0)));
        assert_eq!(tbox, TimeBoundingBox::new(4.0, 10.0));
        assert!(tbox.remove(&TimeBoundingBox::new(7.0, 10.0)));
        assert_eq!(tbox, TimeBoundingBox::new(4.0, 7.0));

        assert!(!tbox.remove(&TimeBoundingBox::new(5.0, 6.0)));
        assert!(!tbox.remove(&TimeBoundingBox::new(3.0, 7.0)));
        assert_eq!(tbox, TimeBoundingBox::new(4.0, 7.0));
    }

    #[test]
    fn test_orders_are_antisymmetric() {
        let boxes = [
            TimeBoundingBox::new(0.0, 10.0),
            TimeBoundingBox::new(0.0, 5.0),
            TimeBoundingBox::new(2.0, 10.0),
            TimeBoundingBox::new(2.0, 3.0),
            TimeBoundingBox::new(0.0, 10.0),
        ];
        for order in ORDERS {
            for a in &boxes {
                for b in &boxes {
                    assert_eq!(order.compare(a, b), order.compare(b, a).reverse(), "{order:?} {a} {b}");
                    assert_eq!(order.compare(a, b) == Ordering::Equal, a == b);
                }
            }
        }
    }

    #[test]
    fn test_start_order_puts_outer_first_on_ties() {
        let mut boxes = vec![
            TimeBoundingBox::new(5.0, 6.0),
            TimeBoundingBox::new(0.0, 5.0),
            TimeBoundingBox::new(0.0, 10.0),
        ];
        INCRE_STARTTIME_ORDER.sort(&mut boxes, |b| *b);
        assert_eq!(
            boxes,
            vec![
                TimeBoundingBox::new(0.0, 10.0),
                TimeBoundingBox::new(0.0, 5.0),
                TimeBoundingBox::new(5.0, 6.0),
            ]
        );

        DECRE_STARTTIME_ORDER.sort(&mut boxes, |b| *b);
        assert_eq!(boxes[0], TimeBoundingBox::new(5.0, 6.0));
        assert_eq!(boxes[2], TimeBoundingBox::new(0.0, 10.0));
    }

    #[test]
    fn test_final_order_puts_inner_first_on_ties() {
        let mut boxes = vec![TimeBoundingBox::new(0.0, 10.0), TimeBoundingBox::new(4.0, 10.0)];
        INCRE_FINALTIME_ORDER.sort(&mut boxes, |b| *b);
        assert_eq!(boxes[0], TimeBoundingBox::new(4.0, 10.0));
        DECRE_FINALTIME_ORDER.sort(&mut boxes, |b| *b);
        assert_eq!(boxes[0], TimeBoundingBox::new(0.0, 10.0));
    }

    #[test]
    fn test_box_wire_layout() {
        let tbox = TimeBoundingBox::new(1.5, 2.5);
        let bytes = crate::codec::to_bytes(&tbox).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[..8], &1.5f64.to_be_bytes());
        assert_eq!(reencode(&tbox), tbox);
        assert_eq!(reencode(&Coord::new(3.0, 7)), Coord::new(3.0, 7));
    }
}
