//! Stack scan computing how much of each nested interval is its own
//!
//! Intervals are visited in [`INCRE_STARTTIME_ORDER`], so a parent is always
//! seen before anything it contains. The stack holds the chain of intervals
//! still open at the current start time; the top is the innermost one.

use crate::domain::{TimeBoundingBox, INCRE_STARTTIME_ORDER};

/// A finalized shadow merged into a parent that is still collecting members
///
/// `coverage` is the fraction of `tbox` the child's own members already
/// claim as exclusive time, in `[0, 1]`. A sparse child over a wide box only
/// accounts for that share of every interval it overlaps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChildShadow {
    pub tbox: TimeBoundingBox,
    pub coverage: f64,
}

impl ChildShadow {
    #[must_use]
    pub fn new(tbox: TimeBoundingBox, coverage: f64) -> Self {
        Self { tbox, coverage: coverage.clamp(0.0, 1.0) }
    }
}

/// Exclusive durations of `boxes`, returned in input order.
///
/// Each interval starts out with its duration minus whatever the
/// `child_shadows` already account for within its span, and then loses the
/// exclusive amount of every interval directly nested in it. Equal boxes
/// keep their input order, so the first of two identical intervals is the
/// outer one.
#[must_use]
pub fn nesting_exclusions(boxes: &[TimeBoundingBox], child_shadows: &[ChildShadow]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    INCRE_STARTTIME_ORDER.sort(&mut order, |&i| boxes[i]);

    let mut exclusions: Vec<f64> = boxes
        .iter()
        .map(|tbox| {
            let covered: f64 = child_shadows
                .iter()
                .map(|child| tbox.intersection_duration(&child.tbox) * child.coverage)
                .sum();
            (tbox.duration() - covered).max(0.0)
        })
        .collect();

    let mut stack: Vec<usize> = Vec::new();
    for &current in &order {
        while let Some(&top) = stack.last() {
            if boxes[top].covers(&boxes[current]) {
                exclusions[top] -= exclusions[current];
                break;
            }
            stack.pop();
        }
        stack.push(current);
    }
    exclusions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxes(spans: &[(f64, f64)]) -> Vec<TimeBoundingBox> {
        spans.iter().map(|&(a, b)| TimeBoundingBox::new(a, b)).collect()
    }

    fn full_children(spans: &[(f64, f64)]) -> Vec<ChildShadow> {
        spans.iter().map(|&(a, b)| ChildShadow::new(TimeBoundingBox::new(a, b), 1.0)).collect()
    }

    #[test]
    fn test_call_stack_exclusions_sum_to_outer_duration() {
        let input = boxes(&[(0.0, 100.0), (10.0, 90.0), (20.0, 30.0), (40.0, 50.0)]);
        let exclusions = nesting_exclusions(&input, &[]);

        assert_eq!(exclusions, vec![20.0, 60.0, 10.0, 10.0]);
        assert!((exclusions.iter().sum::<f64>() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let input = boxes(&[(40.0, 50.0), (20.0, 30.0), (10.0, 90.0), (0.0, 100.0)]);
        let exclusions = nesting_exclusions(&input, &[]);
        assert_eq!(exclusions, vec![10.0, 10.0, 60.0, 20.0]);
    }

    #[test]
    fn test_identical_boxes_nest_first_outside() {
        let input = boxes(&[(5.0, 15.0), (5.0, 15.0)]);
        let exclusions = nesting_exclusions(&input, &[]);
        assert_eq!(exclusions, vec![0.0, 10.0]);
    }

    #[test]
    fn test_siblings_do_not_subtract_from_each_other() {
        let input = boxes(&[(0.0, 10.0), (10.0, 20.0), (25.0, 30.0)]);
        let exclusions = nesting_exclusions(&input, &[]);
        // touching endpoints count as covering only when fully inside
        assert_eq!(exclusions, vec![10.0, 10.0, 5.0]);
    }

    #[test]
    fn test_child_shadows_reduce_initial_exclusion() {
        let input = boxes(&[(0.0, 100.0), (10.0, 40.0)]);
        let children = full_children(&[(50.0, 70.0), (30.0, 35.0)]);
        let exclusions = nesting_exclusions(&input, &children);

        // inner: 30 - 5 = 25; outer: 100 - 25 - 25 = 50
        assert_eq!(exclusions, vec![50.0, 25.0]);
    }

    #[test]
    fn test_child_shadows_never_drive_negative() {
        let input = boxes(&[(0.0, 10.0)]);
        let children = full_children(&[(0.0, 10.0), (2.0, 8.0)]);
        assert_eq!(nesting_exclusions(&input, &children), vec![0.0]);
    }

    #[test]
    fn test_sparse_child_shadow_subtracts_its_coverage() {
        let input = boxes(&[(0.0, 100.0), (10.0, 40.0)]);
        let children = [ChildShadow::new(TimeBoundingBox::new(10.0, 40.0), 0.5)];
        let exclusions = nesting_exclusions(&input, &children);

        // inner: 30 - 15 = 15; outer: 100 - 15 - 15 = 70
        assert_eq!(exclusions, vec![70.0, 15.0]);
    }

    #[test]
    fn test_child_coverage_is_clamped() {
        assert_eq!(ChildShadow::new(TimeBoundingBox::new(0.0, 1.0), 1.5).coverage, 1.0);
        assert_eq!(ChildShadow::new(TimeBoundingBox::new(0.0, 1.0), -0.2).coverage, 0.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(nesting_exclusions(&[], &full_children(&[(0.0, 1.0)])).is_empty());
    }
}
