//! Causality checks over decoded drawables
//!
//! Problems are collected into a [`ValidationResult`] instead of being
//! raised, so a loader can decide whether to abort or continue with a
//! warning.

use std::fmt;

use log::debug;

use crate::domain::{CategoryTable, TimeBoundingBox};
use crate::drawable::Drawable;

/// Relative slack allowed for averaged shadow vertices
const TIME_TOLERANCE: f64 = 1e-9;

/// Slack allowed when comparing inclusive and exclusive ratios (stored as f32)
const RATIO_TOLERANCE: f32 = 1e-4;

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<CausalityViolation>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: CausalityViolation) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A drawable that cannot be drawn faithfully. `index` is the drawable's
/// position in the validated slice.
#[derive(Debug, Clone, PartialEq)]
pub enum CausalityViolation {
    /// Bounds end before they start
    InvertedBounds { index: usize, earliest: f64, latest: f64 },
    /// A vertex lies outside the declared bounds
    VertexOutOfBounds { index: usize, vertex: usize, time: f64 },
    /// A vertex is earlier than the one before it
    VerticesOutOfOrder { index: usize, vertex: usize },
    /// A composite member sticks out of the composite's bounds
    MemberOutOfBounds { index: usize, member: usize },
    /// A shadow that stands for no real drawable
    EmptyShadow { index: usize },
    /// Negative or non-finite ratios, or exclusive above inclusive
    RatioOutOfRange { index: usize, category: i32, inclusive: f32, exclusive: f32 },
}

impl fmt::Display for CausalityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CausalityViolation::InvertedBounds { index, earliest, latest } => {
                write!(f, "drawable {index}: ends at {latest} before it starts at {earliest}")
            }
            CausalityViolation::VertexOutOfBounds { index, vertex, time } => {
                write!(f, "drawable {index}: vertex {vertex} at {time} lies outside its bounds")
            }
            CausalityViolation::VerticesOutOfOrder { index, vertex } => {
                write!(f, "drawable {index}: vertex {vertex} is earlier than vertex {}", vertex - 1)
            }
            CausalityViolation::MemberOutOfBounds { index, member } => {
                write!(f, "drawable {index}: member {member} lies outside the composite's bounds")
            }
            CausalityViolation::EmptyShadow { index } => {
                write!(f, "drawable {index}: shadow holds no real drawables")
            }
            CausalityViolation::RatioOutOfRange { index, category, inclusive, exclusive } => {
                write!(
                    f,
                    "drawable {index}: category {category} has ratios incl={inclusive} excl={exclusive}"
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    /// The category is missing from the table or only a placeholder
    UnknownCategory { index: usize, category: i32 },
    /// Drawables are expected in increasing start time order
    StartTimeRegression { index: usize },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::UnknownCategory { index, category } => {
                write!(f, "drawable {index}: category {category} is not defined")
            }
            ValidationWarning::StartTimeRegression { index } => {
                write!(f, "drawable {index}: starts before the drawable preceding it")
            }
        }
    }
}

fn tolerance(tbox: &TimeBoundingBox) -> f64 {
    TIME_TOLERANCE * tbox.earliest().abs().max(tbox.latest().abs()).max(1.0)
}

fn check_vertices(
    result: &mut ValidationResult,
    index: usize,
    tbox: &TimeBoundingBox,
    times: impl Iterator<Item = f64>,
    ordered: bool,
) {
    let slack = tolerance(tbox);
    let mut previous: Option<f64> = None;
    for (vertex, time) in times.enumerate() {
        if time < tbox.earliest() - slack || time > tbox.latest() + slack {
            result.add_error(CausalityViolation::VertexOutOfBounds { index, vertex, time });
        }
        if ordered && previous.is_some_and(|before| time < before) {
            result.add_error(CausalityViolation::VerticesOutOfOrder { index, vertex });
        }
        previous = Some(time);
    }
}

fn check_drawable(result: &mut ValidationResult, index: usize, drawable: &Drawable) {
    let tbox = drawable.tbox();
    if !tbox.is_time_ordered() {
        result.add_error(CausalityViolation::InvertedBounds {
            index,
            earliest: tbox.earliest(),
            latest: tbox.latest(),
        });
        return;
    }
    match drawable {
        Drawable::Primitive(prime) => {
            check_vertices(result, index, tbox, prime.vertices().iter().map(|v| v.time), true);
        }
        Drawable::Composite(composite) => {
            for (member, prime) in composite.primitives().iter().enumerate() {
                if !tbox.covers(prime.tbox()) || !prime.is_time_ordered() {
                    result.add_error(CausalityViolation::MemberOutOfBounds { index, member });
                }
            }
        }
        Drawable::Shadow(shadow) => {
            // averaged vertices carry no ordering guarantee between each other
            check_vertices(result, index, tbox, shadow.vertices().iter().map(|v| v.time), false);
            if shadow.num_real_objs() <= 0 {
                result.add_error(CausalityViolation::EmptyShadow { index });
            }
            for weight in shadow.weights() {
                let ratios = weight.ratios;
                let broken = !ratios.inclusive.is_finite()
                    || !ratios.exclusive.is_finite()
                    || ratios.inclusive < 0.0
                    || ratios.exclusive < 0.0
                    || ratios.exclusive > ratios.inclusive + RATIO_TOLERANCE;
                if broken {
                    result.add_error(CausalityViolation::RatioOutOfRange {
                        index,
                        category: weight.category_index(),
                        inclusive: ratios.inclusive,
                        exclusive: ratios.exclusive,
                    });
                }
            }
        }
    }
}

/// Check every drawable, in order, against its own bounds and `table`
#[must_use]
pub fn validate_drawables(drawables: &[Drawable], table: &CategoryTable) -> ValidationResult {
    let mut result = ValidationResult::default();
    let mut last_start = f64::NEG_INFINITY;

    for (index, drawable) in drawables.iter().enumerate() {
        check_drawable(&mut result, index, drawable);

        if !drawable.is_shadow() {
            let category = drawable.category().index();
            if table.get(category).is_none() || table.placeholders().contains(&category) {
                result.add_warning(ValidationWarning::UnknownCategory { index, category });
            }
            let start = drawable.tbox().earliest();
            if start < last_start {
                result.add_warning(ValidationWarning::StartTimeRegression { index });
            }
            last_start = last_start.max(start);
        }
    }

    debug!(
        "Validated {} drawables: {} errors, {} warnings",
        drawables.len(),
        result.errors.len(),
        result.warnings.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{to_bytes, Decodable};
    use crate::domain::{default_color, Category, CategoryBinding, Coord, Topology};
    use crate::drawable::{Composite, Primitive, Shadow};
    use shadowscope_common::{ByteOrder, MixedDataReader};
    use std::sync::Arc;

    fn table_with_work() -> (CategoryTable, Arc<Category>) {
        let mut table = CategoryTable::new();
        let work = table.insert(Category::new(0, "work", Topology::State, default_color("work")));
        (table, work)
    }

    /// Re-read `prime` with its stored bounds replaced
    fn with_bounds(prime: &Primitive, earliest: f64, latest: f64) -> Primitive {
        let mut bytes = to_bytes(prime).unwrap();
        let at = 4 + 2 + prime.vertex_count() * Coord::BYTESIZE;
        bytes[at..at + 8].copy_from_slice(&earliest.to_be_bytes());
        bytes[at + 8..at + 16].copy_from_slice(&latest.to_be_bytes());
        Primitive::read_object(&mut MixedDataReader::new(bytes.as_slice(), ByteOrder::BigEndian)).unwrap()
    }

    #[test]
    fn test_clean_trace_is_valid() {
        let (table, work) = table_with_work();
        let drawables = vec![
            Drawable::from(Primitive::state(&work, 0.0, 2.0, 0)),
            Drawable::from(Primitive::state(&work, 1.0, 3.0, 1)),
        ];
        let result = validate_drawables(&drawables, &table);
        assert!(result.is_valid());
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_inverted_bounds_reported() {
        let (table, work) = table_with_work();
        let broken = with_bounds(&Primitive::state(&work, 0.0, 2.0, 0), 2.0, 0.0);
        let result = validate_drawables(&[Drawable::from(broken)], &table);

        assert!(result.has_errors());
        assert_eq!(
            result.errors[0],
            CausalityViolation::InvertedBounds { index: 0, earliest: 2.0, latest: 0.0 }
        );
    }

    #[test]
    fn test_vertex_outside_bounds_reported() {
        let (table, work) = table_with_work();
        let broken = with_bounds(&Primitive::state(&work, 0.0, 2.0, 0), 0.0, 1.0);
        let result = validate_drawables(&[Drawable::from(broken)], &table);
        assert_eq!(
            result.errors,
            vec![CausalityViolation::VertexOutOfBounds { index: 0, vertex: 1, time: 2.0 }]
        );
    }

    #[test]
    fn test_backwards_state_reported() {
        let (table, _) = table_with_work();
        let backwards = Primitive::new(CategoryBinding::unbound(0), vec![Coord::new(3.0, 0), Coord::new(1.0, 0)]);
        let result = validate_drawables(&[Drawable::from(backwards)], &table);
        assert_eq!(result.errors, vec![CausalityViolation::VerticesOutOfOrder { index: 0, vertex: 1 }]);
        assert!(result.errors[0].to_string().contains("earlier than vertex 0"));
    }

    #[test]
    fn test_composite_member_outside_bounds() {
        let (table, work) = table_with_work();
        let inside = Primitive::state(&work, 0.0, 1.0, 0);
        let outside = Primitive::state(&work, 5.0, 6.0, 0);
        let composite = Composite::new(CategoryBinding::bound(Arc::clone(&work)), vec![inside, outside]);
        let mut bytes = to_bytes(&composite).unwrap();
        // shrink the composite's own latest bound to 1.0
        bytes[12..20].copy_from_slice(&1.0f64.to_be_bytes());
        let composite =
            Composite::read_object(&mut MixedDataReader::new(bytes.as_slice(), ByteOrder::BigEndian)).unwrap();

        let result = validate_drawables(&[Drawable::from(composite)], &table);
        assert_eq!(result.errors, vec![CausalityViolation::MemberOutOfBounds { index: 0, member: 1 }]);
    }

    #[test]
    fn test_empty_shadow_reported() {
        let (table, work) = table_with_work();
        let mut shadow = Shadow::from_primitive(&Primitive::state(&work, 0.0, 1.0, 0));
        shadow.finalize_map_of_category_weights();
        let mut bytes = to_bytes(&shadow).unwrap();
        let count_at = 4 + 2 + 2 * Coord::BYTESIZE + TimeBoundingBox::BYTESIZE;
        bytes[count_at..count_at + 8].copy_from_slice(&0i64.to_be_bytes());
        let loaded = Shadow::read_object(&mut MixedDataReader::new(bytes.as_slice(), ByteOrder::BigEndian)).unwrap();

        let result = validate_drawables(&[Drawable::from(loaded)], &table);
        assert_eq!(result.errors, vec![CausalityViolation::EmptyShadow { index: 0 }]);
    }

    #[test]
    fn test_placeholder_and_order_warnings() {
        let (mut table, work) = table_with_work();
        table.resolve(7);
        let drawables = vec![
            Drawable::from(Primitive::state(&work, 5.0, 6.0, 0)),
            Drawable::from(Primitive::new(CategoryBinding::unbound(7), vec![Coord::new(1.0, 0)])),
            Drawable::from(Primitive::new(CategoryBinding::unbound(8), vec![Coord::new(6.0, 0)])),
        ];
        let result = validate_drawables(&drawables, &table);

        assert!(result.is_valid());
        assert_eq!(
            result.warnings,
            vec![
                ValidationWarning::UnknownCategory { index: 1, category: 7 },
                ValidationWarning::StartTimeRegression { index: 1 },
                ValidationWarning::UnknownCategory { index: 2, category: 8 },
            ]
        );
    }
}
