//! Drawables: what the timeline shows
//!
//! - [`Primitive`]: one event, state or arrow with concrete vertices
//! - [`Composite`]: a chain of primitives drawn as one
//! - [`Shadow`]: a statistical merge of many drawables
//!
//! [`Drawable`] closes over the three so merging, validation and the codec
//! can match on the shape instead of dispatching through a trait object.

pub mod composite;
pub mod info;
pub mod nesting;
pub mod primitive;
pub mod shadow;

use std::fmt;

use shadowscope_common::{
    MixedDataInput, MixedDataOutput, DRAWABLE_TAG_COMPOSITE, DRAWABLE_TAG_PRIMITIVE, DRAWABLE_TAG_SHADOW,
};

use crate::codec::{Decodable, Encodable};
use crate::domain::{CategoryBinding, CategoryTable, CodecError, TimeBoundingBox, Topology};

pub use composite::Composite;
pub use info::{decode_info, encode_info, InfoBox, InfoField, InfoValue, InfoValues};
pub use nesting::{nesting_exclusions, ChildShadow};
pub use primitive::Primitive;
pub use shadow::{RenderHints, Shadow};

#[derive(Debug, Clone)]
pub enum Drawable {
    Primitive(Primitive),
    Composite(Composite),
    Shadow(Shadow),
}

impl Drawable {
    #[must_use]
    pub fn category(&self) -> &CategoryBinding {
        match self {
            Drawable::Primitive(prime) => prime.category(),
            Drawable::Composite(composite) => composite.category(),
            Drawable::Shadow(shadow) => shadow.category(),
        }
    }

    #[must_use]
    pub fn tbox(&self) -> &TimeBoundingBox {
        match self {
            Drawable::Primitive(prime) => prime.tbox(),
            Drawable::Composite(composite) => composite.tbox(),
            Drawable::Shadow(shadow) => shadow.tbox(),
        }
    }

    #[must_use]
    pub fn topology(&self) -> Topology {
        match self {
            Drawable::Primitive(prime) => prime.topology(),
            Drawable::Composite(composite) => composite.topology(),
            Drawable::Shadow(shadow) => shadow.topology(),
        }
    }

    /// Vertices a shadow of this drawable carries
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        match self {
            Drawable::Primitive(prime) => prime.vertex_count(),
            Drawable::Composite(_) => 2,
            Drawable::Shadow(shadow) => shadow.vertex_count(),
        }
    }

    /// Rows touched, start vertex first
    #[must_use]
    pub fn line_ids(&self) -> Vec<i32> {
        match self {
            Drawable::Primitive(prime) => prime.line_ids(),
            Drawable::Composite(composite) => composite.outline().iter().map(|vertex| vertex.line_id).collect(),
            Drawable::Shadow(shadow) => shadow.line_ids(),
        }
    }

    /// Real drawables this one stands for
    #[must_use]
    pub fn num_real_objs(&self) -> i64 {
        match self {
            Drawable::Primitive(_) | Drawable::Composite(_) => 1,
            Drawable::Shadow(shadow) => shadow.num_real_objs(),
        }
    }

    #[must_use]
    pub fn is_shadow(&self) -> bool {
        matches!(self, Drawable::Shadow(_))
    }

    #[must_use]
    pub fn is_time_ordered(&self) -> bool {
        match self {
            Drawable::Primitive(prime) => prime.is_time_ordered(),
            Drawable::Composite(composite) => composite.is_time_ordered(),
            Drawable::Shadow(shadow) => shadow.is_time_ordered(),
        }
    }

    /// Bind every category this drawable references
    pub fn resolve_categories(&mut self, table: &mut CategoryTable) {
        match self {
            Drawable::Primitive(prime) => {
                prime.resolve_category(table);
            }
            Drawable::Composite(composite) => {
                composite.resolve_category(table);
            }
            Drawable::Shadow(shadow) => shadow.resolve_categories(table),
        }
    }

    pub fn release_categories(&mut self, table: &mut CategoryTable) {
        match self {
            Drawable::Primitive(prime) => prime.release_category(table),
            Drawable::Composite(composite) => composite.release_category(table),
            Drawable::Shadow(shadow) => shadow.release_categories(table),
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Drawable::Primitive(_) => DRAWABLE_TAG_PRIMITIVE,
            Drawable::Composite(_) => DRAWABLE_TAG_COMPOSITE,
            Drawable::Shadow(_) => DRAWABLE_TAG_SHADOW,
        }
    }
}

impl From<Primitive> for Drawable {
    fn from(prime: Primitive) -> Self {
        Drawable::Primitive(prime)
    }
}

impl From<Composite> for Drawable {
    fn from(composite: Composite) -> Self {
        Drawable::Composite(composite)
    }
}

impl From<Shadow> for Drawable {
    fn from(shadow: Shadow) -> Self {
        Drawable::Shadow(shadow)
    }
}

impl fmt::Display for Drawable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drawable::Primitive(prime) => prime.fmt(f),
            Drawable::Composite(composite) => composite.fmt(f),
            Drawable::Shadow(shadow) => shadow.fmt(f),
        }
    }
}

/// Tagged record: one tag byte, then the shape's own layout
impl Encodable for Drawable {
    fn byte_size(&self) -> usize {
        1 + match self {
            Drawable::Primitive(prime) => prime.byte_size(),
            Drawable::Composite(composite) => composite.byte_size(),
            Drawable::Shadow(shadow) => shadow.byte_size(),
        }
    }

    fn write_object<W: MixedDataOutput>(&self, out: &mut W) -> Result<(), CodecError> {
        out.write_u8(self.tag())?;
        match self {
            Drawable::Primitive(prime) => prime.write_object(out),
            Drawable::Composite(composite) => composite.write_object(out),
            Drawable::Shadow(shadow) => shadow.write_object(out),
        }
    }
}

impl Decodable for Drawable {
    fn read_object<R: MixedDataInput>(input: &mut R) -> Result<Self, CodecError> {
        match input.read_u8()? {
            DRAWABLE_TAG_PRIMITIVE => Ok(Drawable::Primitive(Primitive::read_object(input)?)),
            DRAWABLE_TAG_COMPOSITE => Ok(Drawable::Composite(Composite::read_object(input)?)),
            DRAWABLE_TAG_SHADOW => Ok(Drawable::Shadow(Shadow::read_object(input)?)),
            other => Err(CodecError::InvalidRecordTag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::test_util::reencode;
    use crate::domain::{default_color, Category, Coord};
    use shadowscope_common::{ByteOrder, MixedDataReader};
    use std::sync::Arc;

    fn state() -> Arc<Category> {
        Arc::new(Category::new(0, "work", Topology::State, default_color("work")))
    }

    #[test]
    fn test_tagged_round_trip_for_each_shape() {
        let prime = Primitive::state(&state(), 0.0, 1.0, 2);
        let composite = Composite::new(CategoryBinding::bound(state()), vec![prime.clone()]);
        let mut shadow = Shadow::from_primitive(&prime);
        shadow.finalize_map_of_category_weights();

        for drawable in [Drawable::from(prime), Drawable::from(composite), Drawable::from(shadow)] {
            let decoded = reencode(&drawable);
            assert_eq!(decoded.tag(), drawable.tag());
            assert_eq!(decoded.tbox(), drawable.tbox());
            assert_eq!(decoded.line_ids(), vec![2, 2]);
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let bytes = [7u8];
        let mut input = MixedDataReader::new(&bytes[..], ByteOrder::BigEndian);
        assert!(matches!(Drawable::read_object(&mut input), Err(CodecError::InvalidRecordTag(7))));
    }

    #[test]
    fn test_merge_with_drawable_dispatches() {
        let work = state();
        let mut shadow = Shadow::new(Topology::State);
        let chain = Composite::new(
            CategoryBinding::bound(Arc::clone(&work)),
            vec![Primitive::state(&work, 2.0, 3.0, 1), Primitive::state(&work, 3.0, 6.0, 1)],
        );
        shadow.merge_with_drawable(&Drawable::from(Primitive::state(&work, 0.0, 4.0, 1))).unwrap();
        shadow.merge_with_drawable(&Drawable::from(chain)).unwrap();
        assert_eq!(shadow.num_real_objs(), 2);
        assert_eq!(*shadow.tbox(), TimeBoundingBox::new(0.0, 6.0));

        let event = Drawable::from(Primitive::new(CategoryBinding::unbound(9), vec![Coord::new(1.0, 0)]));
        assert!(shadow.merge_with_drawable(&event).is_err());
        assert_eq!(event.num_real_objs(), 1);
    }

    #[test]
    fn test_resolve_through_enum() {
        let mut table = CategoryTable::new();
        let mut drawable = reencode(&Drawable::from(Primitive::state(&state(), 0.0, 1.0, 0)));
        assert!(!drawable.category().is_bound());
        drawable.resolve_categories(&mut table);
        assert_eq!(drawable.category().category().unwrap().name, "UnknownType-0");
        drawable.release_categories(&mut table);
        assert!(!table.is_used(0));
    }
}
