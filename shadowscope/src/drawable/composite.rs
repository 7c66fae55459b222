//! Multi-segment drawables

use std::fmt;
use std::sync::Arc;

use shadowscope_common::{MixedDataInput, MixedDataOutput};

use super::info::{InfoBox, InfoValues};
use super::primitive::{read_info, write_info, Primitive};
use crate::codec::{read_int_count, write_int_count, Decodable, Encodable};
use crate::domain::{Category, CategoryBinding, CategoryTable, CodecError, Coord, TimeBoundingBox, Topology};

/// An ordered chain of primitives drawn as one logical drawable, e.g. a
/// message that hops across several rows
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    base: InfoBox,
    primitives: Vec<Primitive>,
}

impl Composite {
    #[must_use]
    pub fn new(category: CategoryBinding, primitives: Vec<Primitive>) -> Self {
        let mut tbox = TimeBoundingBox::empty();
        for prime in &primitives {
            tbox.affect_time_bounds(prime.tbox());
        }
        Self { base: InfoBox::new(category, tbox), primitives }
    }

    #[must_use]
    pub fn with_info(mut self, info: Vec<u8>) -> Self {
        self.base.set_info_buffer(info);
        self
    }

    #[must_use]
    pub fn category(&self) -> &CategoryBinding {
        &self.base.category
    }

    #[must_use]
    pub fn tbox(&self) -> &TimeBoundingBox {
        &self.base.tbox
    }

    #[must_use]
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    #[must_use]
    pub fn topology(&self) -> Topology {
        self.base
            .category
            .category()
            .map_or(Topology::State, |category| category.topology)
    }

    /// Two vertices spanning the whole chain: the first primitive's start
    /// row at the earliest time, the last primitive's final row at the latest
    #[must_use]
    pub fn outline(&self) -> [Coord; 2] {
        let start_line = self
            .primitives
            .first()
            .and_then(Primitive::start_vertex)
            .map_or(0, |vertex| vertex.line_id);
        let final_line = self
            .primitives
            .last()
            .and_then(Primitive::final_vertex)
            .map_or(start_line, |vertex| vertex.line_id);
        [
            Coord::new(self.base.tbox.earliest(), start_line),
            Coord::new(self.base.tbox.latest(), final_line),
        ]
    }

    #[must_use]
    pub fn info_buffer(&self) -> &[u8] {
        self.base.info_buffer()
    }

    #[must_use]
    pub fn info_values(&self) -> InfoValues {
        self.base.info_values()
    }

    /// Bounds are ordered and hold every member, each itself time ordered
    #[must_use]
    pub fn is_time_ordered(&self) -> bool {
        let tbox = &self.base.tbox;
        tbox.is_time_ordered()
            && self
                .primitives
                .iter()
                .all(|prime| prime.is_time_ordered() && tbox.covers(prime.tbox()))
    }

    pub fn resolve_category(&mut self, table: &mut CategoryTable) -> Arc<Category> {
        for prime in &mut self.primitives {
            prime.resolve_category(table);
        }
        self.base.category.resolve(table)
    }

    pub fn release_category(&mut self, table: &mut CategoryTable) {
        for prime in &mut self.primitives {
            prime.release_category(table);
        }
        self.base.category.release(table);
    }
}

impl fmt::Display for Composite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Composite[{}] {} x{}", self.base.category, self.base.tbox, self.primitives.len())
    }
}

impl Encodable for Composite {
    fn byte_size(&self) -> usize {
        4 + TimeBoundingBox::BYTESIZE
            + 4
            + self.primitives.iter().map(Encodable::byte_size).sum::<usize>()
            + 2
            + self.info_buffer().len()
    }

    fn write_object<W: MixedDataOutput>(&self, out: &mut W) -> Result<(), CodecError> {
        out.write_i32(self.base.category.index())?;
        self.base.tbox.write_object(out)?;
        write_int_count(out, self.primitives.len(), "primitive")?;
        for prime in &self.primitives {
            prime.write_object(out)?;
        }
        write_info(out, self.info_buffer())
    }
}

impl Decodable for Composite {
    fn read_object<R: MixedDataInput>(input: &mut R) -> Result<Self, CodecError> {
        let index = input.read_i32()?;
        let tbox = TimeBoundingBox::read_object(input)?;
        let count = read_int_count(input)?;
        let mut primitives = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            primitives.push(Primitive::read_object(input)?);
        }
        let mut base = InfoBox::new(CategoryBinding::unbound(index), tbox);
        base.set_info_buffer(read_info(input)?);
        Ok(Self { base, primitives })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::test_util::reencode;
    use crate::domain::default_color;

    fn hop() -> Arc<Category> {
        Arc::new(Category::new(2, "forward", Topology::Arrow, default_color("forward")))
    }

    fn chain() -> Composite {
        let hop = hop();
        Composite::new(
            CategoryBinding::bound(Arc::clone(&hop)),
            vec![
                Primitive::arrow(&hop, Coord::new(1.0, 0), Coord::new(2.0, 1)),
                Primitive::arrow(&hop, Coord::new(2.5, 1), Coord::new(4.0, 3)),
            ],
        )
    }

    #[test]
    fn test_bounds_are_union_of_members() {
        let composite = chain();
        assert_eq!(*composite.tbox(), TimeBoundingBox::new(1.0, 4.0));
        assert_eq!(composite.outline(), [Coord::new(1.0, 0), Coord::new(4.0, 3)]);
        assert!(composite.is_time_ordered());
        assert_eq!(composite.topology(), Topology::Arrow);
    }

    #[test]
    fn test_round_trip() {
        let composite = chain().with_info(vec![1, 2, 3]);
        let decoded = reencode(&composite);
        assert_eq!(decoded.primitives().len(), 2);
        assert_eq!(decoded.tbox(), composite.tbox());
        assert_eq!(decoded.info_buffer(), &[1, 2, 3]);
    }

    #[test]
    fn test_resolve_marks_members_used() {
        let mut table = CategoryTable::new();
        let mut composite = reencode(&chain());
        composite.resolve_category(&mut table);
        assert!(table.is_used(2));
        assert!(composite.primitives().iter().all(|prime| prime.category().is_bound()));

        composite.release_category(&mut table);
        assert!(!table.is_used(2));
    }
}
