//! Real drawables with concrete vertices

use std::fmt;
use std::sync::Arc;

use shadowscope_common::{MixedDataInput, MixedDataOutput};

use super::info::{InfoBox, InfoValues};
use crate::codec::{read_short_count, write_short_count, Decodable, Encodable};
use crate::domain::{Category, CategoryBinding, CategoryTable, CodecError, Coord, TimeBoundingBox, Topology};

/// One event, state or arrow.
///
/// Vertices are ordered: a state or arrow goes from its start vertex to
/// its final vertex. The bounding box is derived from the vertices when
/// constructed and read verbatim when decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    base: InfoBox,
    vertices: Vec<Coord>,
}

impl Primitive {
    #[must_use]
    pub fn new(category: CategoryBinding, vertices: Vec<Coord>) -> Self {
        let tbox = TimeBoundingBox::from_vertices(&vertices);
        Self { base: InfoBox::new(category, tbox), vertices }
    }

    #[must_use]
    pub fn event(category: &Arc<Category>, time: f64, line_id: i32) -> Self {
        Self::new(CategoryBinding::bound(Arc::clone(category)), vec![Coord::new(time, line_id)])
    }

    #[must_use]
    pub fn state(category: &Arc<Category>, start: f64, end: f64, line_id: i32) -> Self {
        Self::new(
            CategoryBinding::bound(Arc::clone(category)),
            vec![Coord::new(start, line_id), Coord::new(end, line_id)],
        )
    }

    #[must_use]
    pub fn arrow(category: &Arc<Category>, from: Coord, to: Coord) -> Self {
        Self::new(CategoryBinding::bound(Arc::clone(category)), vec![from, to])
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
    pub fn vertices(&self) -> &[Coord] {
        &self.vertices
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn start_vertex(&self) -> Option<&Coord> {
        self.vertices.first()
    }

    #[must_use]
    pub fn final_vertex(&self) -> Option<&Coord> {
        self.vertices.last()
    }

    /// The bound category's topology, or a guess from the vertex count
    #[must_use]
    pub fn topology(&self) -> Topology {
        self.base
            .category
            .category()
            .map_or_else(|| Topology::infer(self.vertices.len()), |category| category.topology)
    }

    #[must_use]
    pub fn info_buffer(&self) -> &[u8] {
        self.base.info_buffer()
    }

    #[must_use]
    pub fn info_values(&self) -> InfoValues {
        self.base.info_values()
    }

    /// Bounds are ordered and every vertex lies within them
    #[must_use]
    pub fn is_time_ordered(&self) -> bool {
        let tbox = &self.base.tbox;
        tbox.is_time_ordered() && self.vertices.iter().all(|vertex| tbox.contains(vertex.time))
    }

    pub fn resolve_category(&mut self, table: &mut CategoryTable) -> Arc<Category> {
        self.base.category.resolve(table)
    }

    pub fn release_category(&mut self, table: &mut CategoryTable) {
        self.base.category.release(table);
    }

    #[must_use]
    pub fn line_ids(&self) -> Vec<i32> {
        self.vertices.iter().map(|vertex| vertex.line_id).collect()
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Primitive[{}] {} ", self.base.category, self.base.tbox)?;
        for vertex in &self.vertices {
            write!(f, "{vertex}")?;
        }
        Ok(())
    }
}

impl Encodable for Primitive {
    fn byte_size(&self) -> usize {
        4 + 2 + self.vertices.len() * Coord::BYTESIZE + TimeBoundingBox::BYTESIZE + 2 + self.info_buffer().len()
    }

    fn write_object<W: MixedDataOutput>(&self, out: &mut W) -> Result<(), CodecError> {
        out.write_i32(self.base.category.index())?;
        write_short_count(out, self.vertices.len(), "vertex")?;
        for vertex in &self.vertices {
            vertex.write_object(out)?;
        }
        self.base.tbox.write_object(out)?;
        write_info(out, self.info_buffer())
    }
}

impl Decodable for Primitive {
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
        let info = read_info(input)?;

        let mut base = InfoBox::new(CategoryBinding::unbound(index), tbox);
        base.set_info_buffer(info);
        Ok(Self { base, vertices })
    }
}

pub(crate) fn write_info<W: MixedDataOutput>(out: &mut W, info: &[u8]) -> Result<(), CodecError> {
    write_short_count(out, info.len(), "info byte")?;
    out.write_fully(info)?;
    Ok(())
}

pub(crate) fn read_info<R: MixedDataInput>(input: &mut R) -> Result<Vec<u8>, CodecError> {
    let len = read_short_count(input)?;
    let mut info = vec![0u8; len];
    input.read_fully(&mut info)?;
    Ok(info)
}
