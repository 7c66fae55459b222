//! Container files: categories plus drawables in one stream
//!
//! ```text
//! magic "SHSC" | order flag u8 | version i16
//! i32 category count | categories...
//! i32 drawable count | tag u8 + drawable...
//! ```
//!
//! Everything after the flag byte uses the order the flag names.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, info};
use shadowscope_common::{
    ByteOrder, MixedDataInput, MixedDataOutput, MixedDataReader, MixedDataWriter, CONTAINER_MAGIC,
    CONTAINER_VERSION,
};

use crate::codec::{read_int_count, write_int_count, Decodable, Encodable};
use crate::domain::{Category, CategoryTable, CodecError};
use crate::drawable::Drawable;

/// Collects drawables and writes them with the categories they use
#[derive(Debug, Default)]
pub struct LogFileExporter {
    drawables: Vec<Drawable>,
    byte_order: ByteOrder,
}

impl LogFileExporter {
    #[must_use]
    pub fn new(byte_order: ByteOrder) -> Self {
        Self { drawables: Vec::new(), byte_order }
    }

    pub fn add_drawable(&mut self, drawable: impl Into<Drawable>) {
        self.drawables.push(drawable.into());
    }

    pub fn extend(&mut self, drawables: impl IntoIterator<Item = Drawable>) {
        self.drawables.extend(drawables);
    }

    /// Write the container to any writer.
    ///
    /// Every category a drawable references is marked used in `table` first,
    /// so the category section never misses one. Shadows must be finalized.
    pub fn export<W: Write>(&mut self, table: &mut CategoryTable, writer: W) -> Result<(), CodecError> {
        for drawable in &mut self.drawables {
            drawable.resolve_categories(table);
        }
        let categories = table.used_categories();

        let mut out = MixedDataWriter::new(writer, self.byte_order);
        out.write_fully(&CONTAINER_MAGIC)?;
        out.write_u8(self.byte_order.to_flag())?;
        out.write_i16(CONTAINER_VERSION)?;

        write_int_count(&mut out, categories.len(), "category")?;
        for category in &categories {
            category.write_object(&mut out)?;
        }
        write_int_count(&mut out, self.drawables.len(), "drawable")?;
        for drawable in &self.drawables {
            drawable.write_object(&mut out)?;
        }
        out.flush()?;

        debug!(
            "Wrote {} categories and {} drawables ({} bytes, {:?})",
            categories.len(),
            self.drawables.len(),
            out.bytes_written(),
            self.byte_order
        );
        Ok(())
    }

    pub fn export_to_file(&mut self, table: &mut CategoryTable, path: impl AsRef<Path>) -> Result<(), CodecError> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.export(table, BufWriter::new(file))?;
        info!("Wrote {} drawables to {}", self.drawables.len(), path.display());
        Ok(())
    }

    #[must_use]
    pub fn drawable_count(&self) -> usize {
        self.drawables.len()
    }
}

/// A decoded container
///
/// Drawables come back with unbound categories; call
/// [`LogFile::resolve_categories`] before anything needs names or colors.
#[derive(Debug)]
pub struct LogFile {
    pub byte_order: ByteOrder,
    pub table: CategoryTable,
    pub drawables: Vec<Drawable>,
}

impl LogFile {
    pub fn read<R: Read>(reader: R) -> Result<Self, CodecError> {
        let mut input = MixedDataReader::new(reader, ByteOrder::BigEndian);

        let mut magic = [0u8; 4];
        input.read_fully(&mut magic)?;
        if magic != CONTAINER_MAGIC {
            return Err(CodecError::BadMagic(magic));
        }
        let flag = input.read_u8()?;
        let byte_order = ByteOrder::from_flag(flag).ok_or(CodecError::InvalidByteOrder(flag))?;
        input.set_byte_order(byte_order);
        let version = input.read_i16()?;
        if version != CONTAINER_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let mut table = CategoryTable::new();
        let category_count = read_int_count(&mut input)?;
        for _ in 0..category_count {
            table.insert(Category::read_object(&mut input)?);
        }

        let drawable_count = read_int_count(&mut input)?;
        let mut drawables = Vec::with_capacity(drawable_count.min(1 << 16));
        for _ in 0..drawable_count {
            drawables.push(Drawable::read_object(&mut input)?);
        }

        debug!("Read {category_count} categories and {drawable_count} drawables ({byte_order:?})");
        Ok(Self { byte_order, table, drawables })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, CodecError> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Bind every drawable to the table, synthesizing placeholders for
    /// indices the category section did not define
    pub fn resolve_categories(&mut self) {
        for drawable in &mut self.drawables {
            drawable.resolve_categories(&mut self.table);
        }
    }
}
