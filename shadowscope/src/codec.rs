//! Symmetric binary encoding over mixed-data streams
//!
//! Every persisted entity implements [`Encodable`] and [`Decodable`]. Arrays
//! are length-prefixed: `i16` counts for small bounded lists (info keys,
//! methods, vertices), `i32` counts for lists that can grow large.

use shadowscope_common::{MixedDataInput, MixedDataOutput};

use crate::domain::CodecError;

pub trait Encodable {
    /// Exact number of bytes [`Encodable::write_object`] produces
    fn byte_size(&self) -> usize;

    fn write_object<W: MixedDataOutput>(&self, out: &mut W) -> Result<(), CodecError>;
}

pub trait Decodable: Sized {
    fn read_object<R: MixedDataInput>(input: &mut R) -> Result<Self, CodecError>;
}

/// Encode `value` into a fresh big-endian buffer
pub fn to_bytes<T: Encodable>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut out = shadowscope_common::MixedDataWriter::new(
        Vec::with_capacity(value.byte_size()),
        shadowscope_common::ByteOrder::BigEndian,
    );
    value.write_object(&mut out)?;
    Ok(out.into_inner())
}

pub(crate) fn write_short_count<W: MixedDataOutput>(
    out: &mut W,
    count: usize,
    what: &'static str,
) -> Result<(), CodecError> {
    let count16 = i16::try_from(count).map_err(|_| CodecError::TooMany {
        what,
        count,
        limit: i16::MAX as usize,
    })?;
    out.write_i16(count16)?;
    Ok(())
}

pub(crate) fn write_int_count<W: MixedDataOutput>(
    out: &mut W,
    count: usize,
    what: &'static str,
) -> Result<(), CodecError> {
    let count32 = i32::try_from(count).map_err(|_| CodecError::TooMany {
        what,
        count,
        limit: i32::MAX as usize,
    })?;
    out.write_i32(count32)?;
    Ok(())
}

pub(crate) fn read_short_count<R: MixedDataInput>(input: &mut R) -> Result<usize, CodecError> {
    let count = input.read_i16()?;
    usize::try_from(count).map_err(|_| CodecError::NegativeCount(i32::from(count)))
}

pub(crate) fn read_int_count<R: MixedDataInput>(input: &mut R) -> Result<usize, CodecError> {
    let count = input.read_i32()?;
    usize::try_from(count).map_err(|_| CodecError::NegativeCount(count))
}
