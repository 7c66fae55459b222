//! Mixed-data typed streams
//!
//! Fixed-width integers, IEEE floats, length-prefixed strings and raw byte
//! blocks over any `Read`/`Write`. The byte order belongs to the stream, so
//! records encode identically on every platform.

use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("String of {0} bytes exceeds the 65535-byte limit")]
    StringTooLong(usize),

    #[error(transparent)]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// Endianness of a mixed-data stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Network order, the default for files
    #[default]
    BigEndian,
    LittleEndian,
}

impl ByteOrder {
    /// Flag byte stored in container headers
    #[must_use]
    pub fn to_flag(self) -> u8 {
        match self {
            ByteOrder::BigEndian => 0,
            ByteOrder::LittleEndian => 1,
        }
    }

    #[must_use]
    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(ByteOrder::BigEndian),
            1 => Some(ByteOrder::LittleEndian),
            _ => None,
        }
    }
}

macro_rules! read_number {
    ($name:ident, $ty:ty, $len:literal) => {
        fn $name(&mut self) -> Result<$ty> {
            let mut bytes = [0u8; $len];
            self.read_fully(&mut bytes)?;
            Ok(match self.byte_order() {
                ByteOrder::BigEndian => <$ty>::from_be_bytes(bytes),
                ByteOrder::LittleEndian => <$ty>::from_le_bytes(bytes),
            })
        }
    };
}

macro_rules! write_number {
    ($name:ident, $ty:ty) => {
        fn $name(&mut self, value: $ty) -> Result<()> {
            let bytes = match self.byte_order() {
                ByteOrder::BigEndian => value.to_be_bytes(),
                ByteOrder::LittleEndian => value.to_le_bytes(),
            };
            self.write_fully(&bytes)
        }
    };
}

/// Typed input side of a mixed-data stream
pub trait MixedDataInput {
    fn byte_order(&self) -> ByteOrder;

    /// Fill `buf` completely or fail with `UnexpectedEof`
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()>;

    fn read_u8(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_fully(&mut byte)?;
        Ok(byte[0])
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_ne_bytes([self.read_u8()?]))
    }

    fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_number!(read_i16, i16, 2);
    read_number!(read_u16, u16, 2);
    read_number!(read_i32, i32, 4);
    read_number!(read_i64, i64, 8);
    read_number!(read_f32, f32, 4);
    read_number!(read_f64, f64, 8);

    /// `u16` byte length followed by UTF-8 bytes
    fn read_string(&mut self) -> Result<String> {
        let len = usize::from(self.read_u16()?);
        let mut bytes = vec![0u8; len];
        self.read_fully(&mut bytes)?;
        Ok(String::from_utf8(bytes)?)
    }
}

/// Typed output side of a mixed-data stream
pub trait MixedDataOutput {
    fn byte_order(&self) -> ByteOrder;

    fn write_fully(&mut self, bytes: &[u8]) -> Result<()>;

    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_fully(&[value])
    }

    fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_fully(&value.to_ne_bytes())
    }

    fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    write_number!(write_i16, i16);
    write_number!(write_u16, u16);
    write_number!(write_i32, i32);
    write_number!(write_i64, i64);
    write_number!(write_f32, f32);
    write_number!(write_f64, f64);

    fn write_string(&mut self, value: &str) -> Result<()> {
        let len = u16::try_from(value.len()).map_err(|_| StreamError::StringTooLong(value.len()))?;
        self.write_u16(len)?;
        self.write_fully(value.as_bytes())
    }
}

/// Byte length of `value` once written with [`MixedDataOutput::write_string`]
#[must_use]
pub fn string_byte_size(value: &str) -> usize {
    2 + value.len()
}

/// Mixed-data adapter over any `Read`
#[derive(Debug)]
pub struct MixedDataReader<R> {
    inner: R,
    order: ByteOrder,
    position: u64,
}

impl<R: Read> MixedDataReader<R> {
    pub fn new(inner: R, order: ByteOrder) -> Self {
        Self { inner, order, position: 0 }
    }

    /// Bytes consumed so far
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Switch byte order mid-stream, e.g. after reading a header flag
    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> MixedDataInput for MixedDataReader<R> {
    fn byte_order(&self) -> ByteOrder {
        self.order
    }

    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }
}

/// Mixed-data adapter over any `Write`
#[derive(Debug)]
pub struct MixedDataWriter<W> {
    inner: W,
    order: ByteOrder,
    bytes_written: u64,
}

impl<W: Write> MixedDataWriter<W> {
    pub fn new(inner: W, order: ByteOrder) -> Self {
        Self { inner, order, bytes_written: 0 }
    }

    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> MixedDataOutput for MixedDataWriter<W> {
    fn byte_order(&self) -> ByteOrder {
        self.order
    }

    fn write_fully(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(order: ByteOrder) -> MixedDataWriter<Vec<u8>> {
        MixedDataWriter::new(Vec::new(), order)
    }

    #[test]
    fn test_big_endian_layout() {
        let mut out = writer(ByteOrder::BigEndian);
        out.write_i32(0x0102_0304).unwrap();
        out.write_i16(-2).unwrap();
        assert_eq!(out.into_inner(), vec![1, 2, 3, 4, 0xFF, 0xFE]);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut out = writer(ByteOrder::LittleEndian);
        out.write_i32(0x0102_0304).unwrap();
        assert_eq!(out.into_inner(), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_mixed_values_read_back_in_both_orders() {
        for order in [ByteOrder::BigEndian, ByteOrder::LittleEndian] {
            let mut out = writer(order);
            out.write_i8(-7).unwrap();
            out.write_i64(i64::MIN + 3).unwrap();
            out.write_f32(0.25).unwrap();
            out.write_f64(-1.5e300).unwrap();
            out.write_bool(true).unwrap();
            out.write_string("MPI_Send").unwrap();
            let bytes = out.into_inner();

            let mut input = MixedDataReader::new(bytes.as_slice(), order);
            assert_eq!(input.read_i8().unwrap(), -7);
            assert_eq!(input.read_i64().unwrap(), i64::MIN + 3);
            assert_eq!(input.read_f32().unwrap(), 0.25);
            assert_eq!(input.read_f64().unwrap(), -1.5e300);
            assert!(input.read_bool().unwrap());
            assert_eq!(input.read_string().unwrap(), "MPI_Send");
            assert_eq!(input.position(), bytes.len() as u64);
        }
    }

    #[test]
    fn test_string_prefix_counts_bytes() {
        let mut out = writer(ByteOrder::BigEndian);
        out.write_string("héllo").unwrap();
        assert_eq!(out.bytes_written() as usize, string_byte_size("héllo"));
        assert_eq!(&out.into_inner()[..2], &[0, 6]);
    }

    #[test]
    fn test_oversized_string_rejected() {
        let mut out = writer(ByteOrder::BigEndian);
        let long = "x".repeat(70_000);
        assert!(matches!(out.write_string(&long), Err(StreamError::StringTooLong(70_000))));
    }

    #[test]
    fn test_truncated_input_is_eof() {
        let bytes = [0u8, 1];
        let mut input = MixedDataReader::new(&bytes[..], ByteOrder::BigEndian);
        match input.read_i32() {
            Err(StreamError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected EOF, got {other:?}"),
        }
    }

    #[test]
    fn test_byte_order_flag() {
        assert_eq!(ByteOrder::from_flag(ByteOrder::LittleEndian.to_flag()), Some(ByteOrder::LittleEndian));
        assert_eq!(ByteOrder::from_flag(9), None);
    }
}
