//! Info payloads
//!
//! Real drawables carry their key/value details as a raw byte buffer laid
//! out by the category's info types. The buffer is decoded only when a
//! consumer asks for the values, and a short or missing buffer yields a
//! partial result with a diagnostic instead of an error.

use std::fmt;

use log::warn;
use shadowscope_common::{ByteOrder, MixedDataInput, MixedDataOutput, MixedDataReader, MixedDataWriter};

use crate::domain::{Category, CategoryBinding, CodecError, InfoType, TimeBoundingBox};

/// One decoded info value
#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    Int(i32),
    Hex(i32),
    Long(i64),
    LongHex(i64),
    Float(f32),
    Double(f64),
    Str(String),
}

impl InfoValue {
    #[must_use]
    pub fn info_type(&self) -> InfoType {
        match self {
            InfoValue::Int(_) => InfoType::Int,
            InfoValue::Hex(_) => InfoType::Hex,
            InfoValue::Long(_) => InfoType::Long,
            InfoValue::LongHex(_) => InfoType::LongHex,
            InfoValue::Float(_) => InfoType::Float,
            InfoValue::Double(_) => InfoType::Double,
            InfoValue::Str(_) => InfoType::Str,
        }
    }

    fn read<R: MixedDataInput>(input: &mut R, info_type: InfoType) -> Result<Self, CodecError> {
        Ok(match info_type {
            InfoType::Int => InfoValue::Int(input.read_i32()?),
            InfoType::Hex => InfoValue::Hex(input.read_i32()?),
            InfoType::Long => InfoValue::Long(input.read_i64()?),
            InfoType::LongHex => InfoValue::LongHex(input.read_i64()?),
            InfoType::Float => InfoValue::Float(input.read_f32()?),
            InfoType::Double => InfoValue::Double(input.read_f64()?),
            InfoType::Str => InfoValue::Str(input.read_string()?),
        })
    }

    fn write<W: MixedDataOutput>(&self, out: &mut W) -> Result<(), CodecError> {
        match self {
            InfoValue::Int(v) | InfoValue::Hex(v) => out.write_i32(*v)?,
            InfoValue::Long(v) | InfoValue::LongHex(v) => out.write_i64(*v)?,
            InfoValue::Float(v) => out.write_f32(*v)?,
            InfoValue::Double(v) => out.write_f64(*v)?,
            InfoValue::Str(v) => out.write_string(v)?,
        }
        Ok(())
    }
}

impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoValue::Int(v) => write!(f, "{v}"),
            InfoValue::Hex(v) => write!(f, "0x{v:x}"),
            InfoValue::Long(v) => write!(f, "{v}"),
            InfoValue::LongHex(v) => write!(f, "0x{v:x}"),
            InfoValue::Float(v) => write!(f, "{v}"),
            InfoValue::Double(v) => write!(f, "{v}"),
            InfoValue::Str(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfoField {
    pub key: String,
    pub value: InfoValue,
}

/// Result of decoding an info buffer, possibly partial
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InfoValues {
    pub fields: Vec<InfoField>,
    /// Text the schema places after the last value
    pub trailing_key: Option<String>,
    /// Set when the buffer did not match the schema
    pub diagnostic: Option<String>,
}

impl InfoValues {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.diagnostic.is_none()
    }
}

impl fmt::Display for InfoValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.fields {
            write!(f, "{}{}", field.key, field.value)?;
        }
        if let Some(trailing) = &self.trailing_key {
            f.write_str(trailing)?;
        }
        if let Some(diagnostic) = &self.diagnostic {
            write!(f, " [{diagnostic}]")?;
        }
        Ok(())
    }
}

/// Decode `buffer` against `category`'s info schema
#[must_use]
pub fn decode_info(category: &Category, buffer: &[u8]) -> InfoValues {
    let expected = category.info_types.len();
    let mut values = InfoValues {
        trailing_key: category.info_keys.get(expected).cloned(),
        ..InfoValues::default()
    };
    if expected == 0 {
        return values;
    }
    if buffer.is_empty() {
        values.diagnostic = Some(format!("no info buffer for {expected} typed fields"));
        warn!("{}: {}", category.name, values.diagnostic.as_deref().unwrap_or_default());
        return values;
    }

    let mut input = MixedDataReader::new(buffer, ByteOrder::BigEndian);
    for (position, info_type) in category.info_types.iter().enumerate() {
        match InfoValue::read(&mut input, *info_type) {
            Ok(value) => values.fields.push(InfoField {
                key: category.info_keys.get(position).cloned().unwrap_or_default(),
                value,
            }),
            Err(err) => {
                values.diagnostic = Some(format!(
                    "info buffer of {} bytes ends after {position} of {expected} fields: {err}",
                    buffer.len()
                ));
                break;
            }
        }
    }
    let consumed = usize::try_from(input.position()).unwrap_or(usize::MAX);
    if values.diagnostic.is_none() && consumed < buffer.len() {
        values.diagnostic = Some(format!("{} unread bytes after {expected} fields", buffer.len() - consumed));
    }
    if let Some(diagnostic) = &values.diagnostic {
        warn!("{}: {diagnostic}", category.name);
    }
    values
}

/// Lay `values` out as an info buffer
pub fn encode_info(values: &[InfoValue]) -> Result<Vec<u8>, CodecError> {
    let mut out = MixedDataWriter::new(Vec::new(), ByteOrder::BigEndian);
    for value in values {
        value.write(&mut out)?;
    }
    Ok(out.into_inner())
}

/// Time-bounded, category-tagged holder of an info buffer
#[derive(Debug, Clone, PartialEq)]
pub struct InfoBox {
    pub category: CategoryBinding,
    pub tbox: TimeBoundingBox,
    info: Vec<u8>,
}

impl InfoBox {
    #[must_use]
    pub fn new(category: CategoryBinding, tbox: TimeBoundingBox) -> Self {
        Self { category, tbox, info: Vec::new() }
    }

    #[must_use]
    pub fn info_buffer(&self) -> &[u8] {
        &self.info
    }

    pub fn set_info_buffer(&mut self, info: Vec<u8>) {
        self.info = info;
    }

    /// Decode the buffer; needs the category to be resolved first
    #[must_use]
    pub fn info_values(&self) -> InfoValues {
        match self.category.category() {
            Some(category) => decode_info(category, &self.info),
            None => InfoValues {
                diagnostic: Some(format!("category {} is not resolved", self.category.index())),
                ..InfoValues::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{default_color, Topology};
    use std::sync::Arc;

    fn send_category() -> Category {
        Category::new(1, "MPI_Send", Topology::Arrow, default_color("MPI_Send"))
            .with_info_schema("tag=%d size=%x comm=%s!")
    }

    #[test]
    fn test_decode_full_buffer() {
        let buffer = encode_info(&[
            InfoValue::Int(7),
            InfoValue::Hex(255),
            InfoValue::Str("world".to_string()),
        ])
        .unwrap();
        let values = decode_info(&send_category(), &buffer);

        assert!(values.is_complete());
        assert_eq!(values.fields.len(), 3);
        assert_eq!(values.fields[1].key, " size=");
        assert_eq!(values.to_string(), "tag=7 size=0xff comm=world!");
    }

    #[test]
    fn test_truncated_buffer_is_partial() {
        let mut buffer = encode_info(&[InfoValue::Int(7), InfoValue::Hex(1)]).unwrap();
        buffer.truncate(6);
        let values = decode_info(&send_category(), &buffer);

        assert_eq!(values.fields.len(), 1);
        assert_eq!(values.fields[0].value, InfoValue::Int(7));
        let diagnostic = values.diagnostic.unwrap();
        assert!(diagnostic.contains("after 1 of 3 fields"), "{diagnostic}");
    }

    #[test]
    fn test_missing_buffer_has_diagnostic() {
        let values = decode_info(&send_category(), &[]);
        assert!(values.fields.is_empty());
        assert!(values.diagnostic.unwrap().contains("no info buffer"));
    }

    #[test]
    fn test_extra_bytes_reported() {
        let category = Category::new(2, "mark", Topology::Event, default_color("mark"))
            .with_info_schema("id%d");
        let buffer = encode_info(&[InfoValue::Int(1), InfoValue::Int(2)]).unwrap();
        let values = decode_info(&category, &buffer);
        assert_eq!(values.fields.len(), 1);
        assert!(values.diagnostic.unwrap().contains("4 unread bytes"));
    }

    #[test]
    fn test_info_box_needs_resolved_category() {
        let mut info_box = InfoBox::new(CategoryBinding::unbound(1), TimeBoundingBox::new(0.0, 1.0));
        info_box.set_info_buffer(encode_info(&[InfoValue::Int(1)]).unwrap());
        assert!(info_box.info_values().diagnostic.is_some());

        info_box.category = CategoryBinding::bound(Arc::new(
            Category::new(1, "x", Topology::State, default_color("x")).with_info_schema("n=%d"),
        ));
        assert_eq!(info_box.info_values().to_string(), "n=1");
    }
}
