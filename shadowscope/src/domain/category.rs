//! Drawable categories and their duration statistics
//!
//! A [`Category`] names one kind of drawable (an MPI call, a message type,
//! a marker) together with its display attributes and the schema of the
//! info payload its drawables carry. [`CategoryWeight`] and
//! [`CategorySummary`] hold the inclusive/exclusive duration fractions
//! gathered by shadows.

// Ratios are stored as f32 on the wire
#![allow(clippy::cast_possible_truncation)]

use std::fmt;

use shadowscope_common::stream::string_byte_size;
use shadowscope_common::{
    MixedDataInput, MixedDataOutput, CATEGORY_RATIOS_BYTESIZE, CATEGORY_SUMMARY_BYTESIZE,
    CATEGORY_WEIGHT_BYTESIZE, COLOR_ALPHA_BYTESIZE, SHADOW_ARROW_INDEX, SHADOW_EVENT_INDEX,
    SHADOW_STATE_INDEX, TOPOLOGY_ARROW, TOPOLOGY_EVENT, TOPOLOGY_STATE,
};

use super::table::CategoryBinding;
use crate::codec::{read_short_count, write_short_count, Decodable, Encodable};
use crate::domain::CodecError;

// =============================================================================
// TOPOLOGY
// =============================================================================

/// Structural kind of a drawable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topology {
    Event,
    State,
    Arrow,
}

impl Topology {
    #[must_use]
    pub fn code(self) -> i8 {
        match self {
            Topology::Event => TOPOLOGY_EVENT,
            Topology::State => TOPOLOGY_STATE,
            Topology::Arrow => TOPOLOGY_ARROW,
        }
    }

    pub fn from_code(code: i8) -> Result<Self, CodecError> {
        match code {
            TOPOLOGY_EVENT => Ok(Topology::Event),
            TOPOLOGY_STATE => Ok(Topology::State),
            TOPOLOGY_ARROW => Ok(Topology::Arrow),
            other => Err(CodecError::InvalidTopology(other)),
        }
    }

    #[must_use]
    pub fn vertex_count(self) -> usize {
        match self {
            Topology::Event => 1,
            Topology::State | Topology::Arrow => 2,
        }
    }

    /// Only states nest like call frames
    #[must_use]
    pub fn is_nestable(self) -> bool {
        matches!(self, Topology::State)
    }

    /// Best guess for a drawable whose category is not bound yet
    #[must_use]
    pub fn infer(vertex_count: usize) -> Self {
        if vertex_count == 1 {
            Topology::Event
        } else {
            Topology::State
        }
    }

    /// Index of the synthetic preview category shadows of this kind carry
    #[must_use]
    pub fn shadow_index(self) -> i32 {
        match self {
            Topology::State => SHADOW_STATE_INDEX,
            Topology::Arrow => SHADOW_ARROW_INDEX,
            Topology::Event => SHADOW_EVENT_INDEX,
        }
    }

    #[must_use]
    pub fn from_shadow_index(index: i32) -> Option<Self> {
        match index {
            SHADOW_STATE_INDEX => Some(Topology::State),
            SHADOW_ARROW_INDEX => Some(Topology::Arrow),
            SHADOW_EVENT_INDEX => Some(Topology::Event),
            _ => None,
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Topology::Event => "Event",
            Topology::State => "State",
            Topology::Arrow => "Arrow",
        };
        f.write_str(name)
    }
}

// =============================================================================
// COLOR
// =============================================================================

/// Display color; `modifiable` is false for colors fixed by the producer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorAlpha {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
    pub modifiable: bool,
}

impl ColorAlpha {
    pub const BYTESIZE: usize = COLOR_ALPHA_BYTESIZE;

    #[must_use]
    pub fn opaque(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue, alpha: 255, modifiable: true }
    }

    /// Packed as `0xAARRGGBB`
    #[must_use]
    pub fn to_argb(self) -> i32 {
        i32::from_be_bytes([self.alpha, self.red, self.green, self.blue])
    }

    #[must_use]
    pub fn from_argb(argb: i32, modifiable: bool) -> Self {
        let [alpha, red, green, blue] = argb.to_be_bytes();
        Self { red, green, blue, alpha, modifiable }
    }
}

/// FNV-1a: small deterministic hash for turning a name into a palette slot
fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 1_469_598_103_934_665_603;
    const PRIME: u64 = 1_099_511_628_211;

    let mut hash = OFFSET_BASIS;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Visually distinct categorical palette (RGB)
const CATEGORICAL_PALETTE: &[(u8, u8, u8)] = &[
    (0xF0, 0xCA, 0x00), // signal yellow
    (0xE2, 0x53, 0x03), // signal orange
    (0xD3, 0x6E, 0x70), // antique pink
    (0xBB, 0x1E, 0x10), // traffic red
    (0x90, 0x46, 0x84), // signal violet
    (0x1E, 0x4A, 0x9C), // signal blue
    (0x22, 0x71, 0xB3), // sky blue
    (0x25, 0x6D, 0x7B), // water blue
    (0x57, 0xA6, 0x39), // yellow green
    (0x2D, 0x8F, 0x38), // light green
    (0x00, 0x83, 0x51), // signal green
    (0x1E, 0x8F, 0x8A), // mint turquoise
];

/// Palette entry `slot`, wrapping around
#[must_use]
pub fn palette_color(slot: usize) -> ColorAlpha {
    let (red, green, blue) = CATEGORICAL_PALETTE[slot % CATEGORICAL_PALETTE.len()];
    ColorAlpha::opaque(red, green, blue)
}

/// Stable default color for a category name
#[must_use]
pub fn default_color(name: &str) -> ColorAlpha {
    palette_color((fnv1a64(name.as_bytes()) % CATEGORICAL_PALETTE.len() as u64) as usize)
}

// =============================================================================
// INFO SCHEMA
// =============================================================================

/// Scanf-like type tag of one info value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoType {
    /// `%d`: i32 shown in decimal
    Int,
    /// `%x`: i32 shown in hex
    Hex,
    /// `%D`: i64 shown in decimal
    Long,
    /// `%X`: i64 shown in hex
    LongHex,
    /// `%e`: f32
    Float,
    /// `%E`: f64
    Double,
    /// `%s`: length-prefixed string
    Str,
}

impl InfoType {
    #[must_use]
    pub fn tag(self) -> char {
        match self {
            InfoType::Int => 'd',
            InfoType::Hex => 'x',
            InfoType::Long => 'D',
            InfoType::LongHex => 'X',
            InfoType::Float => 'e',
            InfoType::Double => 'E',
            InfoType::Str => 's',
        }
    }

    #[must_use]
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'd' => Some(InfoType::Int),
            'x' => Some(InfoType::Hex),
            'D' => Some(InfoType::Long),
            'X' => Some(InfoType::LongHex),
            'e' => Some(InfoType::Float),
            'E' => Some(InfoType::Double),
            's' => Some(InfoType::Str),
            _ => None,
        }
    }
}

/// Parse the `%`-delimited key/type mini-language.
///
/// Every `%<tag>` closes the text before it as a key and adds a typed
/// field. `%%` is a literal percent sign; a `%` before an unknown tag or at
/// the end stays literal. Text after the last field becomes a trailing key
/// unless it is empty.
///
/// ```
/// use shadowscope::domain::{parse_info_keys, InfoType};
///
/// let (keys, types) = parse_info_keys("tag%dsize%dname");
/// assert_eq!(keys, ["tag", "size", "name"]);
/// assert_eq!(types, [InfoType::Int, InfoType::Int]);
/// ```
#[must_use]
pub fn parse_info_keys(schema: &str) -> (Vec<String>, Vec<InfoType>) {
    let mut keys = Vec::new();
    let mut types = Vec::new();
    let mut current = String::new();
    let mut chars = schema.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            current.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                current.push('%');
            }
            Some(tag) => {
                if let Some(info_type) = InfoType::from_tag(tag) {
                    chars.next();
                    keys.push(std::mem::take(&mut current));
                    types.push(info_type);
                } else {
                    current.push('%');
                }
            }
            None => current.push('%'),
        }
    }
    if !current.is_empty() {
        keys.push(current);
    }
    (keys, types)
}

/// Inverse of [`parse_info_keys`]
#[must_use]
pub fn format_info_keys(keys: &[String], types: &[InfoType]) -> String {
    let mut schema = String::new();
    for (position, key) in keys.iter().enumerate() {
        schema.push_str(&key.replace('%', "%%"));
        if let Some(info_type) = types.get(position) {
            schema.push('%');
            schema.push(info_type.tag());
        }
    }
    schema
}

// =============================================================================
// RATIOS, WEIGHTS, SUMMARIES
// =============================================================================

/// Durations as fractions of a containing shadow's duration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CategoryRatios {
    pub inclusive: f32,
    pub exclusive: f32,
}

impl CategoryRatios {
    pub const BYTESIZE: usize = CATEGORY_RATIOS_BYTESIZE;

    #[must_use]
    pub fn new(inclusive: f32, exclusive: f32) -> Self {
        Self { inclusive, exclusive }
    }

    pub fn rescale(&mut self, factor: f64) {
        self.inclusive = (f64::from(self.inclusive) * factor) as f32;
        self.exclusive = (f64::from(self.exclusive) * factor) as f32;
    }

    /// Add `other` re-expressed against this denominator
    pub fn add_scaled(&mut self, other: &CategoryRatios, factor: f64) {
        self.inclusive = (f64::from(self.inclusive) + f64::from(other.inclusive) * factor) as f32;
        self.exclusive = (f64::from(self.exclusive) + f64::from(other.exclusive) * factor) as f32;
    }
}

impl Encodable for CategoryRatios {
    fn byte_size(&self) -> usize {
        Self::BYTESIZE
    }

    fn write_object<W: MixedDataOutput>(&self, out: &mut W) -> Result<(), CodecError> {
        out.write_f32(self.inclusive)?;
        out.write_f32(self.exclusive)?;
        Ok(())
    }
}

impl Decodable for CategoryRatios {
    fn read_object<R: MixedDataInput>(input: &mut R) -> Result<Self, CodecError> {
        let inclusive = input.read_f32()?;
        let exclusive = input.read_f32()?;
        Ok(Self { inclusive, exclusive })
    }
}

/// Per-category statistics held by a shadow
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryWeight {
    pub category: CategoryBinding,
    pub ratios: CategoryRatios,
    pub num_real_objs: i64,
}

impl CategoryWeight {
    pub const BYTESIZE: usize = CATEGORY_WEIGHT_BYTESIZE;

    #[must_use]
    pub fn new(category: CategoryBinding, inclusive: f32, exclusive: f32, num_real_objs: i64) -> Self {
        Self { category, ratios: CategoryRatios::new(inclusive, exclusive), num_real_objs }
    }

    #[must_use]
    pub fn category_index(&self) -> i32 {
        self.category.index()
    }

    pub fn rescale(&mut self, factor: f64) {
        self.ratios.rescale(factor);
    }

    pub fn add_drawable_count(&mut self, count: i64) {
        self.num_real_objs += count;
    }

    pub fn add_inclusive_ratio(&mut self, ratio: f64) {
        self.ratios.inclusive = (f64::from(self.ratios.inclusive) + ratio) as f32;
    }

    pub fn add_exclusive_ratio(&mut self, ratio: f64) {
        self.ratios.exclusive = (f64::from(self.ratios.exclusive) + ratio) as f32;
    }

    /// Fold `other` in after re-expressing its ratios with `factor`
    pub fn merge_scaled(&mut self, other: &CategoryWeight, factor: f64) {
        self.ratios.add_scaled(&other.ratios, factor);
        self.num_real_objs += other.num_real_objs;
    }
}

impl fmt::Display for CategoryWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: incl={:.4} excl={:.4} count={}",
            self.category,
            self.ratios.inclusive,
            self.ratios.exclusive,
            self.num_real_objs
        )
    }
}

impl Encodable for CategoryWeight {
    fn byte_size(&self) -> usize {
        Self::BYTESIZE
    }

    fn write_object<W: MixedDataOutput>(&self, out: &mut W) -> Result<(), CodecError> {
        out.write_i32(self.category.index())?;
        self.ratios.write_object(out)?;
        out.write_i64(self.num_real_objs)?;
        Ok(())
    }
}

impl Decodable for CategoryWeight {
    fn read_object<R: MixedDataInput>(input: &mut R) -> Result<Self, CodecError> {
        let index = input.read_i32()?;
        let ratios = CategoryRatios::read_object(input)?;
        let num_real_objs = input.read_i64()?;
        Ok(Self { category: CategoryBinding::unbound(index), ratios, num_real_objs })
    }
}

/// Running statistics of one category across a whole trace
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CategorySummary {
    pub ratios: CategoryRatios,
    pub num_real_objs: i64,
}

impl CategorySummary {
    pub const BYTESIZE: usize = CATEGORY_SUMMARY_BYTESIZE;

    /// Fold a shadow's weight in; `scale` is shadow duration / trace duration
    pub fn accumulate(&mut self, weight: &CategoryWeight, scale: f64) {
        self.ratios.add_scaled(&weight.ratios, scale);
        self.num_real_objs += weight.num_real_objs;
    }
}

impl Encodable for CategorySummary {
    fn byte_size(&self) -> usize {
        Self::BYTESIZE
    }

    fn write_object<W: MixedDataOutput>(&self, out: &mut W) -> Result<(), CodecError> {
        self.ratios.write_object(out)?;
        out.write_i64(self.num_real_objs)?;
        Ok(())
    }
}

impl Decodable for CategorySummary {
    fn read_object<R: MixedDataInput>(input: &mut R) -> Result<Self, CodecError> {
        let ratios = CategoryRatios::read_object(input)?;
        let num_real_objs = input.read_i64()?;
        Ok(Self { ratios, num_real_objs })
    }
}

// =============================================================================
// CATEGORY
// =============================================================================

/// One drawable kind.
///
/// Categories are created once per distinct type and shared through
/// `Arc<Category>`; per-trace mutable state (used, visible, running
/// summary) lives in [`CategoryTable`](super::CategoryTable).
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub index: i32,
    pub name: String,
    pub topology: Topology,
    pub color: ColorAlpha,
    pub width: u8,
    pub info_keys: Vec<String>,
    pub info_types: Vec<InfoType>,
    /// Event-pairing ids used by producers to detect state begin/end
    pub methods: Vec<i32>,
    /// Summary as persisted with the category table
    pub summary: CategorySummary,
}

impl Category {
    #[must_use]
    pub fn new(index: i32, name: impl Into<String>, topology: Topology, color: ColorAlpha) -> Self {
        Self {
            index,
            name: name.into(),
            topology,
            color,
            width: 1,
            info_keys: Vec::new(),
            info_types: Vec::new(),
            methods: Vec::new(),
            summary: CategorySummary::default(),
        }
    }

    /// Stand-in for an index no category table entry exists for
    #[must_use]
    pub fn placeholder(index: i32) -> Self {
        let name = Self::placeholder_name(index);
        let color = default_color(&name);
        Self::new(index, name, Topology::State, color)
    }

    /// Synthetic category shadows of `topology` are drawn with
    #[must_use]
    pub fn shadow_preview(topology: Topology) -> Self {
        let name = format!("Preview_{topology}");
        Self::new(topology.shadow_index(), name, topology, ColorAlpha::opaque(0x80, 0x80, 0x80))
    }

    #[must_use]
    pub fn placeholder_name(index: i32) -> String {
        format!("UnknownType-{index}")
    }

    #[must_use]
    pub fn with_width(mut self, width: u8) -> Self {
        self.width = width;
        self
    }

    #[must_use]
    pub fn with_info_schema(mut self, schema: &str) -> Self {
        let (keys, types) = parse_info_keys(schema);
        self.info_keys = keys;
        self.info_types = types;
        self
    }

    #[must_use]
    pub fn with_methods(mut self, methods: Vec<i32>) -> Self {
        self.methods = methods;
        self
    }

    #[must_use]
    pub fn info_schema(&self) -> String {
        format_info_keys(&self.info_keys, &self.info_types)
    }

    #[must_use]
    pub fn is_shadow_preview(&self) -> bool {
        self.index < 0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Category[{}] {} ({})", self.index, self.name, self.topology)
    }
}

impl Encodable for Category {
    fn byte_size(&self) -> usize {
        4 + string_byte_size(&self.name)
            + 1
            + ColorAlpha::BYTESIZE
            + 1
            + 2
            + self.info_keys.iter().map(|k| string_byte_size(k)).sum::<usize>()
            + 2
            + self.info_types.len()
            + 2
            + self.methods.len() * 4
            + CategorySummary::BYTESIZE
    }

    fn write_object<W: MixedDataOutput>(&self, out: &mut W) -> Result<(), CodecError> {
        out.write_i32(self.index)?;
        out.write_string(&self.name)?;
        out.write_i8(self.topology.code())?;
        out.write_i32(self.color.to_argb())?;
        out.write_bool(self.color.modifiable)?;
        out.write_u8(self.width)?;

        write_short_count(out, self.info_keys.len(), "info key")?;
        for key in &self.info_keys {
            out.write_string(key)?;
        }
        write_short_count(out, self.info_types.len(), "info type")?;
        for info_type in &self.info_types {
            // Tags are ASCII
            out.write_u8(info_type.tag() as u8)?;
        }
        write_short_count(out, self.methods.len(), "method")?;
        for method in &self.methods {
            out.write_i32(*method)?;
        }
        self.summary.write_object(out)
    }
}

impl Decodable for Category {
    fn read_object<R: MixedDataInput>(input: &mut R) -> Result<Self, CodecError> {
        let index = input.read_i32()?;
        let name = input.read_string()?;
        let topology = Topology::from_code(input.read_i8()?)?;
        let argb = input.read_i32()?;
        let modifiable = input.read_bool()?;
        let width = input.read_u8()?;

        let key_count = read_short_count(input)?;
        let mut info_keys = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            info_keys.push(input.read_string()?);
        }
        let type_count = read_short_count(input)?;
        let mut info_types = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            let tag = char::from(input.read_u8()?);
            info_types.push(InfoType::from_tag(tag).ok_or(CodecError::InvalidInfoType(tag))?);
        }
        let method_count = read_short_count(input)?;
        let mut methods = Vec::with_capacity(method_count);
        for _ in 0..method_count {
            methods.push(input.read_i32()?);
        }
        let summary = CategorySummary::read_object(input)?;

        Ok(Self {
            index,
            name,
            topology,
            color: ColorAlpha::from_argb(argb, modifiable),
            width,
            info_keys,
            info_types,
            methods,
            summary,
        })
    }
}
