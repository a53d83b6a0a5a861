//! OpenCL numeric type catalog
//!
//! Maps every OpenCL scalar and vector type to its element size and to the
//! construct / equal / format / parse functions used by argument values.
//! The per-type behaviour lives in a table of function pointers that is built
//! once, on first use, and never torn down.
//!
//! Vector-3 types share storage with their vector-4 counterparts (OpenCL 1.2
//! section 6.1.5 "Alignment of Types"), so they carry four lanes and go
//! through the vector-4 path for equality and formatting.

use crate::error::{CldriveError, Result};
use half::f16;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

// ============================================================================
// Type tags
// ============================================================================

/// Scalar element kind of an OpenCL type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    Bool,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Half,
    Float,
    Double,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 12] = [
        ScalarKind::Bool,
        ScalarKind::Char,
        ScalarKind::UChar,
        ScalarKind::Short,
        ScalarKind::UShort,
        ScalarKind::Int,
        ScalarKind::UInt,
        ScalarKind::Long,
        ScalarKind::ULong,
        ScalarKind::Half,
        ScalarKind::Float,
        ScalarKind::Double,
    ];

    /// OpenCL C spelling of the scalar type
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Char => "char",
            ScalarKind::UChar => "uchar",
            ScalarKind::Short => "short",
            ScalarKind::UShort => "ushort",
            ScalarKind::Int => "int",
            ScalarKind::UInt => "uint",
            ScalarKind::Long => "long",
            ScalarKind::ULong => "ulong",
            ScalarKind::Half => "half",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::Half | ScalarKind::Float | ScalarKind::Double)
    }

    fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "bool" => ScalarKind::Bool,
            "char" => ScalarKind::Char,
            "uchar" | "unsigned char" => ScalarKind::UChar,
            "short" => ScalarKind::Short,
            "ushort" | "unsigned short" => ScalarKind::UShort,
            "int" => ScalarKind::Int,
            "uint" | "unsigned int" | "unsigned" => ScalarKind::UInt,
            "long" => ScalarKind::Long,
            "ulong" | "unsigned long" => ScalarKind::ULong,
            "half" => ScalarKind::Half,
            "float" => ScalarKind::Float,
            "double" => ScalarKind::Double,
            _ => return None,
        };
        Some(kind)
    }
}

/// Vector widths defined by OpenCL
pub const VECTOR_WIDTHS: [u8; 5] = [2, 3, 4, 8, 16];

/// One member of the closed set of supported OpenCL numeric types
///
/// Only valid combinations can be built: a scalar of any kind, or a vector of
/// width 2, 3, 4, 8 or 16 for every kind except `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpenClType {
    kind: ScalarKind,
    width: u8,
}

impl OpenClType {
    pub const INT: OpenClType = OpenClType::scalar(ScalarKind::Int);
    pub const FLOAT: OpenClType = OpenClType::scalar(ScalarKind::Float);

    pub const fn scalar(kind: ScalarKind) -> Self {
        Self { kind, width: 1 }
    }

    /// Vector form of `kind`, or `None` for an undefined width
    pub fn vector(kind: ScalarKind, width: u8) -> Option<Self> {
        if kind == ScalarKind::Bool || !VECTOR_WIDTHS.contains(&width) {
            return None;
        }
        Some(Self { kind, width })
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    /// Declared lane count (1 for scalars)
    pub fn width(&self) -> usize {
        self.width as usize
    }

    pub fn is_vector(&self) -> bool {
        self.width > 1
    }

    /// Lanes actually stored: vector-3 types are padded to four
    pub fn storage_lanes(&self) -> usize {
        if self.width == 3 { 4 } else { self.width as usize }
    }

    /// Every type in the catalog
    pub fn all() -> impl Iterator<Item = OpenClType> {
        ScalarKind::ALL.into_iter().flat_map(|kind| {
            std::iter::once(OpenClType::scalar(kind))
                .chain(VECTOR_WIDTHS.into_iter().filter_map(move |w| OpenClType::vector(kind, w)))
        })
    }
}

impl fmt::Display for OpenClType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_vector() {
            write!(f, "{}{}", self.kind.name(), self.width)
        } else {
            write!(f, "{}", self.kind.name())
        }
    }
}

impl FromStr for OpenClType {
    type Err = CldriveError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        let unknown = || CldriveError::UnknownType(s.to_string());

        if let Some(kind) = ScalarKind::from_name(name) {
            return Ok(OpenClType::scalar(kind));
        }

        let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return Err(unknown());
        }
        let (base, width) = name.split_at(name.len() - digits);
        let kind = ScalarKind::from_name(base).ok_or_else(unknown)?;
        let width: u8 = width.parse().map_err(|_| unknown())?;
        OpenClType::vector(kind, width).ok_or_else(unknown)
    }
}

// ============================================================================
// Lane primitives
// ============================================================================

/// Host representation of one lane of an OpenCL type
trait Lane: Copy {
    const SIZE: usize;
    fn from_seed(seed: i64) -> Self;
    fn read(bytes: &[u8]) -> Self;
    fn write(self, out: &mut [u8]);
    fn bits_eq(self, other: Self) -> bool;
    fn render(self) -> String;
    fn parse(text: &str) -> Option<Self>;
}

macro_rules! int_lane {
    ($($t:ty),*) => {$(
        impl Lane for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn from_seed(seed: i64) -> Self {
                seed as $t
            }

            fn read(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_ne_bytes(raw)
            }

            fn write(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_ne_bytes());
            }

            fn bits_eq(self, other: Self) -> bool {
                self == other
            }

            fn render(self) -> String {
                self.to_string()
            }

            fn parse(text: &str) -> Option<Self> {
                text.parse().ok()
            }
        }
    )*};
}

int_lane!(i8, u8, i16, u16, i32, u32, i64, u64);

macro_rules! float_lane {
    ($($t:ty => $from_seed:expr),*) => {$(
        impl Lane for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn from_seed(seed: i64) -> Self {
                $from_seed(seed)
            }

            fn read(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_ne_bytes(raw)
            }

            fn write(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_ne_bytes());
            }

            // Exact bit comparison: any divergence counts, and a NaN equals itself.
            fn bits_eq(self, other: Self) -> bool {
                self.to_bits() == other.to_bits()
            }

            fn render(self) -> String {
                self.to_string()
            }

            fn parse(text: &str) -> Option<Self> {
                text.parse().ok()
            }
        }
    )*};
}

float_lane!(
    f16 => |s: i64| f16::from_f64(s as f64),
    f32 => |s: i64| s as f32,
    f64 => |s: i64| s as f64
);

/// `cl_bool`: a 32-bit unsigned integer on the host side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClBool(u32);

impl Lane for ClBool {
    const SIZE: usize = 4;

    fn from_seed(seed: i64) -> Self {
        ClBool((seed != 0) as u32)
    }

    fn read(bytes: &[u8]) -> Self {
        ClBool(u32::read(bytes))
    }

    fn write(self, out: &mut [u8]) {
        self.0.write(out)
    }

    fn bits_eq(self, other: Self) -> bool {
        self.0 == other.0
    }

    fn render(self) -> String {
        self.0.to_string()
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "true" => Some(ClBool(1)),
            "false" => Some(ClBool(0)),
            _ => text.parse().ok().map(ClBool),
        }
    }
}

// ============================================================================
// Function table
// ============================================================================

/// Per-lane behaviour, monomorphised from a `Lane` impl
#[derive(Clone, Copy)]
struct LaneOps {
    size: usize,
    write_seed: fn(i64, &mut [u8]),
    equal: fn(&[u8], &[u8]) -> bool,
    format: fn(&[u8]) -> String,
    parse: fn(&str, &mut [u8]) -> bool,
}

impl LaneOps {
    fn of<T: Lane>() -> Self {
        Self {
            size: T::SIZE,
            write_seed: |seed, out| T::from_seed(seed).write(out),
            equal: |a, b| T::read(a).bits_eq(T::read(b)),
            format: |bytes| T::read(bytes).render(),
            parse: |text, out| match T::parse(text) {
                Some(v) => {
                    v.write(out);
                    true
                }
                None => false,
            },
        }
    }

    fn for_kind(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Bool => Self::of::<ClBool>(),
            ScalarKind::Char => Self::of::<i8>(),
            ScalarKind::UChar => Self::of::<u8>(),
            ScalarKind::Short => Self::of::<i16>(),
            ScalarKind::UShort => Self::of::<u16>(),
            ScalarKind::Int => Self::of::<i32>(),
            ScalarKind::UInt => Self::of::<u32>(),
            ScalarKind::Long => Self::of::<i64>(),
            ScalarKind::ULong => Self::of::<u64>(),
            ScalarKind::Half => Self::of::<f16>(),
            ScalarKind::Float => Self::of::<f32>(),
            ScalarKind::Double => Self::of::<f64>(),
        }
    }
}

/// Catalog entry for one type
struct TypeEntry {
    lane: LaneOps,
    lanes: usize,
}

impl TypeEntry {
    fn element_size(&self) -> usize {
        self.lane.size * self.lanes
    }

    fn lane_chunks<'a>(&self, bytes: &'a [u8]) -> std::slice::ChunksExact<'a, u8> {
        bytes.chunks_exact(self.lane.size)
    }
}

static CATALOG: LazyLock<HashMap<OpenClType, TypeEntry>> = LazyLock::new(|| {
    OpenClType::all()
        .map(|ty| {
            let entry = TypeEntry {
                lane: LaneOps::for_kind(ty.kind()),
                lanes: ty.storage_lanes(),
            };
            (ty, entry)
        })
        .collect()
});

fn entry(ty: OpenClType) -> &'static TypeEntry {
    match CATALOG.get(&ty) {
        Some(entry) => entry,
        None => unreachable!("type {} missing from the catalog", ty),
    }
}

// ============================================================================
// Catalog operations on raw elements
// ============================================================================

/// Size in bytes of one element of `ty` as laid out in device memory
pub fn element_size(ty: OpenClType) -> usize {
    entry(ty).element_size()
}

/// Write `seed` into every lane of the element at `out`
pub fn write_element(ty: OpenClType, seed: i64, out: &mut [u8]) {
    let entry = entry(ty);
    for lane in out.chunks_exact_mut(entry.lane.size) {
        (entry.lane.write_seed)(seed, lane);
    }
}

/// Compare two encoded elements of `ty`
pub fn elements_equal(ty: OpenClType, lhs: &[u8], rhs: &[u8]) -> bool {
    let entry = entry(ty);
    lhs.len() == rhs.len()
        && entry
            .lane_chunks(lhs)
            .zip(entry.lane_chunks(rhs))
            .all(|(a, b)| (entry.lane.equal)(a, b))
}

/// Render one encoded element of `ty`
pub fn format_element(ty: OpenClType, bytes: &[u8]) -> String {
    let entry = entry(ty);
    let lanes: Vec<String> = entry.lane_chunks(bytes).map(entry.lane.format).collect();
    if ty.is_vector() {
        format!("({})", lanes.join(", "))
    } else {
        lanes.join("")
    }
}

/// Parse text produced by [`format_element`] back into an encoded element
pub fn parse_element(ty: OpenClType, text: &str) -> Result<Vec<u8>> {
    let entry = entry(ty);
    let err = || CldriveError::ParseValue {
        text: text.to_string(),
        type_name: ty.to_string(),
    };

    let trimmed = text.trim();
    let lanes: Vec<&str> = if ty.is_vector() {
        trimmed
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(err)?
            .split(',')
            .map(str::trim)
            .collect()
    } else {
        vec![trimmed]
    };
    if lanes.len() != entry.lanes {
        return Err(err());
    }

    let mut out = vec![0u8; entry.element_size()];
    for (lane_text, lane_out) in lanes.iter().zip(out.chunks_exact_mut(entry.lane.size)) {
        if !(entry.lane.parse)(lane_text, lane_out) {
            return Err(err());
        }
    }
    Ok(out)
}

// ============================================================================
// Value
// ============================================================================

/// A single value of an OpenCL type, stored in its device encoding
#[derive(Debug, Clone)]
pub struct Value {
    ty: OpenClType,
    bytes: Vec<u8>,
}

impl Value {
    /// Build a value with every lane set to `seed`
    pub fn construct(ty: OpenClType, seed: i64) -> Self {
        let mut bytes = vec![0u8; element_size(ty)];
        write_element(ty, seed, &mut bytes);
        Self { ty, bytes }
    }

    pub fn zero(ty: OpenClType) -> Self {
        Self::construct(ty, 0)
    }

    pub fn parse(ty: OpenClType, text: &str) -> Result<Self> {
        let bytes = parse_element(ty, text)?;
        Ok(Self { ty, bytes })
    }

    pub fn ty(&self) -> OpenClType {
        self.ty
    }

    /// Device encoding of the value
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && elements_equal(self.ty, &self.bytes, &other.bytes)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_element(self.ty, &self.bytes))
    }
}
