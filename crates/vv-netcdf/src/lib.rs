//! NetCDF classic format support for model output datasets.
//!
//! Reads the two classic variants, `CDF\x01` and the 64-bit offset
//! `CDF\x02`, and writes `CDF\x01`. Every numeric variable decodes to an
//! `ndarray::ArrayD<f64>` whatever its stored type; `char` variables are
//! rejected as non-numeric.

mod dataset;
mod header;
mod writer;

pub use dataset::Dataset;
pub use writer::ClassicWriter;

use thiserror::Error;

/// Errors raised while reading or writing NetCDF files.
#[derive(Debug, Error)]
pub enum NetcdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a NetCDF classic file")]
    NotNetcdf,

    #[error("unsupported NetCDF format version {0}")]
    UnsupportedVersion(u8),

    #[error("file truncated at byte {offset} ({needed} more bytes needed)")]
    Truncated { offset: usize, needed: usize },

    #[error("unexpected header tag {found:#x} (expected {expected:#x})")]
    BadTag { expected: u32, found: u32 },

    #[error("unknown NetCDF type tag {0}")]
    UnknownType(u32),

    #[error("variable `{var}` references undefined dimension {dim_id}")]
    InvalidDimension { var: String, dim_id: usize },

    #[error("dimension `{0}` is not defined")]
    NoSuchDimension(String),

    #[error("variable `{0}` not found")]
    NoSuchVariable(String),

    #[error("variable `{0}` holds character data")]
    NonNumeric(String),

    #[error("variable `{var}`: {reason}")]
    BadVariable { var: String, reason: String },

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("dimension `{0}`: a record dimension is already defined")]
    DuplicateRecordDimension(String),

    #[error("dataset sizes or offsets exceed the format's limits")]
    TooLarge,
}

/// External data types of the classic format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcType {
    Byte,
    Char,
    Short,
    Int,
    Float,
    Double,
}

impl NcType {
    pub(crate) fn from_tag(tag: u32) -> Result<Self, NetcdfError> {
        match tag {
            1 => Ok(NcType::Byte),
            2 => Ok(NcType::Char),
            3 => Ok(NcType::Short),
            4 => Ok(NcType::Int),
            5 => Ok(NcType::Float),
            6 => Ok(NcType::Double),
            other => Err(NetcdfError::UnknownType(other)),
        }
    }

    pub(crate) fn tag(self) -> u32 {
        match self {
            NcType::Byte => 1,
            NcType::Char => 2,
            NcType::Short => 3,
            NcType::Int => 4,
            NcType::Float => 5,
            NcType::Double => 6,
        }
    }

    /// Size of one value in bytes.
    pub fn size(self) -> usize {
        match self {
            NcType::Byte | NcType::Char => 1,
            NcType::Short => 2,
            NcType::Int | NcType::Float => 4,
            NcType::Double => 8,
        }
    }

    /// Decode big-endian values to `f64`. Character data decodes as bytes.
    pub(crate) fn decode(self, bytes: &[u8]) -> Vec<f64> {
        let size = self.size();
        bytes
            .chunks_exact(size)
            .map(|c| match self {
                NcType::Byte => c[0] as i8 as f64,
                NcType::Char => c[0] as f64,
                NcType::Short => i16::from_be_bytes([c[0], c[1]]) as f64,
                NcType::Int => i32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64,
                NcType::Float => f32::from_be_bytes([c[0], c[1], c[2], c[3]]) as f64,
                NcType::Double => {
                    f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
                }
            })
            .collect()
    }

    /// Encode values as big-endian bytes of this type. Values are cast with
    /// Rust's saturating `as` conversions.
    pub(crate) fn encode(self, values: &[f64], out: &mut Vec<u8>) {
        for &v in values {
            match self {
                NcType::Byte | NcType::Char => out.push(v as i8 as u8),
                NcType::Short => out.extend_from_slice(&(v as i16).to_be_bytes()),
                NcType::Int => out.extend_from_slice(&(v as i32).to_be_bytes()),
                NcType::Float => out.extend_from_slice(&(v as f32).to_be_bytes()),
                NcType::Double => out.extend_from_slice(&v.to_be_bytes()),
            }
        }
    }
}

/// A named dimension. The record (unlimited) dimension reports the current
/// number of records as its length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
    pub is_record: bool,
}

/// Attribute payload.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Numbers(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

/// Header entry describing one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    pub dim_ids: Vec<usize>,
    pub attributes: Vec<Attribute>,
    pub nc_type: NcType,
    pub(crate) vsize: u64,
    pub(crate) begin: u64,
}

/// Round a byte count up to the 4-byte boundary the format pads to.
pub(crate) fn padded(len: usize) -> usize {
    (len + 3) & !3
}
