//! Read access to a classic-format file held in memory.

use std::fs;
use std::path::Path;

use ndarray::{ArrayD, IxDyn};
use tracing::debug;

use crate::header::{self, Version};
use crate::{Attribute, Dimension, NcType, NetcdfError, VariableInfo};

/// An opened NetCDF classic dataset.
///
/// The whole file is loaded on open; variables are decoded on demand by
/// [`Dataset::read`].
#[derive(Debug)]
pub struct Dataset {
    version: Version,
    numrecs: usize,
    /// Bytes between consecutive records of one record variable.
    record_stride: u64,
    dimensions: Vec<Dimension>,
    attributes: Vec<Attribute>,
    variables: Vec<VariableInfo>,
    data: Vec<u8>,
}

fn record_dim_of(dimensions: &[Dimension]) -> Option<usize> {
    dimensions.iter().position(|d| d.is_record)
}

fn is_record(var: &VariableInfo, record_dim: Option<usize>) -> bool {
    record_dim.is_some() && var.dim_ids.first().copied() == record_dim
}

/// Unpadded size of one record of a record variable.
fn slab_bytes(var: &VariableInfo, dimensions: &[Dimension]) -> Result<u64, NetcdfError> {
    var.dim_ids[1..]
        .iter()
        .try_fold(var.nc_type.size() as u64, |acc, &id| {
            acc.checked_mul(dimensions[id].len as u64)
        })
        .ok_or(NetcdfError::TooLarge)
}

impl Dataset {
    /// Open and index a dataset file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NetcdfError> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        debug!("Read {} bytes from {}", data.len(), path.display());
        Self::from_bytes(data)
    }

    /// Index a dataset already in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, NetcdfError> {
        let header = header::parse(&data)?;
        let record_dim = record_dim_of(&header.dimensions);

        let record_vars: Vec<&VariableInfo> = header
            .variables
            .iter()
            .filter(|v| is_record(v, record_dim))
            .collect();

        let record_stride = match record_vars.as_slice() {
            [] => 0,
            [only] => slab_bytes(only, &header.dimensions)?,
            many => many
                .iter()
                .try_fold(0u64, |acc, v| acc.checked_add(v.vsize))
                .ok_or(NetcdfError::TooLarge)?,
        };

        let numrecs = match header.numrecs {
            Some(n) => n,
            None => {
                let first_begin = record_vars.iter().map(|v| v.begin).min();
                match first_begin {
                    Some(begin) if record_stride > 0 => {
                        ((data.len() as u64).saturating_sub(begin) / record_stride) as usize
                    }
                    _ => 0,
                }
            }
        };

        let mut dimensions = header.dimensions;
        if let Some(idx) = record_dim {
            dimensions[idx].len = numrecs;
        }

        Ok(Self {
            version: header.version,
            numrecs,
            record_stride,
            dimensions,
            attributes: header.attributes,
            variables: header.variables,
            data,
        })
    }

    /// Format version byte: 1 for classic, 2 for 64-bit offset.
    pub fn format_version(&self) -> u8 {
        match self.version {
            Version::Classic => 1,
            Version::Offset64 => 2,
        }
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// True if the dataset has a temporal dimension (named `time`, any case).
    pub fn has_time(&self) -> bool {
        self.dimensions
            .iter()
            .any(|d| d.name.eq_ignore_ascii_case("time"))
    }

    pub fn num_records(&self) -> usize {
        self.numrecs
    }

    pub fn global_attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn variables(&self) -> &[VariableInfo] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&VariableInfo> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variable(name).is_some()
    }

    /// Shape of a variable, record dimension first if it has one.
    pub fn shape(&self, name: &str) -> Result<Vec<usize>, NetcdfError> {
        let var = self
            .variable(name)
            .ok_or_else(|| NetcdfError::NoSuchVariable(name.to_string()))?;
        Ok(self.shape_of(var))
    }

    fn shape_of(&self, var: &VariableInfo) -> Vec<usize> {
        var.dim_ids
            .iter()
            .map(|&id| self.dimensions[id].len)
            .collect()
    }

    /// Decode a numeric variable into an `f64` array.
    pub fn read(&self, name: &str) -> Result<ArrayD<f64>, NetcdfError> {
        let var = self
            .variable(name)
            .ok_or_else(|| NetcdfError::NoSuchVariable(name.to_string()))?;
        if var.nc_type == NcType::Char {
            return Err(NetcdfError::NonNumeric(name.to_string()));
        }

        let shape = self.shape_of(var);
        let size = var.nc_type.size();
        let overflow = || NetcdfError::BadVariable {
            var: name.to_string(),
            reason: "shape overflows addressable memory".to_string(),
        };

        let values = if is_record(var, record_dim_of(&self.dimensions)) {
            let slab = shape[1..]
                .iter()
                .try_fold(1usize, |acc, &d| acc.checked_mul(d))
                .ok_or_else(overflow)?;
            let slab_len = slab.checked_mul(size).ok_or_else(overflow)?;
            let mut values = Vec::new();
            for rec in 0..self.numrecs {
                let offset = (rec as u64)
                    .checked_mul(self.record_stride)
                    .and_then(|o| o.checked_add(var.begin))
                    .ok_or(NetcdfError::TooLarge)?;
                values.extend(var.nc_type.decode(self.slice(offset, slab_len)?));
            }
            values
        } else {
            let count = shape
                .iter()
                .try_fold(1usize, |acc, &d| acc.checked_mul(d))
                .ok_or_else(overflow)?;
            let len = count.checked_mul(size).ok_or_else(overflow)?;
            var.nc_type.decode(self.slice(var.begin, len)?)
        };

        Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
    }

    fn slice(&self, offset: u64, len: usize) -> Result<&[u8], NetcdfError> {
        let start = usize::try_from(offset).map_err(|_| NetcdfError::TooLarge)?;
        let end = start.checked_add(len).ok_or(NetcdfError::TooLarge)?;
        self.data.get(start..end).ok_or(NetcdfError::Truncated {
            offset: start,
            needed: end.saturating_sub(self.data.len()),
        })
    }
}
