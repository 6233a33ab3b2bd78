//! Classic format (`CDF\x01`) writer.

use std::fs;
use std::path::Path;

use crate::header::{NC_ATTRIBUTE, NC_DIMENSION, NC_VARIABLE};
use crate::{NcType, NetcdfError, padded};

struct DimSpec {
    name: String,
    /// `None` for the record dimension.
    len: Option<usize>,
}

struct VarSpec {
    name: String,
    dim_ids: Vec<usize>,
    nc_type: NcType,
    data: Vec<f64>,
}

/// Builds a classic-format file from in-memory arrays.
///
/// ```
/// use vv_netcdf::{ClassicWriter, NcType};
///
/// let mut writer = ClassicWriter::new();
/// writer.add_record_dimension("time").unwrap();
/// writer.add_dimension("x", 2);
/// writer
///     .add_variable("thk", &["time", "x"], NcType::Double, &[1.0, 2.0, 3.0, 4.0])
///     .unwrap();
/// let bytes = writer.to_bytes().unwrap();
/// assert_eq!(&bytes[..4], b"CDF\x01");
/// ```
#[derive(Default)]
pub struct ClassicWriter {
    dimensions: Vec<DimSpec>,
    attributes: Vec<(String, String)>,
    variables: Vec<VarSpec>,
    numrecs: Option<usize>,
}

impl ClassicWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dimension(&mut self, name: &str, len: usize) -> &mut Self {
        self.dimensions.push(DimSpec {
            name: name.to_string(),
            len: Some(len),
        });
        self
    }

    /// Add the unlimited dimension. Its length is set by the record
    /// variables written against it.
    pub fn add_record_dimension(&mut self, name: &str) -> Result<&mut Self, NetcdfError> {
        if self.dimensions.iter().any(|d| d.len.is_none()) {
            return Err(NetcdfError::DuplicateRecordDimension(name.to_string()));
        }
        self.dimensions.push(DimSpec {
            name: name.to_string(),
            len: None,
        });
        Ok(self)
    }

    pub fn add_text_attribute(&mut self, name: &str, value: &str) -> &mut Self {
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    /// Add a variable over the named dimensions with row-major `data`.
    ///
    /// A record variable must list the record dimension first; its record
    /// count is `data.len()` divided by the size of one record, and must
    /// agree with any record variable added before it.
    pub fn add_variable(
        &mut self,
        name: &str,
        dims: &[&str],
        nc_type: NcType,
        data: &[f64],
    ) -> Result<&mut Self, NetcdfError> {
        if nc_type == NcType::Char {
            return Err(NetcdfError::NonNumeric(name.to_string()));
        }
        let bad = |reason: String| NetcdfError::BadVariable {
            var: name.to_string(),
            reason,
        };

        let mut dim_ids = Vec::with_capacity(dims.len());
        for dim in dims {
            let id = self
                .dimensions
                .iter()
                .position(|d| d.name == *dim)
                .ok_or_else(|| NetcdfError::NoSuchDimension(dim.to_string()))?;
            dim_ids.push(id);
        }

        let record_pos = dim_ids
            .iter()
            .position(|&id| self.dimensions[id].len.is_none());
        match record_pos {
            None => {
                let expected: usize = dim_ids
                    .iter()
                    .filter_map(|&id| self.dimensions[id].len)
                    .product();
                if data.len() != expected {
                    return Err(bad(format!(
                        "expected {} values, got {}",
                        expected,
                        data.len()
                    )));
                }
            }
            Some(0) => {
                let slab: usize = dim_ids[1..]
                    .iter()
                    .filter_map(|&id| self.dimensions[id].len)
                    .product();
                let records = match slab {
                    0 if data.is_empty() => 0,
                    0 => return Err(bad("record slab is empty but data was given".into())),
                    _ if data.len() % slab != 0 => {
                        return Err(bad(format!(
                            "{} values do not divide into records of {}",
                            data.len(),
                            slab
                        )));
                    }
                    _ => data.len() / slab,
                };
                match self.numrecs {
                    Some(n) if n != records => {
                        return Err(bad(format!(
                            "has {} records, other record variables have {}",
                            records, n
                        )));
                    }
                    _ => self.numrecs = Some(records),
                }
            }
            Some(_) => return Err(bad("record dimension must come first".into())),
        }

        self.variables.push(VarSpec {
            name: name.to_string(),
            dim_ids,
            nc_type,
            data: data.to_vec(),
        });
        Ok(self)
    }

    fn is_record(&self, var: &VarSpec) -> bool {
        var.dim_ids
            .first()
            .is_some_and(|&id| self.dimensions[id].len.is_none())
    }

    /// Values per slab: the whole variable, or one record of it.
    fn slab_len(&self, var: &VarSpec) -> usize {
        let skip = usize::from(self.is_record(var));
        var.dim_ids[skip..]
            .iter()
            .map(|&id| self.dimensions[id].len.unwrap_or(0))
            .product()
    }

    fn vsize(&self, var: &VarSpec) -> usize {
        padded(self.slab_len(var) * var.nc_type.size())
    }

    /// Serialize the dataset.
    pub fn to_bytes(&self) -> Result<Vec<u8>, NetcdfError> {
        let numrecs = self.numrecs.unwrap_or(0);
        let header_len = self.encode_header(&vec![0; self.variables.len()])?.len();

        let mut begins = vec![0u64; self.variables.len()];
        let mut offset = header_len as u64;
        for (i, var) in self.variables.iter().enumerate() {
            if !self.is_record(var) {
                begins[i] = offset;
                offset += self.vsize(var) as u64;
            }
        }
        for (i, var) in self.variables.iter().enumerate() {
            if self.is_record(var) {
                begins[i] = offset;
                offset += self.vsize(var) as u64;
            }
        }

        let mut out = self.encode_header(&begins)?;

        for var in self.variables.iter().filter(|v| !self.is_record(v)) {
            var.nc_type.encode(&var.data, &mut out);
            out.resize(padded(out.len()), 0);
        }

        let record_vars: Vec<&VarSpec> = self
            .variables
            .iter()
            .filter(|v| self.is_record(v))
            .collect();
        let pad_records = record_vars.len() > 1;
        for rec in 0..numrecs {
            for var in &record_vars {
                let slab = self.slab_len(var);
                var.nc_type
                    .encode(&var.data[rec * slab..(rec + 1) * slab], &mut out);
                if pad_records {
                    out.resize(padded(out.len()), 0);
                }
            }
        }

        Ok(out)
    }

    /// Serialize the dataset to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), NetcdfError> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    fn encode_header(&self, begins: &[u64]) -> Result<Vec<u8>, NetcdfError> {
        let word = |v: usize| u32::try_from(v).map_err(|_| NetcdfError::TooLarge);
        let mut out = b"CDF\x01".to_vec();
        put_u32(&mut out, word(self.numrecs.unwrap_or(0))?);

        if self.dimensions.is_empty() {
            put_u32(&mut out, 0);
            put_u32(&mut out, 0);
        } else {
            put_u32(&mut out, NC_DIMENSION);
            put_u32(&mut out, word(self.dimensions.len())?);
            for dim in &self.dimensions {
                put_name(&mut out, &dim.name)?;
                put_u32(&mut out, word(dim.len.unwrap_or(0))?);
            }
        }

        if self.attributes.is_empty() {
            put_u32(&mut out, 0);
            put_u32(&mut out, 0);
        } else {
            put_u32(&mut out, NC_ATTRIBUTE);
            put_u32(&mut out, word(self.attributes.len())?);
            for (name, value) in &self.attributes {
                put_name(&mut out, name)?;
                put_u32(&mut out, NcType::Char.tag());
                put_u32(&mut out, word(value.len())?);
                out.extend_from_slice(value.as_bytes());
                out.resize(padded(out.len()), 0);
            }
        }

        if self.variables.is_empty() {
            put_u32(&mut out, 0);
            put_u32(&mut out, 0);
        } else {
            put_u32(&mut out, NC_VARIABLE);
            put_u32(&mut out, word(self.variables.len())?);
            for (var, &begin) in self.variables.iter().zip(begins) {
                put_name(&mut out, &var.name)?;
                put_u32(&mut out, word(var.dim_ids.len())?);
                for &id in &var.dim_ids {
                    put_u32(&mut out, word(id)?);
                }
                put_u32(&mut out, 0);
                put_u32(&mut out, 0);
                put_u32(&mut out, var.nc_type.tag());
                put_u32(&mut out, word(self.vsize(var))?);
                put_u32(
                    &mut out,
                    u32::try_from(begin).map_err(|_| NetcdfError::TooLarge)?,
                );
            }
        }

        Ok(out)
    }
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_name(out: &mut Vec<u8>, name: &str) -> Result<(), NetcdfError> {
    let len = u32::try_from(name.len()).map_err(|_| NetcdfError::TooLarge)?;
    put_u32(out, len);
    out.extend_from_slice(name.as_bytes());
    out.resize(padded(out.len()), 0);
    Ok(())
}
