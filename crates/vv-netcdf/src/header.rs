//! Classic format header decoding.

use crate::{AttrValue, Attribute, Dimension, NcType, NetcdfError, VariableInfo, padded};

pub(crate) const NC_DIMENSION: u32 = 0x0A;
pub(crate) const NC_VARIABLE: u32 = 0x0B;
pub(crate) const NC_ATTRIBUTE: u32 = 0x0C;

/// `numrecs` value of a file still being written.
pub(crate) const STREAMING: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Version {
    Classic,
    Offset64,
}

#[derive(Debug)]
pub(crate) struct Header {
    pub version: Version,
    /// `None` when the file declares streaming mode.
    pub numrecs: Option<usize>,
    pub dimensions: Vec<Dimension>,
    pub attributes: Vec<Attribute>,
    pub variables: Vec<VariableInfo>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], NetcdfError> {
        let remaining = self.bytes.len() - self.pos;
        if n > remaining {
            return Err(NetcdfError::Truncated {
                offset: self.pos,
                needed: n - remaining,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, NetcdfError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64, NetcdfError> {
        let hi = self.u32()? as u64;
        let lo = self.u32()? as u64;
        Ok((hi << 32) | lo)
    }

    fn skip_padding(&mut self, len: usize) -> Result<(), NetcdfError> {
        self.take(padded(len) - len).map(|_| ())
    }

    fn name(&mut self) -> Result<String, NetcdfError> {
        let len = self.u32()? as usize;
        let raw = self.take(len)?;
        self.skip_padding(len)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    /// Read a list header. `ABSENT` (two zero words) is an empty list.
    fn list_len(&mut self, expected: u32) -> Result<usize, NetcdfError> {
        let tag = self.u32()?;
        let nelems = self.u32()? as usize;
        match tag {
            0 if nelems == 0 => Ok(0),
            t if t == expected => Ok(nelems),
            found => Err(NetcdfError::BadTag { expected, found }),
        }
    }

    fn attributes(&mut self) -> Result<Vec<Attribute>, NetcdfError> {
        let count = self.list_len(NC_ATTRIBUTE)?;
        let mut attributes = Vec::new();
        for _ in 0..count {
            let name = self.name()?;
            let nc_type = NcType::from_tag(self.u32()?)?;
            let nelems = self.u32()? as usize;
            let len = nelems
                .checked_mul(nc_type.size())
                .ok_or(NetcdfError::TooLarge)?;
            let raw = self.take(len)?;
            self.skip_padding(len)?;
            let value = match nc_type {
                NcType::Char => AttrValue::Text(
                    String::from_utf8_lossy(raw)
                        .trim_end_matches('\0')
                        .to_string(),
                ),
                numeric => AttrValue::Numbers(numeric.decode(raw)),
            };
            attributes.push(Attribute { name, value });
        }
        Ok(attributes)
    }
}

/// Decode the header at the start of `bytes`.
pub(crate) fn parse(bytes: &[u8]) -> Result<Header, NetcdfError> {
    let mut cur = Cursor { bytes, pos: 0 };

    let magic = cur.take(4).map_err(|_| NetcdfError::NotNetcdf)?;
    if &magic[..3] != b"CDF" {
        return Err(NetcdfError::NotNetcdf);
    }
    let version = match magic[3] {
        1 => Version::Classic,
        2 => Version::Offset64,
        other => return Err(NetcdfError::UnsupportedVersion(other)),
    };

    let numrecs = match cur.u32()? {
        STREAMING => None,
        n => Some(n as usize),
    };

    let dim_count = cur.list_len(NC_DIMENSION)?;
    let mut dimensions = Vec::new();
    let mut have_record = false;
    for _ in 0..dim_count {
        let name = cur.name()?;
        let len = cur.u32()? as usize;
        let is_record = len == 0 && !have_record;
        have_record |= is_record;
        dimensions.push(Dimension {
            name,
            len,
            is_record,
        });
    }

    let attributes = cur.attributes()?;

    let var_count = cur.list_len(NC_VARIABLE)?;
    let mut variables = Vec::new();
    for _ in 0..var_count {
        let name = cur.name()?;
        let ndims = cur.u32()? as usize;
        let mut dim_ids = Vec::new();
        for _ in 0..ndims {
            let dim_id = cur.u32()? as usize;
            if dim_id >= dimensions.len() {
                return Err(NetcdfError::InvalidDimension { var: name, dim_id });
            }
            dim_ids.push(dim_id);
        }
        let var_attributes = cur.attributes()?;
        let nc_type = NcType::from_tag(cur.u32()?)?;
        let vsize = cur.u32()? as u64;
        let begin = match version {
            Version::Classic => cur.u32()? as u64,
            Version::Offset64 => cur.u64()?,
        };
        variables.push(VariableInfo {
            name,
            dim_ids,
            attributes: var_attributes,
            nc_type,
            vsize,
            begin,
        });
    }

    Ok(Header {
        version,
        numrecs,
        dimensions,
        attributes,
        variables,
    })
}
