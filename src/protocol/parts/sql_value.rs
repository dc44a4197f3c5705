//! Typed row and parameter values, and their FD:OCA wire form.
//!
//! On the wire each value is a one-byte null indicator (0xFF = null,
//! 0x00 = present) followed by the type-specific representation. Date, time
//! and timestamp travel as fixed-length character strings.

use crate::protocol::codepoint::NULLDATA;
use crate::protocol::parts::{ColumnDefinition, TypeId};
use crate::protocol::{FrameReader, FrameWriter};
use crate::{Db2Error, Db2Result};

const DATE_LEN: usize = 10;
const TIME_LEN: usize = 8;
const TIMESTAMP_LEN: usize = 26;

/// One SQL value as exchanged with the server.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(String),
}

impl SqlValue {
    /// The FD:OCA descriptor triplet for this value when used as a
    /// parameter: (type code, length).
    pub(crate) fn fdoca_descriptor(&self) -> (u8, u16) {
        match self {
            // A null parameter is described as a nullable varchar.
            Self::Null => (TypeId::Varchar.fdoca_code(true), 0),
            Self::SmallInt(_) => (TypeId::SmallInt.fdoca_code(true), 2),
            Self::Int(_) => (TypeId::Integer.fdoca_code(true), 4),
            Self::BigInt(_) => (TypeId::BigInt.fdoca_code(true), 8),
            Self::Double(_) => (TypeId::Double.fdoca_code(true), 8),
            #[allow(clippy::cast_possible_truncation)]
            Self::Text(s) => (TypeId::Varchar.fdoca_code(true), s.len() as u16),
        }
    }

    /// Appends null indicator plus value bytes.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn emit(&self, wr: &mut FrameWriter) -> Db2Result<()> {
        match self {
            Self::Null => {
                wr.write_u8(NULLDATA);
            }
            Self::SmallInt(v) => {
                wr.write_u8(0);
                wr.write_i16(*v);
            }
            Self::Int(v) => {
                wr.write_u8(0);
                wr.write_i32(*v);
            }
            Self::BigInt(v) => {
                wr.write_u8(0);
                wr.write_i64(*v);
            }
            Self::Double(v) => {
                wr.write_u8(0);
                wr.write_f64(*v);
            }
            Self::Text(s) => {
                let encoded = wr.encode_string(s)?;
                if encoded.len() > 0x7FFF {
                    return Err(Db2Error::Usage("string parameter too long"));
                }
                wr.write_u8(0);
                wr.write_u16(encoded.len() as u16);
                wr.write_bytes(&encoded);
            }
        }
        Ok(())
    }

    /// Reads one value of the described column with the unchecked readers.
    pub(crate) fn parse(rdr: &mut FrameReader, col: &ColumnDefinition) -> Db2Result<Self> {
        if rdr.read_fast_u8()? == NULLDATA {
            if !col.nullable {
                return Err(Db2Error::syntax(format!(
                    "null value for non-nullable column {}",
                    col.name
                )));
            }
            return Ok(Self::Null);
        }
        Ok(match col.type_id {
            TypeId::SmallInt => Self::SmallInt(rdr.read_fast_i16()?),
            TypeId::Integer => Self::Int(rdr.read_fast_i32()?),
            TypeId::BigInt => Self::BigInt(rdr.read_fast_i64()?),
            TypeId::Double => Self::Double(rdr.read_fast_f64()?),
            TypeId::Varchar => {
                let len = usize::from(rdr.read_fast_u16()?);
                Self::Text(rdr.read_fast_string(len)?)
            }
            TypeId::Char => Self::Text(rdr.read_fast_string(col.length as usize)?),
            TypeId::Date => Self::Text(rdr.read_fast_string(DATE_LEN)?),
            TypeId::Time => Self::Text(rdr.read_fast_string(TIME_LEN)?),
            TypeId::Timestamp => Self::Text(rdr.read_fast_string(TIMESTAMP_LEN)?),
            TypeId::Decimal => {
                return Err(Db2Error::Unsupported("packed decimal row data"));
            }
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::SmallInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::BigInt(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "'{s}'"),
        }
    }
}
