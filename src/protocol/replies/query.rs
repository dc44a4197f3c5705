//! Parsers for statement and query replies: SQLCARD, SQLDARD, OPNQRYRM,
//! QRYDSC, QRYDTA, ENDQRYRM and ENDUOWRM.

use crate::protocol::parts::{ColumnDefinition, ColumnMetaData, Sqlca, SqlValue, TypeId};
use crate::protocol::replies::connect::parse_svrcod;
use crate::protocol::{codepoint as cp, FrameReader, Peek};
use crate::{Db2Error, Db2Result};

/// Parses an SQLCARD object. An absent (null) SQLCA reads as plain success.
pub fn parse_sqlcard(rdr: &mut FrameReader) -> Db2Result<Sqlca> {
    rdr.expect(cp::SQLCARD)?;
    let payload_len = rdr.scalar_len();
    let start = rdr.consumed();
    let sqlca = Sqlca::parse(rdr)?;
    rdr.finish_scalar(start, payload_len)?;
    Ok(sqlca.unwrap_or_default())
}

/// Parses an SQLDARD: an optional SQLCA followed by the descriptor area.
/// A negative SQLCODE inside the SQLDARD fails the command right here.
pub fn parse_sqldard(rdr: &mut FrameReader) -> Db2Result<(Option<Sqlca>, ColumnMetaData)> {
    rdr.expect(cp::SQLDARD)?;
    let payload_len = rdr.scalar_len();
    let start = rdr.consumed();

    let sqlca = Sqlca::parse(rdr)?;
    if let Some(sqlca) = &sqlca {
        if sqlca.sql_code() < 0 {
            return Err(Db2Error::Server {
                source: sqlca.into(),
            });
        }
    }

    let count = rdr.read_fast_u16()?;
    let mut columns = Vec::with_capacity(usize::from(count));
    for index in 0..count {
        let precision = rdr.read_fast_u16()?;
        let scale = rdr.read_fast_u16()?;
        #[allow(clippy::cast_possible_truncation)]
        let length = rdr.read_fast_u64()? as u32;
        let sql_type = rdr.read_fast_u16()?;
        let _ccsid = rdr.read_fast_u16()?;
        let name = read_ld_string(rdr)?;
        let _label = read_ld_string(rdr)?;
        let _comments = read_ld_string(rdr)?;

        let (type_id, nullable) = TypeId::from_sql_type(sql_type)?;
        let name = if name.is_empty() {
            format!("COL{}", index + 1)
        } else {
            name
        };
        columns.push(ColumnDefinition {
            name,
            type_id,
            nullable,
            length,
            precision,
            scale,
        });
    }
    rdr.finish_scalar(start, payload_len)?;
    debug!("SQLDARD described {count} columns");
    Ok((sqlca, ColumnMetaData::new(columns)))
}

fn read_ld_string(rdr: &mut FrameReader) -> Db2Result<String> {
    let len = usize::from(rdr.read_fast_u16()?);
    rdr.read_fast_string(len)
}

/// The Open Query Complete reply message.
#[derive(Debug)]
pub struct OpenQueryReply {
    pub svrcod: u16,
    pub protocol_type: Option<u16>,
    pub query_instance_id: u64,
}

pub fn parse_opnqryrm(rdr: &mut FrameReader) -> Db2Result<OpenQueryReply> {
    rdr.expect(cp::OPNQRYRM)?;
    rdr.push_collection();
    let mut svrcod: Option<u16> = None;
    let mut protocol_type: Option<u16> = None;
    let mut query_instance_id: Option<u64> = None;
    loop {
        match rdr.peek_code_point()? {
            Peek::EndOfCollection => break,
            Peek::CodePoint(cp::SVRCOD) => {
                svrcod = Some(parse_svrcod(rdr, cp::SVRCOD_INFO, cp::SVRCOD_WARNING)?);
            }
            Peek::CodePoint(cp::QRYPRCTYP) => {
                rdr.expect(cp::QRYPRCTYP)?;
                protocol_type = Some(rdr.read_u16()?);
            }
            Peek::CodePoint(cp::QRYINSID) => {
                rdr.expect(cp::QRYINSID)?;
                // Servers below SQLAM level 7 flow a four-byte instance id.
                query_instance_id = Some(if rdr.scalar_len() == 4 {
                    u64::from(rdr.read_u32()?)
                } else {
                    rdr.read_u64()?
                });
            }
            Peek::CodePoint(other) => {
                return Err(Db2Error::syntax(format!(
                    "unexpected codepoint 0x{other:04X} in OPNQRYRM"
                )))
            }
            Peek::EndOfChain => {
                return Err(Db2Error::syntax("OPNQRYRM collection cut short"));
            }
        }
    }
    rdr.pop_collection()?;
    Ok(OpenQueryReply {
        svrcod: svrcod
            .ok_or_else(|| Db2Error::syntax("OPNQRYRM is missing mandatory SVRCOD"))?,
        protocol_type,
        query_instance_id: query_instance_id.unwrap_or(0),
    })
}

/// Parses the QRYDSC row description: one four-byte FD:OCA descriptor per
/// column. Names are not carried here; callers that already hold described
/// metadata keep it, others get positional names.
pub fn parse_qrydsc(rdr: &mut FrameReader) -> Db2Result<ColumnMetaData> {
    rdr.expect(cp::QRYDSC)?;
    let len = rdr.scalar_len();
    if len == 0 || len % 4 != 0 {
        return Err(Db2Error::syntax(format!(
            "QRYDSC length {len} is not a multiple of four"
        )));
    }
    let mut columns = Vec::with_capacity(len / 4);
    for index in 0..len / 4 {
        let type_code = rdr.read_u8()?;
        let length = u32::from(rdr.read_u16()?);
        let nullable_flag = rdr.read_u8()?;
        let (type_id, nullable) = TypeId::from_fdoca_code(type_code)?;
        columns.push(ColumnDefinition {
            name: format!("COL{}", index + 1),
            type_id,
            nullable: nullable || nullable_flag != 0,
            length,
            precision: 0,
            scale: 0,
        });
    }
    Ok(ColumnMetaData::new(columns))
}

/// Decodes every row in one QRYDTA object, handing each to `on_row`.
/// Returns the number of rows decoded.
pub fn parse_qrydta(
    rdr: &mut FrameReader,
    metadata: &ColumnMetaData,
    mut on_row: impl FnMut(Vec<SqlValue>),
) -> Db2Result<u64> {
    rdr.expect(cp::QRYDTA)?;
    let payload_len = rdr.scalar_len();
    let start = rdr.consumed();
    let mut rows = 0_u64;
    while rdr.consumed() - start < payload_len {
        let row = metadata
            .columns()
            .iter()
            .map(|col| SqlValue::parse(rdr, col))
            .collect::<Db2Result<Vec<SqlValue>>>()?;
        on_row(row);
        rows += 1;
    }
    rdr.finish_scalar(start, payload_len)?;
    trace!("decoded {rows} rows from QRYDTA block");
    Ok(rows)
}

/// The End of Query reply message; the cursor is gone afterwards.
pub fn parse_endqryrm(rdr: &mut FrameReader) -> Db2Result<u16> {
    rdr.expect(cp::ENDQRYRM)?;
    rdr.push_collection();
    let mut svrcod: Option<u16> = None;
    loop {
        match rdr.peek_code_point()? {
            Peek::EndOfCollection => break,
            Peek::CodePoint(cp::SVRCOD) => {
                svrcod = Some(parse_svrcod(rdr, cp::SVRCOD_INFO, cp::SVRCOD_SEVERE)?);
            }
            Peek::CodePoint(point @ (cp::RDBNAM | cp::QRYINSID)) => {
                rdr.expect(point)?;
                rdr.skip_scalar()?;
            }
            Peek::CodePoint(other) => {
                return Err(Db2Error::syntax(format!(
                    "unexpected codepoint 0x{other:04X} in ENDQRYRM"
                )))
            }
            Peek::EndOfChain => {
                return Err(Db2Error::syntax("ENDQRYRM collection cut short"));
            }
        }
    }
    rdr.pop_collection()?;
    svrcod.ok_or_else(|| Db2Error::syntax("ENDQRYRM is missing mandatory SVRCOD"))
}

/// The End Unit of Work reply message sent for commits.
pub fn parse_enduowrm(rdr: &mut FrameReader) -> Db2Result<u16> {
    rdr.expect(cp::ENDUOWRM)?;
    rdr.push_collection();
    let mut svrcod: Option<u16> = None;
    loop {
        match rdr.peek_code_point()? {
            Peek::EndOfCollection => break,
            Peek::CodePoint(cp::SVRCOD) => {
                svrcod = Some(parse_svrcod(rdr, cp::SVRCOD_INFO, cp::SVRCOD_SEVERE)?);
            }
            Peek::CodePoint(cp::UOWDSP) => {
                rdr.expect(cp::UOWDSP)?;
                rdr.skip_scalar()?;
            }
            Peek::CodePoint(other) => {
                return Err(Db2Error::syntax(format!(
                    "unexpected codepoint 0x{other:04X} in ENDUOWRM"
                )))
            }
            Peek::EndOfChain => {
                return Err(Db2Error::syntax("ENDUOWRM collection cut short"));
            }
        }
    }
    rdr.pop_collection()?;
    svrcod.ok_or_else(|| Db2Error::syntax("ENDUOWRM is missing mandatory SVRCOD"))
}
