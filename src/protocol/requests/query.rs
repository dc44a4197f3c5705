//! Builders for statement preparation and query execution: PRPSQLSTT,
//! DSCSQLSTT, OPNQRY, CNTQRY, EXCSQLIMM and RDBCMM, plus the SQLSTT,
//! SQLATTR and SQLDTA command data objects that chain behind them.

use crate::protocol::parts::{Section, SqlValue};
use crate::protocol::{codepoint as cp, dss, FrameWriter};
use crate::Db2Result;

const COLLECTION_NAME: &str = "NULLID";
const CONSISTENCY_TOKEN: &str = "SYSLVL01";

// Identifiers up to this length are written fixed-width and space-padded;
// anything longer switches all three identifiers to the length-prefixed
// form.
const PKG_IDENTIFIER_FIXED_LEN: usize = 18;
const PKG_IDENTIFIER_MAX_LEN: usize = 255;
const RDBNAM_MAX_LEN: usize = 1024;

/// Classifies SQL text: statements that produce a cursor are framed as
/// prepare + open-query, everything else as execute-immediate + commit.
pub fn is_query(sql: &str) -> bool {
    let first_word = sql
        .split_whitespace()
        .next()
        .map(str::to_ascii_uppercase)
        .unwrap_or_default();
    matches!(first_word.as_str(), "SELECT" | "VALUES" | "WITH")
}

/// Prepares a statement and asks for the SQL descriptor area named by
/// `typsqlda` (input for parameter describe, output for column describe).
pub fn write_prepare_describe(
    wr: &mut FrameWriter,
    sql: &str,
    database: &str,
    section: &Section,
    typsqlda: u8,
) -> Db2Result<()> {
    wr.start_request();
    wr.mark_length(cp::PRPSQLSTT);
    build_pkgnamcsn(wr, database, section)?;
    wr.write_scalar_u8(cp::RTNSQLDA, cp::TRUE);
    wr.write_scalar_u8(cp::TYPSQLDA, typsqlda);
    wr.update_length();

    let cursor_attrs = if section.is_holdable() {
        "WITH HOLD FOR READ ONLY "
    } else {
        "FOR READ ONLY "
    };
    write_sqlattr(wr, cursor_attrs)?;
    write_sqlstt(wr, sql)
}

/// Describes an already-prepared statement's other descriptor area.
pub fn write_describe(
    wr: &mut FrameWriter,
    database: &str,
    section: &Section,
    typsqlda: u8,
) -> Db2Result<()> {
    wr.start_request();
    wr.mark_length(cp::DSCSQLSTT);
    build_pkgnamcsn(wr, database, section)?;
    wr.write_scalar_u8(cp::TYPSQLDA, typsqlda);
    wr.update_length();
    Ok(())
}

/// Opens a cursor over a prepared section. Parameter values, if any, chain
/// behind the command in an SQLDTA object.
#[allow(clippy::cast_possible_truncation)]
pub fn write_open_query(
    wr: &mut FrameWriter,
    database: &str,
    section: &Section,
    fetch_size: u32,
    params: &[SqlValue],
) -> Db2Result<()> {
    wr.start_request();
    wr.mark_length(cp::OPNQRY);
    build_pkgnamcsn(wr, database, section)?;
    wr.write_scalar_u32(cp::QRYBLKSZ, dss::MAX_DSS_LENGTH as u32);
    // -1: this requester accepts the entire answer set in extra blocks.
    wr.write_scalar_u16(cp::MAXBLKEXT, 0xFFFF);
    wr.write_scalar_u32(cp::QRYROWSET, fetch_size);
    // Ask the server to close forward-only cursors at end of data.
    wr.write_scalar_u8(cp::QRYCLSIMP, cp::QRYCLSIMP_YES);
    wr.update_length();

    if !params.is_empty() {
        write_sqldta(wr, params)?;
    }
    Ok(())
}

/// Fetches the next query blocks of an open cursor.
#[allow(clippy::cast_possible_truncation)]
pub fn write_continue_query(
    wr: &mut FrameWriter,
    database: &str,
    section: &Section,
    query_instance_id: u64,
) -> Db2Result<()> {
    wr.start_request();
    wr.mark_length(cp::CNTQRY);
    build_pkgnamcsn(wr, database, section)?;
    wr.write_scalar_u32(cp::QRYBLKSZ, dss::MAX_DSS_LENGTH as u32);
    wr.mark_length(cp::QRYINSID);
    wr.write_u32((query_instance_id >> 32) as u32);
    wr.write_u32(query_instance_id as u32);
    wr.update_length();
    wr.update_length();
    Ok(())
}

/// Executes a statement that returns no cursor.
pub fn write_execute_immediate(
    wr: &mut FrameWriter,
    sql: &str,
    database: &str,
    section: &Section,
) -> Db2Result<()> {
    wr.start_request();
    wr.mark_length(cp::EXCSQLIMM);
    build_pkgnamcsn(wr, database, section)?;
    wr.update_length();

    write_sqlstt(wr, sql)
}

/// Commits the current unit of work.
pub fn write_commit(wr: &mut FrameWriter) {
    wr.start_request();
    wr.write_length_codepoint(4, cp::RDBCMM);
}

// ── command data objects ─────────────────────────────────

fn write_sqlstt(wr: &mut FrameWriter, sql: &str) -> Db2Result<()> {
    wr.start_command_data();
    wr.mark_length(cp::SQLSTT);
    write_nocm_nocs(wr, sql)?;
    wr.update_length();
    Ok(())
}

fn write_sqlattr(wr: &mut FrameWriter, attrs: &str) -> Db2Result<()> {
    wr.start_command_data();
    wr.mark_length(cp::SQLATTR);
    write_nocm_nocs(wr, attrs)?;
    wr.update_length();
    Ok(())
}

// SQLSTTGRP: the statement travels in the mixed-byte variant (present
// marker, four-byte length, bytes), the single-byte variant stays null.
#[allow(clippy::cast_possible_truncation)]
fn write_nocm_nocs(wr: &mut FrameWriter, text: &str) -> Db2Result<()> {
    let encoded = wr.encode_string(text)?;
    wr.write_u8(0x00);
    wr.write_u32(encoded.len() as u32);
    wr.write_bytes(&encoded);
    wr.write_u8(0xFF);
    Ok(())
}

// SQLDTA: one FDODSC descriptor triplet per parameter, then the values as
// one FDODTA row.
fn write_sqldta(wr: &mut FrameWriter, params: &[SqlValue]) -> Db2Result<()> {
    wr.start_command_data();
    wr.mark_length(cp::SQLDTA);

    wr.mark_length(cp::FDODSC);
    for value in params {
        let (type_code, length) = value.fdoca_descriptor();
        wr.write_u8(type_code);
        wr.write_u16(length);
        wr.write_u8(0x01);
    }
    wr.update_length();

    wr.mark_length(cp::FDODTA);
    for value in params {
        value.emit(wr)?;
    }
    wr.update_length();

    wr.update_length();
    Ok(())
}

// ── PKGNAMCSN ────────────────────────────────────────────

// The fully qualified package name, consistency token and section number.
// Everything but the section number is identical across executions against
// the same section, so those bytes are cached on the section after the
// first build.
fn build_pkgnamcsn(wr: &mut FrameWriter, database: &str, section: &Section) -> Db2Result<()> {
    wr.mark_length(cp::PKGNAMCSN);
    if let Some(cached) = section.cached_pkgnamc_bytes() {
        wr.write_bytes(cached);
    } else {
        let start = wr.position();
        build_common_pkgnam_info(wr, database, section)?;
        let token = wr.encode_string(CONSISTENCY_TOKEN)?;
        wr.write_padded_bytes(&token, 8, 0x00)?;
        section.cache_pkgnamc_bytes(wr.bytes_since(start).to_vec());
    }
    wr.write_u16(section.section_number());
    wr.update_length();
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn build_common_pkgnam_info(
    wr: &mut FrameWriter,
    database: &str,
    section: &Section,
) -> Db2Result<()> {
    let db_bytes = wr.encode_string(database)?;
    let collection_bytes = wr.encode_string(COLLECTION_NAME)?;
    let package_bytes = wr.encode_string(section.package_name())?;

    check_identifier_len(database, db_bytes.len(), RDBNAM_MAX_LEN)?;
    check_identifier_len(COLLECTION_NAME, collection_bytes.len(), PKG_IDENTIFIER_MAX_LEN)?;
    check_identifier_len(
        section.package_name(),
        package_bytes.len(),
        PKG_IDENTIFIER_MAX_LEN,
    )?;

    let pad = wr.encode_string(" ")?[0];
    let scldta_required = [&db_bytes, &collection_bytes, &package_bytes]
        .iter()
        .any(|b| b.len() > PKG_IDENTIFIER_FIXED_LEN);

    if scldta_required {
        for bytes in [&db_bytes, &collection_bytes, &package_bytes] {
            let len = bytes.len().max(PKG_IDENTIFIER_FIXED_LEN);
            wr.write_u16(len as u16);
            wr.write_padded_bytes(bytes, len, pad)?;
        }
    } else {
        for bytes in [&db_bytes, &collection_bytes, &package_bytes] {
            wr.write_padded_bytes(bytes, PKG_IDENTIFIER_FIXED_LEN, pad)?;
        }
    }
    Ok(())
}

fn check_identifier_len(identifier: &str, len: usize, max: usize) -> Db2Result<()> {
    if len > max {
        return Err(crate::Db2Error::UsageDetailed(format!(
            "identifier {identifier:?} is {len} bytes, limit is {max}"
        )));
    }
    Ok(())
}
