//! Parsers for the connection establishment replies: EXCSATRD, ACCSECRD,
//! SECCHKRM, ACCRDBRM and the piggy-backed session data that may follow.
//!
//! Mandatory fields are tracked with per-field received flags and checked
//! when the enclosing collection closes; a missing mandatory field or an
//! unknown codepoint inside a reply collection is a fatal protocol error.

use crate::protocol::ccsid::CCSID_UTF8;
use crate::protocol::replies::query::parse_sqlcard;
use crate::protocol::{codepoint as cp, FrameReader, Peek};
use crate::{Db2Error, Db2Result};

/// What the server told us about itself during the handshake.
#[derive(Debug, Clone, Default)]
pub struct ServerAttributes {
    /// Job or process name on the server system.
    pub external_name: Option<String>,
    /// Server's own name, usually its network location.
    pub server_name: Option<String>,
    /// Class of server, e.g. `QDB2/LINUX`.
    pub server_class: Option<String>,
    /// Product release level string.
    pub release_level: Option<String>,
    /// Product identifier from the ACCRDB reply.
    pub product_id: Option<String>,
    /// Manager codepoints and the levels the server granted.
    pub manager_levels: Vec<(u16, u16)>,
    /// Highest severity the handshake replies carried.
    pub severity: u16,
    /// Correlation token, when the server assigned one.
    pub correlation_token: Option<Vec<u8>>,
    /// Isolation level piggy-backed after ACCRDBRM.
    pub isolation_level: Option<u8>,
    /// Current schema piggy-backed after ACCRDBRM.
    pub current_schema: Option<String>,
}

impl ServerAttributes {
    /// True when the server granted the unicode manager at CCSID 1208.
    pub fn supports_utf8(&self) -> bool {
        self.manager_levels
            .iter()
            .any(|&(mgr, level)| mgr == cp::UNICODEMGR && level == CCSID_UTF8)
    }

    fn raise_severity(&mut self, svrcod: u16) {
        if svrcod > self.severity {
            self.severity = svrcod;
        }
    }
}

/// Parses the EXCSATRD collection into `attrs`. All fields are optional.
pub fn parse_excsatrd(rdr: &mut FrameReader, attrs: &mut ServerAttributes) -> Db2Result<()> {
    rdr.expect(cp::EXCSATRD)?;
    rdr.push_collection();
    let mut mgrlvlls_received = false;
    loop {
        match rdr.peek_code_point()? {
            Peek::EndOfCollection => break,
            Peek::CodePoint(cp::EXTNAM) => {
                check_dup(attrs.external_name.is_none(), cp::EXTNAM)?;
                rdr.expect(cp::EXTNAM)?;
                attrs.external_name = Some(rdr.read_string()?);
            }
            Peek::CodePoint(cp::SRVNAM) => {
                check_dup(attrs.server_name.is_none(), cp::SRVNAM)?;
                rdr.expect(cp::SRVNAM)?;
                attrs.server_name = Some(rdr.read_string()?);
            }
            Peek::CodePoint(cp::SRVCLSNM) => {
                check_dup(attrs.server_class.is_none(), cp::SRVCLSNM)?;
                rdr.expect(cp::SRVCLSNM)?;
                attrs.server_class = Some(rdr.read_string()?);
            }
            Peek::CodePoint(cp::SRVRLSLV) => {
                check_dup(attrs.release_level.is_none(), cp::SRVRLSLV)?;
                rdr.expect(cp::SRVRLSLV)?;
                attrs.release_level = Some(rdr.read_string()?);
            }
            Peek::CodePoint(cp::MGRLVLLS) => {
                check_dup(!mgrlvlls_received, cp::MGRLVLLS)?;
                mgrlvlls_received = true;
                attrs.manager_levels = parse_mgrlvlls(rdr)?;
            }
            Peek::CodePoint(other) => {
                return Err(unexpected_in(other, "EXCSATRD"));
            }
            Peek::EndOfChain => {
                return Err(Db2Error::syntax("EXCSATRD collection cut short"));
            }
        }
    }
    rdr.pop_collection()?;
    debug!(
        "server attributes: class={:?} release={:?} managers={:?}",
        attrs.server_class, attrs.release_level, attrs.manager_levels
    );
    Ok(())
}

// Each manager entry is a codepoint plus a two-byte level.
fn parse_mgrlvlls(rdr: &mut FrameReader) -> Db2Result<Vec<(u16, u16)>> {
    rdr.expect(cp::MGRLVLLS)?;
    let len = rdr.scalar_len();
    if len == 0 || len % 4 != 0 {
        return Err(Db2Error::syntax(format!(
            "manager level list length {len} is not a multiple of four"
        )));
    }
    let mut levels = Vec::with_capacity(len / 4);
    for _ in 0..len / 4 {
        let manager = rdr.read_u16()?;
        let level = rdr.read_u16()?;
        levels.push((manager, level));
    }
    Ok(levels)
}

/// Parses the ACCSECRD collection and verifies that the server accepted the
/// requested security mechanism.
pub fn parse_accsecrd(rdr: &mut FrameReader, requested_secmec: u16) -> Db2Result<Option<Vec<u8>>> {
    rdr.expect(cp::ACCSECRD)?;
    rdr.push_collection();
    let mut secmec_list: Option<Vec<u16>> = None;
    let mut sectkn: Option<Vec<u8>> = None;
    let mut secchkcd: Option<u8> = None;
    loop {
        match rdr.peek_code_point()? {
            Peek::EndOfCollection => break,
            Peek::CodePoint(cp::SECMEC) => {
                check_dup(secmec_list.is_none(), cp::SECMEC)?;
                rdr.expect(cp::SECMEC)?;
                secmec_list = Some(rdr.read_u16_list()?);
            }
            Peek::CodePoint(cp::SECTKN) => {
                check_dup(sectkn.is_none(), cp::SECTKN)?;
                rdr.expect(cp::SECTKN)?;
                sectkn = Some(rdr.read_all_bytes()?);
            }
            Peek::CodePoint(cp::SECCHKCD) => {
                check_dup(secchkcd.is_none(), cp::SECCHKCD)?;
                secchkcd = Some(parse_secchkcd(rdr)?);
            }
            Peek::CodePoint(other) => return Err(unexpected_in(other, "ACCSECRD")),
            Peek::EndOfChain => {
                return Err(Db2Error::syntax("ACCSECRD collection cut short"));
            }
        }
    }
    rdr.pop_collection()?;

    // A security check code here means ACCSEC itself failed.
    if let Some(code) = secchkcd {
        if code != cp::SECCHKCD_OK {
            return Err(Db2Error::SecurityRejected { code });
        }
    }
    let secmec_list =
        secmec_list.ok_or_else(|| Db2Error::syntax("ACCSECRD is missing mandatory SECMEC"))?;
    if secmec_list.as_slice() != [requested_secmec] {
        return Err(Db2Error::Unsupported(
            "server does not support the requested security mechanism",
        ));
    }
    Ok(sectkn)
}

/// Parses the SECCHKRM reply message; a non-zero security check code fails
/// the handshake.
pub fn parse_secchkrm(rdr: &mut FrameReader, attrs: &mut ServerAttributes) -> Db2Result<()> {
    rdr.expect(cp::SECCHKRM)?;
    rdr.push_collection();
    let mut svrcod: Option<u16> = None;
    let mut secchkcd: Option<u8> = None;
    let mut sectkn_received = false;
    loop {
        match rdr.peek_code_point()? {
            Peek::EndOfCollection => break,
            Peek::CodePoint(cp::SVRCOD) => {
                check_dup(svrcod.is_none(), cp::SVRCOD)?;
                svrcod = Some(parse_svrcod(rdr, cp::SVRCOD_INFO, cp::SVRCOD_SEVERE)?);
            }
            Peek::CodePoint(cp::SECCHKCD) => {
                check_dup(secchkcd.is_none(), cp::SECCHKCD)?;
                secchkcd = Some(parse_secchkcd(rdr)?);
            }
            Peek::CodePoint(cp::SECTKN) => {
                check_dup(!sectkn_received, cp::SECTKN)?;
                sectkn_received = true;
                rdr.expect(cp::SECTKN)?;
                rdr.skip_scalar()?;
            }
            Peek::CodePoint(other) => return Err(unexpected_in(other, "SECCHKRM")),
            Peek::EndOfChain => {
                return Err(Db2Error::syntax("SECCHKRM collection cut short"));
            }
        }
    }
    rdr.pop_collection()?;

    let svrcod =
        svrcod.ok_or_else(|| Db2Error::syntax("SECCHKRM is missing mandatory SVRCOD"))?;
    let secchkcd =
        secchkcd.ok_or_else(|| Db2Error::syntax("SECCHKRM is missing mandatory SECCHKCD"))?;
    attrs.raise_severity(svrcod);
    if secchkcd != cp::SECCHKCD_OK {
        return Err(Db2Error::SecurityRejected { code: secchkcd });
    }

    // Reply data: a mutual-authentication token may follow the message.
    if let Peek::CodePoint(cp::SECTKN) = rdr.peek_code_point()? {
        rdr.expect(cp::SECTKN)?;
        rdr.skip_scalar()?;
    }
    Ok(())
}

/// Parses the ACCRDBRM collection plus whatever the server chose to chain
/// behind it (PBSD, type definition updates, a closing SQLCA).
pub fn parse_accrdbrm(rdr: &mut FrameReader, attrs: &mut ServerAttributes) -> Db2Result<()> {
    rdr.expect(cp::ACCRDBRM)?;
    rdr.push_collection();
    let mut svrcod: Option<u16> = None;
    let mut typdefnam_received = false;
    let mut typdefovr_received = false;
    let mut usrid_received = false;
    loop {
        match rdr.peek_code_point()? {
            Peek::EndOfCollection => break,
            Peek::CodePoint(cp::SVRCOD) => {
                check_dup(svrcod.is_none(), cp::SVRCOD)?;
                svrcod = Some(parse_svrcod(rdr, cp::SVRCOD_INFO, cp::SVRCOD_WARNING)?);
            }
            Peek::CodePoint(cp::PRDID) => {
                check_dup(attrs.product_id.is_none(), cp::PRDID)?;
                rdr.expect(cp::PRDID)?;
                attrs.product_id = Some(rdr.read_string()?);
            }
            Peek::CodePoint(cp::TYPDEFNAM) => {
                check_dup(!typdefnam_received, cp::TYPDEFNAM)?;
                typdefnam_received = true;
                parse_typdefnam(rdr)?;
            }
            Peek::CodePoint(cp::TYPDEFOVR) => {
                check_dup(!typdefovr_received, cp::TYPDEFOVR)?;
                typdefovr_received = true;
                parse_typdefovr(rdr)?;
            }
            Peek::CodePoint(cp::USRID) => {
                check_dup(!usrid_received, cp::USRID)?;
                usrid_received = true;
                rdr.expect(cp::USRID)?;
                rdr.skip_scalar()?;
            }
            Peek::CodePoint(cp::CRRTKN) => {
                check_dup(attrs.correlation_token.is_none(), cp::CRRTKN)?;
                rdr.expect(cp::CRRTKN)?;
                attrs.correlation_token = Some(rdr.read_all_bytes()?);
            }
            Peek::CodePoint(other) => return Err(unexpected_in(other, "ACCRDBRM")),
            Peek::EndOfChain => {
                return Err(Db2Error::syntax("ACCRDBRM collection cut short"));
            }
        }
    }
    rdr.pop_collection()?;

    let svrcod =
        svrcod.ok_or_else(|| Db2Error::syntax("ACCRDBRM is missing mandatory SVRCOD"))?;
    if attrs.product_id.is_none() {
        return Err(Db2Error::syntax("ACCRDBRM is missing mandatory PRDID"));
    }
    if !typdefnam_received {
        return Err(Db2Error::syntax("ACCRDBRM is missing mandatory TYPDEFNAM"));
    }
    if !typdefovr_received {
        return Err(Db2Error::syntax("ACCRDBRM is missing mandatory TYPDEFOVR"));
    }
    attrs.raise_severity(svrcod);

    parse_initial_pbsd(rdr, attrs)?;

    // Trailing type definition updates and an optional closing SQLCA.
    loop {
        match rdr.peek_code_point()? {
            Peek::EndOfChain => return Ok(()),
            Peek::CodePoint(cp::TYPDEFNAM) => parse_typdefnam(rdr)?,
            Peek::CodePoint(cp::TYPDEFOVR) => parse_typdefovr(rdr)?,
            Peek::CodePoint(cp::SQLCARD) => {
                parse_sqlcard(rdr)?.into_result()?;
            }
            Peek::CodePoint(other) => return Err(unexpected_in(other, "ACCRDBRM reply data")),
            Peek::EndOfCollection => {
                return Err(Db2Error::syntax("unbalanced collection after ACCRDBRM"));
            }
        }
    }
}

// PBSD: isolation level and current schema, sent unsolicited after
// ACCRDBRM by servers that support it.
fn parse_initial_pbsd(rdr: &mut FrameReader, attrs: &mut ServerAttributes) -> Db2Result<()> {
    if rdr.peek_code_point()? != Peek::CodePoint(cp::PBSD) {
        return Ok(());
    }
    rdr.expect(cp::PBSD)?;
    rdr.push_collection();
    loop {
        match rdr.peek_code_point()? {
            Peek::EndOfCollection => break,
            Peek::CodePoint(cp::PBSD_ISO) => {
                rdr.expect(cp::PBSD_ISO)?;
                attrs.isolation_level = Some(rdr.read_u8()?);
            }
            Peek::CodePoint(cp::PBSD_SCHEMA) => {
                rdr.expect(cp::PBSD_SCHEMA)?;
                attrs.current_schema = Some(rdr.read_string()?);
            }
            Peek::CodePoint(other) => return Err(unexpected_in(other, "PBSD")),
            Peek::EndOfChain => return Err(Db2Error::syntax("PBSD collection cut short")),
        }
    }
    rdr.pop_collection()?;
    debug!(
        "piggy-backed session data: isolation={:?} schema={:?}",
        attrs.isolation_level, attrs.current_schema
    );
    Ok(())
}

fn parse_typdefnam(rdr: &mut FrameReader) -> Db2Result<()> {
    rdr.expect(cp::TYPDEFNAM)?;
    let typdef = rdr.read_string()?;
    trace!("server type definition name: {typdef}");
    Ok(())
}

fn parse_typdefovr(rdr: &mut FrameReader) -> Db2Result<()> {
    rdr.expect(cp::TYPDEFOVR)?;
    rdr.push_collection();
    loop {
        match rdr.peek_code_point()? {
            Peek::EndOfCollection => break,
            Peek::CodePoint(point @ (cp::CCSIDSBC | cp::CCSIDDBC | cp::CCSIDMBC)) => {
                rdr.expect(point)?;
                let ccsid = rdr.read_u16()?;
                trace!("server ccsid override 0x{point:04X} = {ccsid}");
            }
            Peek::CodePoint(other) => return Err(unexpected_in(other, "TYPDEFOVR")),
            Peek::EndOfChain => {
                return Err(Db2Error::syntax("TYPDEFOVR collection cut short"));
            }
        }
    }
    rdr.pop_collection()
}

/// Severity code, bounds-checked against what the enclosing message allows.
pub(crate) fn parse_svrcod(rdr: &mut FrameReader, min: u16, max: u16) -> Db2Result<u16> {
    rdr.expect(cp::SVRCOD)?;
    let svrcod = rdr.read_u16()?;
    let known = matches!(
        svrcod,
        cp::SVRCOD_INFO
            | cp::SVRCOD_WARNING
            | cp::SVRCOD_ERROR
            | cp::SVRCOD_SEVERE
            | cp::SVRCOD_ACCDMG
            | cp::SVRCOD_PRMDMG
            | cp::SVRCOD_SESDMG
    );
    if !known || svrcod < min || svrcod > max {
        return Err(Db2Error::syntax(format!(
            "severity code {svrcod} out of range [{min}, {max}]"
        )));
    }
    Ok(svrcod)
}

fn parse_secchkcd(rdr: &mut FrameReader) -> Db2Result<u8> {
    rdr.expect(cp::SECCHKCD)?;
    let code = rdr.read_u8()?;
    if code > cp::SECCHKCD_MAX {
        return Err(Db2Error::syntax(format!(
            "security check code 0x{code:02X} out of range"
        )));
    }
    Ok(code)
}

fn check_dup(first: bool, codepoint: u16) -> Db2Result<()> {
    if first {
        Ok(())
    } else {
        Err(Db2Error::syntax(format!(
            "duplicate codepoint 0x{codepoint:04X} in reply collection"
        )))
    }
}

fn unexpected_in(codepoint: u16, context: &str) -> Db2Error {
    Db2Error::syntax(format!(
        "unexpected codepoint 0x{codepoint:04X} in {context}"
    ))
}
