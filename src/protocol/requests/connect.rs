//! Builders for the connection establishment commands: EXCSAT, ACCSEC,
//! SECCHK and ACCRDB. Each is a pure function over the frame writer and its
//! domain parameters.

use crate::protocol::ccsid::{CcsidManager, CCSID_UTF8};
use crate::protocol::requests::{EXTERNAL_NAME, PLATFORM_ID, PRODUCT_ID, SERVER_CLASS_NAME, TYPDEF_ASC};
use crate::protocol::{codepoint as cp, FrameWriter};
use crate::Db2Result;
use rand::Rng;

// Manager levels announced in EXCSAT.
const TARGET_AGENT: u16 = 0x0A;
const TARGET_SQLAM: u16 = 0x0B;
const TARGET_RDB: u16 = 0x0C;
const TARGET_CMNTCPIP: u16 = 0x08;

const EXTNAM_MIN_SIZE: usize = 141;
const EXTNAM_MAX_SIZE: usize = 255;
const SRVNAM_MAX_SIZE: usize = 255;
const USRID_MAX_SIZE: usize = 255;
const PASSWORD_MAX_SIZE: usize = 255;

// RDBNAM is written fixed-width at 18 bytes and may grow to 1024.
const RDBNAM_FIXED_LEN: usize = 18;
const RDBNAM_MAX_LEN: usize = 1024;

// PRDDTA field widths; the leading length byte does not count itself.
const PRDDTA_APPL_ID_FIXED_LEN: usize = 20;
const PRDDTA_USER_ID_FIXED_LEN: usize = 8;

/// Correlation token length: 8 address chars, '.', 4 port chars, 6
/// uniqueness bytes.
pub const CRRTKN_LEN: usize = 19;

/// The Exchange Server Attributes command opens every conversation: it
/// announces this client's external name, server name, release level and
/// the manager levels it can operate.
pub fn build_excsat(wr: &mut FrameWriter, secmgr_level: u16) -> Db2Result<()> {
    wr.start_request();
    wr.mark_length(cp::EXCSAT);

    wr.write_scalar_string(cp::EXTNAM, EXTERNAL_NAME, EXTNAM_MIN_SIZE, EXTNAM_MAX_SIZE)?;
    wr.write_scalar_string(cp::SRVNAM, "localhost", 0, SRVNAM_MAX_SIZE)?;
    wr.write_scalar_string(cp::SRVRLSLV, PRODUCT_ID, 0, usize::MAX)?;

    // The manager list length is fixed: each entry is a codepoint plus a
    // two-byte level.
    wr.mark_length(cp::MGRLVLLS);
    wr.write_u16(cp::AGENT);
    wr.write_u16(TARGET_AGENT);
    wr.write_u16(cp::SQLAM);
    wr.write_u16(TARGET_SQLAM);
    wr.write_u16(cp::UNICODEMGR);
    wr.write_u16(CCSID_UTF8);
    wr.write_u16(cp::RDB);
    wr.write_u16(TARGET_RDB);
    wr.write_u16(cp::SECMGR);
    wr.write_u16(secmgr_level);
    wr.write_u16(cp::CMNTCPIP);
    wr.write_u16(TARGET_CMNTCPIP);
    wr.update_length();

    wr.write_scalar_string(cp::SRVCLSNM, SERVER_CLASS_NAME, 0, usize::MAX)?;

    wr.update_length();
    Ok(())
}

/// The Access Security command opens security negotiation: it names the
/// mechanism the client wants and the database it is aiming for.
pub fn build_accsec(wr: &mut FrameWriter, secmec: u16, database: &str) -> Db2Result<()> {
    wr.start_request();
    wr.mark_length(cp::ACCSEC);
    wr.write_scalar_u16(cp::SECMEC, secmec);
    build_rdbnam(wr, database)?;
    wr.update_length();
    Ok(())
}

/// The Security Check command carries the credentials for the negotiated
/// mechanism.
pub fn build_secchk(
    wr: &mut FrameWriter,
    secmec: u16,
    database: &str,
    user: &str,
    password: Option<&str>,
) -> Db2Result<()> {
    wr.start_request();
    wr.mark_length(cp::SECCHK);
    wr.write_scalar_u16(cp::SECMEC, secmec);
    build_rdbnam(wr, database)?;
    wr.write_scalar_string(cp::USRID, user, 0, USRID_MAX_SIZE)?;
    if let Some(password) = password {
        wr.write_scalar_string(cp::PASSWORD, password, 0, PASSWORD_MAX_SIZE)?;
    }
    wr.update_length();
    Ok(())
}

/// The Access RDB command binds the authenticated conversation to a named
/// relational database and declares the data type representations this
/// client sends.
pub fn build_accrdb(
    wr: &mut FrameWriter,
    database: &str,
    read_only: bool,
    crrtkn: &[u8],
    ccsid: u16,
) -> Db2Result<()> {
    wr.start_request();
    wr.mark_length(cp::ACCRDB);

    build_rdbnam(wr, database)?;
    wr.write_scalar_u16(cp::RDBACCCL, cp::SQLAM);
    wr.write_scalar_string(cp::PRDID, PRODUCT_ID, 0, usize::MAX)?;
    build_prddta(wr)?;
    wr.write_scalar_string(cp::TYPDEFNAM, TYPDEF_ASC, 0, usize::MAX)?;
    wr.write_scalar_bytes(cp::CRRTKN, crrtkn)?;

    // Single-, double- and mixed-byte representations all use the
    // negotiated encoding.
    wr.mark_length(cp::TYPDEFOVR);
    wr.write_scalar_u16(cp::CCSIDSBC, ccsid);
    wr.write_scalar_u16(cp::CCSIDDBC, ccsid);
    wr.write_scalar_u16(cp::CCSIDMBC, ccsid);
    wr.update_length();

    if read_only {
        wr.write_scalar_u8(cp::RDBALWUPD, cp::FALSE);
    }

    wr.update_length();
    Ok(())
}

// RDBNAM keeps its historical fixed width of 18 bytes (space-padded) and
// grows without padding beyond that.
fn build_rdbnam(wr: &mut FrameWriter, database: &str) -> Db2Result<()> {
    wr.write_scalar_string(cp::RDBNAM, database, RDBNAM_FIXED_LEN, RDBNAM_MAX_LEN)
}

// Product-specific data: a length byte, product id, platform id, the
// application id, a fixed-width user id field and an empty accounting
// suffix.
#[allow(clippy::cast_possible_truncation)]
fn build_prddta(wr: &mut FrameWriter) -> Db2Result<()> {
    let prdid = wr.encode_string(PRODUCT_ID)?;
    let platform = wr.encode_string(PLATFORM_ID)?;
    let appl_id = {
        let truncated: String = EXTERNAL_NAME
            .chars()
            .take(PRDDTA_APPL_ID_FIXED_LEN)
            .collect();
        wr.encode_string(&truncated)?
    };
    let space = wr.encode_string(" ")?[0];

    let mut prddta = Vec::with_capacity(64);
    prddta.push(0); // length byte, patched below
    prddta.extend_from_slice(&prdid);
    prddta.extend_from_slice(&platform);
    prddta.extend_from_slice(&appl_id);
    for _ in appl_id.len()..PRDDTA_APPL_ID_FIXED_LEN {
        prddta.push(space);
    }
    for _ in 0..PRDDTA_USER_ID_FIXED_LEN {
        prddta.push(space);
    }
    prddta.push(0); // accounting suffix length
    prddta[0] = (prddta.len() - 1) as u8;

    wr.write_scalar_bytes(cp::PRDDTA, &prddta)
}

/// Builds the 19-byte correlation token sent in ACCRDB. The format mirrors
/// the usual client convention (address part, separator, port part, six
/// uniqueness bytes); only uniqueness matters to the server.
pub fn generate_correlation_token(ccsid: &CcsidManager) -> Db2Result<Vec<u8>> {
    let mut rng = rand::thread_rng();
    let mut text = String::with_capacity(13);
    // Leading character comes from the G..P range by convention.
    text.push(char::from(b'G' + rng.gen_range(0..10)));
    for _ in 0..7 {
        text.push(char::from(b'0' + rng.gen_range(0..10)));
    }
    text.push('.');
    for _ in 0..4 {
        text.push(char::from(b'0' + rng.gen_range(0..10)));
    }
    let mut token = ccsid.encode(&text)?;
    for _ in 0..6 {
        token.push(rng.gen());
    }
    debug_assert_eq!(token.len(), CRRTKN_LEN);
    Ok(token)
}
