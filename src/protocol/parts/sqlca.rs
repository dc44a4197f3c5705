//! The SQL communications area: the server-reported outcome that closes
//! almost every exchange.
//!
//! Wire layout (SQLCAGRP, an FD:OCA early group):
//!
//! ```text
//! SQLCODE     I4
//! SQLSTATE    FCS 5
//! SQLERRPROC  FCS 8
//! SQLCAXGRP   nullable group: SQLERRD I4 x 6, SQLWARN FCS 11,
//!             SQLRDBNAME VCS, SQLERRMSG LD bytes
//! SQLDIAGGRP  nullable group: statement diagnostics, condition rows,
//!             connection rows
//! ```

use crate::db2_error::ServerDiagnostic;
use crate::protocol::codepoint::{NULLDATA, SQLCODE_END_OF_DATA};
use crate::protocol::FrameReader;
use crate::{Db2Error, Db2Result};

/// Parsed SQL communications area.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sqlca {
    sql_code: i32,
    sql_state: String,
    sql_errproc: String,
    sql_errd: [i32; 6],
    message: Option<String>,
    row_count: i64,
    end_of_data: bool,
}

impl Sqlca {
    /// The numeric outcome: 0 success, > 0 warning, < 0 error.
    pub fn sql_code(&self) -> i32 {
        self.sql_code
    }

    /// Five-character SQLSTATE.
    pub fn sql_state(&self) -> &str {
        &self.sql_state
    }

    /// Name of the originating server procedure.
    pub fn sql_errproc(&self) -> &str {
        &self.sql_errproc
    }

    /// The SQLERRD array; index 2 carries the affected-row count.
    pub fn sql_errd(&self) -> &[i32; 6] {
        &self.sql_errd
    }

    /// Message text from the extended diagnostics, if present.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Row count reported by the statement diagnostics group.
    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    /// True when a diagnostics condition row carried the
    /// no-more-rows SQLCODE (+20237).
    pub fn is_end_of_data(&self) -> bool {
        self.end_of_data
    }

    /// Affected rows for update-style statements.
    #[allow(clippy::cast_sign_loss)]
    pub fn affected_rows(&self) -> u64 {
        if self.row_count > 0 {
            self.row_count as u64
        } else {
            self.sql_errd[2].max(0) as u64
        }
    }

    /// Classifies the outcome: a negative code becomes a command failure,
    /// zero or positive yields the SQLCA back (a positive code is a warning
    /// the caller attaches to its result).
    pub fn into_result(self) -> Db2Result<Self> {
        if self.sql_code < 0 {
            Err(Db2Error::Server {
                source: ServerDiagnostic::from(&self),
            })
        } else {
            if self.sql_code > 0 {
                warn!(
                    "server warning: SQLCODE +{} SQLSTATE {}",
                    self.sql_code, self.sql_state
                );
            }
            Ok(self)
        }
    }

    /// True for a positive (warning) code.
    pub fn is_warning(&self) -> bool {
        self.sql_code > 0
    }

    /// Parses a nullable SQLCAGRP with the unchecked readers; the caller
    /// settles the enclosing object length afterwards.
    pub(crate) fn parse(rdr: &mut FrameReader) -> Db2Result<Option<Self>> {
        if rdr.read_fast_u8()? == NULLDATA {
            return Ok(None);
        }
        let sql_code = rdr.read_fast_i32()?;
        let sql_state = rdr.read_fast_string(5)?;
        let sql_errproc = rdr.read_fast_string(8)?;

        let mut sqlca = Self {
            sql_code,
            sql_state,
            sql_errproc,
            ..Self::default()
        };
        sqlca.parse_caxgrp(rdr)?;
        sqlca.parse_diaggrp(rdr)?;
        debug!(
            "parsed SQLCA: code {} state {}",
            sqlca.sql_code, sqlca.sql_state
        );
        Ok(Some(sqlca))
    }

    // SQLCAXGRP: exceptions group, nullable.
    fn parse_caxgrp(&mut self, rdr: &mut FrameReader) -> Db2Result<()> {
        if rdr.read_fast_u8()? == NULLDATA {
            return Ok(());
        }
        for slot in &mut self.sql_errd {
            *slot = rdr.read_fast_i32()?;
        }
        rdr.skip_fast(11)?; // SQLWARN0..SQLWARNA
        rdr.read_fast_vcs()?; // SQLRDBNAME
        let errmsg = match rdr.read_fast_ld_bytes()? {
            Some(bytes) => {
                rdr.skip_fast(2)?; // empty second-variant length
                Some(bytes)
            }
            None => rdr.read_fast_ld_bytes()?,
        };
        if let Some(bytes) = errmsg {
            self.message = Some(rdr.decode_string(&bytes)?);
        }
        Ok(())
    }

    // SQLDIAGGRP: diagnostics group, nullable.
    fn parse_diaggrp(&mut self, rdr: &mut FrameReader) -> Db2Result<()> {
        if rdr.read_fast_u8()? == NULLDATA {
            return Ok(());
        }
        self.parse_diagstt(rdr)?;
        self.parse_diagci(rdr)?;
        self.parse_diagcn(rdr)
    }

    // SQLDIAGSTT: statement diagnostics, nullable. Carries the row count.
    fn parse_diagstt(&mut self, rdr: &mut FrameReader) -> Db2Result<()> {
        if rdr.read_fast_u8()? == NULLDATA {
            return Ok(());
        }
        rdr.read_fast_i32()?; // FUNCTION_CODE
        rdr.read_fast_i32()?; // COST_ESTIMATE
        rdr.read_fast_i32()?; // LAST_ROW
        rdr.skip_fast(16)?;
        self.row_count = rdr.read_fast_i64()?;
        rdr.skip_fast(24)
    }

    // SQLDIAGCI: condition information rows, nullable.
    fn parse_diagci(&mut self, rdr: &mut FrameReader) -> Db2Result<()> {
        if rdr.read_fast_u8()? == NULLDATA {
            return Ok(());
        }
        let rows = rdr.read_fast_i16()?; // SQLNUMROW
        for _ in 0..rows {
            self.parse_dcrow(rdr)?;
        }
        Ok(())
    }

    // SQLDCROW / SQLDCGRP: one diagnostics condition.
    fn parse_dcrow(&mut self, rdr: &mut FrameReader) -> Db2Result<()> {
        let code = rdr.read_fast_i32()?;
        let _state = rdr.read_fast_string(5)?;
        rdr.read_fast_i32()?; // REASON_CODE
        rdr.read_fast_i32()?; // LINE_NUMBER
        rdr.read_fast_i64()?; // ROW_NUMBER
        if code == SQLCODE_END_OF_DATA {
            self.end_of_data = true;
        }
        rdr.skip_fast(47)?;
        rdr.read_fast_vcs()?; // RDBNAM
        Self::parse_dctoks(rdr)?;
        let message = rdr.read_fast_nvcm_nvcs()?; // MESSAGE_TEXT
        if self.message.is_none() {
            self.message = message;
        }
        rdr.skip_fast_nvcm_nvcs()?; // COLUMN_NAME
        rdr.skip_fast_nvcm_nvcs()?; // PARAMETER_NAME
        rdr.skip_fast_nvcm_nvcs()?; // EXTENDED_NAMES
        Self::parse_dcxgrp(rdr)
    }

    // SQLDCTOKS: message token rows, nullable.
    fn parse_dctoks(rdr: &mut FrameReader) -> Db2Result<()> {
        if rdr.read_fast_u8()? == NULLDATA {
            return Ok(());
        }
        let rows = rdr.read_fast_i16()?;
        for _ in 0..rows {
            rdr.skip_fast_nvcm_nvcs()?;
        }
        Ok(())
    }

    // SQLDCXGRP: extended names, nullable. Content is skipped.
    fn parse_dcxgrp(rdr: &mut FrameReader) -> Db2Result<()> {
        if rdr.read_fast_u8()? == NULLDATA {
            return Ok(());
        }
        rdr.skip_fast_nvcm_nvcs()?; // OBJECT_RDBNAM
        rdr.skip_fast_nvcm_nvcs()?; // OBJECT_SCHEMA
        rdr.skip_fast_nvcm_nvcs()?; // SPECIFIC_NAME
        rdr.skip_fast_nvcm_nvcs()?; // TABLE_NAME
        rdr.read_fast_vcs()?; // CONSTRAINT_RDBNAM
        rdr.skip_fast_nvcm_nvcs()?; // CONSTRAINT_SCHEMA
        rdr.skip_fast_nvcm_nvcs()?; // CONSTRAINT_NAME
        rdr.read_fast_vcs()?; // ROUTINE_RDBNAM
        rdr.skip_fast_nvcm_nvcs()?; // ROUTINE_SCHEMA
        rdr.skip_fast_nvcm_nvcs()?; // ROUTINE_NAME
        rdr.read_fast_vcs()?; // TRIGGER_RDBNAM
        rdr.skip_fast_nvcm_nvcs()?; // TRIGGER_SCHEMA
        rdr.skip_fast_nvcm_nvcs() // TRIGGER_NAME
    }

    // SQLDIAGCN: connection rows, nullable.
    fn parse_diagcn(&mut self, rdr: &mut FrameReader) -> Db2Result<()> {
        if rdr.read_fast_u8()? == NULLDATA {
            return Ok(());
        }
        let rows = rdr.read_fast_i16()?;
        for _ in 0..rows {
            rdr.skip_fast(18)?;
            rdr.read_fast_vcs()?; // RDBNAM
            rdr.read_fast_vcs()?; // CLASS_NAME
            rdr.read_fast_vcs()?; // AUTHID
        }
        Ok(())
    }
}

impl std::fmt::Display for Sqlca {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "SQLCODE {} SQLSTATE {}{}",
            self.sql_code,
            self.sql_state,
            self.message
                .as_deref()
                .map(|m| format!(": {m}"))
                .unwrap_or_default()
        )
    }
}
