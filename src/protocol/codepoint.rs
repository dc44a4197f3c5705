//! DDM code point constants of the DRDA dialect this client speaks.
//!
//! Values follow the DRDA specification; only the code points this client
//! actually sends or accepts are listed.

// ── connection management ─────────────────────────────────
/// Exchange Server Attributes.
pub const EXCSAT: u16 = 0x1041;
/// Exchange Server Attributes Reply Data.
pub const EXCSATRD: u16 = 0x1443;
/// Access Security.
pub const ACCSEC: u16 = 0x106D;
/// Access Security Reply Data.
pub const ACCSECRD: u16 = 0x14AC;
/// Security Check.
pub const SECCHK: u16 = 0x106E;
/// Security Check Reply Message.
pub const SECCHKRM: u16 = 0x1219;
/// Access RDB.
pub const ACCRDB: u16 = 0x2001;
/// Access RDB Reply Message.
pub const ACCRDBRM: u16 = 0x2201;

// ── SQL execution ─────────────────────────────────────────
/// Execute Immediate SQL.
pub const EXCSQLIMM: u16 = 0x200A;
/// Open Query.
pub const OPNQRY: u16 = 0x200C;
/// Continue Query (fetch more rows).
pub const CNTQRY: u16 = 0x2005;
/// Prepare SQL Statement.
pub const PRPSQLSTT: u16 = 0x200D;
/// Describe SQL Statement.
pub const DSCSQLSTT: u16 = 0x2008;
/// RDB Commit Unit of Work.
pub const RDBCMM: u16 = 0x200E;

// ── reply messages and reply data ─────────────────────────
/// SQLCA reply data.
pub const SQLCARD: u16 = 0x2408;
/// SQL Descriptor Area reply data.
pub const SQLDARD: u16 = 0x2411;
/// Query Answer Set Description.
pub const QRYDSC: u16 = 0x241A;
/// Query Answer Set Data.
pub const QRYDTA: u16 = 0x241B;
/// Open Query Complete Reply Message.
pub const OPNQRYRM: u16 = 0x2205;
/// End of Query Reply Message.
pub const ENDQRYRM: u16 = 0x220B;
/// End Unit of Work Reply Message.
pub const ENDUOWRM: u16 = 0x220C;
/// Unit of Work Disposition (parameter of ENDUOWRM).
pub const UOWDSP: u16 = 0x2115;

// ── DDM parameters ────────────────────────────────────────
/// External Name.
pub const EXTNAM: u16 = 0x115E;
/// Manager-Level List.
pub const MGRLVLLS: u16 = 0x1404;
/// Server Class Name.
pub const SRVCLSNM: u16 = 0x1147;
/// Server Name.
pub const SRVNAM: u16 = 0x116D;
/// Server Product Release Level.
pub const SRVRLSLV: u16 = 0x115A;
/// Product-specific identifier.
pub const PRDID: u16 = 0x112E;
/// Product-specific data.
pub const PRDDTA: u16 = 0x2104;
/// Security Mechanism.
pub const SECMEC: u16 = 0x11A2;
/// Security Check Code.
pub const SECCHKCD: u16 = 0x11A4;
/// Security Token.
pub const SECTKN: u16 = 0x11DC;
/// RDB Name.
pub const RDBNAM: u16 = 0x2110;
/// User ID.
pub const USRID: u16 = 0x11A0;
/// Password.
pub const PASSWORD: u16 = 0x11A1;
/// RDB Access Manager Class.
pub const RDBACCCL: u16 = 0x210F;
/// RDB Allow Updates.
pub const RDBALWUPD: u16 = 0x211A;
/// Correlation Token.
pub const CRRTKN: u16 = 0x2135;
/// Type Definition Name.
pub const TYPDEFNAM: u16 = 0x002F;
/// Type Definition Overrides.
pub const TYPDEFOVR: u16 = 0x0035;
/// CCSID for single-byte characters.
pub const CCSIDSBC: u16 = 0x119C;
/// CCSID for double-byte characters.
pub const CCSIDDBC: u16 = 0x119D;
/// CCSID for mixed-byte characters.
pub const CCSIDMBC: u16 = 0x119E;
/// Severity Code.
pub const SVRCOD: u16 = 0x1149;
/// SQL Statement text (command data object).
pub const SQLSTT: u16 = 0x2414;
/// SQL cursor attributes (command data object).
pub const SQLATTR: u16 = 0x2450;
/// SQL parameter data (command data object).
pub const SQLDTA: u16 = 0x2412;
/// FD:OCA data descriptor inside SQLDTA.
pub const FDODSC: u16 = 0x0010;
/// FD:OCA data values inside SQLDTA.
pub const FDODTA: u16 = 0x147A;
/// Package Name and Consistency Token.
pub const PKGNAMCSN: u16 = 0x2113;
/// Query Block Size.
pub const QRYBLKSZ: u16 = 0x2114;
/// Maximum Number of Extra Blocks.
pub const MAXBLKEXT: u16 = 0x2141;
/// Query Rowset Size.
pub const QRYROWSET: u16 = 0x2156;
/// Query Close Implicit.
pub const QRYCLSIMP: u16 = 0x215D;
/// Query Instance Identifier.
pub const QRYINSID: u16 = 0x215B;
/// Query Protocol Type.
pub const QRYPRCTYP: u16 = 0x2102;
/// Return SQL Descriptor Area.
pub const RTNSQLDA: u16 = 0x2116;
/// Type of SQL Descriptor Area.
pub const TYPSQLDA: u16 = 0x2146;

// ── piggy-backed session data ─────────────────────────────
/// Piggy-Backed Session Data collection.
pub const PBSD: u16 = 0xC000;
/// PBSD isolation level.
pub const PBSD_ISO: u16 = 0xC001;
/// PBSD current schema.
pub const PBSD_SCHEMA: u16 = 0xC002;

// ── manager code points (MGRLVLLS entries) ────────────────
/// Agent manager.
pub const AGENT: u16 = 0x1403;
/// SQL Application Manager.
pub const SQLAM: u16 = 0x2407;
/// RDB manager.
pub const RDB: u16 = 0x240F;
/// Security Manager.
pub const SECMGR: u16 = 0x1440;
/// TCP/IP Communication Manager.
pub const CMNTCPIP: u16 = 0x1474;
/// Unicode Manager.
pub const UNICODEMGR: u16 = 0x1C08;

// ── enumerated parameter values ───────────────────────────
/// DDM boolean TRUE.
pub const TRUE: u8 = 0xF1;
/// DDM boolean FALSE.
pub const FALSE: u8 = 0xF0;
/// Null indicator for nullable FD:OCA data.
pub const NULLDATA: u8 = 0xFF;
/// Extended output SQL descriptor area.
pub const TYPSQLDA_X_OUTPUT: u8 = 4;
/// Extended input SQL descriptor area.
pub const TYPSQLDA_X_INPUT: u8 = 5;
/// QRYCLSIMP: server closes the cursor implicitly at end of data.
pub const QRYCLSIMP_YES: u8 = 0x01;

// ── severity codes (SVRCOD values) ────────────────────────
pub const SVRCOD_INFO: u16 = 0;
pub const SVRCOD_WARNING: u16 = 4;
pub const SVRCOD_ERROR: u16 = 8;
pub const SVRCOD_SEVERE: u16 = 16;
pub const SVRCOD_ACCDMG: u16 = 20;
pub const SVRCOD_PRMDMG: u16 = 24;
pub const SVRCOD_SESDMG: u16 = 28;

// ── security mechanisms (SECMEC values) ───────────────────
/// User id and password flow in the clear.
pub const SECMEC_USRIDPWD: u16 = 0x03;
/// User id only.
pub const SECMEC_USRIDONL: u16 = 0x04;

/// Security check passed.
pub const SECCHKCD_OK: u8 = 0x00;
/// Highest defined security check code.
pub const SECCHKCD_MAX: u8 = 0x15;

/// SQLCODE reported in a diagnostics condition row when a fetch ran past the
/// last row of the answer set.
pub const SQLCODE_END_OF_DATA: i32 = 20237;
