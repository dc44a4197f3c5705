//! Shared helpers for the scenario tests: a minimal server-side frame
//! builder (independent of the crate's own writer, so encode expectations
//! stay honest) and a collecting row consumer.

#![allow(dead_code)]

use byteorder::{BigEndian, ByteOrder};
use db2connect::{
    Command, CommandOutcome, ConnectParams, Db2Error, Db2Result, Dispatcher, ResultConsumer,
    Sqlca, SqlValue,
};
use std::{cell::RefCell, rc::Rc};

pub fn init_logger() {
    let _ = flexi_logger::Logger::try_with_env_or_str("info").and_then(|l| l.start());
}

// ── code points used when faking the server ──────────────

pub const EXCSATRD: u16 = 0x1443;
pub const ACCSECRD: u16 = 0x14AC;
pub const SECCHKRM: u16 = 0x1219;
pub const ACCRDBRM: u16 = 0x2201;
pub const SQLCARD: u16 = 0x2408;
pub const SQLDARD: u16 = 0x2411;
pub const OPNQRYRM: u16 = 0x2205;
pub const QRYDSC: u16 = 0x241A;
pub const QRYDTA: u16 = 0x241B;
pub const ENDQRYRM: u16 = 0x220B;
pub const ENDUOWRM: u16 = 0x220C;
pub const MGRLVLLS: u16 = 0x1404;
pub const SECMEC: u16 = 0x11A2;
pub const SECCHKCD: u16 = 0x11A4;
pub const SVRCOD: u16 = 0x1149;
pub const PRDID: u16 = 0x112E;
pub const TYPDEFNAM: u16 = 0x002F;
pub const TYPDEFOVR: u16 = 0x0035;
pub const CCSIDSBC: u16 = 0x119C;
pub const QRYPRCTYP: u16 = 0x2102;
pub const QRYINSID: u16 = 0x215B;
pub const UNICODEMGR: u16 = 0x1C08;
pub const AGENT: u16 = 0x1403;
pub const SQLAM: u16 = 0x2407;
pub const PBSD: u16 = 0xC000;
pub const PBSD_ISO: u16 = 0xC001;
pub const PBSD_SCHEMA: u16 = 0xC002;

// ── DDM object helpers ───────────────────────────────────

pub fn obj(codepoint: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    out.extend_from_slice(&(payload.len() as u16 + 4).to_be_bytes());
    out.extend_from_slice(&codepoint.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn u16_param(codepoint: u16, value: u16) -> Vec<u8> {
    obj(codepoint, &value.to_be_bytes())
}

pub fn u8_param(codepoint: u16, value: u8) -> Vec<u8> {
    obj(codepoint, &[value])
}

pub fn string_param(codepoint: u16, value: &str) -> Vec<u8> {
    obj(codepoint, value.as_bytes())
}

/// One reply DSS frame. `chained`/`same_id` describe the link to the next
/// frame in the chain.
pub fn frame(correlation_id: u16, chained: bool, same_id: bool, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() + 6 <= 32767, "test frame too large");
    let mut format = 0x02_u8;
    if chained {
        format |= 0x40;
        if same_id {
            format |= 0x10;
        }
    }
    let mut out = Vec::with_capacity(payload.len() + 6);
    out.extend_from_slice(&(payload.len() as u16 + 6).to_be_bytes());
    out.push(0xD0);
    out.push(format);
    out.extend_from_slice(&correlation_id.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

// ── canned replies ───────────────────────────────────────

/// EXCSATRD advertising a UTF-8 capable server, chained to an ACCSECRD
/// granting the user/password mechanism.
pub fn handshake_leg1_reply() -> Vec<u8> {
    let mut mgrlvlls = Vec::new();
    for (mgr, level) in [(AGENT, 0x0A_u16), (SQLAM, 0x0B), (UNICODEMGR, 1208)] {
        mgrlvlls.extend_from_slice(&mgr.to_be_bytes());
        mgrlvlls.extend_from_slice(&level.to_be_bytes());
    }
    let excsatrd = obj(EXCSATRD, &obj(MGRLVLLS, &mgrlvlls));
    let accsecrd = obj(ACCSECRD, &u16_param(SECMEC, 0x0003));

    let mut reply = frame(1, true, false, &excsatrd);
    reply.extend_from_slice(&frame(2, false, false, &accsecrd));
    reply
}

/// SECCHKRM (passed) chained to ACCRDBRM with piggy-backed session data.
pub fn handshake_leg2_reply() -> Vec<u8> {
    let secchkrm = obj(
        SECCHKRM,
        &[u16_param(SVRCOD, 0), u8_param(SECCHKCD, 0)].concat(),
    );
    let accrdbrm = obj(
        ACCRDBRM,
        &[
            u16_param(SVRCOD, 0),
            string_param(PRDID, "DSN11015"),
            string_param(TYPDEFNAM, "QTDSQLASC"),
            obj(TYPDEFOVR, &u16_param(CCSIDSBC, 1208)),
        ]
        .concat(),
    );
    let pbsd = obj(
        PBSD,
        &[u8_param(PBSD_ISO, 2), string_param(PBSD_SCHEMA, "APP")].concat(),
    );

    let mut reply = frame(1, true, false, &secchkrm);
    reply.extend_from_slice(&frame(2, false, false, &[accrdbrm, pbsd].concat()));
    reply
}

/// An SQLCA group encoding success with `rows` affected rows.
pub fn sqlca_group(sql_code: i32, sql_state: &str, rows: i32) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(0x00); // SQLCA present
    out.extend_from_slice(&sql_code.to_be_bytes());
    out.extend_from_slice(format!("{sql_state:<5}").as_bytes());
    out.extend_from_slice(b"SQLRI01A"); // SQLERRPROC
    // SQLCAXGRP
    out.push(0x00);
    for value in [0_i32, 0, rows, 0, 0, 0] {
        out.extend_from_slice(&value.to_be_bytes());
    }
    out.extend_from_slice(&[0x20; 11]); // SQLWARN
    out.extend_from_slice(&0_u16.to_be_bytes()); // SQLRDBNAME (VCS, empty)
    out.extend_from_slice(&0_u16.to_be_bytes()); // SQLERRMSG mixed: absent
    out.extend_from_slice(&0_u16.to_be_bytes()); // SQLERRMSG single: absent
    out.push(0xFF); // SQLDIAGGRP absent
    out
}

/// An SQLCA group carrying a message and no diagnostics.
pub fn sqlca_group_with_message(sql_code: i32, sql_state: &str, message: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(0x00);
    out.extend_from_slice(&sql_code.to_be_bytes());
    out.extend_from_slice(format!("{sql_state:<5}").as_bytes());
    out.extend_from_slice(b"SQLRI01A");
    out.push(0x00);
    for value in [0_i32; 6] {
        out.extend_from_slice(&value.to_be_bytes());
    }
    out.extend_from_slice(&[0x20; 11]);
    out.extend_from_slice(&0_u16.to_be_bytes());
    out.extend_from_slice(&(message.len() as u16).to_be_bytes());
    out.extend_from_slice(message.as_bytes());
    out.extend_from_slice(&0_u16.to_be_bytes()); // trailing single-byte variant
    out.push(0xFF);
    out
}

/// An SQLCA whose diagnostics condition row reports end-of-data (+20237).
pub fn sqlca_group_end_of_data() -> Vec<u8> {
    let mut out = Vec::new();
    out.push(0x00);
    out.extend_from_slice(&0_i32.to_be_bytes());
    out.extend_from_slice(b"00000");
    out.extend_from_slice(b"SQLRI01A");
    out.push(0xFF); // SQLCAXGRP absent
    out.push(0x00); // SQLDIAGGRP present
    out.push(0xFF); // SQLDIAGSTT absent
    out.push(0x00); // SQLDIAGCI present
    out.extend_from_slice(&1_i16.to_be_bytes()); // one condition row
    out.extend_from_slice(&20237_i32.to_be_bytes());
    out.extend_from_slice(b"02000");
    out.extend_from_slice(&0_i32.to_be_bytes()); // reason
    out.extend_from_slice(&0_i32.to_be_bytes()); // line
    out.extend_from_slice(&3_i64.to_be_bytes()); // row number
    out.extend_from_slice(&[0x00; 47]);
    out.extend_from_slice(&0_u16.to_be_bytes()); // RDBNAM (VCS, empty)
    out.push(0xFF); // SQLDCTOKS absent
    out.extend_from_slice(&[0xFF, 0xFF]); // MESSAGE_TEXT null
    out.extend_from_slice(&[0xFF, 0xFF]); // COLUMN_NAME null
    out.extend_from_slice(&[0xFF, 0xFF]); // PARAMETER_NAME null
    out.extend_from_slice(&[0xFF, 0xFF]); // EXTENDED_NAMES null
    out.push(0xFF); // SQLDCXGRP absent
    out.push(0xFF); // SQLDIAGCN absent
    out
}

/// SQLDARD payload: no SQLCA, then the given column descriptors.
pub fn sqldard_payload(columns: &[(&str, u16, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(0xFF); // no SQLCA
    out.extend_from_slice(&(columns.len() as u16).to_be_bytes());
    for (name, sql_type, length) in columns {
        out.extend_from_slice(&0_u16.to_be_bytes()); // precision
        out.extend_from_slice(&0_u16.to_be_bytes()); // scale
        out.extend_from_slice(&u64::from(*length).to_be_bytes());
        out.extend_from_slice(&sql_type.to_be_bytes());
        out.extend_from_slice(&1208_u16.to_be_bytes()); // ccsid
        for text in [*name, *name, ""] {
            out.extend_from_slice(&(text.len() as u16).to_be_bytes());
            out.extend_from_slice(text.as_bytes());
        }
    }
    out
}

/// OPNQRYRM payload with a query instance id.
pub fn opnqryrm_payload(query_instance_id: u64) -> Vec<u8> {
    let mut insid = Vec::new();
    insid.extend_from_slice(&(12_u16).to_be_bytes());
    insid.extend_from_slice(&QRYINSID.to_be_bytes());
    insid.extend_from_slice(&query_instance_id.to_be_bytes());
    [u16_param(SVRCOD, 0), u16_param(QRYPRCTYP, 0x0002), insid].concat()
}

/// QRYDSC payload: one four-byte triplet per column.
pub fn qrydsc_payload(columns: &[(u8, u16)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (fdoca_type, length) in columns {
        out.push(*fdoca_type);
        out.extend_from_slice(&length.to_be_bytes());
        out.push(fdoca_type % 2);
    }
    out
}

/// QRYDTA payload from typed values.
pub fn qrydta_payload(rows: &[Vec<TestValue>]) -> Vec<u8> {
    let mut out = Vec::new();
    for row in rows {
        for value in row {
            match value {
                TestValue::Null => out.push(0xFF),
                TestValue::Int(v) => {
                    out.push(0x00);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                TestValue::BigInt(v) => {
                    out.push(0x00);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                TestValue::Varchar(s) => {
                    out.push(0x00);
                    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
                    out.extend_from_slice(s.as_bytes());
                }
            }
        }
    }
    out
}

#[derive(Debug, Clone)]
pub enum TestValue {
    Null,
    Int(i32),
    BigInt(i64),
    Varchar(String),
}

// ── dispatcher plumbing ──────────────────────────────────

pub type SharedOutcome = Rc<RefCell<Option<Db2Result<CommandOutcome>>>>;

pub fn capture() -> (SharedOutcome, db2connect::CompletionHandler) {
    let slot: SharedOutcome = Rc::new(RefCell::new(None));
    let writer = Rc::clone(&slot);
    (
        slot,
        Box::new(move |result| {
            *writer.borrow_mut() = Some(result);
        }),
    )
}

/// Runs the full handshake against canned replies, leaving the dispatcher
/// connected to `testdb`.
pub fn connect(dispatcher: &mut Dispatcher) {
    let params = ConnectParams::builder()
        .database("testdb")
        .username("app")
        .password("s3cret")
        .build()
        .unwrap();
    let (outcome, completion) = capture();
    dispatcher.submit(Command::Connect { params }, completion);
    assert!(!dispatcher.take_outbound().is_empty());

    dispatcher.on_bytes(&handshake_leg1_reply());
    assert!(outcome.borrow().is_none(), "handshake completed too early");
    assert!(!dispatcher.take_outbound().is_empty());

    dispatcher.on_bytes(&handshake_leg2_reply());
    match outcome.borrow_mut().take() {
        Some(Ok(CommandOutcome::Connected(_))) => {}
        other => panic!("handshake failed: {other:?}"),
    };
}

/// Reads the codepoint of the first tagged object of the `n`-th DSS frame
/// in a request byte stream.
pub fn request_codepoint(bytes: &[u8], frame_index: usize) -> u16 {
    let mut pos = 0;
    for _ in 0..frame_index {
        pos += BigEndian::read_u16(&bytes[pos..]) as usize;
    }
    BigEndian::read_u16(&bytes[pos + 8..])
}

// ── row consumer ─────────────────────────────────────────

#[derive(Default)]
pub struct CollectingConsumer {
    state: Rc<RefCell<ConsumerState>>,
}

#[derive(Default)]
pub struct ConsumerState {
    pub rows: Vec<Vec<SqlValue>>,
    pub completed: Option<(u64, Option<Sqlca>)>,
    pub errors: Vec<String>,
}

impl CollectingConsumer {
    pub fn new() -> (Self, Rc<RefCell<ConsumerState>>) {
        let consumer = Self::default();
        let state = Rc::clone(&consumer.state);
        (consumer, state)
    }
}

impl ResultConsumer for CollectingConsumer {
    fn on_row(&mut self, row: Vec<SqlValue>) {
        self.state.borrow_mut().rows.push(row);
    }

    fn on_complete(&mut self, row_count: u64, warning: Option<Sqlca>) {
        self.state.borrow_mut().completed = Some((row_count, warning));
    }

    fn on_error(&mut self, error: &Db2Error) {
        self.state.borrow_mut().errors.push(error.to_string());
    }
}
