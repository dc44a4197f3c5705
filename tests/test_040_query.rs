//! Query execution scenarios: simple queries with row streaming, updates,
//! fetch continuation, and prepared (extended) execution.

mod test_utils;

use byteorder::{BigEndian, ByteOrder};
use db2connect::{Command, CommandOutcome, Db2Error, Dispatcher, PreparedStatement, SqlValue};
use test_utils::*;

const OPNQRY: u16 = 0x200C;
const CNTQRY: u16 = 0x2005;
const EXCSQLIMM: u16 = 0x200A;
const RDBCMM: u16 = 0x200E;
const PRPSQLSTT: u16 = 0x200D;

const INTEGER: u16 = 496;
const VARCHAR_NULLABLE: u16 = 449;
const FDOCA_INTEGER: u8 = 0x02;
const FDOCA_NVARCHAR: u8 = 0x33;

fn immutable_columns() -> Vec<(&'static str, u16, u32)> {
    vec![("id", INTEGER, 4), ("message", VARCHAR_NULLABLE, 2048)]
}

fn immutable_qrydsc() -> Vec<u8> {
    qrydsc_payload(&[(FDOCA_INTEGER, 4), (FDOCA_NVARCHAR, 2048)])
}

fn immutable_rows() -> Vec<Vec<TestValue>> {
    vec![
        vec![TestValue::Int(1), TestValue::Varchar("hello".into())],
        vec![TestValue::Int(2), TestValue::Null],
    ]
}

/// The full reply to a simple query: column description, open cursor, row
/// data, end of query, closing SQLCA.
fn select_reply() -> Vec<u8> {
    let dard = obj(SQLDARD, &sqldard_payload(&immutable_columns()));
    let opnqryrm = obj(OPNQRYRM, &opnqryrm_payload(7));
    let qrydsc = obj(QRYDSC, &immutable_qrydsc());
    let qrydta = obj(QRYDTA, &qrydta_payload(&immutable_rows()));
    let endqryrm = obj(ENDQRYRM, &u16_param(SVRCOD, 4));
    let sqlcard = obj(SQLCARD, &sqlca_group(0, "00000", 0));

    let mut reply = frame(1, true, false, &dard);
    reply.extend_from_slice(&frame(2, true, true, &opnqryrm));
    reply.extend_from_slice(&frame(2, true, true, &qrydsc));
    reply.extend_from_slice(&frame(2, true, true, &qrydta));
    reply.extend_from_slice(&frame(2, true, true, &endqryrm));
    reply.extend_from_slice(&frame(2, false, false, &sqlcard));
    reply
}

#[test]
fn test_simple_query_streams_rows() {
    init_logger();
    let mut dispatcher = Dispatcher::new();
    connect(&mut dispatcher);

    let (consumer, state) = CollectingConsumer::new();
    let (outcome, completion) = capture();
    dispatcher.submit(
        Command::Query {
            sql: "SELECT id, message FROM immutable".into(),
            consumer: Box::new(consumer),
        },
        completion,
    );
    let request = dispatcher.take_outbound();
    assert_eq!(request_codepoint(&request, 0), PRPSQLSTT);

    dispatcher.on_bytes(&select_reply());

    match outcome.borrow_mut().take() {
        Some(Ok(CommandOutcome::Query(result))) => assert_eq!(result.row_count, 2),
        other => panic!("unexpected query outcome: {other:?}"),
    }
    let state = state.borrow();
    assert_eq!(state.rows.len(), 2);
    assert_eq!(
        state.rows[0],
        vec![SqlValue::Int(1), SqlValue::Text("hello".into())]
    );
    assert_eq!(state.rows[1], vec![SqlValue::Int(2), SqlValue::Null]);
    assert_eq!(state.completed, Some((2, None)));
    assert!(state.errors.is_empty());
}

#[test]
fn test_query_continuation_fetches_more_blocks() {
    init_logger();
    let mut dispatcher = Dispatcher::new();
    connect(&mut dispatcher);

    let (consumer, state) = CollectingConsumer::new();
    let (outcome, completion) = capture();
    dispatcher.submit(
        Command::Query {
            sql: "SELECT id, message FROM immutable".into(),
            consumer: Box::new(consumer),
        },
        completion,
    );
    dispatcher.take_outbound();

    // First round trip ends after one row block without closing the
    // cursor: the codec must flow a CNTQRY and keep waiting.
    let dard = obj(SQLDARD, &sqldard_payload(&immutable_columns()));
    let opnqryrm = obj(OPNQRYRM, &opnqryrm_payload(7));
    let qrydsc = obj(QRYDSC, &immutable_qrydsc());
    let first_block = obj(
        QRYDTA,
        &qrydta_payload(&[vec![
            TestValue::Int(1),
            TestValue::Varchar("hello".into()),
        ]]),
    );
    let mut reply = frame(1, true, false, &dard);
    reply.extend_from_slice(&frame(2, true, true, &opnqryrm));
    reply.extend_from_slice(&frame(2, true, true, &qrydsc));
    reply.extend_from_slice(&frame(2, false, false, &first_block));
    dispatcher.on_bytes(&reply);

    assert!(outcome.borrow().is_none());
    let continuation = dispatcher.take_outbound();
    assert_eq!(request_codepoint(&continuation, 0), CNTQRY);

    // Second round trip: one more row, then the end-of-data SQLCA
    // (+20237 in the diagnostics) instead of an ENDQRYRM.
    let second_block = obj(
        QRYDTA,
        &qrydta_payload(&[vec![TestValue::Int(2), TestValue::Varchar("again".into())]]),
    );
    let end_card = obj(SQLCARD, &sqlca_group_end_of_data());
    let mut reply = frame(1, true, true, &second_block);
    reply.extend_from_slice(&frame(1, false, false, &end_card));
    dispatcher.on_bytes(&reply);

    match outcome.borrow_mut().take() {
        Some(Ok(CommandOutcome::Query(result))) => assert_eq!(result.row_count, 2),
        other => panic!("unexpected query outcome: {other:?}"),
    }
    assert_eq!(state.borrow().rows.len(), 2);
}

#[test]
fn test_insert_runs_as_execute_immediate_with_commit() {
    init_logger();
    let mut dispatcher = Dispatcher::new();
    connect(&mut dispatcher);

    let (consumer, state) = CollectingConsumer::new();
    let (outcome, completion) = capture();
    dispatcher.submit(
        Command::Query {
            sql: "INSERT INTO immutable (id, message) VALUES (5, 'x')".into(),
            consumer: Box::new(consumer),
        },
        completion,
    );
    let request = dispatcher.take_outbound();
    assert_eq!(request_codepoint(&request, 0), EXCSQLIMM);
    // The SQL text chains behind as a command data object, then the commit.
    let second_frame_len = BigEndian::read_u16(&request[0..2]) as usize;
    let third_start = {
        let mut pos = second_frame_len;
        pos += BigEndian::read_u16(&request[pos..]) as usize;
        pos
    };
    assert_eq!(BigEndian::read_u16(&request[third_start + 8..]), RDBCMM);

    let sqlcard = obj(SQLCARD, &sqlca_group(0, "00000", 1));
    let enduowrm = obj(ENDUOWRM, &u16_param(SVRCOD, 0));
    let commit_card = obj(SQLCARD, &sqlca_group(0, "00000", 0));
    let mut reply = frame(1, true, false, &sqlcard);
    reply.extend_from_slice(&frame(2, false, false, &[enduowrm, commit_card].concat()));
    dispatcher.on_bytes(&reply);

    match outcome.borrow_mut().take() {
        Some(Ok(CommandOutcome::Update(result))) => {
            assert_eq!(result.affected_rows, 1);
            assert!(result.warning.is_none());
        }
        other => panic!("unexpected update outcome: {other:?}"),
    }
    // No row data flows for updates.
    assert!(state.borrow().rows.is_empty());
}

#[test]
fn test_negative_sqlcode_fails_the_command() {
    init_logger();
    let mut dispatcher = Dispatcher::new();
    connect(&mut dispatcher);

    let (consumer, state) = CollectingConsumer::new();
    let (outcome, completion) = capture();
    dispatcher.submit(
        Command::Query {
            sql: "DELETE FROM missing".into(),
            consumer: Box::new(consumer),
        },
        completion,
    );
    dispatcher.take_outbound();

    let sqlcard = obj(
        SQLCARD,
        &sqlca_group_with_message(-204, "42704", "MISSING is undefined"),
    );
    dispatcher.on_bytes(&frame(1, false, false, &sqlcard));

    match outcome.borrow_mut().take() {
        Some(Err(Db2Error::Server { source })) => {
            assert_eq!(source.code(), -204);
            assert_eq!(source.message(), Some("MISSING is undefined"));
        }
        other => panic!("expected a server diagnostic, got {other:?}"),
    }
    assert_eq!(state.borrow().errors.len(), 1);
}

#[test]
fn test_positive_sqlcode_attaches_a_warning() {
    init_logger();
    let mut dispatcher = Dispatcher::new();
    connect(&mut dispatcher);

    let (consumer, _state) = CollectingConsumer::new();
    let (outcome, completion) = capture();
    dispatcher.submit(
        Command::Query {
            sql: "UPDATE immutable SET message = 'x'".into(),
            consumer: Box::new(consumer),
        },
        completion,
    );
    dispatcher.take_outbound();

    let sqlcard = obj(SQLCARD, &sqlca_group(562, "01005", 0));
    let enduowrm = obj(ENDUOWRM, &u16_param(SVRCOD, 0));
    let commit_card = obj(SQLCARD, &sqlca_group(0, "00000", 0));
    let mut reply = frame(1, true, false, &sqlcard);
    reply.extend_from_slice(&frame(2, false, false, &[enduowrm, commit_card].concat()));
    dispatcher.on_bytes(&reply);

    match outcome.borrow_mut().take() {
        Some(Ok(CommandOutcome::Update(result))) => {
            let warning = result.warning.expect("warning attached");
            assert_eq!(warning.sql_code(), 562);
            assert_eq!(warning.sql_state(), "01005");
        }
        other => panic!("expected success with warning, got {other:?}"),
    };
}

/// Prepares `SELECT message FROM immutable WHERE id = ?` against canned
/// describe replies: one nullable integer parameter, one varchar column.
fn prepare_id_lookup(dispatcher: &mut Dispatcher) -> PreparedStatement {
    let (outcome, completion) = capture();
    dispatcher.submit(
        Command::Prepare {
            sql: "SELECT message FROM immutable WHERE id = ?".into(),
        },
        completion,
    );
    dispatcher.take_outbound();
    let param_dard = obj(SQLDARD, &sqldard_payload(&[("", 497, 4)]));
    let column_dard = obj(
        SQLDARD,
        &sqldard_payload(&[("message", VARCHAR_NULLABLE, 2048)]),
    );
    let mut reply = frame(1, true, false, &param_dard);
    reply.extend_from_slice(&frame(2, false, false, &column_dard));
    dispatcher.on_bytes(&reply);
    let taken = outcome.borrow_mut().take();
    match taken {
        Some(Ok(CommandOutcome::Prepared(statement))) => statement,
        other => panic!("prepare failed: {other:?}"),
    }
}

#[test]
fn test_extended_query_with_parameters() {
    init_logger();
    let mut dispatcher = Dispatcher::new();
    connect(&mut dispatcher);

    let statement = prepare_id_lookup(&mut dispatcher);

    // Execute with one bound parameter.
    let (consumer, state) = CollectingConsumer::new();
    let (outcome, completion) = capture();
    dispatcher.submit(
        Command::Execute {
            statement,
            params: vec![SqlValue::Int(5)],
            consumer: Box::new(consumer),
        },
        completion,
    );
    let request = dispatcher.take_outbound();
    assert_eq!(request_codepoint(&request, 0), OPNQRY);
    // The parameter payload chains behind the command.
    let sqldta_start = BigEndian::read_u16(&request[0..2]) as usize;
    assert_eq!(BigEndian::read_u16(&request[sqldta_start + 8..]), 0x2412);

    let opnqryrm = obj(OPNQRYRM, &opnqryrm_payload(9));
    let qrydsc = obj(QRYDSC, &qrydsc_payload(&[(FDOCA_NVARCHAR, 2048)]));
    let qrydta = obj(
        QRYDTA,
        &qrydta_payload(&[vec![TestValue::Varchar("hello".into())]]),
    );
    let endqryrm = obj(ENDQRYRM, &u16_param(SVRCOD, 4));
    let sqlcard = obj(SQLCARD, &sqlca_group(0, "00000", 0));
    let mut reply = frame(1, true, true, &opnqryrm);
    reply.extend_from_slice(&frame(1, true, true, &qrydsc));
    reply.extend_from_slice(&frame(1, true, true, &qrydta));
    reply.extend_from_slice(&frame(1, true, true, &endqryrm));
    reply.extend_from_slice(&frame(1, false, false, &sqlcard));
    dispatcher.on_bytes(&reply);

    match outcome.borrow_mut().take() {
        Some(Ok(CommandOutcome::Query(result))) => assert_eq!(result.row_count, 1),
        other => panic!("unexpected execute outcome: {other:?}"),
    }
    let state = state.borrow();
    assert_eq!(state.rows, vec![vec![SqlValue::Text("hello".into())]]);
    assert_eq!(state.completed, Some((1, None)));
}

#[test]
fn test_failed_open_surfaces_the_server_diagnostic() {
    init_logger();
    let mut dispatcher = Dispatcher::new();
    connect(&mut dispatcher);

    let statement = prepare_id_lookup(&mut dispatcher);

    let (consumer, state) = CollectingConsumer::new();
    let (outcome, completion) = capture();
    dispatcher.submit(
        Command::Execute {
            statement,
            params: vec![SqlValue::Int(5)],
            consumer: Box::new(consumer),
        },
        completion,
    );
    dispatcher.take_outbound();

    // The server refuses the open with an SQLCA instead of an OPNQRYRM.
    let sqlcard = obj(
        SQLCARD,
        &sqlca_group_with_message(-811, "21000", "result of more than one row"),
    );
    dispatcher.on_bytes(&frame(1, false, false, &sqlcard));

    match outcome.borrow_mut().take() {
        Some(Err(Db2Error::Server { source })) => {
            assert_eq!(source.code(), -811);
            assert_eq!(source.sqlstate(), "21000");
        }
        other => panic!("expected a server diagnostic, got {other:?}"),
    }
    assert_eq!(state.borrow().errors.len(), 1);
}

#[test]
fn test_parameter_count_mismatch_is_rejected_before_encode() {
    init_logger();
    let mut dispatcher = Dispatcher::new();
    connect(&mut dispatcher);

    let statement = prepare_id_lookup(&mut dispatcher);

    let (consumer, _state) = CollectingConsumer::new();
    let (outcome, completion) = capture();
    dispatcher.submit(
        Command::Execute {
            statement,
            params: vec![],
            consumer: Box::new(consumer),
        },
        completion,
    );
    assert!(matches!(
        outcome.borrow_mut().take(),
        Some(Err(Db2Error::UsageDetailed(_)))
    ));
    assert_eq!(dispatcher.in_flight(), 0);
}
