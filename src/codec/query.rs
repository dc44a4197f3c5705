//! Direct SQL execution. The leading token classifies the text: queries
//! are framed as prepare + open-query and drive a row-streaming loop,
//! everything else flows as execute-immediate + commit.

use crate::codec::{CodecContext, CommandOutcome, QueryResult, Transition, UpdateResult};
use crate::protocol::parts::{ColumnMetaData, Section, Sqlca};
use crate::protocol::replies::query::{
    parse_endqryrm, parse_enduowrm, parse_opnqryrm, parse_qrydsc, parse_qrydta, parse_sqlcard,
    parse_sqldard,
};
use crate::protocol::requests::query::{
    is_query, write_commit, write_continue_query, write_execute_immediate, write_open_query,
    write_prepare_describe,
};
use crate::protocol::{codepoint as cp, FrameReader, FrameWriter, Peek};
use crate::{Db2Error, Db2Result, ResultConsumer, DEFAULT_FETCH_SIZE};
use std::rc::Rc;

// SQLSTATE class 02: no data.
const SQLCODE_NOT_FOUND: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    HandlingRows,
    Done,
}

/// Decode-side state of one open cursor.
pub(crate) struct Cursor {
    pub metadata: Rc<ColumnMetaData>,
    pub row_count: u64,
    pub all_rows_received: bool,
    pub query_instance_id: u64,
    pub warning: Option<Sqlca>,
}

impl Cursor {
    pub(crate) fn new(metadata: Rc<ColumnMetaData>) -> Self {
        Self {
            metadata,
            row_count: 0,
            all_rows_received: false,
            query_instance_id: 0,
            warning: None,
        }
    }
}

pub(crate) struct QueryCodec {
    sql: String,
    consumer: Option<Box<dyn ResultConsumer>>,
    state: State,
    section: Option<Rc<Section>>,
    cursor: Option<Cursor>,
    affected_rows: u64,
    warning: Option<Sqlca>,
}

impl QueryCodec {
    pub(crate) fn new(sql: String, consumer: Option<Box<dyn ResultConsumer>>) -> Self {
        Self {
            sql,
            consumer,
            state: State::Init,
            section: None,
            cursor: None,
            affected_rows: 0,
            warning: None,
        }
    }

    pub(crate) fn fail(&mut self, error: &Db2Error) {
        if let Some(consumer) = &mut self.consumer {
            consumer.on_error(error);
        }
    }

    pub(crate) fn encode(&mut self, ctx: &mut CodecContext) -> Db2Result<Vec<u8>> {
        let database = ctx.database()?.to_string();
        let section = ctx.sections.take_dynamic_section()?;
        let mut wr = FrameWriter::new(ctx.ccsid.clone());
        if is_query(&self.sql) {
            debug!("query: prepare + open for {:?}", self.sql);
            write_prepare_describe(
                &mut wr,
                &self.sql,
                &database,
                &section,
                cp::TYPSQLDA_X_OUTPUT,
            )?;
            write_open_query(&mut wr, &database, &section, DEFAULT_FETCH_SIZE, &[])?;
        } else {
            debug!("query: execute-immediate + commit for {:?}", self.sql);
            write_execute_immediate(&mut wr, &self.sql, &database, &section)?;
            write_commit(&mut wr);
        }
        self.section = Some(section);
        Ok(wr.into_bytes())
    }

    pub(crate) fn decode(&mut self, reply: &[u8], ctx: &mut CodecContext) -> Db2Result<Transition> {
        let mut rdr = FrameReader::new(reply, ctx.ccsid.clone());
        match (self.state, is_query(&self.sql)) {
            (State::Init, true) => {
                // First group: the prepare's column description.
                rdr.start_same_id_chain()?;
                let (sqlca, metadata) = parse_sqldard(&mut rdr)?;
                rdr.end_of_same_id_chain()?;
                if let Some(sqlca) = sqlca {
                    let sqlca = sqlca.into_result()?;
                    if sqlca.is_warning() {
                        self.warning = Some(sqlca);
                    }
                }

                // Second group: the opened cursor and its first blocks. A
                // failed open flows an SQLCA in place of the reply message.
                rdr.start_same_id_chain()?;
                if rdr.peek_code_point()? == Peek::CodePoint(cp::SQLCARD) {
                    parse_sqlcard(&mut rdr)?.into_result()?;
                    return Err(Db2Error::syntax("open query reply without OPNQRYRM"));
                }
                let open_reply = parse_opnqryrm(&mut rdr)?;
                let mut cursor = Cursor::new(Rc::new(metadata));
                cursor.query_instance_id = open_reply.query_instance_id;
                drive_row_stream(&mut rdr, &mut cursor, self.consumer.as_deref_mut())?;
                self.finish_rows(ctx, cursor)
            }
            (State::HandlingRows, true) => {
                let mut cursor = self
                    .cursor
                    .take()
                    .ok_or_else(|| Db2Error::syntax("row data without an open cursor"))?;
                rdr.start_same_id_chain()?;
                drive_row_stream(&mut rdr, &mut cursor, self.consumer.as_deref_mut())?;
                self.finish_rows(ctx, cursor)
            }
            (State::Init, false) => {
                // Execute-immediate outcome.
                rdr.start_same_id_chain()?;
                let sqlca = parse_sqlcard(&mut rdr)?.into_result()?;
                rdr.end_of_same_id_chain()?;
                self.affected_rows = sqlca.affected_rows();
                if sqlca.is_warning() {
                    self.warning = Some(sqlca);
                }

                // Commit outcome.
                rdr.start_same_id_chain()?;
                parse_enduowrm(&mut rdr)?;
                parse_sqlcard(&mut rdr)?.into_result()?;
                rdr.end_of_same_id_chain()?;

                self.state = State::Done;
                self.release_section(ctx);
                Ok(Transition::Complete(CommandOutcome::Update(UpdateResult {
                    affected_rows: self.affected_rows,
                    warning: self.warning.take(),
                })))
            }
            _ => Err(Db2Error::syntax("reply data for a completed command")),
        }
    }

    // One-shot dynamic slots go back to the pool as soon as the command is
    // done with them.
    fn release_section(&mut self, ctx: &mut CodecContext) {
        if let Some(section) = self.section.take() {
            if section.is_generated() {
                ctx.sections.release(&section);
            }
        }
    }

    // Completes the command when the cursor is drained, or flows a CNTQRY
    // for the next blocks.
    fn finish_rows(&mut self, ctx: &mut CodecContext, cursor: Cursor) -> Db2Result<Transition> {
        if cursor.all_rows_received {
            self.state = State::Done;
            self.release_section(ctx);
            let warning = cursor.warning.or_else(|| self.warning.take());
            if let Some(consumer) = &mut self.consumer {
                consumer.on_complete(cursor.row_count, warning.clone());
            }
            return Ok(Transition::Complete(CommandOutcome::Query(QueryResult {
                row_count: cursor.row_count,
                warning,
            })));
        }

        let database = ctx.database()?.to_string();
        let section = self
            .section
            .as_ref()
            .ok_or_else(|| Db2Error::syntax("open cursor without a section"))?;
        debug!(
            "cursor not drained after {} rows, continuing query",
            cursor.row_count
        );
        let mut wr = FrameWriter::new(ctx.ccsid.clone());
        write_continue_query(&mut wr, &database, section, cursor.query_instance_id)?;
        self.state = State::HandlingRows;
        self.cursor = Some(cursor);
        Ok(Transition::SendAndWait(wr.into_bytes()))
    }
}

/// Consumes the query reply stream after OPNQRYRM: row descriptions, row
/// data blocks, and the end-of-query trailer. Returns when the chain ends;
/// `cursor.all_rows_received` tells whether the cursor is done.
pub(crate) fn drive_row_stream(
    rdr: &mut FrameReader,
    cursor: &mut Cursor,
    mut consumer: Option<&mut (dyn ResultConsumer + 'static)>,
) -> Db2Result<()> {
    loop {
        match rdr.peek_code_point()? {
            Peek::CodePoint(cp::QRYDSC) => {
                let described = parse_qrydsc(rdr)?;
                if described.len() != cursor.metadata.len() {
                    return Err(Db2Error::syntax(format!(
                        "row description has {} columns, statement describes {}",
                        described.len(),
                        cursor.metadata.len()
                    )));
                }
            }
            Peek::CodePoint(cp::QRYDTA) => {
                let metadata = Rc::clone(&cursor.metadata);
                cursor.row_count += parse_qrydta(rdr, &metadata, |row| {
                    if let Some(consumer) = consumer.as_mut() {
                        consumer.on_row(row);
                    }
                })?;
            }
            Peek::CodePoint(cp::ENDQRYRM) => {
                parse_endqryrm(rdr)?;
                cursor.all_rows_received = true;
            }
            Peek::CodePoint(cp::SQLCARD) => {
                let sqlca = parse_sqlcard(rdr)?;
                if sqlca.is_end_of_data() || sqlca.sql_code() == SQLCODE_NOT_FOUND {
                    cursor.all_rows_received = true;
                    continue;
                }
                let sqlca = sqlca.into_result()?;
                if sqlca.is_warning() {
                    cursor.warning = Some(sqlca);
                }
            }
            Peek::EndOfChain => return Ok(()),
            Peek::CodePoint(other) => {
                return Err(Db2Error::syntax(format!(
                    "unexpected codepoint 0x{other:04X} in query reply stream"
                )))
            }
            Peek::EndOfCollection => {
                return Err(Db2Error::syntax(
                    "unbalanced collection in query reply stream",
                ))
            }
        }
    }
}
