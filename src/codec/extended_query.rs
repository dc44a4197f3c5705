//! Execution of a prepared statement with positional parameters. The open
//! query reuses the column metadata captured at prepare time, so repeated
//! executions of the same section never re-describe.

use crate::codec::query::{drive_row_stream, Cursor};
use crate::codec::{CodecContext, CommandOutcome, PreparedStatement, QueryResult, Transition};
use crate::protocol::replies::query::{parse_opnqryrm, parse_sqlcard};
use crate::protocol::requests::query::{is_query, write_continue_query, write_open_query};
use crate::protocol::{codepoint as cp, FrameReader, FrameWriter, Peek};
use crate::{Db2Error, Db2Result, ResultConsumer, SqlValue, DEFAULT_FETCH_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    HandlingRows,
    Done,
}

pub(crate) struct ExtendedQueryCodec {
    statement: PreparedStatement,
    params: Vec<SqlValue>,
    consumer: Box<dyn ResultConsumer>,
    state: State,
    cursor: Option<Cursor>,
}

impl ExtendedQueryCodec {
    pub(crate) fn new(
        statement: PreparedStatement,
        params: Vec<SqlValue>,
        consumer: Box<dyn ResultConsumer>,
    ) -> Self {
        Self {
            statement,
            params,
            consumer,
            state: State::Init,
            cursor: None,
        }
    }

    pub(crate) fn fail(&mut self, error: &Db2Error) {
        self.consumer.on_error(error);
    }

    pub(crate) fn encode(&mut self, ctx: &mut CodecContext) -> Db2Result<Vec<u8>> {
        if !is_query(self.statement.sql()) {
            return Err(Db2Error::Unsupported(
                "prepared execution of non-query statements",
            ));
        }
        let expected = self.statement.param_desc().metadata().len();
        if self.params.len() != expected {
            return Err(Db2Error::UsageDetailed(format!(
                "statement takes {expected} parameters, {} given",
                self.params.len()
            )));
        }
        let database = ctx.database()?.to_string();
        debug!(
            "extended query: opening section {} with {} parameters",
            self.statement.section().section_number(),
            self.params.len()
        );
        let mut wr = FrameWriter::new(ctx.ccsid.clone());
        write_open_query(
            &mut wr,
            &database,
            self.statement.section(),
            DEFAULT_FETCH_SIZE,
            &self.params,
        )?;
        Ok(wr.into_bytes())
    }

    pub(crate) fn decode(&mut self, reply: &[u8], ctx: &mut CodecContext) -> Db2Result<Transition> {
        let mut rdr = FrameReader::new(reply, ctx.ccsid.clone());
        let mut cursor = match self.state {
            State::Init => {
                rdr.start_same_id_chain()?;
                // A failed open flows an SQLCA in place of the reply message.
                if rdr.peek_code_point()? == Peek::CodePoint(cp::SQLCARD) {
                    parse_sqlcard(&mut rdr)?.into_result()?;
                    return Err(Db2Error::syntax("open query reply without OPNQRYRM"));
                }
                let open_reply = parse_opnqryrm(&mut rdr)?;
                // Carried-over metadata from the prepare.
                let mut cursor = Cursor::new(self.statement.row_desc().shared());
                cursor.query_instance_id = open_reply.query_instance_id;
                cursor
            }
            State::HandlingRows => {
                rdr.start_same_id_chain()?;
                self.cursor
                    .take()
                    .ok_or_else(|| Db2Error::syntax("row data without an open cursor"))?
            }
            State::Done => {
                return Err(Db2Error::syntax("reply data for a completed command"));
            }
        };
        drive_row_stream(&mut rdr, &mut cursor, Some(self.consumer.as_mut()))?;

        if cursor.all_rows_received {
            self.state = State::Done;
            let warning = cursor.warning.take();
            self.consumer.on_complete(cursor.row_count, warning.clone());
            return Ok(Transition::Complete(CommandOutcome::Query(QueryResult {
                row_count: cursor.row_count,
                warning,
            })));
        }

        let database = ctx.database()?.to_string();
        let mut wr = FrameWriter::new(ctx.ccsid.clone());
        write_continue_query(
            &mut wr,
            &database,
            self.statement.section(),
            cursor.query_instance_id,
        )?;
        self.state = State::HandlingRows;
        self.cursor = Some(cursor);
        Ok(Transition::SendAndWait(wr.into_bytes()))
    }
}
