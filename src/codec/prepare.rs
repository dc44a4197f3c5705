//! The prepare command: bind SQL text to a package section and describe
//! its parameters and output columns.
//!
//! The request flows PRPSQLSTT (returning the input descriptor area) and a
//! chained DSCSQLSTT (returning the output one); the reply carries one
//! SQLDARD per describe. Statements without parameters or without output
//! columns simply describe an empty area, so the state ladder always runs
//! to completion in one decode pass.

use crate::codec::{CodecContext, CommandOutcome, PreparedStatement, Transition};
use crate::protocol::parts::{ColumnMetaData, ParamDesc, RowDesc, Section};
use crate::protocol::replies::query::parse_sqldard;
use crate::protocol::requests::query::{write_describe, write_prepare_describe};
use crate::protocol::{codepoint as cp, FrameReader, FrameWriter};
use crate::{Db2Error, Db2Result};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    HandlingParamDefs,
    ParamDefsDone,
    HandlingColumnDefs,
    ColumnDefsDone,
}

pub(crate) struct PrepareCodec {
    sql: String,
    state: State,
    section: Option<Rc<Section>>,
    param_md: Option<ColumnMetaData>,
}

impl PrepareCodec {
    pub(crate) fn new(sql: String) -> Self {
        Self {
            sql,
            state: State::Init,
            section: None,
            param_md: None,
        }
    }

    pub(crate) fn encode(&mut self, ctx: &mut CodecContext) -> Db2Result<Vec<u8>> {
        let database = ctx.database()?.to_string();
        let section = ctx.sections.take_prepared_section()?;
        debug!(
            "prepare: section {} for {:?}",
            section.section_number(),
            self.sql
        );

        let mut wr = FrameWriter::new(ctx.ccsid.clone());
        write_prepare_describe(
            &mut wr,
            &self.sql,
            &database,
            &section,
            cp::TYPSQLDA_X_INPUT,
        )?;
        write_describe(&mut wr, &database, &section, cp::TYPSQLDA_X_OUTPUT)?;
        self.section = Some(section);
        Ok(wr.into_bytes())
    }

    pub(crate) fn decode(&mut self, reply: &[u8], ctx: &mut CodecContext) -> Db2Result<Transition> {
        if self.state != State::Init {
            return Err(Db2Error::syntax("reply data for a completed prepare"));
        }
        let mut rdr = FrameReader::new(reply, ctx.ccsid.clone());

        self.state = State::HandlingParamDefs;
        rdr.start_same_id_chain()?;
        let (_, param_md) = parse_sqldard(&mut rdr)?;
        rdr.end_of_same_id_chain()?;
        self.param_md = Some(param_md);
        self.state = State::ParamDefsDone;

        self.state = State::HandlingColumnDefs;
        rdr.start_same_id_chain()?;
        let (_, column_md) = parse_sqldard(&mut rdr)?;
        rdr.end_of_same_id_chain()?;
        self.state = State::ColumnDefsDone;

        let section = self
            .section
            .take()
            .ok_or_else(|| Db2Error::syntax("prepare reply without an allocated section"))?;
        let param_md = self.param_md.take().unwrap_or_default();
        debug!(
            "prepared section {}: {} parameters, {} columns",
            section.section_number(),
            param_md.len(),
            column_md.len()
        );
        let statement = PreparedStatement::new(
            self.sql.clone(),
            section,
            ParamDesc::new(Rc::new(param_md)),
            RowDesc::new(Rc::new(column_md)),
        );
        Ok(Transition::Complete(CommandOutcome::Prepared(statement)))
    }
}
