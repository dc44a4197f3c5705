mod command;
mod dispatcher;
mod extended_query;
mod handshake;
mod prepare;
mod query;

pub use crate::protocol::replies::connect::ServerAttributes;
pub use command::{
    Command, CommandOutcome, CompletionHandler, PreparedStatement, QueryResult, ResultConsumer,
    UpdateResult,
};
pub use dispatcher::Dispatcher;

use crate::protocol::ccsid::CcsidManager;
use crate::protocol::parts::SectionPool;
use crate::{Db2Error, Db2Result};
use std::{cell::RefCell, rc::Rc};

/// What a decode step tells the dispatcher to do next.
pub(crate) enum Transition {
    /// The command finished; pop it and deliver the outcome.
    Complete(CommandOutcome),
    /// The command wrote a follow-up request and stays at the queue head.
    SendAndWait(Vec<u8>),
}

/// Connection-level state the codecs borrow while encoding or decoding.
pub(crate) struct CodecContext<'a> {
    pub ccsid: Rc<RefCell<CcsidManager>>,
    pub database: Option<&'a str>,
    pub sections: &'a mut SectionPool,
}

impl CodecContext<'_> {
    pub(crate) fn database(&self) -> Db2Result<&str> {
        self.database
            .ok_or(Db2Error::Usage("not connected to a database yet"))
    }
}

/// One in-flight command's protocol driver. Exactly one codec decodes at a
/// time (the queue head); the enum dispatch replaces the virtual override
/// chains a class hierarchy would use.
pub(crate) enum CommandCodec {
    Handshake(handshake::HandshakeCodec),
    Prepare(prepare::PrepareCodec),
    Query(query::QueryCodec),
    ExtendedQuery(extended_query::ExtendedQueryCodec),
}

impl CommandCodec {
    pub(crate) fn for_command(command: Command) -> Self {
        match command {
            Command::Connect { params } => Self::Handshake(handshake::HandshakeCodec::new(params)),
            Command::Prepare { sql } => Self::Prepare(prepare::PrepareCodec::new(sql)),
            Command::Query { sql, consumer } => {
                Self::Query(query::QueryCodec::new(sql, Some(consumer)))
            }
            Command::InitDb { schema } => Self::Query(query::QueryCodec::new(
                format!("SET CURRENT SCHEMA {schema}"),
                None,
            )),
            Command::Execute {
                statement,
                params,
                consumer,
            } => Self::ExtendedQuery(extended_query::ExtendedQueryCodec::new(
                statement, params, consumer,
            )),
        }
    }

    pub(crate) fn encode(&mut self, ctx: &mut CodecContext) -> Db2Result<Vec<u8>> {
        match self {
            Self::Handshake(codec) => codec.encode(ctx),
            Self::Prepare(codec) => codec.encode(ctx),
            Self::Query(codec) => codec.encode(ctx),
            Self::ExtendedQuery(codec) => codec.encode(ctx),
        }
    }

    pub(crate) fn decode(&mut self, reply: &[u8], ctx: &mut CodecContext) -> Db2Result<Transition> {
        match self {
            Self::Handshake(codec) => codec.decode(reply, ctx),
            Self::Prepare(codec) => codec.decode(reply, ctx),
            Self::Query(codec) => codec.decode(reply, ctx),
            Self::ExtendedQuery(codec) => codec.decode(reply, ctx),
        }
    }

    /// Routes a failure to the command's row consumer, if it has one.
    pub(crate) fn fail(&mut self, error: &Db2Error) {
        match self {
            Self::Query(codec) => codec.fail(error),
            Self::ExtendedQuery(codec) => codec.fail(error),
            Self::Handshake(_) | Self::Prepare(_) => {}
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Handshake(_) => "handshake",
            Self::Prepare(_) => "prepare",
            Self::Query(_) => "query",
            Self::ExtendedQuery(_) => "extended-query",
        }
    }
}
