//! The user-level command model: what callers submit, what they get back,
//! and how row data streams out.

use crate::conn::ConnectParams;
use crate::protocol::parts::{ParamDesc, RowDesc, Section, Sqlca, SqlValue};
use crate::protocol::replies::connect::ServerAttributes;
use crate::{Db2Error, Db2Result};
use std::rc::Rc;

/// Row and completion sink for commands that produce a cursor. The core
/// calls [`ResultConsumer::on_row`] for every decoded row, then exactly one
/// of [`ResultConsumer::on_complete`] or [`ResultConsumer::on_error`].
pub trait ResultConsumer {
    fn on_row(&mut self, row: Vec<SqlValue>);
    fn on_complete(&mut self, row_count: u64, warning: Option<Sqlca>);
    fn on_error(&mut self, error: &Db2Error);
}

/// A statement prepared against a server-side package section.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    sql: String,
    section: Rc<Section>,
    param_desc: ParamDesc,
    row_desc: RowDesc,
}

impl PreparedStatement {
    pub(crate) fn new(
        sql: String,
        section: Rc<Section>,
        param_desc: ParamDesc,
        row_desc: RowDesc,
    ) -> Self {
        Self {
            sql,
            section,
            param_desc,
            row_desc,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Name of the server-side cursor opened when this statement is
    /// executed as a query.
    pub fn cursor_name(&self) -> &str {
        self.section.cursor_name()
    }

    /// Input parameter description.
    pub fn param_desc(&self) -> &ParamDesc {
        &self.param_desc
    }

    /// Output column description.
    pub fn row_desc(&self) -> &RowDesc {
        &self.row_desc
    }

    pub(crate) fn section(&self) -> &Rc<Section> {
        &self.section
    }
}

/// A user-level request against the connection.
pub enum Command {
    /// Handshake, security negotiation and database binding.
    Connect { params: ConnectParams },
    /// Prepare a statement and describe its parameters and columns.
    Prepare { sql: String },
    /// Execute SQL text directly; queries stream rows into the consumer.
    Query {
        sql: String,
        consumer: Box<dyn ResultConsumer>,
    },
    /// Execute a prepared statement with positional parameter values.
    Execute {
        statement: PreparedStatement,
        params: Vec<SqlValue>,
        consumer: Box<dyn ResultConsumer>,
    },
    /// Bind the connection to a schema.
    InitDb { schema: String },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Connect { params } => f.debug_struct("Connect").field("params", params).finish(),
            Self::Prepare { sql } => f.debug_struct("Prepare").field("sql", sql).finish(),
            Self::Query { sql, .. } => f.debug_struct("Query").field("sql", sql).finish(),
            Self::Execute {
                statement, params, ..
            } => f
                .debug_struct("Execute")
                .field("sql", &statement.sql())
                .field("params", params)
                .finish(),
            Self::InitDb { schema } => f.debug_struct("InitDb").field("schema", schema).finish(),
        }
    }
}

/// Successful result of a command, delivered through its completion
/// handler.
#[derive(Debug)]
pub enum CommandOutcome {
    Connected(ServerAttributes),
    Prepared(PreparedStatement),
    Query(QueryResult),
    Update(UpdateResult),
}

/// Terminal result of a cursor-producing command; the rows themselves went
/// to the [`ResultConsumer`].
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub row_count: u64,
    pub warning: Option<Sqlca>,
}

/// Result of an update-style command.
#[derive(Debug, Clone)]
pub struct UpdateResult {
    pub affected_rows: u64,
    pub warning: Option<Sqlca>,
}

/// Invoked exactly once per submitted command.
pub type CompletionHandler = Box<dyn FnOnce(Db2Result<CommandOutcome>)>;
