//! A sans-io client codec for the DRDA wire protocol spoken by Db2-family
//! database servers.
//!
//! The crate covers the protocol itself: DSS framing, the length/codepoint
//! tagged object tree, the per-command state machines (handshake, prepare,
//! query execution) and the pipelining dispatcher that correlates replies
//! with in-flight commands. Feeding bytes to and from a socket, connection
//! pooling, and mapping rows onto application types are left to the caller.

#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

mod codec;
mod conn;
mod db2_error;
mod protocol;

pub use crate::codec::{
    Command, CommandOutcome, CompletionHandler, Dispatcher, PreparedStatement, QueryResult,
    ResultConsumer, ServerAttributes, UpdateResult,
};
pub use crate::conn::{ConnectParams, ConnectParamsBuilder, SecurityMechanism};
pub use crate::db2_error::{Db2Error, Db2Result, ServerDiagnostic};
pub use crate::protocol::parts::{
    ColumnDefinition, ColumnMetaData, ParamDesc, RowDesc, Sqlca, SqlValue, TypeId,
};

/// Number of rows requested per query block when the caller does not choose.
pub const DEFAULT_FETCH_SIZE: u32 = 64;
