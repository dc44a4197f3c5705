use crate::protocol::parts::Sqlca;
use thiserror::Error;

/// A list specifying categories of [`Db2Error`].
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Db2Error {
    /// The inbound byte stream violated the framing or object grammar of the
    /// protocol. Always fatal for the connection.
    #[error("protocol syntax error: {}", _0)]
    ProtocolSyntax(String),

    /// Database server responded with an error (negative SQLCODE);
    /// the contained `ServerDiagnostic` describes the concrete reason.
    #[error("database server responded with an error")]
    Server {
        /// The causing diagnostic.
        #[from]
        source: ServerDiagnostic,
    },

    /// The server rejected the security check during the handshake.
    /// The connection is unusable afterwards.
    #[error("security check rejected by server (SECCHKCD 0x{:02X})", code)]
    SecurityRejected {
        /// Security check code reported by the server.
        code: u8,
    },

    /// The peer used a protocol feature this client deliberately does not
    /// implement (e.g. streamed objects of unknown length).
    #[error("unsupported protocol feature: {}", _0)]
    Unsupported(&'static str),

    /// Error caused by wrong usage.
    #[error("wrong usage: {}", _0)]
    Usage(&'static str),

    /// Error caused by wrong usage.
    #[error("wrong usage: {}", _0)]
    UsageDetailed(String),

    /// The connection was closed (or poisoned by an earlier protocol error)
    /// while the command was still waiting for its reply.
    #[error("connection is closed")]
    ConnectionClosed,
}

/// Abbreviation of `Result<T, Db2Error>`.
pub type Db2Result<T> = std::result::Result<T, Db2Error>;

impl Db2Error {
    pub(crate) fn syntax(detail: impl Into<String>) -> Self {
        Self::ProtocolSyntax(detail.into())
    }

    /// Returns the contained `ServerDiagnostic`, if any.
    ///
    /// Helps when programmatic access to e.g. the SQLCODE is needed.
    #[must_use]
    pub fn server_diagnostic(&self) -> Option<&ServerDiagnostic> {
        match self {
            Self::Server { source } => Some(source),
            _ => None,
        }
    }
}

/// Describes an error that is reported by the database server in an SQLCA.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerDiagnostic {
    code: i32,
    sqlstate: String,
    message: Option<String>,
}

impl ServerDiagnostic {
    pub(crate) fn new(code: i32, sqlstate: String, message: Option<String>) -> Self {
        Self {
            code,
            sqlstate,
            message,
        }
    }

    /// Returns the SQLCODE.
    #[must_use]
    pub fn code(&self) -> i32 {
        self.code
    }
    /// Returns the five-character SQLSTATE.
    #[must_use]
    pub fn sqlstate(&self) -> &str {
        &self.sqlstate
    }
    /// Returns the message text, if the server sent one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl From<&Sqlca> for ServerDiagnostic {
    fn from(sqlca: &Sqlca) -> Self {
        Self::new(
            sqlca.sql_code(),
            sqlca.sql_state().to_string(),
            sqlca.message().map(ToString::to_string),
        )
    }
}

impl std::error::Error for ServerDiagnostic {}

impl std::fmt::Display for ServerDiagnostic {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            fmt,
            r#"[code: {}, sql state: {}]: "{}""#,
            self.code,
            self.sqlstate,
            self.message.as_deref().unwrap_or("")
        )
    }
}

impl std::fmt::Debug for ServerDiagnostic {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{self}")
    }
}
