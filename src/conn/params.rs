//! Connection parameters for the handshake command.

use crate::protocol::codepoint;
use crate::{Db2Error, Db2Result};
use secstr::SecUtf8;

/// The security mechanism to request from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMechanism {
    /// User id and password flow in the clear (SECMEC 0x03).
    UserPassword,
    /// User id only (SECMEC 0x04).
    UserOnly,
}

impl SecurityMechanism {
    pub(crate) fn code(self) -> u16 {
        match self {
            Self::UserPassword => codepoint::SECMEC_USRIDPWD,
            Self::UserOnly => codepoint::SECMEC_USRIDONL,
        }
    }
}

/// Everything the handshake needs to know: database, credentials and the
/// requested security mechanism. Build with [`ConnectParams::builder`].
#[derive(Debug, Clone)]
pub struct ConnectParams {
    database: String,
    username: String,
    password: SecUtf8,
    security_mechanism: SecurityMechanism,
    read_only: bool,
}

impl ConnectParams {
    pub fn builder() -> ConnectParamsBuilder {
        ConnectParamsBuilder::default()
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        self.password.unsecure()
    }

    pub fn security_mechanism(&self) -> SecurityMechanism {
        self.security_mechanism
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// Builder for [`ConnectParams`].
#[derive(Debug, Clone, Default)]
pub struct ConnectParamsBuilder {
    database: Option<String>,
    username: Option<String>,
    password: Option<SecUtf8>,
    security_mechanism: Option<SecurityMechanism>,
    read_only: bool,
}

impl ConnectParamsBuilder {
    pub fn database<D: AsRef<str>>(&mut self, database: D) -> &mut Self {
        self.database = Some(database.as_ref().to_owned());
        self
    }

    pub fn username<U: AsRef<str>>(&mut self, username: U) -> &mut Self {
        self.username = Some(username.as_ref().to_owned());
        self
    }

    pub fn password<P: AsRef<str>>(&mut self, password: P) -> &mut Self {
        self.password = Some(SecUtf8::from(password.as_ref()));
        self
    }

    pub fn security_mechanism(&mut self, mechanism: SecurityMechanism) -> &mut Self {
        self.security_mechanism = Some(mechanism);
        self
    }

    pub fn read_only(&mut self, read_only: bool) -> &mut Self {
        self.read_only = read_only;
        self
    }

    pub fn build(&self) -> Db2Result<ConnectParams> {
        let database = self
            .database
            .clone()
            .ok_or(Db2Error::Usage("database name is required"))?;
        let username = self
            .username
            .clone()
            .ok_or(Db2Error::Usage("username is required"))?;
        let security_mechanism = self
            .security_mechanism
            .unwrap_or(SecurityMechanism::UserPassword);
        let password = match security_mechanism {
            SecurityMechanism::UserPassword => {
                let password = self
                    .password
                    .clone()
                    .ok_or(Db2Error::Usage("password is required for this mechanism"))?;
                if password.unsecure().is_empty() {
                    return Err(Db2Error::Usage("password must not be empty"));
                }
                password
            }
            SecurityMechanism::UserOnly => {
                self.password.clone().unwrap_or_else(|| SecUtf8::from(""))
            }
        };
        Ok(ConnectParams {
            database,
            username,
            password,
            security_mechanism,
            read_only: self.read_only,
        })
    }
}
