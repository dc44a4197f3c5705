//! The connect command: exchange attributes and negotiate security, then
//! check credentials and bind to the database.
//!
//! ```text
//! CONNECTING      --EXCSAT+ACCSEC-->   (EXCSATRD ++ ACCSECRD)
//! AUTHENTICATING  --SECCHK+ACCRDB-->   (SECCHKRM ++ ACCRDBRM [PBSD])
//! CONNECTED
//! ```
//!
//! Any terminal failure here is fatal for the connection.

use crate::codec::{CodecContext, CommandOutcome, Transition};
use crate::conn::ConnectParams;
use crate::protocol::ccsid::Ccsid;
use crate::protocol::replies::connect::{
    parse_accrdbrm, parse_accsecrd, parse_excsatrd, parse_secchkrm, ServerAttributes,
};
use crate::protocol::requests::connect::{
    build_accrdb, build_accsec, build_excsat, build_secchk, generate_correlation_token,
};
use crate::protocol::{FrameReader, FrameWriter};
use crate::{Db2Error, Db2Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Connecting,
    Authenticating,
    Connected,
}

pub(crate) struct HandshakeCodec {
    params: ConnectParams,
    state: State,
    attrs: ServerAttributes,
}

impl HandshakeCodec {
    pub(crate) fn new(params: ConnectParams) -> Self {
        Self {
            params,
            state: State::Connecting,
            attrs: ServerAttributes::default(),
        }
    }

    pub(crate) fn encode(&mut self, ctx: &mut CodecContext) -> Db2Result<Vec<u8>> {
        debug!("handshake: sending EXCSAT + ACCSEC");
        let secmec = self.params.security_mechanism().code();
        let mut wr = FrameWriter::new(ctx.ccsid.clone());
        build_excsat(&mut wr, secmec)?;
        build_accsec(&mut wr, secmec, self.params.database())?;
        Ok(wr.into_bytes())
    }

    pub(crate) fn decode(&mut self, reply: &[u8], ctx: &mut CodecContext) -> Db2Result<Transition> {
        let mut rdr = FrameReader::new(reply, ctx.ccsid.clone());
        match self.state {
            State::Connecting => {
                rdr.start_same_id_chain()?;
                parse_excsatrd(&mut rdr, &mut self.attrs)?;
                rdr.end_of_same_id_chain()?;
                rdr.start_same_id_chain()?;
                parse_accsecrd(&mut rdr, self.params.security_mechanism().code())?;
                rdr.end_of_same_id_chain()?;

                // The rest of the conversation runs in UTF-8 when the
                // server granted the unicode manager.
                if self.attrs.supports_utf8() {
                    ctx.ccsid.borrow_mut().set(Ccsid::Utf8);
                }

                debug!("handshake: security negotiated, sending SECCHK + ACCRDB");
                let secmec = self.params.security_mechanism().code();
                let mut wr = FrameWriter::new(ctx.ccsid.clone());
                build_secchk(
                    &mut wr,
                    secmec,
                    self.params.database(),
                    self.params.username(),
                    Some(self.params.password()),
                )?;
                let (crrtkn, ccsid_number) = {
                    let ccsid = ctx.ccsid.borrow();
                    (generate_correlation_token(&ccsid)?, ccsid.ccsid_number())
                };
                build_accrdb(
                    &mut wr,
                    self.params.database(),
                    self.params.is_read_only(),
                    &crrtkn,
                    ccsid_number,
                )?;
                self.state = State::Authenticating;
                Ok(Transition::SendAndWait(wr.into_bytes()))
            }
            State::Authenticating => {
                rdr.start_same_id_chain()?;
                parse_secchkrm(&mut rdr, &mut self.attrs)?;
                rdr.end_of_same_id_chain()?;
                rdr.start_same_id_chain()?;
                parse_accrdbrm(&mut rdr, &mut self.attrs)?;
                rdr.end_of_same_id_chain()?;

                self.state = State::Connected;
                debug!(
                    "handshake complete, server product {:?}",
                    self.attrs.product_id
                );
                Ok(Transition::Complete(CommandOutcome::Connected(
                    self.attrs.clone(),
                )))
            }
            State::Connected => Err(Db2Error::syntax(
                "received reply data for a completed handshake",
            )),
        }
    }
}
