//! The connection-level sequencer: encodes submitted commands, keeps the
//! FIFO of in-flight exchanges, slices the inbound byte stream into
//! complete reply chains, and routes each decoded outcome back to its
//! command.
//!
//! The protocol is pipelined: several commands may be in flight, and reply
//! order matches request order, so the queue head is always the codec the
//! next reply belongs to.

use crate::codec::{
    CodecContext, Command, CommandCodec, CommandOutcome, CompletionHandler, Transition,
};
use crate::protocol::ccsid::CcsidManager;
use crate::protocol::frame_reader::chain_length;
use crate::protocol::parts::SectionPool;
use crate::{Db2Error, Db2Result};
use std::collections::VecDeque;
use std::{cell::RefCell, rc::Rc};

struct InFlight {
    codec: CommandCodec,
    completion: Option<CompletionHandler>,
}

impl InFlight {
    fn complete(mut self, result: Db2Result<CommandOutcome>) {
        if let Err(error) = &result {
            self.codec.fail(error);
        }
        if let Some(completion) = self.completion.take() {
            completion(result);
        }
    }
}

/// A sans-io DRDA connection: feed it commands and inbound bytes, write out
/// whatever [`Dispatcher::take_outbound`] yields.
pub struct Dispatcher {
    ccsid: Rc<RefCell<CcsidManager>>,
    sections: SectionPool,
    database: Option<String>,
    in_flight: VecDeque<InFlight>,
    inbound: Vec<u8>,
    outbound: Vec<u8>,
    // Set after a framing error; the stream position can no longer be
    // trusted, so every later command fails immediately.
    poisoned: bool,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("database", &self.database)
            .field("in_flight", &self.in_flight.len())
            .field("inbound_buffered", &self.inbound.len())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            ccsid: Rc::new(RefCell::new(CcsidManager::default())),
            sections: SectionPool::default(),
            database: None,
            in_flight: VecDeque::new(),
            inbound: Vec::new(),
            outbound: Vec::new(),
            poisoned: false,
        }
    }

    /// Number of commands awaiting their reply.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Bytes that must be written to the transport; drains the buffer.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }

    /// Encodes the command and queues it behind any commands already in
    /// flight. The completion handler fires exactly once.
    pub fn submit(&mut self, command: Command, completion: CompletionHandler) {
        if self.poisoned {
            completion(Err(Db2Error::ConnectionClosed));
            return;
        }
        if let Command::Connect { params } = &command {
            self.database = Some(params.database().to_string());
        }

        let mut codec = CommandCodec::for_command(command);
        let mut ctx = CodecContext {
            ccsid: self.ccsid.clone(),
            database: self.database.as_deref(),
            sections: &mut self.sections,
        };
        match codec.encode(&mut ctx) {
            Ok(bytes) => {
                debug!(
                    "submitted {} command, {} bytes, {} ahead in queue",
                    codec.label(),
                    bytes.len(),
                    self.in_flight.len()
                );
                self.outbound.extend_from_slice(&bytes);
                self.in_flight.push_back(InFlight {
                    codec,
                    completion: Some(completion),
                });
            }
            Err(error) => completion(Err(error)),
        }
    }

    /// Feeds inbound bytes. Complete reply chains are dispatched to the
    /// queue-head codec; completion handlers run on this call stack.
    pub fn on_bytes(&mut self, chunk: &[u8]) {
        if self.poisoned {
            trace!("dropping {} bytes on poisoned connection", chunk.len());
            return;
        }
        self.inbound.extend_from_slice(chunk);

        loop {
            let reply_len = match chain_length(&self.inbound) {
                Ok(Some(len)) => len,
                Ok(None) => return,
                Err(error) => {
                    self.poison(error);
                    return;
                }
            };
            let reply: Vec<u8> = self.inbound.drain(..reply_len).collect();
            trace!("dispatching reply chain of {reply_len} bytes");

            let Some(head) = self.in_flight.front_mut() else {
                self.poison(Db2Error::syntax("reply received with no command in flight"));
                return;
            };
            let mut ctx = CodecContext {
                ccsid: self.ccsid.clone(),
                database: self.database.as_deref(),
                sections: &mut self.sections,
            };
            match head.codec.decode(&reply, &mut ctx) {
                Ok(Transition::Complete(outcome)) => {
                    let in_flight = self.in_flight.pop_front().expect("head exists");
                    debug!("{} command complete", in_flight.codec.label());
                    in_flight.complete(Ok(outcome));
                }
                Ok(Transition::SendAndWait(bytes)) => {
                    trace!("command continues with {} more bytes", bytes.len());
                    self.outbound.extend_from_slice(&bytes);
                }
                Err(error) => {
                    let in_flight = self.in_flight.pop_front().expect("head exists");
                    if connection_fatal(&error) {
                        warn!(
                            "{} command failed fatally: {}",
                            in_flight.codec.label(),
                            error
                        );
                        in_flight.complete(Err(error));
                        self.poison(Db2Error::ConnectionClosed);
                        return;
                    }
                    // A server diagnostic consumed its whole reply chain;
                    // later replies still line up with the queue.
                    debug!("{} command failed: {}", in_flight.codec.label(), error);
                    in_flight.complete(Err(error));
                }
            }
        }
    }

    /// Closes the connection: every queued command's callback receives a
    /// connection-closed failure exactly once.
    pub fn close(&mut self) {
        self.poisoned = true;
        self.inbound.clear();
        self.outbound.clear();
        while let Some(in_flight) = self.in_flight.pop_front() {
            in_flight.complete(Err(Db2Error::ConnectionClosed));
        }
    }

    // Framing errors leave the stream position suspect; fail everything
    // still queued and refuse further work.
    fn poison(&mut self, error: Db2Error) {
        warn!("poisoning connection: {error}");
        self.poisoned = true;
        self.inbound.clear();
        while let Some(in_flight) = self.in_flight.pop_front() {
            in_flight.complete(Err(Db2Error::ConnectionClosed));
        }
    }
}

// Server diagnostics fail only their own command; anything that implies a
// corrupted or untrustworthy stream kills the connection.
fn connection_fatal(error: &Db2Error) -> bool {
    !matches!(error, Db2Error::Server { .. } | Db2Error::Usage(_) | Db2Error::UsageDetailed(_))
}
