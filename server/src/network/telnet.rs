//! Telnet IAC handling.
//!
//! Strips command sequences out of the inbound byte stream and works out the
//! replies. The server only ever offers ECHO (while a password is typed) and
//! SGA; a client agreeing to those gets no reply, anything else it asks for
//! is refused.

use mud_shared::telnet::{DO, DONT, ECHO, IAC, SB, SE, SGA, WILL, WONT};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum State {
    #[default]
    Data,
    Iac,
    Negotiate(u8),
    Subneg,
    SubnegIac,
}

/// Incremental IAC stripper. Sequences may be split across reads.
#[derive(Debug, Default)]
pub struct IacParser {
    state: State,
}

impl IacParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a chunk into `(data, replies)`.
    pub fn parse(&mut self, chunk: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::with_capacity(chunk.len());
        let mut replies = Vec::new();

        for &b in chunk {
            self.state = match self.state {
                State::Data if b == IAC => State::Iac,
                State::Data => {
                    data.push(b);
                    State::Data
                }
                State::Iac => match b {
                    IAC => {
                        data.push(IAC);
                        State::Data
                    }
                    DO | DONT | WILL | WONT => State::Negotiate(b),
                    SB => State::Subneg,
                    // NOP, GA, AYT and friends carry nothing for us
                    _ => State::Data,
                },
                State::Negotiate(cmd) => {
                    match cmd {
                        DO if !offered(b) => replies.extend_from_slice(&[IAC, WONT, b]),
                        WILL => replies.extend_from_slice(&[IAC, DONT, b]),
                        _ => {}
                    }
                    State::Data
                }
                State::Subneg if b == IAC => State::SubnegIac,
                State::Subneg => State::Subneg,
                State::SubnegIac if b == SE => State::Data,
                State::SubnegIac => State::Subneg,
            };
        }
        (data, replies)
    }
}

/// Options the server offers itself
fn offered(opt: u8) -> bool {
    opt == ECHO || opt == SGA
}
