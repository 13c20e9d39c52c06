//! Blocking call/reply client.

use crate::error::ClientError;
use std::io::{Read, Write};
use thriftmw_codec::{pack_args, unpack_results, TypeDesc, Value};
use thriftmw_protocol::{
    ApplicationException, BinaryInputProtocol, BinaryOutputProtocol, InputProtocol,
    MessageIdentifier, MessageType, OutputProtocol, TType,
};

/// Sends calls over a reader/writer pair, one at a time.
pub struct Client<R, W> {
    iprot: BinaryInputProtocol<R>,
    oprot: BinaryOutputProtocol<W>,
    seq_id: i32,
}

impl<R: Read, W: Write> Client<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self::from_protocols(BinaryInputProtocol::new(reader), BinaryOutputProtocol::new(writer))
    }

    pub fn from_protocols(iprot: BinaryInputProtocol<R>, oprot: BinaryOutputProtocol<W>) -> Self {
        Self {
            iprot,
            oprot,
            seq_id: 0,
        }
    }

    /// Calls `name` with positional `args` and decodes one value per
    /// declared result type. Result slots absent from the reply are `Null`.
    pub fn call(
        &mut self,
        name: &str,
        args: &[Value],
        result_types: &[TypeDesc],
    ) -> Result<Vec<Value>, ClientError> {
        self.seq_id = self.seq_id.wrapping_add(1);
        let seq_id = self.seq_id;
        tracing::debug!("Calling {} (seq {})", name, seq_id);

        self.oprot
            .write_message_begin(&MessageIdentifier::new(name, MessageType::Call, seq_id))?;
        pack_args(&format!("{name}_args"), args, &mut self.oprot)?;
        self.oprot.write_message_end()?;
        self.oprot.flush()?;

        let reply = self.iprot.read_message_begin()?;
        if reply.name != name {
            self.discard_reply()?;
            return Err(ClientError::WrongMethodName {
                expected: name.to_string(),
                got: reply.name,
            });
        }
        if reply.sequence_id != seq_id {
            self.discard_reply()?;
            return Err(ClientError::BadSequenceId {
                expected: seq_id,
                got: reply.sequence_id,
            });
        }

        match reply.message_type {
            MessageType::Reply => {
                let results = unpack_results(result_types, &mut self.iprot)?;
                self.iprot.read_message_end()?;
                Ok(results)
            }
            MessageType::Exception => {
                let exc = ApplicationException::read(&mut self.iprot)?;
                self.iprot.read_message_end()?;
                tracing::debug!("{} (seq {}) failed: {}", name, seq_id, exc);
                Err(ClientError::Application(exc))
            }
            other => {
                self.discard_reply()?;
                Err(ClientError::InvalidMessageType(other))
            }
        }
    }

    /// Sequence id of the most recent call.
    pub fn seq_id(&self) -> i32 {
        self.seq_id
    }

    pub fn reader(&self) -> &R {
        self.iprot.get_ref()
    }

    pub fn writer(&self) -> &W {
        self.oprot.get_ref()
    }

    fn discard_reply(&mut self) -> Result<(), ClientError> {
        self.iprot.skip(TType::Struct)?;
        self.iprot.read_message_end()?;
        Ok(())
    }
}
