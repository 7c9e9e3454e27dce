//! Envelope encoding and decoding.
//!
//! Envelope format: [message_type: u8][payload: bytes]
//!
//! The type id selects the decode function from the role's registry; the
//! payload is whatever that kind's serializer produced. Stream framing (the
//! length prefix) is added by the link, not here.

use crate::error::{EncodeError, MalformedMessage};
use crate::message::{Message, MessageKind};
use crate::registry::MessageRegistry;
use std::fmt;
use std::sync::Arc;

/// An encoded `[type id][payload]` buffer.
///
/// Cloning is cheap, so one encode can be handed to any number of peers.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    bytes: Arc<[u8]>,
}

impl Envelope {
    /// Wrap raw envelope bytes.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Type id of the envelope.
    pub fn type_id(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    /// Payload bytes after the type id.
    pub fn payload(&self) -> &[u8] {
        self.bytes.get(1..).unwrap_or_default()
    }

    /// Entire envelope.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Envelope length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the envelope is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for Envelope {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("type_id", &self.type_id())
            .field("len", &self.len())
            .finish()
    }
}

/// Encoder/decoder for one role's message set.
pub struct EnvelopeCodec<M: Message> {
    registry: Arc<MessageRegistry<M>>,
}

impl<M: Message> Clone for EnvelopeCodec<M> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<M: Message> EnvelopeCodec<M> {
    /// Create a codec over a sealed registry.
    pub fn new(registry: Arc<MessageRegistry<M>>) -> Self {
        Self { registry }
    }

    /// Registry backing this codec.
    pub fn registry(&self) -> &MessageRegistry<M> {
        &self.registry
    }

    /// Encode a message into a self-contained envelope.
    pub fn encode(&self, message: &M) -> Result<Envelope, EncodeError> {
        let kind = message.kind();
        let id = self
            .registry
            .id_for_kind(kind)
            .ok_or(EncodeError::Unregistered {
                role: M::ROLE,
                kind: kind.name(),
            })?;

        let mut buf = Vec::with_capacity(32);
        buf.push(id);
        message
            .write_payload(&mut buf)
            .map_err(|source| EncodeError::Serialize {
                kind: kind.name(),
                source,
            })?;

        Ok(Envelope::from_bytes(buf))
    }

    /// Decode an envelope.
    ///
    /// The decode function registered for the leading id sees exactly the
    /// bytes after it and must consume all of them.
    pub fn decode(&self, data: &[u8]) -> Result<M, MalformedMessage> {
        let (&id, payload) = data
            .split_first()
            .ok_or(MalformedMessage::Empty { role: M::ROLE })?;

        let (kind, decode) = match (self.registry.kind_for(id), self.registry.decoder_for(id)) {
            (Some(kind), Some(decode)) => (kind, decode),
            _ => return Err(MalformedMessage::UnknownId { role: M::ROLE, id }),
        };

        let (message, rest) = decode(payload).map_err(|source| MalformedMessage::Payload {
            role: M::ROLE,
            kind: kind.name(),
            source,
        })?;

        if !rest.is_empty() {
            return Err(MalformedMessage::TrailingBytes {
                role: M::ROLE,
                kind: kind.name(),
                count: rest.len(),
            });
        }

        Ok(message)
    }
}
