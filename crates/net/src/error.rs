//! Error taxonomy of the dispatch core.
//!
//! Setup errors abort startup. Everything else is contained at the
//! dispatcher/delivery boundary and only ever affects the peer it names.

use crate::message::Role;
use crate::peer::PeerId;
use thiserror::Error;

/// Registry misuse detected while building the message table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// Two kinds were registered under the same id in one role.
    #[error("{role} id {id} already registered to {existing}, cannot register {kind}")]
    DuplicateId {
        /// Registry role.
        role: Role,
        /// Contested id.
        id: u8,
        /// Kind already holding the id.
        existing: &'static str,
        /// Kind that was rejected.
        kind: &'static str,
    },

    /// The same kind was registered twice in one role.
    #[error("{role} kind {kind} already registered with id {existing}")]
    DuplicateKind {
        /// Registry role.
        role: Role,
        /// Kind registered twice.
        kind: &'static str,
        /// Id it already holds.
        existing: u8,
    },

    /// A kind of the closed message set never received an id.
    #[error("{role} kind {kind} has no registered id")]
    Unregistered {
        /// Registry role.
        role: Role,
        /// Kind without an id.
        kind: &'static str,
    },
}

/// An inbound envelope that cannot be decoded.
///
/// Framing cannot be resynchronised after this, so the producing connection
/// is closed.
#[derive(Debug, Error)]
pub enum MalformedMessage {
    /// The envelope did not even contain a type id.
    #[error("empty {role} envelope")]
    Empty {
        /// Role the envelope was decoded as.
        role: Role,
    },

    /// The type id is not registered for this role.
    #[error("unknown {role} message id {id}")]
    UnknownId {
        /// Role the envelope was decoded as.
        role: Role,
        /// Id read from the envelope.
        id: u8,
    },

    /// The payload was truncated or garbled.
    #[error("invalid {role} {kind} payload")]
    Payload {
        /// Role the envelope was decoded as.
        role: Role,
        /// Kind selected by the id.
        kind: &'static str,
        /// Underlying decode failure.
        #[source]
        source: postcard::Error,
    },

    /// The payload decoded but left unread bytes behind.
    #[error("{count} trailing bytes after {role} {kind} payload")]
    TrailingBytes {
        /// Role the envelope was decoded as.
        role: Role,
        /// Kind selected by the id.
        kind: &'static str,
        /// Number of unread bytes.
        count: usize,
    },

    /// The payload decoded but violates a size limit.
    #[error("{role} {kind} rejected: {reason}")]
    Rejected {
        /// Role the envelope was decoded as.
        role: Role,
        /// Kind of the rejected message.
        kind: &'static str,
        /// Which limit was violated.
        reason: &'static str,
    },
}

/// Failure to build an outbound envelope.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The kind has no id in this role's registry.
    #[error("{role} kind {kind} is not registered")]
    Unregistered {
        /// Registry role.
        role: Role,
        /// Kind that could not be mapped.
        kind: &'static str,
    },

    /// Payload serialization failed.
    #[error("failed to serialize {kind} payload")]
    Serialize {
        /// Kind being serialized.
        kind: &'static str,
        /// Underlying serializer error.
        #[source]
        source: postcard::Error,
    },
}

/// The main execution context is gone (shutdown or never started).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{role} main context is unavailable")]
pub struct DispatchUnavailable {
    /// Role of the missing context.
    pub role: Role,
}

/// The delivery target's outbound stream is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("peer {peer} disconnected")]
pub struct PeerDisconnected {
    /// Peer that could not be reached.
    pub peer: PeerId,
}

/// Outcome of a failed [`Dispatcher::on_receive`](crate::Dispatcher::on_receive).
#[derive(Debug, Error)]
pub enum ReceiveError {
    /// The bytes could not be decoded; close the connection.
    #[error(transparent)]
    Malformed(#[from] MalformedMessage),

    /// The main context is gone; the message was dropped.
    #[error(transparent)]
    Unavailable(#[from] DispatchUnavailable),
}

impl ReceiveError {
    /// Whether the producing connection must be closed.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, ReceiveError::Malformed(_))
    }
}
