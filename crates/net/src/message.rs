//! The contract every message set fulfils.
//!
//! A message set is a closed sum type: each variant is one message kind
//! carrying its own fields. The registry maps the set's fieldless
//! [`MessageKind`] descriptors to wire ids; no runtime type inspection is
//! involved.

use serde::de::DeserializeOwned;
use std::fmt;
use std::hash::Hash;

/// Which side of the channel receives a message set.
///
/// Each role has its own id space, so the same numeric id may be used by
/// both sets without collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Messages received (and handled) by the server.
    Serverbound,
    /// Messages received (and handled) by clients.
    Clientbound,
}

impl Role {
    /// Stable tag used when hashing the message table.
    pub const fn tag(self) -> u8 {
        match self {
            Role::Serverbound => 0,
            Role::Clientbound => 1,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Serverbound => f.write_str("serverbound"),
            Role::Clientbound => f.write_str("clientbound"),
        }
    }
}

/// Fieldless descriptor naming one variant of a message set.
pub trait MessageKind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Stable name, used in logs and in the schema hash.
    fn name(self) -> &'static str;
}

/// Decode function registered for one id.
///
/// Receives the bytes right after the type id and returns the decoded
/// message plus whatever it did not consume.
pub type DecodeFn<M> = fn(&[u8]) -> Result<(M, &[u8]), postcard::Error>;

/// A closed set of messages received by one role.
pub trait Message: Sized + Send + fmt::Debug + 'static {
    /// Descriptor type of the set's variants.
    type Kind: MessageKind;

    /// Role that receives this set.
    const ROLE: Role;

    /// Every kind in the set; each must be registered before the registry
    /// can be built.
    const KINDS: &'static [Self::Kind];

    /// Kind of this message.
    fn kind(&self) -> Self::Kind;

    /// Append the payload fields (without the type id) to `out`.
    fn write_payload(&self, out: &mut Vec<u8>) -> Result<(), postcard::Error>;

    /// Check size limits of a freshly decoded message.
    fn verify(&self) -> Result<(), &'static str> {
        Ok(())
    }
}

/// Decode a payload struct with postcard and lift it into its message set.
///
/// Instantiations coerce to [`DecodeFn`], e.g.
/// `decode_as::<RequestComputer, ServerboundMessage>`.
pub fn decode_as<T, M>(bytes: &[u8]) -> Result<(M, &[u8]), postcard::Error>
where
    T: DeserializeOwned + Into<M>,
{
    let (payload, rest) = postcard::take_from_bytes::<T>(bytes)?;
    Ok((payload.into(), rest))
}
