//! Two-way mapping between message kinds and wire ids.
//!
//! A registry is assembled once with [`RegistryBuilder`] and sealed by
//! [`RegistryBuilder::build`]. The sealed [`MessageRegistry`] has no mutating
//! methods, so it can be shared behind an `Arc` by every I/O task without
//! locking.

use crate::error::SetupError;
use crate::message::{DecodeFn, Message, MessageKind, Role};
use std::collections::HashMap;
use std::fmt;

/// One row of a registration table: `(id, kind, decode)`.
pub type Registration<M> = (u8, <M as Message>::Kind, DecodeFn<M>);

/// Mutable registration phase of a [`MessageRegistry`].
pub struct RegistryBuilder<M: Message> {
    decoders: Vec<Option<(M::Kind, DecodeFn<M>)>>,
    ids: HashMap<M::Kind, u8>,
}

impl<M: Message> RegistryBuilder<M> {
    /// Start an empty registry for `M::ROLE`.
    pub fn new() -> Self {
        Self {
            decoders: vec![None; 256],
            ids: HashMap::new(),
        }
    }

    /// Register `kind` under `id`.
    ///
    /// Returns the id on success. Reusing an id or a kind within the role is
    /// a [`SetupError`].
    pub fn register(
        &mut self,
        id: u8,
        kind: M::Kind,
        decode: DecodeFn<M>,
    ) -> Result<u8, SetupError> {
        if let Some((existing, _)) = self.decoders[usize::from(id)] {
            return Err(SetupError::DuplicateId {
                role: M::ROLE,
                id,
                existing: existing.name(),
                kind: kind.name(),
            });
        }
        if let Some(&existing) = self.ids.get(&kind) {
            return Err(SetupError::DuplicateKind {
                role: M::ROLE,
                kind: kind.name(),
                existing,
            });
        }

        self.decoders[usize::from(id)] = Some((kind, decode));
        self.ids.insert(kind, id);
        Ok(id)
    }

    /// Seal the registry.
    ///
    /// Every kind in `M::KINDS` must have been registered, which guarantees
    /// that encoding a message of the set can never hit an unknown kind.
    pub fn build(self) -> Result<MessageRegistry<M>, SetupError> {
        if let Some(missing) = M::KINDS.iter().find(|kind| !self.ids.contains_key(kind)) {
            return Err(SetupError::Unregistered {
                role: M::ROLE,
                kind: missing.name(),
            });
        }

        Ok(MessageRegistry {
            decoders: self.decoders.into_boxed_slice(),
            ids: self.ids,
        })
    }
}

impl<M: Message> Default for RegistryBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sealed, read-only message table for one role.
pub struct MessageRegistry<M: Message> {
    decoders: Box<[Option<(M::Kind, DecodeFn<M>)>]>,
    ids: HashMap<M::Kind, u8>,
}

impl<M: Message> MessageRegistry<M> {
    /// Build a registry from an ordered registration table.
    pub fn from_table(table: &[Registration<M>]) -> Result<Self, SetupError> {
        let mut builder = RegistryBuilder::new();
        for &(id, kind, decode) in table {
            builder.register(id, kind, decode)?;
        }
        builder.build()
    }

    /// Role this registry serves.
    pub fn role(&self) -> Role {
        M::ROLE
    }

    /// Wire id of `message`'s kind.
    pub fn id_for(&self, message: &M) -> Option<u8> {
        self.id_for_kind(message.kind())
    }

    /// Wire id of `kind`.
    pub fn id_for_kind(&self, kind: M::Kind) -> Option<u8> {
        self.ids.get(&kind).copied()
    }

    /// Decode function registered under `id`.
    pub fn decoder_for(&self, id: u8) -> Option<DecodeFn<M>> {
        self.decoders[usize::from(id)].map(|(_, decode)| decode)
    }

    /// Kind registered under `id`.
    pub fn kind_for(&self, id: u8) -> Option<M::Kind> {
        self.decoders[usize::from(id)].map(|(kind, _)| kind)
    }

    /// Registered `(id, kind)` pairs in ascending id order.
    pub fn entries(&self) -> impl Iterator<Item = (u8, M::Kind)> + '_ {
        self.decoders
            .iter()
            .enumerate()
            .filter_map(|(id, entry)| entry.map(|(kind, _)| (id as u8, kind)))
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Feed the table into a schema hasher.
    pub(crate) fn hash_into(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&[M::ROLE.tag()]);
        for (id, kind) in self.entries() {
            hasher.update(&[id]);
            hasher.update(kind.name().as_bytes());
            hasher.update(&[0]);
        }
    }
}

impl<M: Message> fmt::Debug for MessageRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries().map(|(id, kind)| (id, kind.name())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::decode_as;
    use crate::protocol::{
        ComputerAction, RequestComputer, ServerboundKind, ServerboundMessage,
    };

    #[test]
    fn duplicate_id_is_setup_error() {
        let mut builder = RegistryBuilder::<ServerboundMessage>::new();
        builder
            .register(
                2,
                ServerboundKind::RequestComputer,
                decode_as::<RequestComputer, _>,
            )
            .expect("first registration");

        let err = builder
            .register(
                2,
                ServerboundKind::ComputerAction,
                decode_as::<ComputerAction, _>,
            )
            .unwrap_err();
        assert_eq!(
            err,
            SetupError::DuplicateId {
                role: Role::Serverbound,
                id: 2,
                existing: "RequestComputer",
                kind: "ComputerAction",
            }
        );
    }

    #[test]
    fn duplicate_kind_is_setup_error() {
        let mut builder = RegistryBuilder::<ServerboundMessage>::new();
        builder
            .register(
                2,
                ServerboundKind::RequestComputer,
                decode_as::<RequestComputer, _>,
            )
            .unwrap();
        let err = builder
            .register(
                9,
                ServerboundKind::RequestComputer,
                decode_as::<RequestComputer, _>,
            )
            .unwrap_err();
        assert!(matches!(err, SetupError::DuplicateKind { existing: 2, .. }));
    }

    #[test]
    fn build_rejects_incomplete_table() {
        let mut builder = RegistryBuilder::<ServerboundMessage>::new();
        builder
            .register(
                2,
                ServerboundKind::RequestComputer,
                decode_as::<RequestComputer, _>,
            )
            .unwrap();
        assert!(matches!(
            builder.build(),
            Err(SetupError::Unregistered { .. })
        ));
    }

    #[test]
    fn lookups_are_two_way() {
        let registry = crate::protocol::serverbound_registry().expect("standard table");
        assert_eq!(registry.role(), Role::Serverbound);
        assert_eq!(
            registry.id_for(&ServerboundMessage::RequestComputer(RequestComputer {})),
            Some(2)
        );
        assert_eq!(
            registry.kind_for(2),
            Some(ServerboundKind::RequestComputer)
        );
        assert!(registry.decoder_for(2).is_some());
        assert!(registry.decoder_for(200).is_none());
        assert_eq!(registry.len(), ServerboundMessage::KINDS.len());
    }
}
