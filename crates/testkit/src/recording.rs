//! A main-context handler that only records.

use ccnet_net::{MainThreadHandler, Message, PeerHandle, PeerId};

/// One task observed on the main context.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded<M> {
    /// A message was handled.
    Message(PeerId, M),
    /// A peer joined.
    Joined(PeerId),
    /// A peer left.
    Left(PeerId),
}

/// Handler that records every task in execution order.
#[derive(Debug)]
pub struct RecordingHandler<M> {
    log: Vec<Recorded<M>>,
    peers: Vec<PeerHandle>,
}

impl<M> Default for RecordingHandler<M> {
    fn default() -> Self {
        Self {
            log: Vec::new(),
            peers: Vec::new(),
        }
    }
}

impl<M: Message> RecordingHandler<M> {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    pub fn log(&self) -> &[Recorded<M>] {
        &self.log
    }

    /// Handled messages with their origin.
    pub fn messages(&self) -> impl Iterator<Item = (PeerId, &M)> + '_ {
        self.log.iter().filter_map(|entry| match entry {
            Recorded::Message(origin, message) => Some((*origin, message)),
            _ => None,
        })
    }

    /// Number of handled messages.
    pub fn message_count(&self) -> usize {
        self.messages().count()
    }

    /// Handles of peers that joined and have not left.
    pub fn connected(&self) -> &[PeerHandle] {
        &self.peers
    }
}

impl<M: Message> MainThreadHandler<M> for RecordingHandler<M> {
    fn handle(&mut self, origin: PeerId, message: M) {
        self.log.push(Recorded::Message(origin, message));
    }

    fn peer_joined(&mut self, peer: PeerHandle) {
        self.log.push(Recorded::Joined(peer.id()));
        self.peers.push(peer);
    }

    fn peer_left(&mut self, peer: PeerId) {
        self.log.push(Recorded::Left(peer));
        self.peers.retain(|handle| handle.id() != peer);
    }
}
