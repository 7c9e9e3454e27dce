//! Connected peers and the directory the delivery layer queries.

use crate::codec::Envelope;
use crate::error::PeerDisconnected;
use ccnet_core::{ChunkAddress, ChunkPos, DimensionId, WorldPos};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tokio::sync::mpsc;

/// Identity of a connection, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Sending half of a peer's outbound stream.
///
/// Handles are cheap to clone; every clone writes into the same FIFO stream.
#[derive(Clone)]
pub struct PeerHandle {
    id: PeerId,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl PeerHandle {
    /// Create a handle and the outbound stream it writes into.
    pub fn channel(id: PeerId) -> (PeerHandle, OutboundStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            PeerHandle { id, outbound: tx },
            OutboundStream { id, queue: rx },
        )
    }

    /// Peer identity.
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Append an envelope to the peer's outbound stream.
    pub fn send(&self, envelope: &Envelope) -> Result<(), PeerDisconnected> {
        self.outbound
            .send(envelope.clone())
            .map_err(|_| PeerDisconnected { peer: self.id })
    }

    /// Whether the outbound stream is still open.
    pub fn is_connected(&self) -> bool {
        !self.outbound.is_closed()
    }
}

impl fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerHandle")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Receiving half of a peer's outbound stream, drained by the transport.
#[derive(Debug)]
pub struct OutboundStream {
    id: PeerId,
    queue: mpsc::UnboundedReceiver<Envelope>,
}

impl OutboundStream {
    /// Peer this stream belongs to.
    pub fn peer(&self) -> PeerId {
        self.id
    }

    /// Wait for the next envelope; `None` once every handle is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.queue.recv().await
    }

    /// Take the next envelope if one is already queued.
    pub fn try_next(&mut self) -> Option<Envelope> {
        self.queue.try_recv().ok()
    }

    /// Take every envelope currently queued.
    pub fn drain(&mut self) -> Vec<Envelope> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Close the stream; further sends fail with [`PeerDisconnected`].
    pub fn close(&mut self) {
        self.queue.close();
    }
}

/// Where a peer currently is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerLocation {
    /// Dimension the peer is in.
    pub dimension: DimensionId,
    /// Position within the dimension.
    pub position: WorldPos,
}

impl PeerLocation {
    /// Create a new location.
    pub fn new(dimension: DimensionId, position: WorldPos) -> Self {
        Self {
            dimension,
            position,
        }
    }

    /// Chunk the peer stands in.
    pub fn chunk(&self) -> ChunkAddress {
        ChunkAddress::of(self.dimension, &self.position)
    }
}

/// Query surface over the connected peers of a process.
///
/// The delivery layer only reads through this trait; ownership of peers
/// stays with whoever maintains the directory.
pub trait PeerDirectory {
    /// Every connected peer.
    fn peers(&self) -> Box<dyn Iterator<Item = &PeerHandle> + '_>;

    /// A specific peer.
    fn peer(&self, id: PeerId) -> Option<&PeerHandle>;

    /// Current location of a peer, if known.
    fn location(&self, id: PeerId) -> Option<PeerLocation>;

    /// Whether a peer is subscribed to updates about `chunk`.
    fn is_tracking(&self, id: PeerId, chunk: ChunkAddress) -> bool;
}

struct PeerRecord {
    handle: PeerHandle,
    location: Option<PeerLocation>,
    tracked: BTreeSet<ChunkAddress>,
}

/// In-memory peer directory with location and chunk-interest tracking.
///
/// Uses BTreeMap/BTreeSet for deterministic iteration order.
#[derive(Default)]
pub struct PeerTable {
    records: BTreeMap<PeerId, PeerRecord>,
}

impl PeerTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer; replaces any previous record with the same id.
    pub fn insert(&mut self, handle: PeerHandle) {
        self.records.insert(
            handle.id(),
            PeerRecord {
                handle,
                location: None,
                tracked: BTreeSet::new(),
            },
        );
    }

    /// Remove a peer, returning its handle.
    pub fn remove(&mut self, id: PeerId) -> Option<PeerHandle> {
        self.records.remove(&id).map(|record| record.handle)
    }

    /// Whether `id` is in the table.
    pub fn contains(&self, id: PeerId) -> bool {
        self.records.contains_key(&id)
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record a peer's location. Returns false for unknown peers.
    pub fn set_location(&mut self, id: PeerId, location: PeerLocation) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.location = Some(location);
                true
            }
            None => false,
        }
    }

    /// Subscribe a peer to a chunk.
    pub fn track(&mut self, id: PeerId, chunk: ChunkAddress) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => record.tracked.insert(chunk),
            None => false,
        }
    }

    /// Unsubscribe a peer from a chunk.
    pub fn untrack(&mut self, id: PeerId, chunk: ChunkAddress) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => record.tracked.remove(&chunk),
            None => false,
        }
    }

    /// Replace a peer's subscriptions with every chunk within
    /// `view_distance` (Chebyshev, in chunks) of its current location.
    ///
    /// Peers without a location end up tracking nothing.
    pub fn update_interest(&mut self, id: PeerId, view_distance: u32) {
        let Some(record) = self.records.get_mut(&id) else {
            return;
        };
        record.tracked.clear();

        let Some(location) = record.location else {
            return;
        };
        let centre = location.position.chunk();
        let radius = view_distance.min(i32::MAX as u32) as i32;
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                let chunk = ChunkPos::new(centre.x.saturating_add(dx), centre.z.saturating_add(dz));
                record
                    .tracked
                    .insert(ChunkAddress::new(location.dimension, chunk));
            }
        }
    }

    /// Number of chunks a peer tracks.
    pub fn tracked_count(&self, id: PeerId) -> usize {
        self.records
            .get(&id)
            .map_or(0, |record| record.tracked.len())
    }
}

impl PeerDirectory for PeerTable {
    fn peers(&self) -> Box<dyn Iterator<Item = &PeerHandle> + '_> {
        Box::new(self.records.values().map(|record| &record.handle))
    }

    fn peer(&self, id: PeerId) -> Option<&PeerHandle> {
        self.records.get(&id).map(|record| &record.handle)
    }

    fn location(&self, id: PeerId) -> Option<PeerLocation> {
        self.records.get(&id).and_then(|record| record.location)
    }

    fn is_tracking(&self, id: PeerId, chunk: ChunkAddress) -> bool {
        self.records
            .get(&id)
            .is_some_and(|record| record.tracked.contains(&chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_stream_reports_disconnect() {
        let (handle, mut stream) = PeerHandle::channel(PeerId(1));
        assert!(handle.is_connected());
        stream.close();
        assert!(!handle.is_connected());
        let err = handle.send(&Envelope::from_bytes(vec![1u8])).unwrap_err();
        assert_eq!(err.peer, PeerId(1));
    }

    #[test]
    fn outbound_stream_is_fifo() {
        let (handle, mut stream) = PeerHandle::channel(PeerId(1));
        for id in 0..5u8 {
            handle.send(&Envelope::from_bytes(vec![id])).unwrap();
        }
        let ids: Vec<_> = stream.drain().iter().filter_map(Envelope::type_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn interest_follows_location() {
        let mut table = PeerTable::new();
        let (handle, _stream) = PeerHandle::channel(PeerId(3));
        table.insert(handle);

        table.update_interest(PeerId(3), 2);
        assert_eq!(table.tracked_count(PeerId(3)), 0);

        table.set_location(
            PeerId(3),
            PeerLocation::new(DimensionId::NETHER, WorldPos::new(8.0, 70.0, -8.0)),
        );
        table.update_interest(PeerId(3), 1);
        assert_eq!(table.tracked_count(PeerId(3)), 9);

        let here = ChunkAddress::new(DimensionId::NETHER, ChunkPos::new(0, -1));
        let edge = ChunkAddress::new(DimensionId::NETHER, ChunkPos::new(1, 0));
        let far = ChunkAddress::new(DimensionId::NETHER, ChunkPos::new(2, -1));
        let other_dim = ChunkAddress::new(DimensionId::OVERWORLD, ChunkPos::new(0, -1));
        assert!(table.is_tracking(PeerId(3), here));
        assert!(table.is_tracking(PeerId(3), edge));
        assert!(!table.is_tracking(PeerId(3), far));
        assert!(!table.is_tracking(PeerId(3), other_dim));
    }

    #[test]
    fn removed_peer_leaves_directory() {
        let mut table = PeerTable::new();
        let (handle, _stream) = PeerHandle::channel(PeerId(9));
        table.insert(handle);
        assert!(table.peer(PeerId(9)).is_some());
        assert!(table.remove(PeerId(9)).is_some());
        assert!(table.peer(PeerId(9)).is_none());
        assert!(!table.set_location(PeerId(9), PeerLocation::new(DimensionId::END, WorldPos::default())));
    }
}
