//! Addressing strategies for outbound envelopes.
//!
//! Every function takes an already-encoded [`Envelope`], so a broadcast
//! serializes its payload once. A peer whose stream has closed is logged and
//! skipped; it never aborts delivery to the remaining peers.

use crate::codec::{Envelope, EnvelopeCodec};
use crate::error::EncodeError;
use crate::message::{Message, MessageKind};
use crate::peer::{PeerDirectory, PeerHandle, PeerId};
use ccnet_core::{ChunkAddress, DimensionId, WorldPos};
use tracing::{debug, trace};

/// Per-peer outcome of a delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Peers the envelope was queued for.
    pub delivered: Vec<PeerId>,
    /// Addressed peers whose stream was already closed.
    pub disconnected: Vec<PeerId>,
}

impl DeliveryReport {
    /// Number of peers reached.
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    fn record(&mut self, peer: &PeerHandle, envelope: &Envelope) {
        if send_to(peer, envelope) {
            self.delivered.push(peer.id());
        } else {
            self.disconnected.push(peer.id());
        }
    }
}

/// Write an envelope to one peer's outbound stream.
///
/// Returns whether the envelope was queued. A closed stream is logged and
/// swallowed since the peer is gone regardless.
pub fn send_to(peer: &PeerHandle, envelope: &Envelope) -> bool {
    match peer.send(envelope) {
        Ok(()) => {
            trace!(peer = %peer.id(), len = envelope.len(), "queued envelope");
            true
        }
        Err(e) => {
            debug!("Dropping envelope {:?}: {}", envelope.type_id(), e);
            false
        }
    }
}

/// Deliver to every connected peer.
pub fn broadcast_all<D>(directory: &D, envelope: &Envelope) -> DeliveryReport
where
    D: PeerDirectory + ?Sized,
{
    deliver_where(directory, envelope, |_| true)
}

/// Deliver to every peer in `dimension` within `radius` of `origin`.
///
/// Distance is Euclidean and the boundary is inclusive. Peers without a
/// known location are skipped.
pub fn broadcast_radius<D>(
    directory: &D,
    envelope: &Envelope,
    dimension: DimensionId,
    origin: WorldPos,
    radius: f64,
) -> DeliveryReport
where
    D: PeerDirectory + ?Sized,
{
    let radius_sq = radius * radius;
    deliver_where(directory, envelope, |peer| {
        radius >= 0.0
            && directory.location(peer).is_some_and(|loc| {
                loc.dimension == dimension && loc.position.distance_squared(&origin) <= radius_sq
            })
    })
}

/// Deliver to every peer currently tracking `chunk`.
pub fn broadcast_tracking<D>(directory: &D, envelope: &Envelope, chunk: ChunkAddress) -> DeliveryReport
where
    D: PeerDirectory + ?Sized,
{
    deliver_where(directory, envelope, |peer| directory.is_tracking(peer, chunk))
}

fn deliver_where<D, F>(directory: &D, envelope: &Envelope, mut include: F) -> DeliveryReport
where
    D: PeerDirectory + ?Sized,
    F: FnMut(PeerId) -> bool,
{
    let mut report = DeliveryReport::default();
    for peer in directory.peers() {
        if include(peer.id()) {
            report.record(peer, envelope);
        }
    }
    report
}

/// Typed front end over the codec and the addressing functions.
///
/// Each call encodes once and hands the envelope to one addressing strategy.
pub struct Outbound<M: Message> {
    codec: EnvelopeCodec<M>,
}

impl<M: Message> Clone for Outbound<M> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
        }
    }
}

impl<M: Message> Outbound<M> {
    /// Create an outbound front end for messages of `M`.
    pub fn new(codec: EnvelopeCodec<M>) -> Self {
        Self { codec }
    }

    /// Codec used for encoding.
    pub fn codec(&self) -> &EnvelopeCodec<M> {
        &self.codec
    }

    /// Send to a handle directly (e.g. a client's link to its server).
    pub fn send(&self, peer: &PeerHandle, message: &M) -> Result<bool, EncodeError> {
        let envelope = self.codec.encode(message)?;
        Ok(send_to(peer, &envelope))
    }

    /// Send to one peer of a directory. Unknown peers count as disconnected.
    pub fn send_to_peer<D>(
        &self,
        directory: &D,
        peer: PeerId,
        message: &M,
    ) -> Result<bool, EncodeError>
    where
        D: PeerDirectory + ?Sized,
    {
        let envelope = self.codec.encode(message)?;
        match directory.peer(peer) {
            Some(handle) => Ok(send_to(handle, &envelope)),
            None => {
                debug!(%peer, kind = message.kind().name(), "send to unknown peer dropped");
                Ok(false)
            }
        }
    }

    /// Send to every connected peer.
    pub fn send_to_all<D>(&self, directory: &D, message: &M) -> Result<DeliveryReport, EncodeError>
    where
        D: PeerDirectory + ?Sized,
    {
        let envelope = self.codec.encode(message)?;
        Ok(broadcast_all(directory, &envelope))
    }

    /// Send to peers within `radius` of `origin` in `dimension`.
    pub fn send_to_all_around<D>(
        &self,
        directory: &D,
        message: &M,
        dimension: DimensionId,
        origin: WorldPos,
        radius: f64,
    ) -> Result<DeliveryReport, EncodeError>
    where
        D: PeerDirectory + ?Sized,
    {
        let envelope = self.codec.encode(message)?;
        Ok(broadcast_radius(directory, &envelope, dimension, origin, radius))
    }

    /// Send to peers tracking `chunk`.
    pub fn send_to_all_tracking<D>(
        &self,
        directory: &D,
        message: &M,
        chunk: ChunkAddress,
    ) -> Result<DeliveryReport, EncodeError>
    where
        D: PeerDirectory + ?Sized,
    {
        let envelope = self.codec.encode(message)?;
        Ok(broadcast_tracking(directory, &envelope, chunk))
    }
}
