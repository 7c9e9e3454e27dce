//! In-memory peers whose outbound stream is captured instead of sent.

use anyhow::{Context, Result};
use ccnet_net::{
    ClientboundMessage, Envelope, EnvelopeCodec, Message, OutboundStream, PeerHandle, PeerId,
    ProtocolRegistries, ServerboundMessage,
};
use tracing::debug;

/// A peer with no network behind it.
///
/// Everything delivered to [`LoopbackPeer::handle`] queues up in memory and
/// can be read back raw or decoded with the role codec `M`.
pub struct LoopbackPeer<M: Message> {
    handle: PeerHandle,
    outbound: OutboundStream,
    codec: EnvelopeCodec<M>,
}

impl LoopbackPeer<ClientboundMessage> {
    /// A client as seen from the server: captures client-received messages.
    pub fn client(id: u64) -> Result<Self> {
        let registries = ProtocolRegistries::standard().context("standard message tables")?;
        Ok(Self::new(PeerId(id), EnvelopeCodec::new(registries.clientbound)))
    }
}

impl LoopbackPeer<ServerboundMessage> {
    /// The server as seen from a client: captures server-received messages.
    pub fn server(id: u64) -> Result<Self> {
        let registries = ProtocolRegistries::standard().context("standard message tables")?;
        Ok(Self::new(PeerId(id), EnvelopeCodec::new(registries.serverbound)))
    }
}

impl<M: Message> LoopbackPeer<M> {
    /// Create a loopback peer decoding with `codec`.
    pub fn new(id: PeerId, codec: EnvelopeCodec<M>) -> Self {
        let (handle, outbound) = PeerHandle::channel(id);
        Self {
            handle,
            outbound,
            codec,
        }
    }

    /// Peer identity.
    pub fn id(&self) -> PeerId {
        self.handle.id()
    }

    /// A sending handle, e.g. for a `PeerTable` or `peer_joined`.
    pub fn handle(&self) -> PeerHandle {
        self.handle.clone()
    }

    /// Take every envelope delivered so far, in delivery order.
    pub fn take_envelopes(&mut self) -> Vec<Envelope> {
        self.outbound.drain()
    }

    /// Take and decode every envelope delivered so far.
    pub fn take_messages(&mut self) -> Result<Vec<M>> {
        self.take_envelopes()
            .iter()
            .map(|envelope| {
                self.codec
                    .decode(envelope.as_bytes())
                    .with_context(|| format!("decoding {envelope:?} for {}", self.id()))
            })
            .collect()
    }

    /// Take the raw bytes of every envelope delivered so far.
    pub fn take_bytes(&mut self) -> Vec<Vec<u8>> {
        self.take_envelopes()
            .iter()
            .map(|envelope| envelope.as_bytes().to_vec())
            .collect()
    }

    /// Close the captured stream; later deliveries fail as for a dropped
    /// connection.
    pub fn disconnect(&mut self) {
        debug!(peer = %self.id(), "loopback peer disconnected");
        self.outbound.close();
    }
}
