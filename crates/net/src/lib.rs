#![warn(missing_docs)]
//! Message dispatch over the `computercraft:main` channel.
//!
//! A closed message set per direction, a sealed id registry, the envelope
//! codec, the hand-off onto the main execution context, and the four
//! addressing strategies for outbound traffic. `transport` and `link` carry
//! envelopes over QUIC.

pub mod codec;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod link;
pub mod message;
pub mod peer;
pub mod protocol;
pub mod registry;
mod transport;

pub use codec::{Envelope, EnvelopeCodec};
pub use delivery::{
    broadcast_all, broadcast_radius, broadcast_tracking, send_to, DeliveryReport, Outbound,
};
pub use dispatch::{main_context, Dispatcher, MainExecutor, MainTask, MainThreadHandler};
pub use error::{
    DispatchUnavailable, EncodeError, MalformedMessage, PeerDisconnected, ReceiveError,
    SetupError,
};
pub use link::{accept_link, connect_link, LinkConfig, LINK_MAGIC};
pub use message::{decode_as, DecodeFn, Message, MessageKind, Role};
pub use peer::{OutboundStream, PeerDirectory, PeerHandle, PeerId, PeerLocation, PeerTable};
pub use protocol::{ClientboundMessage, ProtocolRegistries, ServerboundMessage};
pub use registry::{MessageRegistry, RegistryBuilder};
pub use transport::{ClientEndpoint, ServerEndpoint, ALPN};
