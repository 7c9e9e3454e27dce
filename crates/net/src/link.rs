//! One QUIC connection carrying the channel.
//!
//! A single bidirectional stream per connection keeps every peer's envelopes
//! in FIFO order. Frame format: `[len: u32 LE][envelope]`.
//!
//! Hello (client to server): `[LINK_MAGIC][schema hash: u64 LE]`, answered
//! by one status byte.

use crate::codec::Envelope;
use crate::dispatch::Dispatcher;
use crate::message::Message;
use crate::peer::{OutboundStream, PeerHandle, PeerId};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, trace, warn};

/// Prefix of the client hello.
pub const LINK_MAGIC: &[u8; 8] = b"CCMAIN\x00\x01";

/// Application close code for a peer that sent a malformed frame.
pub const CLOSE_MALFORMED: u32 = 1;

/// Application close code for a rejected hello.
pub const CLOSE_REJECTED: u32 = 2;

const HELLO_ACCEPTED: u8 = 1;
const HELLO_REJECTED: u8 = 0;

/// Connection tuning, the `[link]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// QUIC keep-alive interval.
    pub keep_alive_secs: u64,
    /// Connection idle timeout.
    pub idle_timeout_secs: u64,
    /// Largest accepted frame.
    pub max_frame_len: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            keep_alive_secs: 5,
            idle_timeout_secs: 30,
            max_frame_len: 1024 * 1024,
        }
    }
}

/// Failure to read a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The length prefix exceeds the configured maximum.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge {
        /// Announced length.
        len: u32,
        /// Configured maximum.
        max: u32,
    },

    /// The stream ended inside a frame.
    #[error("stream ended {missing} bytes short of a complete frame")]
    Truncated {
        /// Bytes still expected when the stream ended.
        missing: usize,
    },

    /// The stream failed mid-frame.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Write one length-prefixed frame.
pub async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(bytes.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too long"))?;
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(bytes).await?;
    trace!("Wrote frame of {} bytes", bytes.len());
    Ok(())
}

/// Read one length-prefixed frame.
///
/// Returns `Ok(None)` when the stream ends at a frame boundary. Ending
/// anywhere else is [`FrameError::Truncated`].
pub async fn read_frame<R>(reader: &mut R, max_len: u32) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(FrameError::Truncated {
                missing: prefix.len() - filled,
            });
        }
        filled += n;
    }

    let len = u32::from_le_bytes(prefix);
    if len > max_len {
        return Err(FrameError::TooLarge { len, max: max_len });
    }

    let mut frame = vec![0u8; len as usize];
    let mut filled = 0;
    while filled < frame.len() {
        let n = reader.read(&mut frame[filled..]).await?;
        if n == 0 {
            return Err(FrameError::Truncated {
                missing: frame.len() - filled,
            });
        }
        filled += n;
    }
    trace!("Read frame of {} bytes", len);
    Ok(Some(frame))
}

/// Write the client hello.
pub async fn write_hello<W>(writer: &mut W, schema_hash: u64) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(LINK_MAGIC).await?;
    writer.write_all(&schema_hash.to_le_bytes()).await
}

/// Read a client hello, returning the schema hash it announces.
pub async fn read_hello<R>(reader: &mut R) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut magic = [0u8; 8];
    reader
        .read_exact(&mut magic)
        .await
        .context("Failed to read hello")?;
    if &magic != LINK_MAGIC {
        bail!("Bad hello magic {:02x?}", magic);
    }

    let mut hash = [0u8; 8];
    reader
        .read_exact(&mut hash)
        .await
        .context("Failed to read schema hash")?;
    Ok(u64::from_le_bytes(hash))
}

/// Complete the server side of a connection.
///
/// Waits for the client's stream and hello, checks the schema hash, then
/// starts the reader and writer tasks. The dispatcher is told about the peer
/// before any of its messages.
#[instrument(skip_all, fields(peer = %peer, remote = %connection.remote_address()))]
pub async fn accept_link<M: Message>(
    connection: quinn::Connection,
    peer: PeerId,
    schema_hash: u64,
    dispatcher: Dispatcher<M>,
    config: &LinkConfig,
) -> Result<PeerHandle> {
    let (mut send, mut recv) = connection
        .accept_bi()
        .await
        .context("Failed to accept channel stream")?;

    let announced = match read_hello(&mut recv).await {
        Ok(hash) => hash,
        Err(e) => {
            warn!("Rejecting hello: {:#}", e);
            connection.close(CLOSE_REJECTED.into(), b"bad hello");
            return Err(e);
        }
    };

    if announced != schema_hash {
        warn!(
            "Schema hash mismatch: client={:016x}, server={:016x}",
            announced, schema_hash
        );
        send.write_all(&[HELLO_REJECTED])
            .await
            .context("Failed to write hello status")?;
        let _ = send.finish();
        // Give the client a moment to read the status before closing.
        let _ = tokio::time::timeout(Duration::from_secs(1), connection.closed()).await;
        connection.close(CLOSE_REJECTED.into(), b"schema mismatch");
        bail!("Schema hash mismatch: {:016x} != {:016x}", announced, schema_hash);
    }

    send.write_all(&[HELLO_ACCEPTED])
        .await
        .context("Failed to write hello status")?;
    info!("Peer linked");

    Ok(start(connection, peer, send, recv, dispatcher, config))
}

/// Complete the client side of a connection.
///
/// `peer` names the server in the client's own dispatcher.
#[instrument(skip_all, fields(peer = %peer, remote = %connection.remote_address()))]
pub async fn connect_link<M: Message>(
    connection: quinn::Connection,
    peer: PeerId,
    schema_hash: u64,
    dispatcher: Dispatcher<M>,
    config: &LinkConfig,
) -> Result<PeerHandle> {
    let (mut send, mut recv) = connection
        .open_bi()
        .await
        .context("Failed to open channel stream")?;

    write_hello(&mut send, schema_hash)
        .await
        .context("Failed to write hello")?;

    let mut status = [0u8; 1];
    recv.read_exact(&mut status)
        .await
        .context("Failed to read hello status")?;
    if status[0] != HELLO_ACCEPTED {
        connection.close(CLOSE_REJECTED.into(), b"rejected");
        bail!("Server rejected hello (schema {:016x})", schema_hash);
    }
    info!("Linked to server");

    Ok(start(connection, peer, send, recv, dispatcher, config))
}

fn start<M: Message>(
    connection: quinn::Connection,
    peer: PeerId,
    send: quinn::SendStream,
    recv: quinn::RecvStream,
    dispatcher: Dispatcher<M>,
    config: &LinkConfig,
) -> PeerHandle {
    let (handle, outbound) = PeerHandle::channel(peer);

    if dispatcher.peer_joined(handle.clone()).is_err() {
        debug!(%peer, "main context gone before peer joined");
    }

    tokio::spawn(write_loop(send, outbound));
    tokio::spawn(read_loop(
        connection,
        peer,
        recv,
        dispatcher,
        config.max_frame_len,
    ));

    handle
}

async fn write_loop(mut send: quinn::SendStream, mut outbound: OutboundStream) {
    let peer = outbound.peer();
    while let Some(envelope) = outbound.recv().await {
        if let Err(e) = write_envelope(&mut send, &envelope).await {
            debug!(%peer, "Writer stopping: {}", e);
            outbound.close();
            return;
        }
    }
    let _ = send.finish();
    debug!(%peer, "Outbound stream finished");
}

async fn write_envelope(send: &mut quinn::SendStream, envelope: &Envelope) -> io::Result<()> {
    write_frame(send, envelope.as_bytes()).await
}

async fn read_loop<M: Message>(
    connection: quinn::Connection,
    peer: PeerId,
    mut recv: quinn::RecvStream,
    dispatcher: Dispatcher<M>,
    max_frame_len: u32,
) {
    loop {
        match read_frame(&mut recv, max_frame_len).await {
            Ok(Some(frame)) => {
                if let Err(e) = dispatcher.on_receive(peer, &frame) {
                    if e.is_connection_fatal() {
                        warn!(%peer, "Closing connection: {}", e);
                        connection.close(CLOSE_MALFORMED.into(), b"malformed message");
                        break;
                    }
                }
            }
            Ok(None) => {
                debug!(%peer, "Inbound stream ended");
                break;
            }
            Err(FrameError::TooLarge { len, max }) => {
                warn!(%peer, "Closing connection: frame of {} bytes exceeds {}", len, max);
                connection.close(CLOSE_MALFORMED.into(), b"frame too large");
                break;
            }
            Err(FrameError::Truncated { missing }) => {
                warn!(%peer, "Closing connection: stream ended {} bytes into a frame", missing);
                connection.close(CLOSE_MALFORMED.into(), b"truncated frame");
                break;
            }
            Err(FrameError::Io(e)) => {
                debug!(%peer, "Inbound stream failed: {}", e);
                break;
            }
        }
    }

    info!(%peer, "Peer disconnected");
    if dispatcher.peer_left(peer).is_err() {
        debug!(%peer, "main context gone before peer left");
    }
}
