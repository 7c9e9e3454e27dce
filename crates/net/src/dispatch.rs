//! Hand-off from I/O tasks to the single main execution context.
//!
//! Any number of I/O tasks hold a [`Dispatcher`] and call
//! [`Dispatcher::on_receive`] concurrently. Decoding happens on the calling
//! task; handling is queued and only ever runs inside [`MainExecutor`], one
//! task at a time.

use crate::codec::EnvelopeCodec;
use crate::error::{DispatchUnavailable, MalformedMessage, ReceiveError};
use crate::message::{Message, MessageKind};
use crate::peer::{PeerHandle, PeerId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, trace};

/// Work item executed on the main context.
#[derive(Debug)]
pub enum MainTask<M> {
    /// A decoded message to handle.
    Message {
        /// Peer whose stream carried the message.
        origin: PeerId,
        /// Decoded message.
        message: M,
    },
    /// A connection completed its hello.
    PeerJoined(PeerHandle),
    /// A connection's inbound stream ended.
    PeerLeft(PeerId),
}

/// Main-context state of one process role.
///
/// Implementations may freely mutate application state: every call happens
/// on the main context, never concurrently with another.
pub trait MainThreadHandler<M: Message> {
    /// React to a decoded message.
    ///
    /// The origin may already have disconnected; deliveries to it are then
    /// dropped.
    fn handle(&mut self, origin: PeerId, message: M);

    /// A peer connected.
    fn peer_joined(&mut self, _peer: PeerHandle) {}

    /// A peer disconnected.
    fn peer_left(&mut self, _peer: PeerId) {}
}

/// Create the main context for role `M`: a dispatcher for I/O tasks and the
/// executor that drains it.
pub fn main_context<M: Message>(codec: EnvelopeCodec<M>) -> (Dispatcher<M>, MainExecutor<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Dispatcher { codec, queue: tx },
        MainExecutor {
            queue: rx,
            executed: 0,
        },
    )
}

/// I/O-side entry point: decodes and enqueues.
pub struct Dispatcher<M: Message> {
    codec: EnvelopeCodec<M>,
    queue: mpsc::UnboundedSender<MainTask<M>>,
}

impl<M: Message> Clone for Dispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            codec: self.codec.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl<M: Message> Dispatcher<M> {
    /// Decode bytes received from `origin` and schedule their handling.
    ///
    /// Never blocks and never runs the handler inline. A
    /// [`ReceiveError::Malformed`] means the origin's framing is broken and
    /// its connection must be closed.
    pub fn on_receive(&self, origin: PeerId, bytes: &[u8]) -> Result<(), ReceiveError> {
        let message = self.codec.decode(bytes)?;
        if let Err(reason) = message.verify() {
            return Err(MalformedMessage::Rejected {
                role: M::ROLE,
                kind: message.kind().name(),
                reason,
            }
            .into());
        }

        trace!(%origin, kind = message.kind().name(), "scheduling message");
        self.schedule(MainTask::Message { origin, message })
            .map_err(|e| {
                debug!(%origin, "Dropping message: {}", e);
                ReceiveError::from(e)
            })
    }

    /// Schedule a connection lifecycle notification.
    pub fn peer_joined(&self, peer: PeerHandle) -> Result<(), DispatchUnavailable> {
        self.schedule(MainTask::PeerJoined(peer))
    }

    /// Schedule a disconnect notification.
    pub fn peer_left(&self, peer: PeerId) -> Result<(), DispatchUnavailable> {
        self.schedule(MainTask::PeerLeft(peer))
    }

    /// Enqueue a task for the main context.
    pub fn schedule(&self, task: MainTask<M>) -> Result<(), DispatchUnavailable> {
        self.queue
            .send(task)
            .map_err(|_| DispatchUnavailable { role: M::ROLE })
    }

    /// Whether the main context still accepts work.
    pub fn is_available(&self) -> bool {
        !self.queue.is_closed()
    }
}

/// Consumer side of the main context.
pub struct MainExecutor<M: Message> {
    queue: mpsc::UnboundedReceiver<MainTask<M>>,
    executed: u64,
}

impl<M: Message> MainExecutor<M> {
    /// Run every task queued so far, one at a time, on the calling thread.
    ///
    /// Returns the number of tasks executed.
    pub fn run_pending<H>(&mut self, handler: &mut H) -> usize
    where
        H: MainThreadHandler<M> + ?Sized,
    {
        let mut count = 0;
        loop {
            match self.queue.try_recv() {
                Ok(task) => {
                    self.execute(handler, task);
                    count += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        count
    }

    /// Run tasks as they arrive until every dispatcher is gone (or the
    /// context was closed and drained).
    pub async fn run<H>(mut self, handler: &mut H) -> u64
    where
        H: MainThreadHandler<M> + ?Sized,
    {
        while let Some(task) = self.queue.recv().await {
            self.execute(handler, task);
        }
        self.executed
    }

    /// Wait until a task is available and run it.
    ///
    /// Returns false once the queue is closed and empty.
    pub async fn run_next<H>(&mut self, handler: &mut H) -> bool
    where
        H: MainThreadHandler<M> + ?Sized,
    {
        match self.queue.recv().await {
            Some(task) => {
                self.execute(handler, task);
                true
            }
            None => false,
        }
    }

    /// Stop accepting new tasks. Already queued tasks can still be drained.
    pub fn close(&mut self) {
        debug!(role = %M::ROLE, "main context closing");
        self.queue.close();
    }

    /// Total tasks executed by this context.
    pub fn executed(&self) -> u64 {
        self.executed
    }

    fn execute<H>(&mut self, handler: &mut H, task: MainTask<M>)
    where
        H: MainThreadHandler<M> + ?Sized,
    {
        self.executed += 1;
        match task {
            MainTask::Message { origin, message } => handler.handle(origin, message),
            MainTask::PeerJoined(peer) => handler.peer_joined(peer),
            MainTask::PeerLeft(peer) => handler.peer_left(peer),
        }
    }
}
