//! Text-frame channel abstraction.
//!
//! A [`Channel`] carries one session's frames in both directions. The runner
//! only sees whole text frames; framing, encryption and stream management
//! belong to the implementation. [`QuinnChannel`](crate::QuinnChannel) is the
//! production implementation and [`MemoryChannel`] drives sessions in tests.

use std::{
    future::Future,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use stackgate_proto::ProtocolError;
use thiserror::Error;
use tokio::sync::mpsc;

/// Channel errors.
///
/// Every variant ends the session. None of them is reported to the client.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Channel was already closed locally.
    #[error("channel closed")]
    Closed,

    /// Underlying stream or connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Peer sent bytes that are not a valid frame.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Duplex text-frame channel for one session.
pub trait Channel: Send {
    /// Send one text frame.
    fn send(&mut self, text: &str) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Receive the next text frame.
    ///
    /// Returns `Ok(None)` once the peer has closed its side.
    fn receive(&mut self) -> impl Future<Output = Result<Option<String>, ChannelError>> + Send;

    /// Flush pending frames and close. Idempotent.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// Address of the peer.
    fn remote_addr(&self) -> SocketAddr;
}

/// In-memory channel for driving sessions without a network.
///
/// Created with [`MemoryChannel::pair`]; the other end is a [`MemoryPeer`]
/// playing the client.
pub struct MemoryChannel {
    remote: SocketAddr,
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    reads: Arc<AtomicUsize>,
}

/// Client side of a [`MemoryChannel`].
pub struct MemoryPeer {
    to_server: Option<mpsc::UnboundedSender<String>>,
    from_server: mpsc::UnboundedReceiver<String>,
    reads: Arc<AtomicUsize>,
}

impl MemoryChannel {
    /// Create a connected channel/peer pair. `remote` is the address the
    /// server side reports for the peer.
    pub fn pair(remote: SocketAddr) -> (Self, MemoryPeer) {
        let (to_server, inbound) = mpsc::unbounded_channel();
        let (outbound, from_server) = mpsc::unbounded_channel();
        let reads = Arc::new(AtomicUsize::new(0));

        let channel = Self { remote, inbound, outbound: Some(outbound), reads: Arc::clone(&reads) };
        let peer = MemoryPeer { to_server: Some(to_server), from_server, reads };

        (channel, peer)
    }
}

impl Channel for MemoryChannel {
    async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        let outbound = self.outbound.as_ref().ok_or(ChannelError::Closed)?;
        outbound
            .send(text.to_string())
            .map_err(|_| ChannelError::Transport("peer dropped".to_string()))
    }

    async fn receive(&mut self) -> Result<Option<String>, ChannelError> {
        if self.outbound.is_none() {
            return Err(ChannelError::Closed);
        }

        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) {
        self.outbound = None;
        self.inbound.close();
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }
}

impl MemoryPeer {
    /// Send a frame to the server side. Frames sent after the server closed
    /// the channel are dropped.
    pub fn send(&self, text: &str) {
        if let Some(tx) = &self.to_server {
            let _ = tx.send(text.to_string());
        }
    }

    /// Next frame from the server, or `None` once the server closed the
    /// channel and every frame has been received.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_server.recv().await
    }

    /// Drain every frame the server has sent so far without waiting.
    pub fn drain(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.from_server.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Close the client side.
    pub fn disconnect(&mut self) {
        self.to_server = None;
    }

    /// Number of times the server side has started a read.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}
