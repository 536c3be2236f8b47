//! In-memory transport backed by tokio channels.
//!
//! Used to drive the Message Center without sockets: the [`ChannelPeer`] plays
//! the remote side, injecting datagrams and collecting what the link sends.

use std::net::SocketAddr;

use tokio::sync::mpsc;

use super::{Datagram, Transport};
use crate::{LinkError, Result};

pub struct ChannelTransport {
    name: &'static str,
    inbound: mpsc::Receiver<Datagram>,
    outbound: mpsc::UnboundedSender<(SocketAddr, Vec<u8>)>,
}

/// Remote end of a [`ChannelTransport`].
pub struct ChannelPeer {
    inbound: mpsc::Sender<Datagram>,
    outbound: mpsc::UnboundedReceiver<(SocketAddr, Vec<u8>)>,
}

impl ChannelTransport {
    pub fn pair(name: &'static str, capacity: usize) -> (Self, ChannelPeer) {
        let (in_tx, in_rx) = mpsc::channel(capacity);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (
            Self { name, inbound: in_rx, outbound: out_tx },
            ChannelPeer { inbound: in_tx, outbound: out_rx },
        )
    }
}

#[async_trait::async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Result<Option<Datagram>> {
        Ok(self.inbound.recv().await)
    }

    async fn send_to(&mut self, data: &[u8], dest: SocketAddr) -> Result<()> {
        self.outbound
            .send((dest, data.to_vec()))
            .map_err(|_| LinkError::ChannelClosed { channel: self.name })
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

impl ChannelPeer {
    /// Deliver a datagram to the link as if it came from `source`.
    pub async fn inject(&self, data: impl Into<Vec<u8>>, source: SocketAddr) -> Result<()> {
        self.inbound
            .send(Datagram { data: data.into(), source })
            .await
            .map_err(|_| LinkError::ChannelClosed { channel: "peer inbound" })
    }

    /// Next datagram the link sent, with its destination.
    pub async fn next_sent(&mut self) -> Option<(SocketAddr, Vec<u8>)> {
        self.outbound.recv().await
    }

    /// Datagram already sent by the link, without waiting.
    pub fn try_next_sent(&mut self) -> Option<(SocketAddr, Vec<u8>)> {
        self.outbound.try_recv().ok()
    }
}
