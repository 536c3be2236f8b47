//! Transport trait for datagram peers.
//!
//! The Message Center talks to the radio and to the Matlab bridge through the
//! same small contract: receive the next datagram, send one to an address. The
//! UDP implementation is what runs against the hardware; the channel
//! implementation lets tests stand in for the boards.

pub mod channel;
pub mod matlab;
pub mod udp;

use std::net::SocketAddr;

use crate::Result;

pub use channel::{ChannelPeer, ChannelTransport};
pub use matlab::{MATLAB_REPLY_SIZE, MatlabBridge, MatlabRequest};
pub use udp::UdpTransport;

/// One received datagram and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub data: Vec<u8>,
    pub source: SocketAddr,
}

/// A datagram endpoint owned by the Message Center.
///
/// `recv` must be cancel safe: the run loop races it against other sources and
/// drops the future of whichever loses.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Wait for the next datagram.
    ///
    /// Returns:
    /// - `Ok(Some(datagram))` - data arrived
    /// - `Ok(None)` - the transport is closed for good
    /// - `Err(e)` - transient receive failure; the caller may keep polling
    async fn recv(&mut self) -> Result<Option<Datagram>>;

    /// Send one datagram. Best effort: no acknowledgement, no retransmission.
    async fn send_to(&mut self, data: &[u8], dest: SocketAddr) -> Result<()>;

    /// Short name used in logs and error context.
    fn name(&self) -> &'static str;
}
