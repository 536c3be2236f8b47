//! UDP transport over tokio sockets.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::debug;

use super::{Datagram, Transport};
use crate::{LinkError, Result};

/// Largest UDP payload over IPv4, so `recv_from` never truncates.
const MAX_DATAGRAM: usize = 65_507;

pub struct UdpTransport {
    name: &'static str,
    socket: UdpSocket,
    buffer: Box<[u8]>,
}

impl UdpTransport {
    pub async fn bind(name: &'static str, addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| LinkError::transport_error(format!("{name} bind {addr}"), e))?;
        debug!(transport = name, local = ?socket.local_addr().ok(), "UDP transport bound");
        Ok(Self { name, socket, buffer: vec![0; MAX_DATAGRAM].into_boxed_slice() })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(|e| LinkError::transport_error(self.name, e))
    }
}

#[async_trait::async_trait]
impl Transport for UdpTransport {
    async fn recv(&mut self) -> Result<Option<Datagram>> {
        let (len, source) = self
            .socket
            .recv_from(&mut self.buffer[..])
            .await
            .map_err(|e| LinkError::transport_error(self.name, e))?;
        Ok(Some(Datagram { data: self.buffer[..len].to_vec(), source }))
    }

    async fn send_to(&mut self, data: &[u8], dest: SocketAddr) -> Result<()> {
        self.socket
            .send_to(data, dest)
            .await
            .map_err(|e| LinkError::transport_error(format!("{} -> {dest}", self.name), e))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loopback_datagram_roundtrip() {
        let localhost: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let mut a = UdpTransport::bind("a", localhost).await.unwrap();
        let mut b = UdpTransport::bind("b", localhost).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send_to(&[0x9E, 1, 2, 3], b_addr).await.unwrap();
        let datagram = b.recv().await.unwrap().unwrap();

        assert_eq!(datagram.data, vec![0x9E, 1, 2, 3]);
        assert_eq!(datagram.source, a.local_addr().unwrap());
    }

    #[tokio::test]
    async fn large_datagrams_arrive_whole() {
        let localhost: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let mut a = UdpTransport::bind("a", localhost).await.unwrap();
        let mut b = UdpTransport::bind("b", localhost).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        let payload: Vec<u8> = (0..9000u32).map(|i| i as u8).collect();
        a.send_to(&payload, b_addr).await.unwrap();
        let datagram = b.recv().await.unwrap().unwrap();

        assert_eq!(datagram.data.len(), payload.len());
        assert_eq!(datagram.data, payload);
    }

    #[tokio::test]
    async fn bind_failure_is_transport_error() {
        let localhost: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let first = UdpTransport::bind("first", localhost).await.unwrap();
        let taken = first.local_addr().unwrap();

        let err = UdpTransport::bind("second", taken).await.err().unwrap();
        assert!(matches!(err, LinkError::Transport { .. }));
        assert!(err.is_retryable());
    }
}
