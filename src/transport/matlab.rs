//! Matlab co-simulation bridge.
//!
//! ## Wire Format
//!
//! Requests are big-endian doubles: `time_token, dac, deac, dec, drc`, optionally
//! followed by `dac_cmp, dec_cmp, drc_cmp` (40 or 64 bytes). Every request
//! becomes one actuator command, answered with the 20-double state vector of
//! [`TelemetrySnapshot::matlab_states`].

use std::net::SocketAddr;

use super::{Datagram, Transport, UdpTransport};
use crate::config::MatlabConfig;
use crate::telemetry::{CommandDeltas, MATLAB_STATE_LEN, TelemetrySnapshot};
use crate::{LinkError, Result};

const SHORT_REQUEST_SIZE: usize = 5 * 8;
const FULL_REQUEST_SIZE: usize = 8 * 8;

/// Size of one reply datagram.
pub const MATLAB_REPLY_SIZE: usize = MATLAB_STATE_LEN * 8;

/// One decoded command request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatlabRequest {
    /// Matlab-side time token, carried into both actuator packets
    pub time_token: u32,
    pub deltas: CommandDeltas,
}

impl MatlabRequest {
    /// Decode a 40- or 64-byte request.
    ///
    /// The time token travels as a double; it is saturated into `u32` (NaN
    /// becomes 0).
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != SHORT_REQUEST_SIZE && data.len() != FULL_REQUEST_SIZE {
            return Err(LinkError::decode_error(
                "Matlab request",
                format!(
                    "expected {SHORT_REQUEST_SIZE} or {FULL_REQUEST_SIZE} bytes, got {}",
                    data.len()
                ),
            ));
        }

        let values: Vec<f64> = data
            .chunks_exact(8)
            .map(|chunk| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(chunk);
                f64::from_be_bytes(bytes)
            })
            .collect();
        let value = |i: usize| values.get(i).copied().unwrap_or(0.0);

        let deltas = CommandDeltas {
            dac: value(1),
            deac: value(2),
            dec: value(3),
            drc: value(4),
            dac_cmp: value(5),
            dec_cmp: value(6),
            drc_cmp: value(7),
        };
        if !deltas.is_finite() {
            return Err(LinkError::decode_error("Matlab request", "non-finite control delta"));
        }

        Ok(Self { time_token: value(0) as u32, deltas })
    }

    pub fn encode(&self) -> Vec<u8> {
        let d = &self.deltas;
        [f64::from(self.time_token), d.dac, d.deac, d.dec, d.drc, d.dac_cmp, d.dec_cmp, d.drc_cmp]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect()
    }
}

/// Encode the reply datagram for a snapshot.
pub fn encode_reply(snapshot: &TelemetrySnapshot) -> Vec<u8> {
    snapshot.matlab_states().iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// Request socket plus reply socket towards the Matlab peer.
pub struct MatlabBridge {
    rx: Box<dyn Transport>,
    tx: Box<dyn Transport>,
    peer: SocketAddr,
}

impl MatlabBridge {
    pub fn new(rx: Box<dyn Transport>, tx: Box<dyn Transport>, peer: SocketAddr) -> Self {
        Self { rx, tx, peer }
    }

    /// Bind both UDP sockets as configured.
    pub async fn bind(config: &MatlabConfig) -> Result<Self> {
        let rx = UdpTransport::bind("matlab rx", config.rx_addr()).await?;
        let tx = UdpTransport::bind("matlab tx", config.tx_bind_addr()).await?;
        Ok(Self::new(Box::new(rx), Box::new(tx), config.peer_addr()))
    }

    pub async fn recv(&mut self) -> Result<Option<Datagram>> {
        self.rx.recv().await
    }

    pub async fn reply(&mut self, snapshot: &TelemetrySnapshot) -> Result<()> {
        self.tx.send_to(&encode_reply(snapshot), self.peer).await
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}
