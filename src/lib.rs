//! Ground-station telemetry link for flight-in-wind-tunnel rigs.
//!
//! groundlink receives sensor frames from the rig and model boards over the
//! radio, turns them into calibrated, filtered and differentiated quantities,
//! and sends actuator setpoints back, while mirroring state to an operator
//! interface and a Matlab co-simulation peer and recording every raw frame.
//!
//! # Features
//!
//! - **Framing**: byte-stuffed, timestamped multi-record radio buffers
//! - **Telemetry**: encoder unwrap, IMU decoding, Butterworth smoothing and rates
//! - **Dispatch**: one processing task owns all state; operator commands are
//!   parsed on the side and can never stall the radio
//! - **Flight record**: append-only raw log with offline replay
//!
//! ## Example
//!
//! ```rust,no_run
//! use groundlink::{GroundLink, GuiMessage, LinkConfig};
//!
//! #[tokio::main]
//! async fn main() -> groundlink::Result<()> {
//!     let config = LinkConfig::from_path("groundlink.yaml")?;
//!     let mut link = GroundLink::connect(config).await?;
//!     groundlink::logging::init("info", Some(link.operator_log_sink()))?;
//!
//!     link.start().await?;
//!     while let Some(message) = link.recv_gui().await {
//!         if let GuiMessage::ExpData { states } = message {
//!             println!("rig roll: {:.2}", states[13]);
//!         }
//!     }
//!     link.join().await
//! }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

pub mod clock;
pub mod config;
pub mod logging;

// Wire formats and the telemetry pipeline
pub mod framing;
pub mod recorder;
pub mod telemetry;

// Transports and the run loop
pub mod center;
pub mod transport;

// Core exports
pub use error::*;

pub use center::{GroundLink, GuiMessage, LinkHandle, LoopPhase, MessageCenter, OperatorCommand};
pub use clock::LinkClock;
pub use config::LinkConfig;
pub use framing::{Batch, Frame, SensorRecord, pack, packs, unpack};
pub use recorder::{FrameRecorder, LogReader};
pub use telemetry::{Calibration, CommandDeltas, TelemetrySnapshot, TelemetryState};
pub use transport::{Datagram, MatlabBridge, Transport, UdpTransport};
