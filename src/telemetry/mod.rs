//! Telemetry pipeline: calibration, conversion, filtering and command synthesis.

pub mod calibration;
pub mod command;
pub mod convert;
pub mod filter;
pub mod snapshot;
pub mod state;

pub use calibration::Calibration;
pub use command::{ActuatorCommand, CommandDeltas};
pub use filter::{Butterworth, ButterworthCoefficients, LowPass, RateChannel};
pub use snapshot::{AxisState, GUI_STATE_LEN, MATLAB_STATE_LEN, TelemetrySnapshot};
pub use state::{DEFAULT_NOTIFY_INTERVAL_US, NullObserver, Observer, TelemetryState};
