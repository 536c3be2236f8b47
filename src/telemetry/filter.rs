//! Low-pass filtering and rate estimation for tracked channels.
//!
//! Each tracked quantity owns one [`RateChannel`], which in turn owns one
//! persistent low-pass filter. The filter's output is its own memory: the
//! previous filtered value is never recomputed from raw history.

use serde::{Deserialize, Serialize};

/// A stateful scalar smoothing operator.
pub trait LowPass: Send {
    /// Feed one sample and return the filtered value.
    fn update(&mut self, sample: f64) -> f64;
}

/// State-space coefficients of a second-order low-pass filter.
///
/// `state` holds `[A | B]` (two rows of `x0, x1, u`), `output` holds `[C | D]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ButterworthCoefficients {
    pub state: [[f64; 3]; 2],
    pub output: [f64; 3],
}

impl ButterworthCoefficients {
    /// 10 Hz cutoff at a 100 Hz sample rate, as run on the servo boards.
    pub const TEN_HZ_AT_100HZ: Self = Self {
        state: [[0.2779, -0.4152, 0.5872], [0.4152, 0.8651, 0.1908]],
        output: [0.1468, 0.6594, 0.0675],
    };
}

impl Default for ButterworthCoefficients {
    fn default() -> Self {
        Self::TEN_HZ_AT_100HZ
    }
}

/// Second-order Butterworth low-pass in state-space form.
///
/// The state advances first; the output combines the new state with the
/// current input.
#[derive(Debug, Clone)]
pub struct Butterworth {
    coefficients: ButterworthCoefficients,
    state: [f64; 2],
}

impl Butterworth {
    pub fn new(coefficients: ButterworthCoefficients) -> Self {
        Self { coefficients, state: [0.0; 2] }
    }
}

impl LowPass for Butterworth {
    fn update(&mut self, sample: f64) -> f64 {
        let [x0, x1] = self.state;
        let [a0, a1] = self.coefficients.state;
        self.state = [
            a0[0] * x0 + a0[1] * x1 + a0[2] * sample,
            a1[0] * x0 + a1[1] * x1 + a1[2] * sample,
        ];
        let c = self.coefficients.output;
        c[0] * self.state[0] + c[1] * self.state[1] + c[2] * sample
    }
}

/// One tracked physical quantity: calibrated value, filtered value and rate.
#[derive(Debug, Clone)]
pub struct RateChannel<F = Butterworth> {
    filter: F,
    value: f64,
    filtered: f64,
    rate: f64,
    rate_valid: bool,
    primed: bool,
}

impl RateChannel<Butterworth> {
    pub fn butterworth(coefficients: ButterworthCoefficients) -> Self {
        Self::new(Butterworth::new(coefficients))
    }
}

impl<F: LowPass> RateChannel<F> {
    pub fn new(filter: F) -> Self {
        Self { filter, value: 0.0, filtered: 0.0, rate: 0.0, rate_valid: false, primed: false }
    }

    /// Feed one calibrated sample taken `dt` seconds after the previous one.
    ///
    /// Returns `(filtered, rate)`. The first sample yields rate 0 and leaves the
    /// rate flagged invalid. A non-positive or non-finite `dt` (duplicate or
    /// reset timestamp) holds the previous rate while the filter still advances.
    pub fn update(&mut self, sample: f64, dt: f64) -> (f64, f64) {
        let filtered = self.filter.update(sample);

        if !self.primed {
            self.primed = true;
            self.rate = 0.0;
        } else if dt.is_finite() && dt > 0.0 {
            self.rate = (filtered - self.filtered) / dt;
            self.rate_valid = true;
        }

        self.value = sample;
        self.filtered = filtered;
        (filtered, self.rate)
    }

    /// Last calibrated (unfiltered) sample.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn filtered(&self) -> f64 {
        self.filtered
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Whether [`rate`](Self::rate) came from two samples with a usable `dt`.
    pub fn rate_valid(&self) -> bool {
        self.rate_valid
    }
}
