//! Delay-locked loop that smooths MIDI clock tick times into a stable
//! period estimate.

use log::warn;
use std::f64::consts::{PI, SQRT_2};

/// Default loop bandwidth in 1/Hz.
pub const DEFAULT_BANDWIDTH: f64 = 6.0;
pub const MIN_BANDWIDTH: f64 = 0.1;
pub const MAX_BANDWIDTH: f64 = 100.0;

/// Returns `bandwidth` if it lies in `[MIN_BANDWIDTH, MAX_BANDWIDTH]`,
/// otherwise warns and returns the default.
pub fn sanitize_bandwidth(bandwidth: f64) -> f64 {
    if (MIN_BANDWIDTH..=MAX_BANDWIDTH).contains(&bandwidth) {
        bandwidth
    } else {
        warn!(
            "Invalid bandwidth {}, should be {} <= bw <= {}. Using {}",
            bandwidth, MIN_BANDWIDTH, MAX_BANDWIDTH, DEFAULT_BANDWIDTH
        );
        DEFAULT_BANDWIDTH
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockFilterState {
    /// time of the current tick [s]
    pub t0: f64,
    /// expected time of the next tick [s]
    pub t1: f64,
    /// second order loop error, converges to the period
    pub e2: f64,
    pub b: f64,
    pub c: f64,
}

/// Second order DLL. Tracks both phase (`t1`) and period (`e2`) of a tick
/// stream, so the estimate converges critically damped under jitter.
#[derive(Debug, Clone)]
pub struct ClockFilter {
    bandwidth: f64,
    state: Option<ClockFilterState>,
}

impl Default for ClockFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BANDWIDTH)
    }
}

impl ClockFilter {
    pub fn new(bandwidth: f64) -> Self {
        Self {
            bandwidth: sanitize_bandwidth(bandwidth),
            state: None,
        }
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn state(&self) -> Option<&ClockFilterState> {
        self.state.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Drops the loop state; `advance` yields nothing until the next
    /// `initialize`.
    pub fn reset(&mut self) {
        self.state = None;
    }

    /// Establishes a new reference point: a tick at `time` seconds with the
    /// given expected `period` in seconds.
    pub fn initialize(&mut self, time: f64, period: f64) {
        let omega = 2.0 * PI * period / self.bandwidth;
        self.state = Some(ClockFilterState {
            t0: time,
            t1: time + period,
            e2: period,
            b: SQRT_2 * omega,
            c: omega * omega,
        });
    }

    /// Runs one loop iteration for a tick observed at `time` seconds and
    /// returns the smoothed period in seconds.
    pub fn advance(&mut self, time: f64) -> Option<f64> {
        let dll = self.state.as_mut()?;
        let e = time - dll.t1;
        dll.t0 = dll.t1;
        dll.t1 += dll.b * e + dll.e2;
        dll.e2 += dll.c * e;
        Some(dll.t1 - dll.t0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_out_of_range_bandwidth_falls_back() {
        assert_eq!(ClockFilter::new(0.0).bandwidth(), DEFAULT_BANDWIDTH);
        assert_eq!(ClockFilter::new(-3.0).bandwidth(), DEFAULT_BANDWIDTH);
        assert_eq!(ClockFilter::new(250.0).bandwidth(), DEFAULT_BANDWIDTH);
        assert_eq!(ClockFilter::new(f64::NAN).bandwidth(), DEFAULT_BANDWIDTH);
        assert_eq!(ClockFilter::new(0.1).bandwidth(), 0.1);
        assert_eq!(ClockFilter::new(100.0).bandwidth(), 100.0);
    }

    #[test]
    fn test_uninitialized_filter_yields_nothing() {
        let mut dll = ClockFilter::default();
        assert_eq!(dll.advance(1.0), None);
    }

    #[test]
    fn test_coefficients() {
        let mut dll = ClockFilter::new(6.0);
        dll.initialize(1.0, 0.02);
        let state = dll.state().unwrap();
        let omega = 2.0 * PI * 0.02 / 6.0;
        assert_relative_eq!(state.b, SQRT_2 * omega);
        assert_relative_eq!(state.c, omega * omega);
        assert_relative_eq!(state.t1, 1.02);
    }

    #[test]
    fn test_exact_period_without_jitter() {
        let period = 0.020_833;
        let mut dll = ClockFilter::default();
        dll.initialize(0.0, period);
        for n in 1..10 {
            let smoothed = dll.advance(n as f64 * period).unwrap();
            assert_relative_eq!(smoothed, period, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_reset_invalidates_state() {
        let mut dll = ClockFilter::default();
        dll.initialize(0.0, 0.01);
        assert!(dll.is_initialized());
        dll.reset();
        assert!(!dll.is_initialized());
        assert_eq!(dll.advance(0.02), None);
    }
}
