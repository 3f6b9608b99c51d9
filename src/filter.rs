//! A single-pole exponential low-pass filter, applied in place.
//!
//! ### Example:
//! ```rust
//! use approx::assert_ulps_eq;
//! use buffered_fft::filter::LowPassFilter;
//!
//! let filter = LowPassFilter::with_alpha(0.5);
//! let mut signal = [0.0_f64, 2.0, 4.0];
//! filter.apply(&mut signal);
//!
//! assert_ulps_eq!(signal[1], 1.0);
//! assert_ulps_eq!(signal[2], 2.5);
//! ```
use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::Deserialize;
#[cfg(feature = "serde")]
use serde::Serialize;

use crate::complex::ComplexExt;
use crate::Complex64;

/// A sample type the low-pass filter can smooth.
pub trait FilterSample {
    /// Replaces `current` with `previous + alpha * (current - previous)`.
    fn smooth(previous: &Self, current: &mut Self, alpha: f64);
}

impl FilterSample for f64 {
    #[inline]
    fn smooth(previous: &Self, current: &mut Self, alpha: f64) {
        *current = previous + alpha * (*current - previous);
    }
}

impl FilterSample for i8 {
    // For α in [0, 1] the smoothed value lies between the two samples. Outside that range the
    // cast saturates at the `i8` bounds.
    #[allow(clippy::cast_possible_truncation)]
    #[inline]
    fn smooth(previous: &Self, current: &mut Self, alpha: f64) {
        let previous = f64::from(*previous);
        *current = (previous + alpha * (f64::from(*current) - previous)) as i8;
    }
}

impl FilterSample for Complex64 {
    #[inline]
    fn smooth(previous: &Self, current: &mut Self, alpha: f64) {
        let mut delta = Complex64::default();
        let mut step = Complex64::default();
        current.sub_into(previous, &mut delta);
        delta.scale_into(alpha, &mut step);
        previous.add_into(&step, current);
    }
}

/// `y[i] = y[i-1] + α·(x[i] - y[i-1])`, with `y[0] = x[0]`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LowPassFilter {
    alpha: f64,
}

impl LowPassFilter {
    /// Filter for samples `timestep` seconds apart with the given cutoff frequency in Hz.
    ///
    /// Positive `timestep` and `cutoff_hz` give an α in (0, 1).
    #[must_use]
    pub fn new(timestep: f64, cutoff_hz: f64) -> Self {
        let rc = 1.0 / (2.0 * PI * cutoff_hz);
        Self::with_alpha(timestep / (rc + timestep))
    }

    /// Filter with an explicit smoothing factor.
    ///
    /// α is expected in [0, 1]: 0 holds the first value, 1 passes the input through. Larger
    /// values overshoot, and byte samples then saturate at `i8::MIN`/`i8::MAX`.
    #[must_use]
    pub fn with_alpha(alpha: f64) -> Self {
        Self { alpha }
    }

    /// The smoothing factor α.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Filters `values` in place. The first value is left as it is.
    pub fn apply<S: FilterSample>(&self, values: &mut [S]) {
        for i in 1..values.len() {
            let (head, tail) = values.split_at_mut(i);
            S::smooth(&head[i - 1], &mut tail[0], self.alpha);
        }
    }
}
