//! Compute-into arithmetic for [`Complex64`].
//!
//! The engine reuses a handful of scratch values for every butterfly. Instead of building a new
//! value per operation, the methods on [`ComplexExt`] write their result into a destination the
//! caller already owns.
//!
//! ### Example:
//! ```rust
//! use buffered_fft::complex::ComplexExt;
//! use buffered_fft::Complex64;
//!
//! let a = Complex64::new(1.0, 2.0);
//! let b = Complex64::new(3.0, -1.0);
//! let mut scratch = Complex64::default();
//!
//! a.mul_into(&b, &mut scratch);
//! assert!(scratch.approx_eq(&Complex64::new(5.0, 5.0)));
//! ```
use crate::Complex64;

/// Epsilon used by [`ComplexExt::approx_eq`] on each component.
pub const COMPARE_EPSILON: f64 = 1e-7;

/// In-place arithmetic and helpers on complex values.
///
/// The destination of an `*_into` call must not be one of its operands while the
/// butterfly that uses it is still reading that operand. Within this crate the destination always
/// lives in a different buffer from both operands.
pub trait ComplexExt {
    /// Writes `self + other` into `dst`.
    fn add_into(&self, other: &Self, dst: &mut Self);
    /// Writes `self - other` into `dst`.
    fn sub_into(&self, other: &Self, dst: &mut Self);
    /// Writes `self * other` into `dst`.
    fn mul_into(&self, other: &Self, dst: &mut Self);
    /// Writes `self * factor` into `dst`.
    fn scale_into(&self, factor: f64, dst: &mut Self);
    /// Returns `re² + im²`.
    fn magnitude_squared(&self) -> f64;
    /// Overwrites both components.
    fn set(&mut self, re: f64, im: f64);
    /// Overwrites both components with those of `other`.
    fn copy_from(&mut self, other: &Self);
    /// Compares both components within [`COMPARE_EPSILON`].
    fn approx_eq(&self, other: &Self) -> bool;
    /// Renders the value as `"re + imi"` with two decimals.
    fn to_short_string(&self) -> String;
}

impl ComplexExt for Complex64 {
    #[inline]
    fn add_into(&self, other: &Self, dst: &mut Self) {
        dst.set(self.re + other.re, self.im + other.im);
    }

    #[inline]
    fn sub_into(&self, other: &Self, dst: &mut Self) {
        dst.set(self.re - other.re, self.im - other.im);
    }

    #[inline]
    fn mul_into(&self, other: &Self, dst: &mut Self) {
        dst.set(
            self.re * other.re - self.im * other.im,
            self.re * other.im + self.im * other.re,
        );
    }

    #[inline]
    fn scale_into(&self, factor: f64, dst: &mut Self) {
        dst.set(self.re * factor, self.im * factor);
    }

    #[inline]
    fn magnitude_squared(&self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    #[inline]
    fn set(&mut self, re: f64, im: f64) {
        self.re = re;
        self.im = im;
    }

    #[inline]
    fn copy_from(&mut self, other: &Self) {
        self.set(other.re, other.im);
    }

    fn approx_eq(&self, other: &Self) -> bool {
        (self.re - other.re).abs() < COMPARE_EPSILON && (self.im - other.im).abs() < COMPARE_EPSILON
    }

    fn to_short_string(&self) -> String {
        format!("{:.2} + {:.2}i", self.re, self.im)
    }
}

/// Widens a slice of real values into a new vector of complex values with zero imaginary parts.
#[must_use]
pub fn from_reals(reals: &[f64]) -> Vec<Complex64> {
    reals.iter().map(|re| Complex64::new(*re, 0.0)).collect()
}

/// Widens real values into an existing complex buffer, without allocating.
///
/// # Panics
/// Panics if `output` is shorter than `reals`.
pub fn fill_from_reals(reals: &[f64], output: &mut [Complex64]) {
    assert!(
        output.len() >= reals.len(),
        "output holds {} values, {} needed",
        output.len(),
        reals.len()
    );
    for (re, out) in reals.iter().zip(output.iter_mut()) {
        out.set(*re, 0.0);
    }
}

/// Magnitude spectrum `|z|` of a transform result.
#[must_use]
pub fn magnitudes(spectrum: &[Complex64]) -> Vec<f64> {
    spectrum
        .iter()
        .map(|bin| bin.magnitude_squared().sqrt())
        .collect()
}

/// Returns `true` when both slices have the same length and every pair is
/// [`approx_eq`](ComplexExt::approx_eq).
#[must_use]
pub fn slices_approx_eq(a: &[Complex64], b: &[Complex64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.approx_eq(y))
}
