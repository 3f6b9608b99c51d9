//! Sub-bin peak location in magnitude spectra.
//!
//! All functions look for the largest value strictly inside the slice, so that both neighbours of
//! the peak exist, and refine its index from those three points.
//!
//! ### Example:
//! ```rust
//! use approx::assert_ulps_eq;
//! use buffered_fft::peak;
//!
//! let magnitudes = [-1.25, 0.75, 0.75, -1.25];
//! assert_eq!(peak::find_interior_max(&magnitudes), Some(1));
//! assert_ulps_eq!(peak::quadratic(&magnitudes).unwrap(), 1.5);
//! ```

/// Index of the first maximum among `values[1..len - 1]`.
///
/// Returns `None` if there are fewer than three values.
#[must_use]
pub fn find_interior_max(values: &[f64]) -> Option<usize> {
    if values.len() < 3 {
        return None;
    }
    let mut max = 1;
    for i in 2..values.len() - 1 {
        if values[i] > values[max] {
            max = i;
        }
    }
    Some(max)
}

/// Value at fractional `index`, linearly interpolated between its two neighbours.
///
/// Indices below zero give the first value, indices at or past the last one give the last value.
/// Returns `None` for an empty slice.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn linear_interpolate(values: &[f64], index: f64) -> Option<f64> {
    let first = *values.first()?;
    let last = values[values.len() - 1];
    if index <= 0.0 {
        return Some(first);
    }
    if index >= (values.len() - 1) as f64 {
        return Some(last);
    }

    // Both in range: 0 < index < len - 1.
    let low = index.floor() as usize;
    let high = index.ceil() as usize;
    if low == high {
        return Some(values[low]);
    }
    Some(values[low] + (values[high] - values[low]) * (index - low as f64))
}

/// Peak index refined by fitting a parabola through the maximum and its neighbours.
///
/// The result is clamped to `[0, len - 1]`. A flat neighbourhood gives the integer index.
/// Returns `None` if there are fewer than three values.
#[must_use]
pub fn quadratic(values: &[f64]) -> Option<f64> {
    let m = find_interior_max(values)?;
    let (left, centre, right) = (values[m - 1], values[m], values[m + 1]);

    let denominator = 2.0 * (2.0 * centre - left - right);
    if denominator == 0.0 {
        return Some(m as f64);
    }
    let index = m as f64 + (right - left) / denominator;
    Some(index.clamp(0.0, (values.len() - 1) as f64))
}

/// Peak index refined by the barycentre of the maximum and its neighbours.
///
/// A zero sum gives the integer index. Returns `None` if there are fewer than three values.
#[must_use]
pub fn barycentric(values: &[f64]) -> Option<f64> {
    let m = find_interior_max(values)?;
    let (left, centre, right) = (values[m - 1], values[m], values[m + 1]);

    let sum = left + centre + right;
    if sum == 0.0 {
        return Some(m as f64);
    }
    Some(m as f64 + (right - left) / sum)
}
