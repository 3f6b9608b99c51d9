#![deny(missing_docs)]
#![doc = include_str!("../README.md")]
#![warn(clippy::pedantic)]
// We do many casts from usize to f64 when building twiddle angles. The usize is an index into a
// transform of at most `capacity` points, which never comes close to 2^52.
#![allow(clippy::cast_precision_loss)]
// `Stride` and the view types are named after the module they live in on purpose.
#![allow(clippy::module_name_repetitions)]

pub use num_complex::Complex64;

pub mod complex;
pub mod engine;
pub mod error;
pub mod filter;
pub mod peak;
pub mod sample;
pub mod task;
pub mod view;

pub use engine::BufferedFft;
pub use error::FftError;
pub use error::Result;

/// This module re-exports all the traits and types under a single namespace to be easily
/// consumed.
pub mod prelude {
    pub use crate::complex::ComplexExt;
    pub use crate::engine::BufferedFft;
    pub use crate::error::FftError;
    pub use crate::filter::FilterSample;
    pub use crate::filter::LowPassFilter;
    pub use crate::sample::Sample;
    pub use crate::task::Executor;
    pub use crate::task::FftHandle;
    pub use crate::task::Inline;
    pub use crate::task::WorkerPool;
    pub use crate::view::Stride;
    pub use crate::view::StridedView;
    pub use crate::view::StridedViewMut;
    pub use crate::Complex64;
}
