//! The error type shared by every fallible operation in this crate.

/// Errors the engine and its task wrapper can report.
#[derive(Clone, PartialEq, Eq)]
pub enum FftError {
    /// The requested transform length exceeds the engine's capacity.
    Size {
        /// Requested transform length.
        requested: usize,
        /// Capacity the engine was built with.
        capacity: usize,
    },
    /// The requested transform length is not a power of two.
    NotPowerOfTwo {
        /// Requested transform length.
        len: usize,
    },
    /// The output buffer cannot hold the transform result.
    OutputTooSmall {
        /// Length of the transform.
        required: usize,
        /// Length of the supplied output buffer.
        actual: usize,
    },
    /// An asynchronous transform on this engine has not finished copying its result out.
    Busy,
    /// A submitted task panicked. Carries the panic message when it was a string.
    TaskPanicked(String),
    /// A submitted task was dropped by its executor before it ran.
    Cancelled,
}

impl core::fmt::Display for FftError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Size {
                requested,
                capacity,
            } => write!(
                f,
                "Transform length {requested} exceeds engine capacity {capacity}"
            ),
            Self::NotPowerOfTwo { len } => {
                write!(f, "Transform length {len} is not a power of two")
            }
            Self::OutputTooSmall { required, actual } => write!(
                f,
                "Output buffer holds {actual} values but the transform produces {required}"
            ),
            Self::Busy => "An asynchronous transform is still in flight on this engine".fmt(f),
            Self::TaskPanicked(message) => write!(f, "FFT task panicked: {message}"),
            Self::Cancelled => "FFT task was dropped before it ran".fmt(f),
        }
    }
}

impl core::fmt::Debug for FftError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self, f)
    }
}

impl std::error::Error for FftError {}

/// Result alias defaulting to [`FftError`].
pub type Result<T, E = FftError> = std::result::Result<T, E>;
