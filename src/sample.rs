//! Input sample types the engine accepts.
use crate::Complex64;

/// A value that can be widened into one complex input sample of a transform.
///
/// Real samples become complex values with a zero imaginary part.
pub trait Sample: Copy {
    /// Widens `self` to a complex value.
    fn to_complex(self) -> Complex64;
}

impl Sample for Complex64 {
    #[inline]
    fn to_complex(self) -> Complex64 {
        self
    }
}

impl Sample for i8 {
    #[inline]
    fn to_complex(self) -> Complex64 {
        Complex64::new(f64::from(self), 0.0)
    }
}

impl Sample for f32 {
    #[inline]
    fn to_complex(self) -> Complex64 {
        Complex64::new(f64::from(self), 0.0)
    }
}

impl Sample for f64 {
    #[inline]
    fn to_complex(self) -> Complex64 {
        Complex64::new(self, 0.0)
    }
}
