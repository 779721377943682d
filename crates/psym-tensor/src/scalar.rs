//! Scalar trait for element buffers.
//!
//! Buffers only copy and compare elements. The random fill multiplies
//! per-mode factors and the printers format elements.

use std::fmt::{Debug, Display};

use num_complex::{Complex32, Complex64};
use num_traits::One;

/// Trait for element types stored in tensor buffers.
pub trait Scalar: Copy + Debug + Display + PartialEq + One {
    /// Create a scalar from f64.
    fn from_f64(val: f64) -> Self;
}

impl Scalar for f64 {
    fn from_f64(val: f64) -> Self {
        val
    }
}

impl Scalar for f32 {
    fn from_f64(val: f64) -> Self {
        val as f32
    }
}

impl Scalar for Complex64 {
    fn from_f64(val: f64) -> Self {
        Complex64::new(val, 0.0)
    }
}

impl Scalar for Complex32 {
    fn from_f64(val: f64) -> Self {
        Complex32::new(val as f32, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_of<T: Scalar>(values: &[f64]) -> T {
        values
            .iter()
            .fold(T::one(), |acc, &v| acc * T::from_f64(v))
    }

    #[test]
    fn test_scalar_real() {
        assert_eq!(f64::from_f64(2.5), 2.5);
        assert_eq!(f32::from_f64(0.5), 0.5f32);
        assert_eq!(product_of::<f64>(&[2.0, 0.5, 3.0]), 3.0);
    }

    #[test]
    fn test_scalar_complex() {
        assert_eq!(Complex64::from_f64(1.5), Complex64::new(1.5, 0.0));
        assert_eq!(Complex32::from_f64(-1.0), Complex32::new(-1.0, 0.0));
        assert_eq!(
            product_of::<Complex64>(&[2.0, 4.0]),
            Complex64::new(8.0, 0.0)
        );
    }

    #[test]
    fn test_scalar_display_precision() {
        assert_eq!(format!("{:.3}", f64::from_f64(0.25)), "0.250");
        assert_eq!(format!("{:.1}", Complex64::new(1.0, -2.0)), "1.0-2.0i");
    }
}
