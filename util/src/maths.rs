//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by the maths utilities.
#[derive(Debug, Error, PartialEq)]
pub enum MathsError {
    #[error("The source range ({0}, {1}) is degenerate, its bounds must differ")]
    DegenerateRange(f64, f64),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a value from one range into another.
///
/// Values outside of the source range are extrapolated linearly, the result is not clamped
/// into the target range. A source range whose bounds are equal is rejected.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> Result<T, MathsError>
where
    T: Float,
{
    let span = source_range.1 - source_range.0;

    if span == T::zero() {
        return Err(MathsError::DegenerateRange(
            source_range.0.to_f64().unwrap_or(std::f64::NAN),
            source_range.1.to_f64().unwrap_or(std::f64::NAN),
        ));
    }

    Ok(target_range.0 + ((value - source_range.0) * (target_range.1 - target_range.0) / span))
}

/// Clamp a value between optional bounds.
///
/// An unset bound leaves that side of the value unbounded.
pub fn clamp<T>(value: T, min: Option<T>, max: Option<T>) -> T
where
    T: Float,
{
    let mut ret = value;

    if let Some(max) = max {
        if ret > max {
            ret = max
        }
    }
    if let Some(min) = min {
        if ret < min {
            ret = min
        }
    }

    ret
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((-1f64, 1f64), (1000f64, 2000f64), -1.0), Ok(1000.0));
        assert_eq!(lin_map((-1f64, 1f64), (1000f64, 2000f64), 0.0), Ok(1500.0));
        assert_eq!(lin_map((-1f64, 1f64), (1000f64, 2000f64), 1.0), Ok(2000.0));

        // Out of range values are extrapolated
        assert_eq!(lin_map((-1f64, 1f64), (1000f64, 2000f64), 2.0), Ok(2500.0));

        // Inverted target ranges are allowed
        assert_eq!(lin_map((0f64, 1f64), (10f64, 0f64), 0.25), Ok(7.5));
    }

    #[test]
    fn test_lin_map_degenerate() {
        assert_eq!(
            lin_map((1f64, 1f64), (1000f64, 2000f64), 0.5),
            Err(MathsError::DegenerateRange(1.0, 1.0))
        );
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5f64, Some(-1.0), Some(1.0)), 1.0);
        assert_eq!(clamp(-5f64, Some(-1.0), Some(1.0)), -1.0);
        assert_eq!(clamp(0.5f64, Some(-1.0), Some(1.0)), 0.5);
        assert_eq!(clamp(5f64, None, Some(1.0)), 1.0);
        assert_eq!(clamp(-5f64, None, Some(1.0)), -5.0);
        assert_eq!(clamp(5f64, None, None), 5.0);
    }
}
