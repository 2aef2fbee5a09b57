//! Parameter bounds.
//!
//! Maps a slot's `(min, max, kind)` constraint onto [`Bounds`]. The CPU solver
//! clamps seeds into them and projects every step back inside, so every
//! value the model sees stays within its constraint.

use crate::parameters::constraints::ConstraintKind;
use std::f64::{INFINITY, NEG_INFINITY};
use thiserror::Error;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must not exceed max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Bound value must not be NaN")]
    NanBound,
}

/// Represents the effective bounds of a parameter during optimization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum allowed value for the parameter
    pub min: f64,

    /// Maximum allowed value for the parameter
    pub max: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }
}

impl Bounds {
    /// Create a new bounds constraint with min and max values
    ///
    /// # Examples
    ///
    /// ```
    /// use odmrfit_rs::parameters::bounds::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert_eq!(bounds.min, 0.0);
    /// assert_eq!(bounds.max, 10.0);
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() {
            return Err(BoundsError::NanBound);
        }
        if min > max {
            return Err(BoundsError::InvalidBounds { min, max });
        }

        Ok(Self { min, max })
    }

    /// Create an unbounded constraint (negative infinity to positive infinity)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Effective bounds of a slot whose constraint is `(min, max, kind)`.
    ///
    /// `FREE` ignores both values, `LOWER` keeps only `min`, `UPPER` keeps only
    /// `max`, and `LOWER_UPPER` keeps both.
    pub fn for_kind(kind: ConstraintKind, min: f64, max: f64) -> Result<Self, BoundsError> {
        match kind {
            ConstraintKind::Free => Ok(Self::unbounded()),
            ConstraintKind::Lower => Self::new(min, INFINITY),
            ConstraintKind::Upper => Self::new(NEG_INFINITY, max),
            ConstraintKind::LowerUpper => Self::new(min, max),
        }
    }

    /// Both bounds enforced and equal.
    pub fn is_pinned(&self) -> bool {
        self.min == self.max
    }

    /// Clamp a value to be within the bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Whether a step from `value` along `-gradient` would leave the bounds.
    pub fn blocks(&self, value: f64, gradient: f64) -> bool {
        (value <= self.min && gradient > 0.0) || (value >= self.max && gradient < 0.0)
    }
}
