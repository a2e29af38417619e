//! Common value types for scene geometry.
//!
//! The scene is Y-up: `x` runs along a work area's width, `y` is the vertical
//! axis and `z` runs along the work area's depth.

use std::ops::Add;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Global numerical tolerance for floating-point comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Represents a 3D vector or point in scene space.
///
/// # Examples
/// ```
/// use blockviz_layout::types::Vec3;
///
/// let corner = Vec3::new(1.0, 0.0, 3.0);
/// let offset = Vec3::new(0.5, 2.0, 0.5);
/// assert_eq!(corner + offset, Vec3::new(1.5, 2.0, 3.5));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    ///
    /// # Parameters
    /// * `x` - X component (width axis)
    /// * `y` - Y component (vertical axis)
    /// * `z` - Z component (depth axis)
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// A point on the ground plane (`y = 0`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GroundPoint {
    pub x: f64,
    pub z: f64,
}

impl GroundPoint {
    #[inline]
    pub const fn new(x: f64, z: f64) -> Self {
        Self { x, z }
    }

    /// Lifts the point to the given elevation.
    #[inline]
    pub const fn at_elevation(&self, y: f64) -> Vec3 {
        Vec3::new(self.x, y, self.z)
    }
}

/// Rectangular footprint of a work area, in unscaled site units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Footprint {
    /// Extent along the X axis.
    pub width: f64,
    /// Extent along the Z axis.
    pub depth: f64,
}

impl Footprint {
    #[inline]
    pub const fn new(width: f64, depth: f64) -> Self {
        Self { width, depth }
    }

    #[inline]
    pub fn half_width(&self) -> f64 {
        self.width / 2.0
    }

    #[inline]
    pub fn half_depth(&self) -> f64 {
        self.depth / 2.0
    }
}

/// Axis-aligned rectangle on the ground plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundRect {
    pub min: GroundPoint,
    pub max: GroundPoint,
}

impl GroundRect {
    /// Creates a rectangle centered on `center` with the given footprint.
    pub fn centered(center: GroundPoint, footprint: Footprint) -> Self {
        Self {
            min: GroundPoint::new(center.x - footprint.half_width(), center.z - footprint.half_depth()),
            max: GroundPoint::new(center.x + footprint.half_width(), center.z + footprint.half_depth()),
        }
    }

    /// Smallest rectangle enclosing both rectangles.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: GroundPoint::new(self.min.x.min(other.min.x), self.min.z.min(other.min.z)),
            max: GroundPoint::new(self.max.x.max(other.max.x), self.max.z.max(other.max.z)),
        }
    }

    /// Returns the center point.
    #[inline]
    pub fn center(&self) -> GroundPoint {
        GroundPoint::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.z + self.max.z) / 2.0,
        )
    }
}

/// Validation helpers shared by the model and the configuration layer.
pub mod validation {
    /// Validates a strictly positive, finite measure.
    ///
    /// # Returns
    /// `Ok(())` for valid values, otherwise error text
    pub fn validate_dimension(value: f64, name: &str) -> Result<(), String> {
        if value.is_nan() {
            return Err(format!("{} must not be NaN", name));
        }
        if value.is_infinite() {
            return Err(format!("{} must not be infinite", name));
        }
        if value <= 0.0 {
            return Err(format!("{} must be positive, got: {}", name, value));
        }
        Ok(())
    }

    /// Validates a value in the half-open unit interval `[0, 1)`.
    pub fn validate_unit_fraction(value: f64, name: &str) -> Result<(), String> {
        if !(0.0..1.0).contains(&value) {
            return Err(format!("{} must be in [0, 1), got: {}", name, value));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(GroundPoint::new(1.0, 3.0).at_elevation(2.0), a);
    }

    #[test]
    fn test_ground_rect_union_center() {
        let a = GroundRect::centered(GroundPoint::new(0.0, 0.0), Footprint::new(10.0, 4.0));
        let b = GroundRect::centered(GroundPoint::new(20.0, 10.0), Footprint::new(10.0, 4.0));

        let union = a.union(&b);
        assert_eq!(union.min, GroundPoint::new(-5.0, -2.0));
        assert_eq!(union.max, GroundPoint::new(25.0, 12.0));
        assert_eq!(union.center(), GroundPoint::new(10.0, 5.0));
    }

    #[test]
    fn test_validation_dimension() {
        assert!(validation::validate_dimension(10.0, "Length").is_ok());
        assert!(validation::validate_dimension(0.0, "Length").is_err());
        assert!(validation::validate_dimension(-1.0, "Length").is_err());
        assert!(validation::validate_dimension(f64::NAN, "Length").is_err());
        assert!(validation::validate_dimension(f64::INFINITY, "Length").is_err());
    }

    #[test]
    fn test_validation_unit_fraction() {
        assert!(validation::validate_unit_fraction(0.0, "Threshold").is_ok());
        assert!(validation::validate_unit_fraction(0.99, "Threshold").is_ok());
        assert!(validation::validate_unit_fraction(1.0, "Threshold").is_err());
        assert!(validation::validate_unit_fraction(-0.1, "Threshold").is_err());
        assert!(validation::validate_unit_fraction(f64::NAN, "Threshold").is_err());
    }
}
