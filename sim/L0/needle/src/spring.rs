//! Virtual springs coupling the needle to the tissue.

use nalgebra::{Point3, Vector3};

use crate::needle::Needle;

/// Where along the needle a spring belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpringKind {
    /// Shaft spring at the coarse body spacing.
    Body,
    /// Spring in the refined region behind the tip.
    Tip,
}

/// A point-to-point elastic coupling between a needle location and a fixed
/// tissue anchor.
///
/// The anchor is set once, when the spring is created, and never moves. The
/// attachment is a distance from the needle base that is re-projected as the
/// needle slides through the tissue.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualSpring {
    anchor: Point3<f64>,
    distance: f64,
    stiffness: f64,
    kind: SpringKind,
}

impl VirtualSpring {
    /// Create a spring attached at `distance` with anchor `anchor`.
    #[must_use]
    pub fn new(anchor: Point3<f64>, distance: f64, stiffness: f64, kind: SpringKind) -> Self {
        Self {
            anchor,
            distance,
            stiffness,
            kind,
        }
    }

    /// Create a spring anchored at the needle's current point at `distance`.
    #[must_use]
    pub fn at_distance(needle: &Needle, distance: f64, stiffness: f64, kind: SpringKind) -> Self {
        Self::new(needle.point_at_distance(distance), distance, stiffness, kind)
    }

    /// Fixed tissue anchor.
    #[must_use]
    pub fn anchor(&self) -> Point3<f64> {
        self.anchor
    }

    /// Attachment distance from the needle base.
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub(crate) fn set_distance(&mut self, distance: f64) {
        self.distance = distance;
    }

    /// Stiffness (N/m).
    #[must_use]
    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    pub(crate) fn set_stiffness(&mut self, stiffness: f64) {
        self.stiffness = stiffness;
    }

    /// Body or tip spring.
    #[must_use]
    pub fn kind(&self) -> SpringKind {
        self.kind
    }

    /// Vector from the anchor to the attached needle point.
    #[must_use]
    pub fn extension(&self, needle: &Needle) -> Vector3<f64> {
        needle.point_at_distance(self.distance) - self.anchor
    }

    /// Restoring force the spring applies to the needle.
    #[must_use]
    pub fn force(&self, needle: &Needle) -> Vector3<f64> {
        -self.extension(needle) * self.stiffness
    }

    /// Stored elastic energy `½ k |x − a|²`.
    #[must_use]
    pub fn energy(&self, needle: &Needle) -> f64 {
        0.5 * self.stiffness * self.extension(needle).norm_squared()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::needle::NeedleProperties;
    use approx::assert_relative_eq;

    #[test]
    fn test_spring_at_rest_has_no_energy() {
        let needle = Needle::new(NeedleProperties::default(), 3).unwrap();
        let spring = VirtualSpring::at_distance(&needle, 0.04, 50.0, SpringKind::Body);
        assert_relative_eq!(spring.anchor(), Point3::new(0.0, 0.0, 0.04), epsilon = 1e-15);
        assert_relative_eq!(spring.energy(&needle), 0.0, epsilon = 1e-20);
    }

    #[test]
    fn test_offset_anchor_energy_and_force() {
        let needle = Needle::new(NeedleProperties::default(), 3).unwrap();
        let spring = VirtualSpring::new(Point3::new(0.001, 0.0, 0.05), 0.05, 20.0, SpringKind::Tip);
        assert_relative_eq!(spring.extension(&needle), Vector3::new(-0.001, 0.0, 0.0), epsilon = 1e-15);
        assert_relative_eq!(spring.force(&needle), Vector3::new(0.02, 0.0, 0.0), epsilon = 1e-15);
        assert_relative_eq!(spring.energy(&needle), 0.5 * 20.0 * 1e-6, epsilon = 1e-18);
        assert_eq!(spring.kind(), SpringKind::Tip);
    }
}
