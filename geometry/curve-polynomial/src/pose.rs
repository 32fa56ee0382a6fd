//! Rigid pose type used to move curves and needle bases.

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A rigid transformation: a rotation followed by a translation.
///
/// Poses compose like homogeneous matrices: `a.compose(&b)` applies `b`
/// first, then `a`. The six-component constructor uses the
/// translation plus theta-u (scaled axis) rotation convention.
///
/// # Example
///
/// ```
/// use curve_polynomial::RigidPose;
/// use nalgebra::{Point3, UnitQuaternion, Vector3};
/// use std::f64::consts::PI;
///
/// let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 2.0);
/// let pose = RigidPose::new(rotation, Vector3::new(1.0, 2.0, 3.0));
///
/// let moved = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert!((moved - Point3::new(1.0, 3.0, 3.0)).norm() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidPose {
    /// Rotation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
    /// Translation vector.
    pub translation: Vector3<f64>,
}

impl Default for RigidPose {
    fn default() -> Self {
        Self::identity()
    }
}

impl RigidPose {
    /// Creates a new pose from a rotation and a translation.
    #[must_use]
    pub const fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// The identity pose.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Creates a pose with only translation.
    #[must_use]
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation,
        }
    }

    /// Creates a pose with only rotation.
    #[must_use]
    pub fn from_rotation(rotation: UnitQuaternion<f64>) -> Self {
        Self {
            rotation,
            translation: Vector3::zeros(),
        }
    }

    /// Creates a pose from `(tx, ty, tz)` and a theta-u rotation vector `(rx, ry, rz)`.
    ///
    /// The rotation vector's direction is the rotation axis and its norm the
    /// angle in radians.
    #[must_use]
    pub fn from_pose_vector(tx: f64, ty: f64, tz: f64, rx: f64, ry: f64, rz: f64) -> Self {
        Self {
            rotation: UnitQuaternion::from_scaled_axis(Vector3::new(rx, ry, rz)),
            translation: Vector3::new(tx, ty, tz),
        }
    }

    /// Returns `[tx, ty, tz, rx, ry, rz]` with the rotation as theta-u.
    #[must_use]
    pub fn to_pose_vector(&self) -> [f64; 6] {
        let tu = self.rotation.scaled_axis();
        [
            self.translation.x,
            self.translation.y,
            self.translation.z,
            tu.x,
            tu.y,
            tu.z,
        ]
    }

    /// Position of the pose origin.
    #[must_use]
    pub fn position(&self) -> Point3<f64> {
        Point3::from(self.translation)
    }

    /// The pose's local z axis expressed in the parent frame.
    #[must_use]
    pub fn z_axis(&self) -> Vector3<f64> {
        self.rotation * Vector3::z()
    }

    /// Transforms a 3D point.
    #[must_use]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * point.coords + self.translation)
    }

    /// Transforms a 3D vector (rotation only).
    #[must_use]
    pub fn transform_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * vector
    }

    /// Composes this pose with another (self * other).
    ///
    /// The result applies `other` first, then `self`.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.translation + self.rotation * other.translation,
        }
    }

    /// Computes the inverse pose.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.inverse();
        Self {
            rotation: inv_rotation,
            translation: inv_rotation * -self.translation,
        }
    }

    /// Converts to a 4x4 homogeneous transformation matrix.
    #[must_use]
    pub fn to_matrix4(&self) -> Matrix4<f64> {
        let mut mat = Matrix4::identity();
        let rot_mat = self.rotation.to_rotation_matrix();
        mat.fixed_view_mut::<3, 3>(0, 0).copy_from(rot_mat.matrix());
        mat.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        mat
    }

    /// Returns true if this pose is approximately the identity.
    #[must_use]
    pub fn is_identity(&self, epsilon: f64) -> bool {
        // 2 * |sin(angle / 2)| avoids the acos precision loss near zero
        2.0 * self.rotation.imag().norm() < epsilon && self.translation.norm() < epsilon
    }
}
