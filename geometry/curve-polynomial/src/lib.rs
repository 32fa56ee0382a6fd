//! Polynomial parametric curves for needle and catheter modeling.
//!
//! A [`PolynomialCurve`] describes a 3D path as three polynomials of one
//! scalar parameter. The crate provides:
//!
//! - **Evaluation**: point, tangent, derivatives of any order and curvature
//! - **Fitting**: weighted least squares from point samples, with or without
//!   known parameter values ([`ParameterStrategy`])
//! - **Reparameterization**: domain relabeling, exact affine substitution,
//!   reversal, sub-curve extraction and order changes
//! - **Rigid motion**: [`RigidPose`] application and uniform scaling
//!
//! # Example
//!
//! ```
//! use curve_polynomial::PolynomialCurve;
//! use nalgebra::Point3;
//!
//! let points = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.5, 0.0),
//!     Point3::new(2.0, 0.0, 0.0),
//! ];
//! let mut curve = PolynomialCurve::new();
//! curve.define_from_points(&points, &[0.0, 1.0, 2.0], 2).unwrap();
//!
//! let mid = curve.point(1.0);
//! assert!((mid - points[1]).norm() < 1e-9);
//! assert!(curve.curvature(1.0) > 0.0);
//! ```
//!
//! # Coordinate System
//!
//! Curves live in a right-handed frame. The unit of the parameter is up to
//! the caller; needle models use metres of arc length.
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**.
//!
//! # Feature Flags
//!
//! - `serde`: Enable serialization for [`RigidPose`] and [`ParameterStrategy`]

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::many_single_char_names,
    clippy::similar_names,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::too_many_lines,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::suboptimal_flops,
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::needless_range_loop,
    clippy::neg_cmp_op_on_partial_ord,
    clippy::too_many_arguments
)]

mod error;
mod fit;
mod polynomial;
mod pose;

pub use error::CurveError;
pub use fit::{ParameterStrategy, estimate_parameters};
pub use polynomial::{DEFAULT_LENGTH_SAMPLES, MAX_ORDER, PolynomialCurve};
pub use pose::RigidPose;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix3xX, Point3, Vector3};

/// Result type for curve operations.
pub type Result<T> = std::result::Result<T, CurveError>;

/// Read-only geometric queries shared by single curves and multi-segment paths.
pub trait Curve3 {
    /// Point at parameter `s`.
    fn point(&self, s: f64) -> Point3<f64>;

    /// Unit tangent at parameter `s`.
    fn tangent(&self, s: f64) -> Vector3<f64>;

    /// Curvature at parameter `s`.
    fn curvature(&self, s: f64) -> f64;

    /// Domain `(start, end)` of the parameter.
    fn domain(&self) -> (f64, f64);

    /// `n` points uniformly spaced in parameter.
    fn sample_uniform(&self, n: usize) -> Vec<Point3<f64>> {
        let (start, end) = self.domain();
        let n = n.max(2);
        (0..n)
            .map(|i| self.point(start + (end - start) * i as f64 / (n - 1) as f64))
            .collect()
    }
}

impl Curve3 for PolynomialCurve {
    fn point(&self, s: f64) -> Point3<f64> {
        Self::point(self, s)
    }

    fn tangent(&self, s: f64) -> Vector3<f64> {
        Self::tangent(self, s)
    }

    fn curvature(&self, s: f64) -> f64 {
        Self::curvature(self, s)
    }

    fn domain(&self) -> (f64, f64) {
        (self.start_parameter(), self.end_parameter())
    }
}
