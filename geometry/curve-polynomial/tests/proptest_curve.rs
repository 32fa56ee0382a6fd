//! Property-based tests for polynomial curves.
//!
//! Run with: cargo test -p curve-polynomial -- proptest

use curve_polynomial::{ParameterStrategy, PolynomialCurve, RigidPose};
use nalgebra::{Matrix3xX, Point3};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

/// A curve of order 1..=6 with bounded coefficients over a random domain.
fn arb_curve() -> impl Strategy<Value = PolynomialCurve> {
    (1usize..=6, -1.0..1.0f64, 0.1..2.0f64).prop_flat_map(|(order, start, width)| {
        prop::collection::vec(-1.0..1.0f64, 3 * (order + 1)).prop_map(move |values| {
            let coefficients = Matrix3xX::from_column_slice(&values);
            let mut curve = PolynomialCurve::from_coefficients(coefficients)
                .unwrap_or_else(|e| panic!("bounded order must be accepted: {e}"));
            curve
                .set_boundaries(start, start + width)
                .unwrap_or_else(|e| panic!("finite ordered domain must be accepted: {e}"));
            curve
        })
    })
}

fn arb_pose() -> impl Strategy<Value = RigidPose> {
    (
        prop::array::uniform3(-1.0..1.0f64),
        prop::array::uniform3(-3.0..3.0f64),
    )
        .prop_map(|([tx, ty, tz], [rx, ry, rz])| RigidPose::from_pose_vector(tx, ty, tz, rx, ry, rz))
}

fn max_abs_diff(a: &Matrix3xX<f64>, b: &Matrix3xX<f64>) -> f64 {
    (a - b).abs().max()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn proptest_reverse_is_involution(curve in arb_curve()) {
        let mut reversed = curve.clone();
        reversed.reverse();
        reversed.reverse();
        prop_assert!(max_abs_diff(reversed.coefficients(), curve.coefficients()) < 1e-9);
    }

    #[test]
    fn proptest_reverse_swaps_ends(curve in arb_curve()) {
        let mut reversed = curve.clone();
        reversed.reverse();
        prop_assert!((reversed.start_point() - curve.end_point()).norm() < 1e-9);
        prop_assert!((reversed.end_point() - curve.start_point()).norm() < 1e-9);
    }

    #[test]
    fn proptest_move_then_inverse(curve in arb_curve(), pose in arb_pose()) {
        let mut moved = curve.clone();
        moved.apply_pose(&pose);
        moved.apply_pose(&pose.inverse());
        prop_assert!(max_abs_diff(moved.coefficients(), curve.coefficients()) < 1e-9);
    }

    #[test]
    fn proptest_move_commutes_with_evaluation(
        curve in arb_curve(),
        pose in arb_pose(),
        u in 0.0..1.0f64,
    ) {
        let s = curve.start_parameter() + u * curve.parametric_length();
        let mut moved = curve.clone();
        moved.apply_pose(&pose);
        let expected = pose.transform_point(&curve.point(s));
        prop_assert!((moved.point(s) - expected).norm() < 1e-9);
    }

    #[test]
    fn proptest_derivative_matches_finite_difference(curve in arb_curve(), u in 0.1..0.9f64) {
        let s = curve.start_parameter() + u * curve.parametric_length();
        let h = 1e-6 * curve.parametric_length();
        let fd = (curve.point(s + h) - curve.point(s - h)) / (2.0 * h);
        let analytic = curve.derivative(s, 1);
        let scale = 1.0 + analytic.norm();
        prop_assert!((fd - analytic).norm() < 1e-5 * scale, "fd {fd:?} vs {analytic:?}");
    }

    #[test]
    fn proptest_sub_curve_is_idempotent(curve in arb_curve(), a in 0.0..0.4f64, b in 0.6..1.0f64) {
        let sa = curve.start_parameter() + a * curve.parametric_length();
        let sb = curve.start_parameter() + b * curve.parametric_length();
        let once = curve.sub_polynomial_curve(sa, sb).unwrap_or_else(|e| panic!("{e}"));
        let twice = once.sub_polynomial_curve(sa, sb).unwrap_or_else(|e| panic!("{e}"));
        for k in 0..=10 {
            let s = sa + (sb - sa) * f64::from(k) / 10.0;
            prop_assert!((once.point(s) - twice.point(s)).norm() < 1e-6);
            prop_assert!((once.point(s) - curve.point(s)).norm() < 1e-6);
        }
    }

    #[test]
    fn proptest_boundary_change_preserves_polynomial(
        curve in arb_curve(),
        a in 0.0..0.4f64,
        b in 0.6..1.0f64,
    ) {
        let sa = curve.start_parameter() + a * curve.parametric_length();
        let sb = curve.start_parameter() + b * curve.parametric_length();
        let mut restricted = curve.clone();
        restricted
            .change_coefficients_to_fit_boundaries(sa, sb)
            .unwrap_or_else(|e| panic!("{e}"));
        let mid = 0.5 * (sa + sb);
        prop_assert!((restricted.point(mid) - curve.point(mid)).norm() < 1e-9);
    }

    #[test]
    fn proptest_length_estimate_bounded_by_chord(curve in arb_curve()) {
        let chord = (curve.end_point() - curve.start_point()).norm();
        prop_assert!(curve.estimate_length(200) + 1e-12 >= chord);
    }

    #[test]
    fn proptest_nearly_collinear_auto_fit_is_stable(
        offsets in prop::collection::vec(-1e-9..1e-9f64, 12),
        direction in prop::array::uniform3(0.1..1.0f64),
    ) {
        let [dx, dy, dz] = direction;
        let points: Vec<Point3<f64>> = offsets
            .iter()
            .enumerate()
            .map(|(i, &eps)| {
                let s = i as f64 / 11.0;
                Point3::new(dx * s + eps, dy * s - eps, dz * s + eps)
            })
            .collect();

        let mut curve = PolynomialCurve::new();
        let result = curve.define_from_points_auto(&points, &ParameterStrategy::PrincipalAxis, 3);
        prop_assert!(result.is_ok(), "{result:?}");
        prop_assert!(curve.coefficients().iter().all(|c| c.is_finite()));
        prop_assert!((curve.start_point() - points[0]).norm() < 1e-6);
        prop_assert!((curve.end_point() - points[11]).norm() < 1e-6);
    }
}
