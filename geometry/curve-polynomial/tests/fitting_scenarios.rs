//! End-to-end fitting and reparameterization scenarios.
//!
//! These tests exercise the public API the way needle models use it:
//! fit from sampled shapes, cut sub-curves, then move curves rigidly.

use approx::assert_relative_eq;
use curve_polynomial::{Curve3, ParameterStrategy, PolynomialCurve, RigidPose};
use nalgebra::{DMatrix, Point3, Vector3};

/// Ten samples of a helix of radius 1 and pitch 0.2 per radian.
fn helix_samples() -> (Vec<Point3<f64>>, Vec<f64>) {
    let params: Vec<f64> = (0..10).map(|k| 0.6 * f64::from(k)).collect();
    let points = params
        .iter()
        .map(|&t| Point3::new(t.cos(), t.sin(), 0.2 * t))
        .collect();
    (points, params)
}

fn endpoint_residual(curve: &PolynomialCurve, points: &[Point3<f64>], params: &[f64]) -> f64 {
    let last = points.len() - 1;
    (curve.point(params[0]) - points[0]).norm() + (curve.point(params[last]) - points[last]).norm()
}

#[test]
fn weighted_endpoints_reduce_endpoint_error() {
    let (points, params) = helix_samples();

    let mut uniform = PolynomialCurve::new();
    uniform.define_from_points(&points, &params, 3).unwrap();

    let mut weights = vec![1.0; points.len()];
    weights[0] = 1000.0;
    weights[9] = 1000.0;
    let mut weighted = PolynomialCurve::new();
    weighted
        .define_from_weighted_points(&points, &params, &weights, 3)
        .unwrap();

    let uniform_err = endpoint_residual(&uniform, &points, &params);
    let weighted_err = endpoint_residual(&weighted, &points, &params);
    assert!(
        weighted_err < uniform_err,
        "weighted endpoint error {weighted_err} should be below uniform {uniform_err}"
    );
    assert!(weighted_err < 1e-2);
}

#[test]
fn uniform_weights_match_unweighted_fit() {
    let (points, params) = helix_samples();

    let mut plain = PolynomialCurve::new();
    plain.define_from_points(&points, &params, 4).unwrap();
    let mut weighted = PolynomialCurve::new();
    weighted
        .define_from_weighted_points(&points, &params, &[2.5; 10], 4)
        .unwrap();

    assert_relative_eq!(plain.coefficients(), weighted.coefficients(), epsilon = 1e-9);
}

#[test]
fn full_domain_sub_curve_matches_original() {
    let (points, params) = helix_samples();
    let mut curve = PolynomialCurve::new();
    curve.define_from_points(&points, &params, 5).unwrap();

    let sub = curve
        .sub_polynomial_curve(curve.start_parameter(), curve.end_parameter())
        .unwrap();
    assert_eq!(sub.order(), curve.order());
    for &s in &params {
        assert_relative_eq!(sub.point(s), curve.point(s), epsilon = 1e-8);
    }
}

#[test]
fn sub_curve_then_boundary_change_agree() {
    let (points, params) = helix_samples();
    let mut curve = PolynomialCurve::new();
    curve.define_from_points(&points, &params, 3).unwrap();

    let sub = curve.sub_polynomial_curve(1.0, 3.0).unwrap();
    let mut restricted = curve.clone();
    restricted.change_coefficients_to_fit_boundaries(1.0, 3.0).unwrap();

    // A cubic restricted to a sub-interval is still a cubic: both are exact.
    assert_relative_eq!(sub.coefficients(), restricted.coefficients(), epsilon = 1e-8);
}

#[test]
fn reverse_twice_restores_curve() {
    let (points, params) = helix_samples();
    let mut curve = PolynomialCurve::new();
    curve.define_from_points(&points, &params, 4).unwrap();
    let original = curve.clone();

    curve.reverse();
    assert_relative_eq!(curve.start_point(), original.end_point(), epsilon = 1e-12);
    curve.reverse();
    assert_relative_eq!(curve.coefficients(), original.coefficients(), epsilon = 1e-10);
}

#[test]
fn move_then_inverse_restores_curve() {
    let (points, params) = helix_samples();
    let mut curve = PolynomialCurve::new();
    curve.define_from_points(&points, &params, 3).unwrap();
    let original = curve.clone();

    curve.move_by(0.01, -0.2, 0.3, 0.4, 0.1, -0.7);
    let pose = RigidPose::from_pose_vector(0.01, -0.2, 0.3, 0.4, 0.1, -0.7);
    curve.apply_pose(&pose.inverse());

    assert_relative_eq!(curve.coefficients(), original.coefficients(), epsilon = 1e-12);
}

#[test]
fn rigid_motion_preserves_length_and_curvature() {
    let (points, params) = helix_samples();
    let mut curve = PolynomialCurve::new();
    curve.define_from_points(&points, &params, 3).unwrap();
    let before_length = curve.length();
    let before_curvature = curve.curvature(2.0);

    curve.move_by(1.0, 2.0, 3.0, 0.0, std::f64::consts::FRAC_PI_2, 0.0);
    assert_relative_eq!(curve.length(), before_length, epsilon = 1e-10);
    assert_relative_eq!(curve.curvature(2.0), before_curvature, epsilon = 1e-10);
}

#[test]
fn auto_fit_of_straight_needle_samples() {
    // A straight shaft along z sampled out of order.
    let points: Vec<Point3<f64>> = [0.04, 0.0, 0.1, 0.02, 0.08, 0.06]
        .iter()
        .map(|&z| Point3::new(0.0, 0.0, z))
        .collect();

    let mut curve = PolynomialCurve::new();
    curve
        .define_from_points_auto(&points, &ParameterStrategy::PrincipalAxis, 3)
        .unwrap();

    assert_relative_eq!(curve.length(), 0.1, epsilon = 1e-9);
    assert_relative_eq!(curve.parametric_length(), 0.1, epsilon = 1e-9);
    assert_relative_eq!(curve.curvature(0.05), 0.0, epsilon = 1e-6);

    // Oriented from the first sample towards the last one.
    let tangent = curve.start_tangent();
    assert_relative_eq!(tangent.dot(&Vector3::z()).abs(), 1.0, epsilon = 1e-9);
}

#[test]
fn coefficient_matrix_round_trip() {
    let (points, params) = helix_samples();
    let mut curve = PolynomialCurve::new();
    curve.define_from_points(&points, &params, 3).unwrap();

    let dynamic = DMatrix::from_fn(3, 4, |r, c| curve.coefficients()[(r, c)]);
    let mut copy = PolynomialCurve::new();
    copy.set_polynomial_coefficients(&dynamic).unwrap();
    copy.set_boundaries(curve.start_parameter(), curve.end_parameter())
        .unwrap();

    assert_eq!(copy, curve);
}

#[test]
fn trait_sampling_follows_domain() {
    let (points, params) = helix_samples();
    let mut curve = PolynomialCurve::new();
    curve.define_from_points(&points, &params, 3).unwrap();

    let sampled = Curve3::sample_uniform(&curve, 5);
    assert_eq!(sampled.len(), 5);
    assert_relative_eq!(sampled[0], curve.start_point(), epsilon = 1e-12);
    assert_relative_eq!(sampled[4], curve.end_point(), epsilon = 1e-12);
    let (start, end) = Curve3::domain(&curve);
    assert_eq!(start, 0.0);
    assert_relative_eq!(end, 5.4, epsilon = 1e-12);
}
