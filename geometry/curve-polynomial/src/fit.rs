//! Weighted least-squares fitting of polynomial curves.
//!
//! For samples `p_k` at normalized parameters `t_k` with weights `w_k`, the
//! coefficients of each axis solve the normal equations
//!
//! ```text
//! (Aᵀ W A) c = Aᵀ W x        A_ki = t_k^i,  W = diag(w_k)
//! ```
//!
//! The three axes share `Aᵀ W A`, so one factorization serves all of them.
//!
//! When no parameter values are available, [`ParameterStrategy`] decides how
//! to derive them from the point cloud before fitting.

use nalgebra::{DMatrix, DVector, Matrix3, Matrix3xX, Point3, Vector3};
use tracing::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::polynomial::MAX_ORDER;
use crate::{CurveError, PolynomialCurve, Result};

/// Smallest accepted ratio between the extreme singular values of `Aᵀ W A`.
const RCOND: f64 = 1e-15;

/// How parameter values are estimated for unparameterized points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParameterStrategy {
    /// Project onto the dominant principal axis of the point cloud.
    ///
    /// The axis is oriented from the first point towards the last one.
    #[default]
    PrincipalAxis,
    /// Project onto a caller-supplied direction.
    Direction(Vector3<f64>),
    /// Cumulative chord length, keeping the given point order.
    ChordLength,
}

/// Estimate one parameter value per point.
///
/// Projection strategies return the offset along the axis from the lowest
/// projection, so the values are non-negative and start at zero.
///
/// # Errors
///
/// - [`CurveError::InsufficientData`] for fewer than two points.
/// - [`CurveError::InvalidArgument`] for a zero-length direction hint.
/// - [`CurveError::IllConditionedSystem`] when the points have no extent along
///   the chosen axis (coincident points, or a hint perpendicular to them).
pub fn estimate_parameters(points: &[Point3<f64>], strategy: &ParameterStrategy) -> Result<Vec<f64>> {
    if points.len() < 2 {
        return Err(CurveError::insufficient_data(2, points.len()));
    }

    let axis = match strategy {
        ParameterStrategy::ChordLength => return chord_length_parameters(points),
        ParameterStrategy::Direction(direction) => direction
            .try_normalize(f64::MIN_POSITIVE)
            .ok_or_else(|| CurveError::invalid_argument("direction hint has zero length"))?,
        ParameterStrategy::PrincipalAxis => principal_axis(points)?,
    };

    let origin = points[0].coords;
    let projections: Vec<f64> = points.iter().map(|p| (p.coords - origin).dot(&axis)).collect();
    let lo = projections.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = projections.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let extent = points
        .iter()
        .map(|p| (p.coords - origin).norm())
        .fold(0.0, f64::max);

    if !(hi - lo > 1e-12 * extent) {
        return Err(CurveError::ill_conditioned(
            "points have no extent along the parameterization axis",
        ));
    }

    Ok(projections.into_iter().map(|v| v - lo).collect())
}

fn chord_length_parameters(points: &[Point3<f64>]) -> Result<Vec<f64>> {
    let mut params = Vec::with_capacity(points.len());
    let mut total = 0.0;
    params.push(0.0);
    for pair in points.windows(2) {
        total += (pair[1] - pair[0]).norm();
        params.push(total);
    }
    if total <= 0.0 {
        return Err(CurveError::ill_conditioned("all points coincide"));
    }
    Ok(params)
}

fn principal_axis(points: &[Point3<f64>]) -> Result<Vector3<f64>> {
    let n = points.len() as f64;
    let centroid = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n;
    let mut covariance = Matrix3::zeros();
    for p in points {
        let d = p.coords - centroid;
        covariance += d * d.transpose();
    }
    covariance /= n;

    let eigen = covariance.symmetric_eigen();
    let index = eigen.eigenvalues.imax();
    if !(eigen.eigenvalues[index] > 0.0) {
        return Err(CurveError::ill_conditioned("all points coincide"));
    }

    let mut axis: Vector3<f64> = eigen.eigenvectors.column(index).into_owned();
    let span = points[points.len() - 1] - points[0];
    if axis.dot(&span) < 0.0 {
        axis = -axis;
    }
    trace!(?axis, "principal axis");
    Ok(axis)
}

/// Solve the weighted normal equations on normalized parameters `ts`.
///
/// Samples with zero weight do not contribute.
pub(crate) fn solve_normal_equations(
    points: &[Vector3<f64>],
    ts: &[f64],
    weights: Option<&[f64]>,
    order: usize,
) -> Result<Matrix3xX<f64>> {
    let n = order + 1;
    let mut ata = DMatrix::<f64>::zeros(n, n);
    let mut atb = DMatrix::<f64>::zeros(n, 3);
    let mut row = vec![0.0; n];

    for (k, (p, &t)) in points.iter().zip(ts).enumerate() {
        let w = weights.map_or(1.0, |w| w[k]);
        if w == 0.0 {
            continue;
        }
        row[0] = 1.0;
        for i in 1..n {
            row[i] = row[i - 1] * t;
        }
        for i in 0..n {
            let wi = w * row[i];
            for j in 0..n {
                ata[(i, j)] += wi * row[j];
            }
            for axis in 0..3 {
                atb[(i, axis)] += wi * p[axis];
            }
        }
    }

    let svd = ata.svd(true, true);
    let max = svd.singular_values.max();
    let min = svd.singular_values.min();
    if !(max > 0.0) || min <= max * RCOND {
        debug!(order, min, max, "rejecting singular normal equations");
        return Err(CurveError::ill_conditioned(format!(
            "normal equations for order {order} are singular (singular values {min:.3e} / {max:.3e})"
        )));
    }

    let solution = svd.solve(&atb, 0.0).map_err(CurveError::ill_conditioned)?;
    Ok(Matrix3xX::from_fn(n, |axis, i| solution[(i, axis)]))
}

fn validate_samples(
    points: &[Point3<f64>],
    params: &[f64],
    weights: Option<&[f64]>,
    order: usize,
) -> Result<()> {
    if order > MAX_ORDER {
        return Err(CurveError::invalid_argument(format!(
            "order {order} exceeds the maximum supported order {MAX_ORDER}"
        )));
    }
    if params.len() != points.len() {
        return Err(CurveError::dimension_mismatch(
            format!("{} parameter values", points.len()),
            format!("{} parameter values", params.len()),
        ));
    }
    if points.len() < order + 1 {
        return Err(CurveError::insufficient_data(order + 1, points.len()));
    }
    if let Some(i) = params.iter().position(|v| !v.is_finite()) {
        return Err(CurveError::invalid_argument(format!(
            "parameter {i} is not finite"
        )));
    }
    if let Some(i) = points.iter().position(|p| !p.coords.iter().all(|v| v.is_finite())) {
        return Err(CurveError::invalid_argument(format!("point {i} is not finite")));
    }

    if let Some(weights) = weights {
        if weights.len() != points.len() {
            return Err(CurveError::dimension_mismatch(
                format!("{} weights", points.len()),
                format!("{} weights", weights.len()),
            ));
        }
        if let Some(i) = weights.iter().position(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(CurveError::invalid_argument(format!(
                "weight {i} is {}; weights must be finite and non-negative",
                weights[i]
            )));
        }
        let active = weights.iter().filter(|&&w| w > 0.0).count();
        if active < order + 1 {
            return Err(CurveError::insufficient_data(order + 1, active));
        }
    }
    Ok(())
}

impl PolynomialCurve {
    /// Fit the curve to points with known parameter values.
    ///
    /// The domain becomes `[min(params), max(params)]`.
    ///
    /// # Errors
    ///
    /// - [`CurveError::InsufficientData`] if there are fewer than `order + 1` points.
    /// - [`CurveError::DimensionMismatch`] if `params` and `points` differ in length.
    /// - [`CurveError::InvalidArgument`] for non-finite input or a collapsed
    ///   parameter range with `order > 0`.
    /// - [`CurveError::IllConditionedSystem`] if the normal equations are singular.
    pub fn define_from_points(
        &mut self,
        points: &[Point3<f64>],
        params: &[f64],
        order: usize,
    ) -> Result<()> {
        self.fit_samples(points, params, None, order)
    }

    /// Fit the curve to weighted points with known parameter values.
    ///
    /// Weights scale each sample's row in the normal equations; they must be
    /// finite and non-negative, and at least `order + 1` must be positive.
    pub fn define_from_weighted_points(
        &mut self,
        points: &[Point3<f64>],
        params: &[f64],
        weights: &[f64],
        order: usize,
    ) -> Result<()> {
        self.fit_samples(points, params, Some(weights), order)
    }

    /// Matrix form of [`Self::define_from_points`]: one point per column.
    pub fn define_from_point_matrix(
        &mut self,
        points: &Matrix3xX<f64>,
        params: &DVector<f64>,
        order: usize,
    ) -> Result<()> {
        let points = columns_to_points(points);
        self.fit_samples(&points, params.as_slice(), None, order)
    }

    /// Matrix form of [`Self::define_from_weighted_points`].
    pub fn define_from_weighted_point_matrix(
        &mut self,
        points: &Matrix3xX<f64>,
        params: &DVector<f64>,
        weights: &DVector<f64>,
        order: usize,
    ) -> Result<()> {
        let points = columns_to_points(points);
        self.fit_samples(&points, params.as_slice(), Some(weights.as_slice()), order)
    }

    /// Fit the curve to points without parameter values.
    ///
    /// Parameters come from `strategy`; points are then ordered by parameter
    /// and fitted. The resulting domain is relabeled to `[0, length]`.
    pub fn define_from_points_auto(
        &mut self,
        points: &[Point3<f64>],
        strategy: &ParameterStrategy,
        order: usize,
    ) -> Result<()> {
        self.fit_auto(points, None, strategy, order)
    }

    /// Weighted variant of [`Self::define_from_points_auto`].
    pub fn define_from_weighted_points_auto(
        &mut self,
        points: &[Point3<f64>],
        weights: &[f64],
        strategy: &ParameterStrategy,
        order: usize,
    ) -> Result<()> {
        if weights.len() != points.len() {
            return Err(CurveError::dimension_mismatch(
                format!("{} weights", points.len()),
                format!("{} weights", weights.len()),
            ));
        }
        self.fit_auto(points, Some(weights), strategy, order)
    }

    /// Matrix form of [`Self::define_from_points_auto`].
    pub fn define_from_point_matrix_auto(
        &mut self,
        points: &Matrix3xX<f64>,
        strategy: &ParameterStrategy,
        order: usize,
    ) -> Result<()> {
        let points = columns_to_points(points);
        self.fit_auto(&points, None, strategy, order)
    }

    /// Matrix form of [`Self::define_from_weighted_points_auto`].
    pub fn define_from_weighted_point_matrix_auto(
        &mut self,
        points: &Matrix3xX<f64>,
        weights: &DVector<f64>,
        strategy: &ParameterStrategy,
        order: usize,
    ) -> Result<()> {
        let points = columns_to_points(points);
        self.define_from_weighted_points_auto(&points, weights.as_slice(), strategy, order)
    }

    fn fit_auto(
        &mut self,
        points: &[Point3<f64>],
        weights: Option<&[f64]>,
        strategy: &ParameterStrategy,
        order: usize,
    ) -> Result<()> {
        if points.len() < order + 1 {
            return Err(CurveError::insufficient_data(order + 1, points.len()));
        }
        let params = estimate_parameters(points, strategy)?;

        let mut indices: Vec<usize> = (0..points.len()).collect();
        indices.sort_by(|&a, &b| params[a].total_cmp(&params[b]));
        let sorted_points: Vec<Point3<f64>> = indices.iter().map(|&i| points[i]).collect();
        let sorted_params: Vec<f64> = indices.iter().map(|&i| params[i]).collect();
        let sorted_weights: Option<Vec<f64>> =
            weights.map(|w| indices.iter().map(|&i| w[i]).collect());

        self.fit_samples(
            &sorted_points,
            &sorted_params,
            sorted_weights.as_deref(),
            order,
        )?;
        let length = self.length();
        if length > 0.0 {
            self.set_boundaries(0.0, length)?;
        }
        Ok(())
    }

    fn fit_samples(
        &mut self,
        points: &[Point3<f64>],
        params: &[f64],
        weights: Option<&[f64]>,
        order: usize,
    ) -> Result<()> {
        validate_samples(points, params, weights, order)?;

        let lo = params.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = params.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = hi - lo;
        if !(span > 0.0) && order > 0 {
            return Err(CurveError::invalid_argument(
                "parameter values span an empty domain",
            ));
        }

        let ts: Vec<f64> = params
            .iter()
            .map(|&p| if span > 0.0 { (p - lo) / span } else { 0.0 })
            .collect();
        let coords: Vec<Vector3<f64>> = points.iter().map(|p| p.coords).collect();
        let coefficients = solve_normal_equations(&coords, &ts, weights, order)?;

        self.replace_coefficients(coefficients);
        self.set_boundaries(lo, hi)?;
        debug!(
            order,
            samples = points.len(),
            weighted = weights.is_some(),
            "fitted polynomial curve"
        );
        Ok(())
    }
}

fn columns_to_points(points: &Matrix3xX<f64>) -> Vec<Point3<f64>> {
    points
        .column_iter()
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spread_points() -> (Vec<Point3<f64>>, Vec<f64>) {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(0.0, 0.0, 3.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(0.0, 0.0, 3.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(2.0, 2.0, 0.0),
            Point3::new(2.0, 0.0, 2.0),
        ];
        let params = (0..10).map(f64::from).collect();
        (points, params)
    }

    #[test]
    fn test_exact_interpolation() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let params = [0.0, 1.0, 2.0, 3.0];
        let mut curve = PolynomialCurve::new();
        curve.define_from_points(&points, &params, 3).unwrap();

        assert_eq!(curve.order(), 3);
        assert_eq!(curve.start_parameter(), 0.0);
        assert_eq!(curve.end_parameter(), 3.0);
        for (p, &s) in points.iter().zip(&params) {
            assert_relative_eq!(curve.point(s), *p, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_insufficient_points() {
        let (points, params) = spread_points();
        let mut curve = PolynomialCurve::new();
        let err = curve
            .define_from_points(&points[..3], &params[..3], 4)
            .unwrap_err();
        assert_eq!(err, CurveError::insufficient_data(5, 3));
    }

    #[test]
    fn test_param_length_mismatch() {
        let (points, params) = spread_points();
        let mut curve = PolynomialCurve::new();
        let err = curve
            .define_from_points(&points, &params[..5], 3)
            .unwrap_err();
        assert!(err.is_dimension_mismatch());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let (points, params) = spread_points();
        let mut weights = vec![1.0; 10];
        weights[4] = -0.5;
        let mut curve = PolynomialCurve::new();
        let err = curve
            .define_from_weighted_points(&points, &params, &weights, 3)
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_too_few_positive_weights() {
        let (points, params) = spread_points();
        let mut weights = vec![0.0; 10];
        weights[0] = 1.0;
        weights[9] = 1.0;
        let mut curve = PolynomialCurve::new();
        let err = curve
            .define_from_weighted_points(&points, &params, &weights, 3)
            .unwrap_err();
        assert_eq!(err, CurveError::insufficient_data(4, 2));
    }

    #[test]
    fn test_duplicate_params_are_ill_conditioned() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        let params = [0.0, 0.0, 1.0, 1.0];
        let mut curve = PolynomialCurve::new();
        let err = curve.define_from_points(&points, &params, 3).unwrap_err();
        assert!(err.is_ill_conditioned());
    }

    #[test]
    fn test_collapsed_params_rejected() {
        let points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let mut curve = PolynomialCurve::new();
        let err = curve.define_from_points(&points, &[2.0, 2.0], 1).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_matrix_and_slice_forms_agree() {
        let (points, params) = spread_points();
        let weights: Vec<f64> = (0..10).map(|i| 1.0 + 0.2 * (f64::from(i % 3) - 1.0)).collect();

        let mut from_slices = PolynomialCurve::new();
        from_slices
            .define_from_weighted_points(&points, &params, &weights, 3)
            .unwrap();

        let matrix = Matrix3xX::from_columns(&points.iter().map(|p| p.coords).collect::<Vec<_>>());
        let mut from_matrix = PolynomialCurve::new();
        from_matrix
            .define_from_weighted_point_matrix(
                &matrix,
                &DVector::from_vec(params.clone()),
                &DVector::from_vec(weights),
                3,
            )
            .unwrap();

        assert_eq!(from_slices, from_matrix);
    }

    #[test]
    fn test_zero_weight_samples_are_ignored() {
        let mut points: Vec<Point3<f64>> =
            (0..6).map(|i| Point3::new(f64::from(i), 0.0, 0.0)).collect();
        points[3] = Point3::new(3.0, 50.0, 0.0);
        let params: Vec<f64> = (0..6).map(f64::from).collect();
        let mut weights = vec![1.0; 6];
        weights[3] = 0.0;

        let mut curve = PolynomialCurve::new();
        curve
            .define_from_weighted_points(&points, &params, &weights, 1)
            .unwrap();
        assert_relative_eq!(curve.point(3.0).y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_principal_axis_parameters_are_monotonic() {
        let points: Vec<Point3<f64>> = (0..5)
            .map(|i| Point3::new(0.1 * f64::from(i), 0.0, 0.0))
            .rev()
            .collect();
        let params = estimate_parameters(&points, &ParameterStrategy::PrincipalAxis).unwrap();
        // Axis is oriented from the first point to the last.
        assert_relative_eq!(params[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(params[4], 0.4, epsilon = 1e-12);
        assert!(params.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_direction_hint() {
        let (points, _) = spread_points();
        let params =
            estimate_parameters(&points, &ParameterStrategy::Direction(Vector3::new(2.0, 0.0, 0.0)))
                .unwrap();
        assert_relative_eq!(params[8], 2.0, epsilon = 1e-12);
        assert_relative_eq!(params[1], 1.0, epsilon = 1e-12);

        let err = estimate_parameters(&points, &ParameterStrategy::Direction(Vector3::zeros()))
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_chord_length_parameters() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 4.0, 0.0),
            Point3::new(3.0, 4.0, 1.0),
        ];
        let params = estimate_parameters(&points, &ParameterStrategy::ChordLength).unwrap();
        assert_eq!(params, vec![0.0, 5.0, 6.0]);
    }

    #[test]
    fn test_coincident_points_rejected() {
        let points = vec![Point3::new(1.0, 1.0, 1.0); 6];
        for strategy in [
            ParameterStrategy::PrincipalAxis,
            ParameterStrategy::ChordLength,
            ParameterStrategy::Direction(Vector3::x()),
        ] {
            let err = estimate_parameters(&points, &strategy).unwrap_err();
            assert!(err.is_ill_conditioned(), "{strategy:?}");
        }
    }

    #[test]
    fn test_perpendicular_hint_rejected() {
        let points: Vec<Point3<f64>> = (0..5).map(|i| Point3::new(0.0, f64::from(i), 0.0)).collect();
        let err = estimate_parameters(&points, &ParameterStrategy::Direction(Vector3::x()))
            .unwrap_err();
        assert!(err.is_ill_conditioned());
    }

    #[test]
    fn test_auto_fit_sets_metric_domain() {
        let points: Vec<Point3<f64>> = (0..8)
            .map(|i| {
                let x = 0.1 * f64::from(i);
                Point3::new(x, 0.2 * x * x, 0.0)
            })
            .collect();
        let mut curve = PolynomialCurve::new();
        curve
            .define_from_points_auto(&points, &ParameterStrategy::Direction(Vector3::x()), 2)
            .unwrap();
        assert_eq!(curve.start_parameter(), 0.0);
        assert_relative_eq!(curve.end_parameter(), curve.length(), epsilon = 1e-12);
        assert_relative_eq!(curve.start_point(), points[0], epsilon = 1e-9);
        assert_relative_eq!(curve.end_point(), points[7], epsilon = 1e-9);
    }

    #[test]
    fn test_auto_fit_weight_length_mismatch() {
        let (points, _) = spread_points();
        let mut curve = PolynomialCurve::new();
        let err = curve
            .define_from_weighted_points_auto(&points, &[1.0; 3], &ParameterStrategy::default(), 3)
            .unwrap_err();
        assert!(err.is_dimension_mismatch());
    }

    #[test]
    fn test_weighted_auto_matrix_and_slice_forms_agree() {
        let points: Vec<Point3<f64>> = (0..9)
            .map(|i| {
                let x = 0.1 * f64::from(i);
                Point3::new(x, 0.3 * x * x, 0.05 * x.sin())
            })
            .collect();
        let weights: Vec<f64> = (0..9)
            .map(|i| if i == 0 || i == 8 { 10.0 } else { 1.0 })
            .collect();
        let strategy = ParameterStrategy::default();

        let mut from_slices = PolynomialCurve::new();
        from_slices
            .define_from_weighted_points_auto(&points, &weights, &strategy, 3)
            .unwrap();

        let matrix = Matrix3xX::from_columns(&points.iter().map(|p| p.coords).collect::<Vec<_>>());
        let mut from_matrix = PolynomialCurve::new();
        from_matrix
            .define_from_weighted_point_matrix_auto(
                &matrix,
                &DVector::from_vec(weights),
                &strategy,
                3,
            )
            .unwrap();

        assert_eq!(from_slices, from_matrix);
        assert_relative_eq!(from_matrix.start_point(), points[0], epsilon = 1e-2);

        let err = from_matrix
            .define_from_weighted_point_matrix_auto(
                &matrix,
                &DVector::from_element(4, 1.0),
                &strategy,
                3,
            )
            .unwrap_err();
        assert!(err.is_dimension_mismatch());
    }
}
