//! Polynomial parametric curves in 3D.
//!
//! A [`PolynomialCurve`] of order `n` stores a `3 x (n+1)` coefficient matrix.
//! Row `r` holds the polynomial of axis `r`, column `i` the coefficient of
//! `t^i`, where `t ∈ [0, 1]` is the normalized parameter:
//!
//! ```text
//! t = (s - s0) / (s1 - s0)        P(s) = Σ c_i t^i
//! ```
//!
//! The user-facing parameter `s` lives in the domain `[s0, s1]`. Changing the
//! domain with [`PolynomialCurve::set_boundaries`] relabels the same shape;
//! [`PolynomialCurve::change_coefficients_to_fit_boundaries`] keeps the
//! polynomial `P(s)` and rewrites the coefficients instead.
//!
//! # Domain policy
//!
//! Every evaluation clamps `s` into `[s0, s1]`, so a parameter that drifts
//! just outside the domain through rounding evaluates at the nearest end.

use nalgebra::{DMatrix, Matrix3xX, Point3, Vector3};

use crate::fit::solve_normal_equations;
use crate::pose::RigidPose;
use crate::{CurveError, Result};

/// Highest supported polynomial order.
///
/// Monomial normal equations above this order are too badly conditioned to
/// produce meaningful coefficients.
pub const MAX_ORDER: usize = 20;

/// Number of polyline segments used when the cached length is refreshed.
pub const DEFAULT_LENGTH_SAMPLES: usize = 50;

/// A 3D curve whose coordinates are polynomials of a scalar parameter.
///
/// Equality compares order, domain and coefficients exactly. The cached
/// physical length does not take part in comparisons.
#[derive(Debug, Clone)]
pub struct PolynomialCurve {
    order: usize,
    coefficients: Matrix3xX<f64>,
    start: f64,
    end: f64,
    length: f64,
}

impl Default for PolynomialCurve {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PolynomialCurve {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
            && self.start == other.start
            && self.end == other.end
            && self.coefficients == other.coefficients
    }
}

impl PolynomialCurve {
    /// Create an order-0 curve at the origin over the domain `[0, 1]`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            order: 0,
            coefficients: Matrix3xX::zeros(1),
            start: 0.0,
            end: 1.0,
            length: 0.0,
        }
    }

    /// Create a curve of the given order with all coefficients zero.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::InvalidArgument`] if `order > MAX_ORDER`.
    pub fn with_order(order: usize) -> Result<Self> {
        check_order(order)?;
        Ok(Self {
            order,
            coefficients: Matrix3xX::zeros(order + 1),
            ..Self::new()
        })
    }

    /// Create a curve over `[0, 1]` from a `3 x (n+1)` coefficient matrix.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::DimensionMismatch`] for a matrix without columns
    /// and [`CurveError::InvalidArgument`] if the order exceeds [`MAX_ORDER`].
    pub fn from_coefficients(coefficients: Matrix3xX<f64>) -> Result<Self> {
        if coefficients.ncols() == 0 {
            return Err(CurveError::dimension_mismatch("3x(n+1) with n >= 0", "3x0"));
        }
        let order = coefficients.ncols() - 1;
        check_order(order)?;
        let mut curve = Self {
            order,
            coefficients,
            ..Self::new()
        };
        curve.refresh_length();
        Ok(curve)
    }

    /// Polynomial order.
    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Change the polynomial order.
    ///
    /// Raising the order pads with zero coefficients and keeps the shape
    /// exactly. Lowering it refits the current shape by least squares.
    pub fn set_order(&mut self, order: usize) -> Result<()> {
        check_order(order)?;
        if order == self.order {
            return Ok(());
        }
        if order > self.order {
            let mut coefficients = Matrix3xX::zeros(order + 1);
            coefficients
                .columns_mut(0, self.order + 1)
                .copy_from(&self.coefficients);
            self.coefficients = coefficients;
        } else {
            let lowered = self.new_order_polynomial_curve(order)?;
            self.coefficients = lowered.coefficients;
        }
        self.order = order;
        self.refresh_length();
        Ok(())
    }

    /// Coefficient matrix (`3 x (order+1)`).
    #[must_use]
    pub fn coefficients(&self) -> &Matrix3xX<f64> {
        &self.coefficients
    }

    /// Replace the coefficients; the order becomes `ncols - 1`.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::DimensionMismatch`] unless the matrix has three
    /// rows and at least one column.
    pub fn set_polynomial_coefficients(&mut self, coefficients: &DMatrix<f64>) -> Result<()> {
        if coefficients.nrows() != 3 || coefficients.ncols() == 0 {
            return Err(CurveError::dimension_mismatch(
                "3x(n+1) with n >= 0",
                format!("{}x{}", coefficients.nrows(), coefficients.ncols()),
            ));
        }
        let order = coefficients.ncols() - 1;
        check_order(order)?;
        self.coefficients = Matrix3xX::from_fn(order + 1, |r, c| coefficients[(r, c)]);
        self.order = order;
        self.refresh_length();
        Ok(())
    }

    /// Replace the coefficients from a fixed-row matrix.
    pub(crate) fn replace_coefficients(&mut self, coefficients: Matrix3xX<f64>) {
        self.order = coefficients.ncols().saturating_sub(1);
        self.coefficients = coefficients;
        self.refresh_length();
    }

    // ------------------------------------------------------------------
    // Domain and length
    // ------------------------------------------------------------------

    /// Start of the parametric domain.
    #[must_use]
    pub fn start_parameter(&self) -> f64 {
        self.start
    }

    /// End of the parametric domain.
    #[must_use]
    pub fn end_parameter(&self) -> f64 {
        self.end
    }

    /// Set the start of the domain, keeping the end.
    pub fn set_start_parameter(&mut self, start: f64) -> Result<()> {
        self.set_boundaries(start, self.end)
    }

    /// Set the end of the domain, keeping the start.
    pub fn set_end_parameter(&mut self, end: f64) -> Result<()> {
        self.set_boundaries(self.start, end)
    }

    /// Relabel the parametric domain. The shape is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::InvalidArgument`] if a bound is not finite or
    /// `start > end`.
    pub fn set_boundaries(&mut self, start: f64, end: f64) -> Result<()> {
        check_domain(start, end)?;
        self.start = start;
        self.end = end;
        Ok(())
    }

    /// Width of the parametric domain, `s1 - s0`.
    #[must_use]
    pub fn parametric_length(&self) -> f64 {
        self.end - self.start
    }

    /// Move the end of the domain so that `s1 - s0 == length`.
    pub fn set_parametric_length(&mut self, length: f64) -> Result<()> {
        if !length.is_finite() || length < 0.0 {
            return Err(CurveError::invalid_argument(format!(
                "parametric length must be finite and non-negative, got {length}"
            )));
        }
        self.set_boundaries(self.start, self.start + length)
    }

    /// Cached physical length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Declare the physical length of the curve.
    pub fn set_length(&mut self, length: f64) -> Result<()> {
        if !length.is_finite() || length < 0.0 {
            return Err(CurveError::invalid_argument(format!(
                "length must be finite and non-negative, got {length}"
            )));
        }
        self.length = length;
        Ok(())
    }

    /// Estimate the arc length by summing a polyline of `n_samples` segments.
    ///
    /// The estimate never exceeds the true length and converges to it as
    /// `n_samples` grows.
    #[must_use]
    pub fn estimate_length(&self, n_samples: usize) -> f64 {
        let n = n_samples.max(1);
        let mut previous = self.eval_normalized(0.0);
        let mut total = 0.0;
        for i in 1..=n {
            let current = self.eval_normalized(i as f64 / n as f64);
            total += (current - previous).norm();
            previous = current;
        }
        total
    }

    fn refresh_length(&mut self) {
        self.length = self.estimate_length(DEFAULT_LENGTH_SAMPLES);
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Normalized parameter for `s`, clamped to `[0, 1]`.
    #[must_use]
    pub fn normalized_parameter(&self, s: f64) -> f64 {
        let span = self.end - self.start;
        if span > 0.0 {
            ((s - self.start) / span).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn parameter_from_normalized(&self, t: f64) -> f64 {
        self.start + t * (self.end - self.start)
    }

    // d/ds = (1 / span) d/dt; a collapsed domain keeps d/dt.
    fn derivative_scale(&self) -> f64 {
        let span = self.end - self.start;
        if span > 0.0 { 1.0 / span } else { 1.0 }
    }

    pub(crate) fn eval_normalized(&self, t: f64) -> Vector3<f64> {
        let mut acc = Vector3::zeros();
        for i in (0..=self.order).rev() {
            acc = acc * t + self.coefficients.column(i);
        }
        acc
    }

    fn derivative_normalized(&self, t: f64, k: usize) -> Vector3<f64> {
        if k > self.order {
            return Vector3::zeros();
        }
        let mut acc = Vector3::zeros();
        for i in (k..=self.order).rev() {
            acc = acc * t + self.coefficients.column(i) * falling_factorial(i, k);
        }
        acc
    }

    /// Point at parameter `s`.
    #[must_use]
    pub fn point(&self, s: f64) -> Point3<f64> {
        Point3::from(self.eval_normalized(self.normalized_parameter(s)))
    }

    /// Points at several parameters, one per column.
    #[must_use]
    pub fn points(&self, params: &[f64]) -> Matrix3xX<f64> {
        let mut out = Matrix3xX::zeros(params.len());
        for (j, &s) in params.iter().enumerate() {
            out.set_column(j, &self.point(s).coords);
        }
        out
    }

    /// Point at the start of the domain.
    #[must_use]
    pub fn start_point(&self) -> Point3<f64> {
        Point3::from(self.eval_normalized(0.0))
    }

    /// Point at the end of the domain.
    #[must_use]
    pub fn end_point(&self) -> Point3<f64> {
        Point3::from(self.eval_normalized(1.0))
    }

    /// `k`-th derivative with respect to `s`. `k = 0` gives the point.
    #[must_use]
    pub fn derivative(&self, s: f64, k: usize) -> Vector3<f64> {
        let t = self.normalized_parameter(s);
        let scale = self.derivative_scale().powi(k as i32);
        self.derivative_normalized(t, k) * scale
    }

    /// Unit tangent at `s`, or zero where the first derivative vanishes.
    #[must_use]
    pub fn tangent(&self, s: f64) -> Vector3<f64> {
        self.derivative(s, 1)
            .try_normalize(f64::MIN_POSITIVE)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Unit tangent at the start of the domain.
    #[must_use]
    pub fn start_tangent(&self) -> Vector3<f64> {
        self.tangent(self.start)
    }

    /// Unit tangent at the end of the domain.
    #[must_use]
    pub fn end_tangent(&self) -> Vector3<f64> {
        self.tangent(self.end)
    }

    /// Curvature `|P' x P''| / |P'|^3` at `s`; zero where the speed vanishes.
    #[must_use]
    pub fn curvature(&self, s: f64) -> f64 {
        let d1 = self.derivative(s, 1);
        let d2 = self.derivative(s, 2);
        let speed = d1.norm();
        if speed > 1e-12 {
            d1.cross(&d2).norm() / speed.powi(3)
        } else {
            0.0
        }
    }

    /// Parameter of the curve point closest to `point`.
    ///
    /// Seeds from `samples` uniform samples and refines with Newton steps on
    /// `(P(t) - q) · P'(t) = 0`.
    #[must_use]
    pub fn closest_parameter(&self, point: &Point3<f64>, samples: usize) -> f64 {
        let n = samples.max(2);
        let target = point.coords;
        let mut best_t = 0.0;
        let mut best_dist = f64::INFINITY;
        for i in 0..=n {
            let t = i as f64 / n as f64;
            let dist = (self.eval_normalized(t) - target).norm_squared();
            if dist < best_dist {
                best_dist = dist;
                best_t = t;
            }
        }

        let mut t = best_t;
        for _ in 0..8 {
            let diff = self.eval_normalized(t) - target;
            let d1 = self.derivative_normalized(t, 1);
            let d2 = self.derivative_normalized(t, 2);
            let f = diff.dot(&d1);
            let df = d1.norm_squared() + diff.dot(&d2);
            if df <= 0.0 {
                break;
            }
            let next = (t - f / df).clamp(0.0, 1.0);
            let step = (next - t).abs();
            t = next;
            if step < 1e-14 {
                break;
            }
        }
        if (self.eval_normalized(t) - target).norm_squared() > best_dist {
            t = best_t;
        }
        self.parameter_from_normalized(t)
    }

    /// Mean distance of `n_samples` curve points to the start-to-end chord.
    #[must_use]
    pub fn mean_axis_deviation(&self, n_samples: usize) -> f64 {
        let n = n_samples.max(2);
        let origin = self.eval_normalized(0.0);
        let chord = self.eval_normalized(1.0) - origin;
        let axis = chord.try_normalize(1e-15);
        let mut total = 0.0;
        for i in 0..n {
            let p = self.eval_normalized(i as f64 / (n - 1) as f64) - origin;
            total += match axis {
                Some(u) => p.cross(&u).norm(),
                None => p.norm(),
            };
        }
        total / n as f64
    }

    /// Dense polyline of `n_points` uniformly spaced points for display.
    #[must_use]
    pub fn rendering_points(&self, n_points: usize) -> Vec<Point3<f64>> {
        let n = n_points.max(2);
        (0..n)
            .map(|i| Point3::from(self.eval_normalized(i as f64 / (n - 1) as f64)))
            .collect()
    }

    fn control_parameters(&self) -> Vec<f64> {
        if self.order == 0 {
            return vec![0.0];
        }
        (0..=self.order)
            .map(|j| j as f64 / self.order as f64)
            .collect()
    }

    /// The `order + 1` curve points at evenly spaced parameters.
    #[must_use]
    pub fn control_points(&self) -> Matrix3xX<f64> {
        let ts = self.control_parameters();
        Matrix3xX::from_columns(
            &ts.iter()
                .map(|&t| self.eval_normalized(t))
                .collect::<Vec<_>>(),
        )
    }

    /// Make the curve interpolate the given control points exactly.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::DimensionMismatch`] unless there are exactly
    /// `order + 1` columns.
    pub fn set_control_points(&mut self, control_points: &Matrix3xX<f64>) -> Result<()> {
        if control_points.ncols() != self.order + 1 {
            return Err(CurveError::dimension_mismatch(
                format!("3x{}", self.order + 1),
                format!("3x{}", control_points.ncols()),
            ));
        }
        let points: Vec<Vector3<f64>> = control_points
            .column_iter()
            .map(|c| c.into_owned())
            .collect();
        let coefficients =
            solve_normal_equations(&points, &self.control_parameters(), None, self.order)?;
        self.replace_coefficients(coefficients);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Derived curves and reparameterization
    // ------------------------------------------------------------------

    /// Curve of the same order over `[sa, sb]` following the same path.
    ///
    /// The sub-curve is obtained by resampling this curve and refitting.
    ///
    /// # Errors
    ///
    /// Returns [`CurveError::InvalidArgument`] unless
    /// `s0 <= sa < sb <= s1`.
    pub fn sub_polynomial_curve(&self, sa: f64, sb: f64) -> Result<Self> {
        if !(sa.is_finite() && sb.is_finite() && self.start <= sa && sa < sb && sb <= self.end) {
            return Err(CurveError::invalid_argument(format!(
                "sub-curve bounds [{sa}, {sb}] must satisfy {} <= sa < sb <= {}",
                self.start, self.end
            )));
        }
        let n = resample_count(self.order);
        let ts: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
        let points: Vec<Vector3<f64>> = ts
            .iter()
            .map(|&u| self.point(sa + u * (sb - sa)).coords)
            .collect();
        let coefficients = solve_normal_equations(&points, &ts, None, self.order)?;

        let mut sub = Self {
            order: self.order,
            coefficients,
            start: sa,
            end: sb,
            length: 0.0,
        };
        sub.refresh_length();
        Ok(sub)
    }

    /// Least-squares approximation of this curve with order `order`.
    ///
    /// Raising the order is exact; lowering it is lossy.
    pub fn new_order_polynomial_curve(&self, order: usize) -> Result<Self> {
        check_order(order)?;
        if order == self.order {
            return Ok(self.clone());
        }
        let n = resample_count(order.max(self.order));
        let ts: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64).collect();
        let points: Vec<Vector3<f64>> = ts.iter().map(|&t| self.eval_normalized(t)).collect();
        let coefficients = solve_normal_equations(&points, &ts, None, order)?;

        let mut curve = Self {
            order,
            coefficients,
            start: self.start,
            end: self.end,
            length: 0.0,
        };
        curve.refresh_length();
        Ok(curve)
    }

    /// Keep the polynomial `P(s)` but restrict or extend it to `[start, end]`.
    ///
    /// The coefficients are rewritten by the affine substitution
    /// `t = a + b t'`; no refitting happens.
    pub fn change_coefficients_to_fit_boundaries(&mut self, start: f64, end: f64) -> Result<()> {
        check_domain(start, end)?;
        let span = self.end - self.start;
        let (a, b) = if span > 0.0 {
            ((start - self.start) / span, (end - start) / span)
        } else {
            (0.0, 0.0)
        };
        self.coefficients = affine_substitution(&self.coefficients, a, b);
        self.start = start;
        self.end = end;
        self.refresh_length();
        Ok(())
    }

    /// Stretch the domain so that `s1 - s0` equals the cached physical length.
    pub fn change_coefficients_to_fit_metric_length(&mut self) {
        self.end = self.start + self.length;
    }

    /// Traverse the same path in the opposite direction over the same domain.
    ///
    /// The substitution `t -> 1 - t` is exact in real arithmetic but rounds
    /// in floating point, so reversing twice restores the coefficients only
    /// to within about `1e-10` relative to the largest coefficient. Curves
    /// with small integer coefficients come back bit-identical; fitted
    /// curves generally do not, and should be compared with a tolerance
    /// rather than `==`.
    pub fn reverse(&mut self) {
        self.coefficients = affine_substitution(&self.coefficients, 1.0, -1.0);
    }

    /// Apply a rigid motion to the curve.
    ///
    /// Rotation acts on every coefficient vector; translation only on the
    /// constant term.
    pub fn apply_pose(&mut self, pose: &RigidPose) {
        let rotation = pose.rotation.to_rotation_matrix();
        self.coefficients = rotation.matrix() * &self.coefficients;
        let mut constant = self.coefficients.column_mut(0);
        constant += pose.translation;
    }

    /// Apply a rigid motion given as translation plus theta-u rotation.
    pub fn move_by(&mut self, tx: f64, ty: f64, tz: f64, rx: f64, ry: f64, rz: f64) {
        self.apply_pose(&RigidPose::from_pose_vector(tx, ty, tz, rx, ry, rz));
    }

    /// Scale the curve uniformly about the origin.
    pub fn scale(&mut self, factor: f64) {
        self.coefficients *= factor;
        self.length *= factor.abs();
    }
}

fn check_order(order: usize) -> Result<()> {
    if order > MAX_ORDER {
        return Err(CurveError::invalid_argument(format!(
            "order {order} exceeds the maximum supported order {MAX_ORDER}"
        )));
    }
    Ok(())
}

fn check_domain(start: f64, end: f64) -> Result<()> {
    if !start.is_finite() || !end.is_finite() || start > end {
        return Err(CurveError::invalid_argument(format!(
            "domain [{start}, {end}] must be finite with start <= end"
        )));
    }
    Ok(())
}

fn resample_count(order: usize) -> usize {
    4 * (order + 1)
}

fn falling_factorial(i: usize, k: usize) -> f64 {
    ((i + 1 - k)..=i).map(|v| v as f64).product()
}

/// Rewrite `Σ c_i t^i` as a polynomial in `t'` where `t = a + b t'`.
fn affine_substitution(coefficients: &Matrix3xX<f64>, a: f64, b: f64) -> Matrix3xX<f64> {
    let n = coefficients.ncols();
    let mut out = Matrix3xX::zeros(n);
    for i in 0..n {
        // (a + b t')^i = Σ_j C(i, j) a^(i-j) b^j t'^j
        let mut binomial = 1.0;
        for j in 0..=i {
            let factor = binomial * a.powi((i - j) as i32) * b.powi(j as i32);
            if factor != 0.0 {
                let mut column = out.column_mut(j);
                column += coefficients.column(i) * factor;
            }
            binomial = binomial * (i - j) as f64 / (j + 1) as f64;
        }
    }
    out
}
