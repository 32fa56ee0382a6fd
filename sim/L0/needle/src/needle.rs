//! Needle mechanical properties and segmented centerline.
//!
//! The centerline is an ordered sequence of [`PolynomialCurve`] segments.
//! Segment `k` is parameterized by local arc length over `[0, ℓ_k]`; a
//! distance `d` from the base maps to a segment and a local parameter with
//! [`Needle::locate`].
//!
//! ```text
//!  base                                            tip
//!   ●━━━━━━━━━━━━━━┿━━━━━━━━━━━━━━┿━━━━━━━━━━━━━━━━●
//!   0    seg 0     ℓ0    seg 1   ℓ0+ℓ1   seg 2      L
//! ```

use std::f64::consts::PI;

use curve_polynomial::{Curve3, MAX_ORDER, PolynomialCurve, RigidPose};
use nalgebra::{Matrix3xX, Point3, Vector3};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::preset::NeedlePreset;
use crate::surface::TissueSurface;
use crate::{NeedleError, Result};

/// Scan steps per segment when locating the tissue entry point.
const ENTRY_SCAN_STEPS: usize = 64;

/// Bisection steps refining the entry point.
const ENTRY_BISECTIONS: usize = 60;

/// Mechanical properties of a tubular needle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeedleProperties {
    /// Outer diameter (m).
    pub outer_diameter: f64,

    /// Inner diameter of the lumen (m). Zero for a solid needle.
    pub inside_diameter: f64,

    /// Young's modulus of the needle material (Pa).
    pub youngs_modulus: f64,

    /// Free length from base to tip (m).
    pub length: f64,
}

impl Default for NeedleProperties {
    fn default() -> Self {
        NeedlePreset::BiopsyNeedle.properties()
    }
}

impl NeedleProperties {
    /// Create needle properties.
    #[must_use]
    pub const fn new(
        outer_diameter: f64,
        inside_diameter: f64,
        youngs_modulus: f64,
        length: f64,
    ) -> Self {
        Self {
            outer_diameter,
            inside_diameter,
            youngs_modulus,
            length,
        }
    }

    /// Second moment of area of the annular cross-section, `π(D⁴ − d⁴)/64`.
    #[must_use]
    pub fn second_moment_of_area(&self) -> f64 {
        PI * (self.outer_diameter.powi(4) - self.inside_diameter.powi(4)) / 64.0
    }

    /// Flexural rigidity `E·I` (N·m²).
    #[must_use]
    pub fn bending_stiffness(&self) -> f64 {
        self.youngs_modulus * self.second_moment_of_area()
    }

    /// True if the needle has a lumen.
    #[must_use]
    pub fn is_cannulated(&self) -> bool {
        self.inside_diameter > 0.0
    }

    /// Validate the properties.
    ///
    /// # Errors
    ///
    /// Returns [`NeedleError::InvalidConfig`] unless the outer diameter,
    /// modulus and length are positive and `0 <= inside < outer`.
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.outer_diameter) {
            return Err(NeedleError::invalid_config(format!(
                "outer diameter must be positive, got {}",
                self.outer_diameter
            )));
        }
        if !(self.inside_diameter.is_finite()
            && self.inside_diameter >= 0.0
            && self.inside_diameter < self.outer_diameter)
        {
            return Err(NeedleError::invalid_config(format!(
                "inside diameter {} must lie in [0, {})",
                self.inside_diameter, self.outer_diameter
            )));
        }
        if !positive(self.youngs_modulus) {
            return Err(NeedleError::invalid_config(format!(
                "Young's modulus must be positive, got {}",
                self.youngs_modulus
            )));
        }
        if !positive(self.length) {
            return Err(NeedleError::invalid_config(format!(
                "needle length must be positive, got {}",
                self.length
            )));
        }
        Ok(())
    }
}

/// A flexible needle: properties, base pose and centerline segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Needle {
    properties: NeedleProperties,
    base_pose: RigidPose,
    segments: Vec<PolynomialCurve>,
}

impl Needle {
    /// Create a straight single-segment needle along the z axis of the
    /// identity base pose.
    ///
    /// # Errors
    ///
    /// Returns [`NeedleError::InvalidConfig`] for invalid properties and
    /// [`NeedleError::InvalidArgument`] if `order` exceeds [`MAX_ORDER`].
    pub fn new(properties: NeedleProperties, order: usize) -> Result<Self> {
        properties.validate()?;
        check_orders(&[order])?;
        let base_pose = RigidPose::identity();
        let segments = straight_segments(&properties, &base_pose, &[order])?;
        Ok(Self {
            properties,
            base_pose,
            segments,
        })
    }

    /// Move the needle rigidly so its base sits at `pose`.
    #[must_use]
    pub fn with_base_pose(mut self, pose: RigidPose) -> Self {
        self.set_base_pose(pose);
        self
    }

    /// Mechanical properties.
    #[must_use]
    pub fn properties(&self) -> &NeedleProperties {
        &self.properties
    }

    /// Replace the mechanical properties.
    ///
    /// A change of length rebuilds a straight centerline along the current
    /// base pose with the same segment orders.
    pub fn set_properties(&mut self, properties: NeedleProperties) -> Result<()> {
        properties.validate()?;
        let reshape = properties.length != self.properties.length;
        self.properties = properties;
        if reshape {
            self.reset_straight()?;
        }
        Ok(())
    }

    /// Set the outer diameter.
    pub fn set_outer_diameter(&mut self, diameter: f64) -> Result<()> {
        self.set_properties(NeedleProperties {
            outer_diameter: diameter,
            ..self.properties
        })
    }

    /// Set the inside diameter.
    pub fn set_inside_diameter(&mut self, diameter: f64) -> Result<()> {
        self.set_properties(NeedleProperties {
            inside_diameter: diameter,
            ..self.properties
        })
    }

    /// Set Young's modulus.
    pub fn set_youngs_modulus(&mut self, modulus: f64) -> Result<()> {
        self.set_properties(NeedleProperties {
            youngs_modulus: modulus,
            ..self.properties
        })
    }

    /// Set the free length. Resets the centerline to a straight shape.
    pub fn set_length(&mut self, length: f64) -> Result<()> {
        self.set_properties(NeedleProperties {
            length,
            ..self.properties
        })
    }

    /// Free length from base to tip.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.properties.length
    }

    /// Straighten the needle along the z axis of its base pose.
    pub fn reset_straight(&mut self) -> Result<()> {
        let orders = self.segment_orders();
        self.segments = straight_segments(&self.properties, &self.base_pose, &orders)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Base pose
    // ------------------------------------------------------------------

    /// World pose of the needle base.
    #[must_use]
    pub fn base_pose(&self) -> &RigidPose {
        &self.base_pose
    }

    /// Base position.
    #[must_use]
    pub fn base_position(&self) -> Point3<f64> {
        self.base_pose.position()
    }

    /// Insertion direction at the base (the base pose's z axis).
    #[must_use]
    pub fn base_direction(&self) -> Vector3<f64> {
        self.base_pose.z_axis()
    }

    /// Rigidly move the whole needle so that its base sits at `pose`.
    pub fn set_base_pose(&mut self, pose: RigidPose) {
        let delta = pose.compose(&self.base_pose.inverse());
        for segment in &mut self.segments {
            segment.apply_pose(&delta);
        }
        self.base_pose = pose;
    }

    /// Apply a world-frame rigid motion to the whole needle.
    pub fn apply_pose(&mut self, pose: &RigidPose) {
        for segment in &mut self.segments {
            segment.apply_pose(pose);
        }
        self.base_pose = pose.compose(&self.base_pose);
    }

    // ------------------------------------------------------------------
    // Segments
    // ------------------------------------------------------------------

    /// Centerline segments from base to tip.
    #[must_use]
    pub fn segments(&self) -> &[PolynomialCurve] {
        &self.segments
    }

    /// Number of segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Segment `index`.
    ///
    /// # Errors
    ///
    /// Returns [`NeedleError::IndexOutOfBounds`] if there is no such segment.
    pub fn segment(&self, index: usize) -> Result<&PolynomialCurve> {
        let count = self.segments.len();
        self.segments.get(index).ok_or_else(|| {
            NeedleError::index_out_of_bounds(format!("segment {index} of {count}"))
        })
    }

    /// Change the order of segment `index`, refitting its current shape.
    ///
    /// The segment keeps its `[0, ℓ_k]` domain. Raising the order is exact;
    /// lowering it is a least-squares approximation.
    ///
    /// # Errors
    ///
    /// Returns [`NeedleError::IndexOutOfBounds`] if there is no such segment
    /// and [`NeedleError::InvalidArgument`] for an order above [`MAX_ORDER`].
    pub fn set_segment_order(&mut self, index: usize, order: usize) -> Result<()> {
        check_orders(&[order])?;
        let refitted = self.segment(index)?.new_order_polynomial_curve(order)?;
        self.segments[index] = refitted;
        Ok(())
    }

    /// Polynomial order of each segment.
    #[must_use]
    pub fn segment_orders(&self) -> Vec<usize> {
        self.segments.iter().map(PolynomialCurve::order).collect()
    }

    /// Nominal length of each segment.
    #[must_use]
    pub fn segment_lengths(&self) -> Vec<f64> {
        self.segments
            .iter()
            .map(PolynomialCurve::parametric_length)
            .collect()
    }

    /// Re-divide the needle into equal-length segments of the given orders.
    ///
    /// Each new segment is fitted to the current shape over its span, so the
    /// needle keeps its shape up to the accuracy of the new orders.
    ///
    /// # Errors
    ///
    /// Returns [`NeedleError::InvalidArgument`] for an empty order list or an
    /// order above [`MAX_ORDER`].
    pub fn split_segments(&mut self, orders: &[usize]) -> Result<()> {
        if orders.is_empty() {
            return Err(NeedleError::invalid_argument(
                "a needle needs at least one segment",
            ));
        }
        check_orders(orders)?;

        let span = self.length() / orders.len() as f64;
        let mut segments = Vec::with_capacity(orders.len());
        for (k, &order) in orders.iter().enumerate() {
            let offset = k as f64 * span;
            let n = 4 * (order + 1);
            let params: Vec<f64> = (0..n)
                .map(|i| span * (i as f64 / (n - 1) as f64))
                .collect();
            let points: Vec<Point3<f64>> = params
                .iter()
                .map(|&s| self.point_at_distance(offset + s))
                .collect();
            let mut curve = PolynomialCurve::new();
            curve.define_from_points(&points, &params, order)?;
            segments.push(curve);
        }
        self.segments = segments;
        debug!(segments = orders.len(), ?orders, "split needle centerline");
        Ok(())
    }

    /// Replace every segment's coefficients, keeping the domains.
    pub(crate) fn replace_shape(&mut self, coefficients: Vec<Matrix3xX<f64>>) -> Result<()> {
        if coefficients.len() != self.segments.len() {
            return Err(NeedleError::invalid_argument(format!(
                "{} coefficient blocks for {} segments",
                coefficients.len(),
                self.segments.len()
            )));
        }
        let mut segments = Vec::with_capacity(coefficients.len());
        for (old, block) in self.segments.iter().zip(coefficients) {
            let mut curve = PolynomialCurve::from_coefficients(block)?;
            curve.set_boundaries(old.start_parameter(), old.end_parameter())?;
            segments.push(curve);
        }
        self.segments = segments;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries by distance from the base
    // ------------------------------------------------------------------

    /// Segment index and local parameter for distance `d` from the base.
    ///
    /// `d` is clamped to `[0, length]`.
    #[must_use]
    pub fn locate(&self, distance: f64) -> (usize, f64) {
        let mut remaining = distance.max(0.0);
        let last = self.segments.len() - 1;
        for (k, segment) in self.segments.iter().enumerate() {
            let span = segment.parametric_length();
            if remaining <= span || k == last {
                return (k, segment.start_parameter() + remaining.min(span));
            }
            remaining -= span;
        }
        (last, self.segments[last].end_parameter())
    }

    /// Centerline point at distance `d` from the base.
    #[must_use]
    pub fn point_at_distance(&self, distance: f64) -> Point3<f64> {
        let (k, s) = self.locate(distance);
        self.segments[k].point(s)
    }

    /// Unit tangent at distance `d`.
    #[must_use]
    pub fn tangent_at_distance(&self, distance: f64) -> Vector3<f64> {
        let (k, s) = self.locate(distance);
        self.segments[k].tangent(s)
    }

    /// Curvature at distance `d`.
    #[must_use]
    pub fn curvature_at_distance(&self, distance: f64) -> f64 {
        let (k, s) = self.locate(distance);
        self.segments[k].curvature(s)
    }

    /// Largest curvature over `samples` points per segment.
    #[must_use]
    pub fn max_curvature(&self, samples: usize) -> f64 {
        let n = samples.max(2);
        self.segments
            .iter()
            .flat_map(|segment| {
                let (start, span) = (segment.start_parameter(), segment.parametric_length());
                (0..n).map(move |i| segment.curvature(start + span * i as f64 / (n - 1) as f64))
            })
            .fold(0.0, f64::max)
    }

    /// Tip position.
    #[must_use]
    pub fn tip_position(&self) -> Point3<f64> {
        self.segments[self.segments.len() - 1].end_point()
    }

    /// Unit tangent at the tip.
    #[must_use]
    pub fn tip_direction(&self) -> Vector3<f64> {
        self.segments[self.segments.len() - 1].end_tangent()
    }

    /// Mean distance of `n_samples` centerline points to the base-tip chord.
    #[must_use]
    pub fn mean_axis_deviation(&self, n_samples: usize) -> f64 {
        let n = n_samples.max(2);
        let origin = self.point_at_distance(0.0);
        let axis = (self.tip_position() - origin).try_normalize(1e-15);
        let length = self.length();
        let total: f64 = (0..n)
            .map(|i| {
                let p = self.point_at_distance(length * i as f64 / (n - 1) as f64) - origin;
                axis.map_or_else(|| p.norm(), |u| p.cross(&u).norm())
            })
            .sum();
        total / n as f64
    }

    /// Distance from the base of the centerline point closest to `point`.
    #[must_use]
    pub fn closest_distance(&self, point: &Point3<f64>, samples: usize) -> f64 {
        let mut best_sq = f64::INFINITY;
        let mut best = 0.0;
        let mut offset = 0.0;
        for segment in &self.segments {
            let s = segment.closest_parameter(point, samples);
            let dist_sq = (segment.point(s) - point).norm_squared();
            if dist_sq < best_sq {
                best_sq = dist_sq;
                best = offset + (s - segment.start_parameter());
            }
            offset += segment.parametric_length();
        }
        best
    }

    /// Distance from the base where the needle enters the tissue.
    ///
    /// Returns `None` while the tip is outside the tissue and `Some(0.0)` if
    /// the whole needle is inside. The crossing closest to the tip is used.
    #[must_use]
    pub fn surface_entry_distance(&self, surface: &TissueSurface) -> Option<f64> {
        if !surface.contains(&self.tip_position()) {
            return None;
        }
        let length = self.length();
        let steps = ENTRY_SCAN_STEPS * self.segments.len();
        let step = length / steps as f64;

        let mut inside = length;
        for i in (0..steps).rev() {
            let d = i as f64 * step;
            if !surface.contains(&self.point_at_distance(d)) {
                let (mut lo, mut hi) = (d, inside);
                for _ in 0..ENTRY_BISECTIONS {
                    let mid = 0.5 * (lo + hi);
                    if surface.contains(&self.point_at_distance(mid)) {
                        hi = mid;
                    } else {
                        lo = mid;
                    }
                }
                return Some(0.5 * (lo + hi));
            }
            inside = d;
        }
        Some(0.0)
    }

    /// Dense polyline along the whole needle for display.
    #[must_use]
    pub fn rendering_points(&self, n_points: usize) -> Vec<Point3<f64>> {
        self.sample_uniform(n_points)
    }
}

impl Curve3 for Needle {
    fn point(&self, s: f64) -> Point3<f64> {
        self.point_at_distance(s)
    }

    fn tangent(&self, s: f64) -> Vector3<f64> {
        self.tangent_at_distance(s)
    }

    fn curvature(&self, s: f64) -> f64 {
        self.curvature_at_distance(s)
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, self.length())
    }
}

fn check_orders(orders: &[usize]) -> Result<()> {
    if let Some(&order) = orders.iter().find(|&&o| o > MAX_ORDER) {
        return Err(NeedleError::invalid_argument(format!(
            "segment order {order} exceeds the maximum supported order {MAX_ORDER}"
        )));
    }
    Ok(())
}

/// Equal-length straight segments along the base z axis.
fn straight_segments(
    properties: &NeedleProperties,
    base_pose: &RigidPose,
    orders: &[usize],
) -> Result<Vec<PolynomialCurve>> {
    let span = properties.length / orders.len() as f64;
    let origin = base_pose.translation;
    let direction = base_pose.z_axis();
    orders
        .iter()
        .enumerate()
        .map(|(k, &order)| -> Result<PolynomialCurve> {
            let mut coefficients = Matrix3xX::zeros(order + 1);
            coefficients.set_column(0, &(origin + direction * (k as f64 * span)));
            if order >= 1 {
                coefficients.set_column(1, &(direction * span));
            }
            let mut curve = PolynomialCurve::from_coefficients(coefficients)?;
            curve.set_boundaries(0.0, span)?;
            Ok(curve)
        })
        .collect()
}
