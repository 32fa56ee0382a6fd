//! Quasi-static equilibrium of the needle against its virtual springs.
//!
//! # Energy
//!
//! Each segment `k` of order `n_k` and length `ℓ_k` is written in the
//! normalized parameter `t = s / ℓ_k` as `r(t) = Σ c_i t^i`. The solver
//! minimizes
//!
//! ```text
//! E = ½ EI Σ_k ∫ |r''(s)|² ds  +  Σ_springs ½ κ |r(d) − a|²
//! ```
//!
//! The bending term is the quadratic form `EI/ℓ_k³ · H` with
//! `H_ij = i(i−1) j(j−1) / (i+j−3)` for `i, j >= 2`. Each spring adds
//! `κ φ φᵀ` to the matrix and `κ φ aᵀ` to the right-hand side, where
//! `φ_i = t^i`. The three axes share the matrix and differ only in the
//! right-hand side.
//!
//! # Constraints
//!
//! ```text
//! r_0(0)  = base position
//! r_0'(0) = base direction
//! r_k(ℓ_k) = r_k+1(0),  r_k'(ℓ_k) = r_k+1'(0)   (C1 joints)
//! r_k''(ℓ_k) = r_k+1''(0)                      (C2 joints, orders >= 2)
//! ```
//!
//! The KKT system `[[Q, Bᵀ], [B, 0]] [x; μ] = [b; g]` is solved by SVD and
//! rejected when its smallest singular value falls below the configured
//! relative tolerance.

use nalgebra::{DMatrix, Matrix3xX};
use tracing::{debug, warn};

use crate::config::{SegmentContinuity, SolverConfig};
use crate::needle::Needle;
use crate::network::SpringNetwork;
use crate::{NeedleError, Result};

/// Statistics from the last equilibrium solve.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolveStats {
    /// Coefficients solved per axis.
    pub unknowns: usize,
    /// Equality constraints per axis.
    pub constraints: usize,
    /// Springs taking part in the solve.
    pub springs: usize,
    /// Bending energy of the solved shape (J).
    pub bending_energy: f64,
    /// Energy stored in the springs (J).
    pub spring_energy: f64,
    /// Ratio of smallest to largest singular value of the KKT matrix.
    pub condition: f64,
}

impl SolveStats {
    /// Total elastic energy.
    #[must_use]
    pub fn total_energy(&self) -> f64 {
        self.bending_energy + self.spring_energy
    }
}

/// Solver for the needle's equilibrium shape.
#[derive(Debug, Clone, Default)]
pub struct EquilibriumSolver {
    config: SolverConfig,
    stats: SolveStats,
}

impl EquilibriumSolver {
    /// Create a solver.
    ///
    /// # Errors
    ///
    /// Returns [`NeedleError::InvalidConfig`] if the configuration is invalid.
    pub fn new(config: SolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            stats: SolveStats::default(),
        })
    }

    /// Solver configuration.
    #[must_use]
    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: SolverConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Statistics from the last successful solve.
    #[must_use]
    pub const fn stats(&self) -> &SolveStats {
        &self.stats
    }

    /// Replace the needle shape with the equilibrium for `network`.
    ///
    /// The needle is left untouched on error.
    ///
    /// # Errors
    ///
    /// Returns [`NeedleError::IllConditionedSystem`] if a segment has order
    /// zero or zero length, or if the KKT matrix is numerically singular.
    pub fn solve(&mut self, needle: &mut Needle, network: &SpringNetwork) -> Result<SolveStats> {
        let orders = needle.segment_orders();
        let lengths = needle.segment_lengths();
        if let Some(k) = orders.iter().position(|&n| n == 0) {
            return Err(NeedleError::ill_conditioned(format!(
                "segment {k} has order 0; base position and tangent need order >= 1"
            )));
        }
        if let Some(k) = lengths.iter().position(|&l| !(l > 0.0)) {
            return Err(NeedleError::ill_conditioned(format!(
                "segment {k} has zero length"
            )));
        }

        let offsets: Vec<usize> = orders
            .iter()
            .scan(0, |acc, &n| {
                let offset = *acc;
                *acc += n + 1;
                Some(offset)
            })
            .collect();
        let unknowns: usize = orders.iter().map(|n| n + 1).sum();

        // Energy: Q x = b
        let mut q = DMatrix::<f64>::zeros(unknowns, unknowns);
        let mut b = DMatrix::<f64>::zeros(unknowns, 3);
        let ei = needle.properties().bending_stiffness();
        for (k, (&n, &l)) in orders.iter().zip(&lengths).enumerate() {
            let scale = ei / l.powi(3);
            let o = offsets[k];
            for i in 2..=n {
                for j in 2..=n {
                    q[(o + i, o + j)] += scale * bending_weight(i, j);
                }
            }
        }

        let mut springs = 0;
        for spring in network.springs() {
            let (k, s) = needle.locate(spring.distance());
            let segment = &needle.segments()[k];
            let t = segment.normalized_parameter(s);
            let o = offsets[k];
            let n = orders[k];
            let kappa = spring.stiffness();
            let anchor = spring.anchor();

            let phi: Vec<f64> = (0..=n).map(|i| t.powi(i as i32)).collect();
            for i in 0..=n {
                for j in 0..=n {
                    q[(o + i, o + j)] += kappa * phi[i] * phi[j];
                }
                for axis in 0..3 {
                    b[(o + i, axis)] += kappa * phi[i] * anchor[axis];
                }
            }
            springs += 1;
        }

        // Equalities: B x = g
        let (bc, g) = self.constraint_rows(needle, &orders, &lengths, &offsets);
        let constraints = bc.nrows();

        // Bring the energy block to unit scale; the multipliers absorb it.
        let q_scale = q.amax().max(f64::MIN_POSITIVE);
        q /= q_scale;
        b /= q_scale;

        let size = unknowns + constraints;
        let mut kkt = DMatrix::<f64>::zeros(size, size);
        kkt.view_mut((0, 0), (unknowns, unknowns)).copy_from(&q);
        kkt.view_mut((unknowns, 0), (constraints, unknowns))
            .copy_from(&bc);
        kkt.view_mut((0, unknowns), (unknowns, constraints))
            .copy_from(&bc.transpose());
        let mut rhs = DMatrix::<f64>::zeros(size, 3);
        rhs.view_mut((0, 0), (unknowns, 3)).copy_from(&b);
        rhs.view_mut((unknowns, 0), (constraints, 3)).copy_from(&g);

        let svd = kkt.svd(true, true);
        let max = svd.singular_values.max();
        let min = svd.singular_values.min();
        if !(max > 0.0) || min <= max * self.config.singular_tolerance {
            warn!(
                unknowns,
                constraints,
                springs,
                min,
                max,
                "rejecting singular equilibrium system"
            );
            return Err(NeedleError::ill_conditioned(format!(
                "equilibrium system is singular (singular values {min:.3e} / {max:.3e})"
            )));
        }
        let solution = svd.solve(&rhs, 0.0).map_err(NeedleError::ill_conditioned)?;

        let blocks: Vec<Matrix3xX<f64>> = orders
            .iter()
            .zip(&offsets)
            .map(|(&n, &o)| Matrix3xX::from_fn(n + 1, |axis, i| solution[(o + i, axis)]))
            .collect();
        needle.replace_shape(blocks)?;

        let stats = SolveStats {
            unknowns,
            constraints,
            springs,
            bending_energy: bending_energy(needle),
            spring_energy: network.total_energy(needle),
            condition: min / max,
        };
        debug!(
            unknowns,
            constraints,
            springs,
            bending_energy = stats.bending_energy,
            spring_energy = stats.spring_energy,
            "equilibrium solved"
        );
        self.stats = stats;
        Ok(stats)
    }

    fn constraint_rows(
        &self,
        needle: &Needle,
        orders: &[usize],
        lengths: &[f64],
        offsets: &[usize],
    ) -> (DMatrix<f64>, DMatrix<f64>) {
        let joints = orders.len() - 1;
        let c2 = |k: usize| {
            self.config.continuity == SegmentContinuity::C2 && orders[k] >= 2 && orders[k + 1] >= 2
        };
        let rows = 2 + 2 * joints + (0..joints).filter(|&k| c2(k)).count();
        let unknowns: usize = orders.iter().map(|n| n + 1).sum();

        let mut bc = DMatrix::<f64>::zeros(rows, unknowns);
        let mut g = DMatrix::<f64>::zeros(rows, 3);
        let base = needle.base_position();
        let direction = needle.base_direction() * lengths[0];

        bc[(0, offsets[0])] = 1.0;
        bc[(1, offsets[0] + 1)] = 1.0;
        for axis in 0..3 {
            g[(0, axis)] = base[axis];
            g[(1, axis)] = direction[axis];
        }

        // Derivative rows are multiplied through by ℓ_k^m so every row is
        // of order one.
        let mut r = 2;
        for k in 0..joints {
            let (o, next) = (offsets[k], offsets[k + 1]);
            let ratio = lengths[k] / lengths[k + 1];
            for i in 0..=orders[k] {
                bc[(r, o + i)] = 1.0;
                bc[(r + 1, o + i)] = i as f64;
            }
            bc[(r, next)] = -1.0;
            bc[(r + 1, next + 1)] = -ratio;
            r += 2;
            if c2(k) {
                for i in 2..=orders[k] {
                    bc[(r, o + i)] = (i * (i - 1)) as f64;
                }
                bc[(r, next + 2)] = -2.0 * ratio * ratio;
                r += 1;
            }
        }
        (bc, g)
    }
}

/// `∫₀¹ (i(i−1) t^(i−2)) (j(j−1) t^(j−2)) dt` for `i, j >= 2`.
fn bending_weight(i: usize, j: usize) -> f64 {
    (i * (i - 1) * j * (j - 1)) as f64 / (i + j - 3) as f64
}

/// Bending energy `½ EI ∫ |r''|² ds` of the current needle shape.
#[must_use]
pub fn bending_energy(needle: &Needle) -> f64 {
    let ei = needle.properties().bending_stiffness();
    needle
        .segments()
        .iter()
        .filter(|segment| segment.parametric_length() > 0.0)
        .map(|segment| {
            let c = segment.coefficients();
            let n = segment.order();
            let mut sum = 0.0;
            for i in 2..=n {
                for j in 2..=n {
                    sum += bending_weight(i, j) * c.column(i).dot(&c.column(j));
                }
            }
            0.5 * ei * sum / segment.parametric_length().powi(3)
        })
        .sum()
}
