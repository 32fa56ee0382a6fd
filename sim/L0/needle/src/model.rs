//! Needle insertion model driven by base motions.

use std::f64::consts::PI;

use curve_polynomial::RigidPose;
use nalgebra::{Point3, UnitQuaternion, Vector3};
use tracing::trace;

use crate::config::{SolverConfig, SpringConfig};
use crate::needle::{Needle, NeedleProperties};
use crate::network::SpringNetwork;
use crate::preset::NeedlePreset;
use crate::solver::{EquilibriumSolver, SolveStats};
use crate::spring::{SpringKind, VirtualSpring};
use crate::surface::TissueSurface;
use crate::{NeedleError, Result};

/// Samples per segment for curvature maxima.
const CURVATURE_SAMPLES: usize = 50;

/// A flexible needle embedded in tissue through virtual springs.
///
/// Each base motion runs one update:
///
/// ```text
/// move base ─► rigid prediction ─► spring network update ─► equilibrium solve
///                                          ▲                       │
///                                          └── re-projection ◄─────┘
/// ```
///
/// Updates are transactional: if the solve fails the model keeps its
/// previous state. Cloning the model copies the needle, the springs and the
/// solver, so a clone can follow a different trajectory.
///
/// # Example
///
/// ```
/// use sim_needle::{NeedleInsertionModel, NeedlePreset};
///
/// let mut model = NeedleInsertionModel::from_preset(NeedlePreset::BiopsyNeedle, 3).unwrap();
/// model.set_surface_at_tip().unwrap();
/// for _ in 0..100 {
///     model.move_base(0.0, 0.0, 1e-4, 0.0, 0.0, 0.0).unwrap();
/// }
/// assert!((model.inserted_length() - 0.01).abs() < 1e-9);
/// assert!(model.spring_count() > 0);
/// ```
#[derive(Debug, Clone)]
pub struct NeedleInsertionModel {
    needle: Needle,
    network: SpringNetwork,
    solver: EquilibriumSolver,
}

impl NeedleInsertionModel {
    /// Create a model with a straight single-segment needle of the given
    /// order and default spring and solver settings.
    pub fn new(properties: NeedleProperties, order: usize) -> Result<Self> {
        Ok(Self {
            needle: Needle::new(properties, order)?,
            network: SpringNetwork::default(),
            solver: EquilibriumSolver::default(),
        })
    }

    /// Create a model from a preset.
    pub fn from_preset(preset: NeedlePreset, order: usize) -> Result<Self> {
        Ok(Self {
            needle: Needle::new(preset.properties(), order)?,
            network: SpringNetwork::new(preset.spring_config())?,
            solver: EquilibriumSolver::default(),
        })
    }

    /// Use the given spring policy.
    pub fn with_spring_config(mut self, config: SpringConfig) -> Result<Self> {
        self.network.set_config(config)?;
        Ok(self)
    }

    /// Use the given solver configuration.
    pub fn with_solver_config(mut self, config: SolverConfig) -> Result<Self> {
        self.solver.set_config(config)?;
        Ok(self)
    }

    /// Load needle properties and spring settings from a preset.
    ///
    /// The needle is straightened along its current base pose and all
    /// springs and the tissue surface are removed.
    pub fn load_preset(&mut self, preset: NeedlePreset) -> Result<()> {
        let mut needle = self.needle.clone();
        needle.set_properties(preset.properties())?;
        needle.reset_straight()?;
        let network = SpringNetwork::new(preset.spring_config())?;
        self.needle = needle;
        self.network = network;
        trace!(%preset, "loaded needle preset");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    /// The needle.
    #[must_use]
    pub fn needle(&self) -> &Needle {
        &self.needle
    }

    /// Mutable access to the needle, for property and segment edits.
    ///
    /// Springs are re-attached on the next base motion.
    pub fn needle_mut(&mut self) -> &mut Needle {
        &mut self.needle
    }

    /// The spring network.
    #[must_use]
    pub fn network(&self) -> &SpringNetwork {
        &self.network
    }

    /// Spring policy.
    #[must_use]
    pub fn spring_config(&self) -> &SpringConfig {
        self.network.config()
    }

    /// Solver configuration.
    #[must_use]
    pub fn solver_config(&self) -> &SolverConfig {
        self.solver.config()
    }

    /// Replace the solver configuration.
    pub fn set_solver_config(&mut self, config: SolverConfig) -> Result<()> {
        self.solver.set_config(config)
    }

    /// Statistics of the last successful solve.
    #[must_use]
    pub fn last_solve_stats(&self) -> &SolveStats {
        self.solver.stats()
    }

    // ------------------------------------------------------------------
    // Base motion
    // ------------------------------------------------------------------

    /// World pose of the needle base.
    #[must_use]
    pub fn base_pose(&self) -> &RigidPose {
        self.needle.base_pose()
    }

    /// Move the base to an absolute pose and re-solve.
    pub fn set_base_pose(&mut self, pose: RigidPose) -> Result<()> {
        check_pose(&pose)?;
        self.update_base(pose)
    }

    /// Move the base incrementally in its own frame.
    ///
    /// `(tx, ty, tz)` is a translation and `(rx, ry, rz)` a theta-u rotation,
    /// both expressed in the current base frame.
    pub fn move_base(
        &mut self,
        tx: f64,
        ty: f64,
        tz: f64,
        rx: f64,
        ry: f64,
        rz: f64,
    ) -> Result<()> {
        let delta = RigidPose::from_pose_vector(tx, ty, tz, rx, ry, rz);
        check_pose(&delta)?;
        let pose = self.needle.base_pose().compose(&delta);
        self.update_base(pose)
    }

    /// Move the base incrementally in the world frame.
    ///
    /// The translation is added to the base position and the rotation is
    /// applied about the base position.
    pub fn move_base_world_frame(
        &mut self,
        tx: f64,
        ty: f64,
        tz: f64,
        rx: f64,
        ry: f64,
        rz: f64,
    ) -> Result<()> {
        let delta = RigidPose::from_pose_vector(tx, ty, tz, rx, ry, rz);
        check_pose(&delta)?;
        let base = self.needle.base_pose();
        let pose = RigidPose::new(
            delta.rotation * base.rotation,
            base.translation + delta.translation,
        );
        self.update_base(pose)
    }

    /// Re-solve the equilibrium at the current base pose.
    pub fn solve(&mut self) -> Result<SolveStats> {
        let pose = *self.needle.base_pose();
        self.update_base(pose)?;
        Ok(*self.solver.stats())
    }

    fn update_base(&mut self, pose: RigidPose) -> Result<()> {
        let mut needle = self.needle.clone();
        let mut network = self.network.clone();
        let mut solver = self.solver.clone();
        let samples = solver.config().projection_samples;

        needle.set_base_pose(pose);
        network.update(&needle, samples);
        solver.solve(&mut needle, &network)?;
        for _ in 0..solver.config().projection_iterations {
            network.track(&needle, samples);
            network.retire(&needle);
            solver.solve(&mut needle, &network)?;
        }

        trace!(
            body = network.body_springs().len(),
            tip = network.tip_springs().len(),
            energy = solver.stats().total_energy(),
            "base update committed"
        );
        self.needle = needle;
        self.network = network;
        self.solver = solver;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tissue and springs
    // ------------------------------------------------------------------

    /// Place the tissue surface at the current tip, normal to the tip
    /// direction. Existing springs are kept.
    pub fn set_surface_at_tip(&mut self) -> Result<()> {
        let surface =
            TissueSurface::new(self.needle.tip_position(), self.needle.tip_direction())?;
        self.network.set_surface(Some(surface));
        Ok(())
    }

    /// Define or remove the tissue surface.
    pub fn set_surface(&mut self, surface: Option<TissueSurface>) {
        self.network.set_surface(surface);
    }

    /// Tissue surface, if defined.
    #[must_use]
    pub fn surface(&self) -> Option<&TissueSurface> {
        self.network.surface()
    }

    /// Add a spring anchored at the needle's current point at `distance`.
    ///
    /// The stiffness follows the spring policy for `kind`. The shape is
    /// updated on the next base motion or [`Self::solve`].
    pub fn add_spring_at_distance(&mut self, kind: SpringKind, distance: f64) -> Result<()> {
        let stiffness = match kind {
            SpringKind::Body => self.spring_config().body_stiffness(),
            SpringKind::Tip => self.spring_config().tip_stiffness(),
        };
        if !distance.is_finite() {
            return Err(NeedleError::invalid_argument("spring distance is not finite"));
        }
        let spring = VirtualSpring::at_distance(&self.needle, distance, stiffness, kind);
        self.network.insert(&self.needle, spring)
    }

    /// Remove every spring.
    pub fn clear_springs(&mut self) {
        self.network.clear();
    }

    /// Body springs ordered by distance from the base.
    #[must_use]
    pub fn body_springs(&self) -> &[VirtualSpring] {
        self.network.body_springs()
    }

    /// Tip springs ordered by distance from the base.
    #[must_use]
    pub fn tip_springs(&self) -> &[VirtualSpring] {
        self.network.tip_springs()
    }

    /// Number of springs.
    #[must_use]
    pub fn spring_count(&self) -> usize {
        self.network.len()
    }

    /// Energy stored in the springs.
    #[must_use]
    pub fn total_spring_energy(&self) -> f64 {
        self.network.total_energy(&self.needle)
    }

    /// Length of needle past the tissue surface.
    #[must_use]
    pub fn inserted_length(&self) -> f64 {
        self.network.inserted_length(&self.needle)
    }

    /// Set the tissue stiffness per unit length and restiffen the springs.
    pub fn set_stiffness_per_unit_length(&mut self, stiffness: f64) -> Result<()> {
        let config = self.spring_config().with_stiffness_per_unit_length(stiffness);
        self.network.set_config(config)
    }

    /// Set the body spring spacing.
    pub fn set_inter_spring_distance(&mut self, distance: f64) -> Result<()> {
        let config = *self.spring_config();
        self.network
            .set_config(config.with_spacing(distance, config.inter_tip_spring_distance))
    }

    /// Set the tip spring spacing.
    pub fn set_inter_tip_spring_distance(&mut self, distance: f64) -> Result<()> {
        let config = *self.spring_config();
        self.network
            .set_config(config.with_spacing(config.inter_spring_distance, distance))
    }

    /// Set the minimum number of tip springs.
    pub fn set_min_tip_springs(&mut self, count: usize) -> Result<()> {
        let config = *self.spring_config();
        self.network
            .set_config(config.with_tip_springs(count, config.max_tip_springs))
    }

    /// Set the maximum number of tip springs.
    pub fn set_max_tip_springs(&mut self, count: usize) -> Result<()> {
        let config = *self.spring_config();
        self.network
            .set_config(config.with_tip_springs(config.min_tip_springs, count))
    }

    /// Enable or disable automatic spring creation.
    pub fn set_automatic_spring_addition(&mut self, enabled: bool) -> Result<()> {
        let config = self.spring_config().with_automatic_addition(enabled);
        self.network.set_config(config)
    }

    // ------------------------------------------------------------------
    // Derived queries
    // ------------------------------------------------------------------

    /// Tip position.
    #[must_use]
    pub fn tip_position(&self) -> Point3<f64> {
        self.needle.tip_position()
    }

    /// Unit tangent at the tip.
    #[must_use]
    pub fn tip_direction(&self) -> Vector3<f64> {
        self.needle.tip_direction()
    }

    /// Tip frame: the base frame carried along the needle's bend, with its z
    /// axis on the tip direction.
    #[must_use]
    pub fn tip_pose(&self) -> RigidPose {
        let base = self.needle.base_pose();
        let bend = UnitQuaternion::rotation_between(&base.z_axis(), &self.tip_direction())
            .unwrap_or_else(|| {
                UnitQuaternion::from_axis_angle(&(base.rotation * Vector3::x_axis()), PI)
            });
        RigidPose::new(bend * base.rotation, self.tip_position().coords)
    }

    /// Curvature at `distance` from the base.
    #[must_use]
    pub fn curvature_at_distance(&self, distance: f64) -> f64 {
        self.needle.curvature_at_distance(distance)
    }

    /// Largest curvature along the needle.
    #[must_use]
    pub fn max_curvature(&self) -> f64 {
        self.needle.max_curvature(CURVATURE_SAMPLES)
    }

    /// Mean deviation of the needle from its base-tip chord.
    #[must_use]
    pub fn mean_axis_deviation(&self, n_samples: usize) -> f64 {
        self.needle.mean_axis_deviation(n_samples)
    }
}

fn check_pose(pose: &RigidPose) -> Result<()> {
    let finite = pose.translation.iter().all(|v| v.is_finite())
        && pose.rotation.coords.iter().all(|v| v.is_finite());
    if finite {
        Ok(())
    } else {
        Err(NeedleError::invalid_argument("base motion is not finite"))
    }
}
