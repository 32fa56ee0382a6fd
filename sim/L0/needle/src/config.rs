//! Configuration for the spring network and the equilibrium solver.
//!
//! Distances are in metres, stiffness per unit length in N/m².

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{NeedleError, Result};

/// How each virtual spring's stiffness is derived.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StiffnessMode {
    /// `stiffness_per_unit_length × spacing`, so the force density along the
    /// needle does not depend on how many springs there are.
    #[default]
    PerUnitLength,
    /// Every spring gets the same stiffness (N/m).
    Fixed(f64),
}

/// Policy for creating, spacing and retiring virtual springs.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpringConfig {
    /// Spacing between consecutive body springs.
    pub inter_spring_distance: f64,

    /// Spacing between consecutive tip springs. Usually finer than the body
    /// spacing.
    pub inter_tip_spring_distance: f64,

    /// Tip springs kept once enough of the needle is inserted.
    pub min_tip_springs: usize,

    /// Upper bound on tip springs; the most proximal ones are dropped first.
    pub max_tip_springs: usize,

    /// Create springs automatically as the needle advances.
    pub automatic_addition: bool,

    /// Tissue stiffness per unit needle length (N/m²).
    pub stiffness_per_unit_length: f64,

    /// How the per-spring stiffness is computed.
    pub stiffness_mode: StiffnessMode,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            inter_spring_distance: 0.005,
            inter_tip_spring_distance: 0.001,
            min_tip_springs: 5,
            max_tip_springs: 10,
            automatic_addition: true,
            stiffness_per_unit_length: 10_000.0,
            stiffness_mode: StiffnessMode::PerUnitLength,
        }
    }
}

impl SpringConfig {
    /// Body springs only, no tip refinement.
    #[must_use]
    pub const fn body_only() -> Self {
        Self {
            inter_spring_distance: 0.005,
            inter_tip_spring_distance: 0.001,
            min_tip_springs: 0,
            max_tip_springs: 0,
            automatic_addition: true,
            stiffness_per_unit_length: 10_000.0,
            stiffness_mode: StiffnessMode::PerUnitLength,
        }
    }

    /// Springs are only created by explicit calls.
    #[must_use]
    pub const fn manual() -> Self {
        Self {
            inter_spring_distance: 0.005,
            inter_tip_spring_distance: 0.001,
            min_tip_springs: 5,
            max_tip_springs: 10,
            automatic_addition: false,
            stiffness_per_unit_length: 10_000.0,
            stiffness_mode: StiffnessMode::PerUnitLength,
        }
    }

    /// Set body and tip spacing.
    #[must_use]
    pub const fn with_spacing(mut self, body: f64, tip: f64) -> Self {
        self.inter_spring_distance = body;
        self.inter_tip_spring_distance = tip;
        self
    }

    /// Set the tip spring count bounds.
    #[must_use]
    pub const fn with_tip_springs(mut self, min: usize, max: usize) -> Self {
        self.min_tip_springs = min;
        self.max_tip_springs = max;
        self
    }

    /// Set the tissue stiffness per unit length.
    #[must_use]
    pub const fn with_stiffness_per_unit_length(mut self, stiffness: f64) -> Self {
        self.stiffness_per_unit_length = stiffness;
        self
    }

    /// Set how spring stiffness is derived.
    #[must_use]
    pub const fn with_stiffness_mode(mut self, mode: StiffnessMode) -> Self {
        self.stiffness_mode = mode;
        self
    }

    /// Enable or disable automatic spring creation.
    #[must_use]
    pub const fn with_automatic_addition(mut self, enabled: bool) -> Self {
        self.automatic_addition = enabled;
        self
    }

    /// Stiffness of a spring that represents `spacing` metres of tissue.
    #[must_use]
    pub fn stiffness_for_spacing(&self, spacing: f64) -> f64 {
        match self.stiffness_mode {
            StiffnessMode::PerUnitLength => self.stiffness_per_unit_length * spacing,
            StiffnessMode::Fixed(k) => k,
        }
    }

    /// Stiffness assigned to new body springs.
    #[must_use]
    pub fn body_stiffness(&self) -> f64 {
        self.stiffness_for_spacing(self.inter_spring_distance)
    }

    /// Stiffness assigned to new tip springs.
    #[must_use]
    pub fn tip_stiffness(&self) -> f64 {
        self.stiffness_for_spacing(self.inter_tip_spring_distance)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NeedleError::InvalidConfig`] for non-positive spacing or
    /// stiffness, or `min_tip_springs > max_tip_springs`.
    pub fn validate(&self) -> Result<()> {
        if !(self.inter_spring_distance.is_finite() && self.inter_spring_distance > 0.0) {
            return Err(NeedleError::invalid_config(format!(
                "inter_spring_distance must be positive, got {}",
                self.inter_spring_distance
            )));
        }
        if !(self.inter_tip_spring_distance.is_finite() && self.inter_tip_spring_distance > 0.0) {
            return Err(NeedleError::invalid_config(format!(
                "inter_tip_spring_distance must be positive, got {}",
                self.inter_tip_spring_distance
            )));
        }
        if self.min_tip_springs > self.max_tip_springs {
            return Err(NeedleError::invalid_config(format!(
                "min_tip_springs ({}) exceeds max_tip_springs ({})",
                self.min_tip_springs, self.max_tip_springs
            )));
        }
        let stiffness = match self.stiffness_mode {
            StiffnessMode::PerUnitLength => self.stiffness_per_unit_length,
            StiffnessMode::Fixed(k) => k,
        };
        if !(stiffness.is_finite() && stiffness > 0.0) {
            return Err(NeedleError::invalid_config(format!(
                "spring stiffness must be positive, got {stiffness}"
            )));
        }
        Ok(())
    }
}

/// Continuity enforced where two needle segments meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SegmentContinuity {
    /// Position and tangent.
    C1,
    /// Position, tangent and second derivative where both orders allow it.
    #[default]
    C2,
}

/// Configuration for the equilibrium solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Extra re-projection passes after the first solve.
    ///
    /// Each pass re-attaches springs to the closest point of the new shape
    /// and solves again. Typical range: 0-3.
    pub projection_iterations: u32,

    /// Uniform samples per segment used to seed closest-point searches.
    pub projection_samples: usize,

    /// Relative singular value below which the system counts as singular.
    pub singular_tolerance: f64,

    /// Continuity between consecutive segments.
    pub continuity: SegmentContinuity,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            projection_iterations: 1,
            projection_samples: 16,
            singular_tolerance: 1e-14,
            continuity: SegmentContinuity::C2,
        }
    }
}

impl SolverConfig {
    /// Single solve per base motion, no re-projection.
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            projection_iterations: 0,
            projection_samples: 8,
            singular_tolerance: 1e-14,
            continuity: SegmentContinuity::C2,
        }
    }

    /// More re-projection passes and denser closest-point seeding.
    #[must_use]
    pub const fn accurate() -> Self {
        Self {
            projection_iterations: 3,
            projection_samples: 64,
            singular_tolerance: 1e-14,
            continuity: SegmentContinuity::C2,
        }
    }

    /// Set the number of re-projection passes.
    #[must_use]
    pub const fn with_projection_iterations(mut self, iterations: u32) -> Self {
        self.projection_iterations = iterations;
        self
    }

    /// Set the segment continuity.
    #[must_use]
    pub const fn with_continuity(mut self, continuity: SegmentContinuity) -> Self {
        self.continuity = continuity;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.projection_samples < 2 {
            return Err(NeedleError::invalid_config(
                "projection_samples must be at least 2",
            ));
        }
        if !(self.singular_tolerance.is_finite()
            && self.singular_tolerance > 0.0
            && self.singular_tolerance < 1.0)
        {
            return Err(NeedleError::invalid_config(format!(
                "singular_tolerance must lie in (0, 1), got {}",
                self.singular_tolerance
            )));
        }
        Ok(())
    }
}
