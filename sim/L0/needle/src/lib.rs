//! Quasi-static flexible needle insertion.
//!
//! A bevel-tip needle is modeled as a chain of polynomial segments
//! ([`curve_polynomial::PolynomialCurve`]) clamped at a moving base. Tissue
//! acts on the needle through virtual springs created as the needle enters
//! it. After every base motion the needle settles at the shape that
//! minimizes bending plus spring energy.
//!
//! # Architecture
//!
//! ```text
//! NeedleInsertionModel
//!     │
//!     ├── Needle           ← segments, properties, base pose
//!     ├── SpringNetwork    ← body and tip springs, tissue surface
//!     └── EquilibriumSolver
//!
//! move_base(δ)
//!     ├── rigid prediction of the needle
//!     ├── springs: track → retire → add
//!     ├── equilibrium solve (KKT, SVD)
//!     └── re-projection passes
//! ```
//!
//! # Example
//!
//! ```
//! use sim_needle::{NeedleInsertionModel, NeedlePreset, SpringConfig};
//!
//! let mut model = NeedleInsertionModel::from_preset(NeedlePreset::AbayazidRrm13, 3)?
//!     .with_spring_config(SpringConfig::default().with_tip_springs(3, 6))?;
//! model.set_surface_at_tip()?;
//!
//! // Push 2 cm into the tissue while drifting sideways.
//! for _ in 0..200 {
//!     model.move_base_world_frame(1e-6, 0.0, 1e-4, 0.0, 0.0, 0.0)?;
//! }
//! assert!(model.tip_springs().len() <= 6);
//! assert!(model.max_curvature() > 0.0);
//! # Ok::<(), sim_needle::NeedleError>(())
//! ```
//!
//! # Units
//!
//! SI throughout: metres, pascals, newtons per metre.
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**.
//!
//! # Feature Flags
//!
//! - `serde`: Enable serialization for configurations, properties and presets

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::many_single_char_names,
    clippy::similar_names,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::too_many_lines,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::suboptimal_flops,
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::needless_range_loop,
    clippy::too_many_arguments
)]

mod config;
mod error;
mod model;
mod needle;
mod network;
mod preset;
mod solver;
mod spring;
mod surface;

pub use config::{SegmentContinuity, SolverConfig, SpringConfig, StiffnessMode};
pub use error::{NeedleError, Result};
pub use model::NeedleInsertionModel;
pub use needle::{Needle, NeedleProperties};
pub use network::{NetworkUpdate, SpringNetwork};
pub use preset::NeedlePreset;
pub use solver::{EquilibriumSolver, SolveStats, bending_energy};
pub use spring::{SpringKind, VirtualSpring};
pub use surface::TissueSurface;

// Re-export curve types used in the public API
pub use curve_polynomial::{Curve3, PolynomialCurve, RigidPose};
