//! Property-based tests for the insertion model.
//!
//! Run with: cargo test -p sim-needle -- proptest

use proptest::prelude::*;
use sim_needle::{Curve3, NeedleInsertionModel, NeedlePreset, RigidPose};

fn arb_preset() -> impl Strategy<Value = NeedlePreset> {
    prop::sample::select(NeedlePreset::ALL.to_vec())
}

/// A base pose with bounded position and arbitrary orientation.
fn arb_base() -> impl Strategy<Value = RigidPose> {
    (
        prop::array::uniform3(-0.1..0.1f64),
        prop::array::uniform3(-2.0..2.0f64),
    )
        .prop_map(|([tx, ty, tz], [rx, ry, rz])| RigidPose::from_pose_vector(tx, ty, tz, rx, ry, rz))
}

/// An inserted model: surface at the initial tip, then a straight push.
fn inserted(preset: NeedlePreset, base: RigidPose, steps: usize) -> NeedleInsertionModel {
    let mut model = NeedleInsertionModel::from_preset(preset, 3)
        .unwrap_or_else(|e| panic!("preset must build: {e}"));
    model
        .set_base_pose(base)
        .unwrap_or_else(|e| panic!("free needle must solve: {e}"));
    model
        .set_surface_at_tip()
        .unwrap_or_else(|e| panic!("tip direction must be a valid normal: {e}"));
    for _ in 0..steps {
        model
            .move_base(0.0, 0.0, 1e-4, 0.0, 0.0, 0.0)
            .unwrap_or_else(|e| panic!("straight push must solve: {e}"));
    }
    model
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// The base stays clamped at its pose whatever the springs do.
    #[test]
    fn proptest_base_stays_clamped(
        preset in arb_preset(),
        base in arb_base(),
        steps in 20usize..120,
        lateral in prop::array::uniform2(-1e-3..1e-3f64),
        tilt in -0.05..0.05f64,
    ) {
        let mut model = inserted(preset, base, steps);
        model
            .move_base_world_frame(lateral[0], lateral[1], 0.0, tilt, 0.0, 0.0)
            .unwrap_or_else(|e| panic!("lateral motion must solve: {e}"));

        let pose = model.base_pose();
        let needle = model.needle();
        prop_assert!((needle.point_at_distance(0.0) - pose.position()).norm() < 1e-7);
        prop_assert!((needle.tangent_at_distance(0.0) - pose.z_axis()).norm() < 1e-5);
    }

    /// Tip spring counts never exceed the configured maximum.
    #[test]
    fn proptest_tip_springs_bounded(
        preset in arb_preset(),
        base in arb_base(),
        steps in 0usize..150,
    ) {
        let model = inserted(preset, base, steps);
        prop_assert!(model.tip_springs().len() <= model.spring_config().max_tip_springs);
        prop_assert!(model.total_spring_energy() >= 0.0);
    }

    /// A straight push keeps the needle on its initial axis.
    #[test]
    fn proptest_straight_push_keeps_axis(
        preset in arb_preset(),
        base in arb_base(),
        steps in 0usize..100,
    ) {
        let model = inserted(preset, base, steps);
        let axis = base.z_axis();
        let length = model.needle().length();
        let expected_tip = base.position() + axis * (length + steps as f64 * 1e-4);
        prop_assert!((model.tip_position() - expected_tip).norm() < 1e-7);
        for point in model.needle().sample_uniform(20) {
            let offset = point - base.position();
            prop_assert!((offset - axis * offset.dot(&axis)).norm() < 1e-7);
        }
    }
}
