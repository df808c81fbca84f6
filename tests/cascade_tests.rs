//! Shadow Cascade Tests
//!
//! Tests for:
//! - Split ordering, quantization, and hysteresis
//! - Stable (never shrinking) cascade radii
//! - Texel snapping of the cascade center along light right/up
//! - Reverse-Z orthographic fit sanity

use glam::Vec3;

use verdant::renderer::cascades::{
    CASCADE_SPLIT_QUANTIZATION, CascadeState, SHADOW_CASCADE_COUNT, cascade_bounding_radius,
    desired_split, light_basis, quantize_split, snap_to_texel,
};

const EPSILON: f32 = 1e-3;

fn update_default(state: &mut CascadeState, eye: Vec3) -> verdant::renderer::cascades::CascadeFrame {
    let to_sun = Vec3::new(0.4, 0.8, 0.3).normalize();
    state.update(eye, to_sun, 0.1, 600.0, 70.0_f32.to_radians(), 16.0 / 9.0)
}

// ============================================================================
// Splits
// ============================================================================

#[test]
fn splits_strictly_increasing_with_minimum_gap() {
    let mut state = CascadeState::new();
    let frame = update_default(&mut state, Vec3::new(3.0, 20.0, -7.0));
    let mut previous = 0.1;
    for (index, split) in frame.splits.iter().enumerate() {
        assert!(
            *split >= previous + CASCADE_SPLIT_QUANTIZATION - EPSILON,
            "split {index} ({split}) must exceed {previous} by the quantization step"
        );
        previous = *split;
    }
    assert!(frame.splits[SHADOW_CASCADE_COUNT - 1] <= 600.0 + EPSILON);
}

#[test]
fn splits_are_quantized() {
    let mut state = CascadeState::new();
    let frame = update_default(&mut state, Vec3::ZERO);
    for split in frame.splits {
        let quantum = split / CASCADE_SPLIT_QUANTIZATION;
        assert!(
            (quantum - quantum.round()).abs() < EPSILON,
            "split {split} not on the quantization grid"
        );
    }
}

#[test]
fn splits_hold_steady_under_identical_input() {
    let mut state = CascadeState::new();
    let first = update_default(&mut state, Vec3::ZERO);
    let second = update_default(&mut state, Vec3::ZERO);
    assert_eq!(first.splits, second.splits);
}

#[test]
fn quantize_rounds_to_half_units() {
    assert!((quantize_split(10.2) - 10.0).abs() < EPSILON);
    assert!((quantize_split(10.3) - 10.5).abs() < EPSILON);
}

#[test]
fn desired_split_blends_log_and_uniform() {
    // lambda = 0 is pure uniform.
    let uniform = desired_split(0, 4, 1.0, 101.0, 0.0);
    assert!((uniform - 26.0).abs() < EPSILON);
    // lambda = 1 is pure logarithmic: 1 * 101^(1/4).
    let logarithmic = desired_split(0, 4, 1.0, 101.0, 1.0);
    assert!((logarithmic - 101.0_f32.powf(0.25)).abs() < 1e-2);
}

// ============================================================================
// Radii
// ============================================================================

#[test]
fn bounding_radius_padded_and_sixteenth_rounded() {
    let radius = cascade_bounding_radius(40.0, 0.7, 1.6);
    assert!(radius >= 24.0);
    let sixteenths = radius * 16.0;
    assert!((sixteenths - sixteenths.round()).abs() < 1e-3);
}

#[test]
fn stable_radius_never_shrinks_for_fixed_projection() {
    let mut state = CascadeState::new();
    let first = update_default(&mut state, Vec3::ZERO);
    // Move the camera; splits may requantize but radii must not shrink.
    let second = update_default(&mut state, Vec3::new(250.0, 4.0, -90.0));
    for cascade in 0..SHADOW_CASCADE_COUNT {
        assert!(
            second.cascades[cascade].radius >= first.cascades[cascade].radius - EPSILON,
            "cascade {cascade} radius shrank within a session"
        );
    }
}

// ============================================================================
// Texel snapping
// ============================================================================

#[test]
fn cascade_center_snaps_to_texel_multiples() {
    let mut state = CascadeState::new();
    let frame = update_default(&mut state, Vec3::new(13.37, 42.01, -7.77));
    for (index, cascade) in frame.cascades.iter().enumerate() {
        let along_right = cascade.snapped_center.dot(cascade.light_right) / cascade.texel_size;
        let along_up = cascade.snapped_center.dot(cascade.light_up) / cascade.texel_size;
        assert!(
            (along_right - along_right.round()).abs() < 1e-2,
            "cascade {index} center not texel-aligned on light-right: {along_right}"
        );
        assert!(
            (along_up - along_up.round()).abs() < 1e-2,
            "cascade {index} center not texel-aligned on light-up: {along_up}"
        );
    }
}

#[test]
fn snap_to_texel_is_idempotent() {
    let snapped = snap_to_texel(17.3, 0.25);
    assert!((snap_to_texel(snapped, 0.25) - snapped).abs() < 1e-6);
}

// ============================================================================
// Light basis and projection
// ============================================================================

#[test]
fn light_basis_is_orthonormal_and_swaps_up_hint() {
    let (forward, right, up) = light_basis(Vec3::new(0.3, 0.9, 0.2).normalize());
    assert!(forward.dot(right).abs() < 1e-5);
    assert!(forward.dot(up).abs() < 1e-5);
    assert!(right.dot(up).abs() < 1e-5);

    // Near-vertical sun must not collapse the basis.
    let (_, right_v, up_v) = light_basis(Vec3::new(0.0, 1.0, 0.0));
    assert!(right_v.length() > 0.9);
    assert!(up_v.length() > 0.9);
}

#[test]
fn cascade_projection_is_reverse_z() {
    let mut state = CascadeState::new();
    let frame = update_default(&mut state, Vec3::ZERO);
    let cascade = &frame.cascades[0];
    // The snapped center sits mid-volume: its depth must land strictly
    // inside (0, 1), nearer the light than the far plane's 0.
    let clip = cascade.view_proj * cascade.snapped_center.extend(1.0);
    let depth = clip.z / clip.w;
    assert!(depth > 0.0 && depth < 1.0, "center depth {depth} outside reverse-Z range");
}
