//! Voxel GI Tests
//!
//! Tests for:
//! - Grid origin snapping on X/Z and the vertical hysteresis on Y
//! - Change-flag evaluation (the compute skip policy)
//! - Occupancy packing (solid mask + palette albedo)
//! - Propagation decay arithmetic

use glam::Vec3;

use verdant::renderer::gi::{
    GI_CELL_SIZE, GI_GRID_RESOLUTION, GI_PROPAGATE_FRAME_DECAY, GI_PROPAGATION_ITERATIONS,
    GiLightingState, GiState, axis_origin, compute_flags, pack_occupancy,
    propagate_iteration_decay, stable_origin_y,
};
use verdant::world::World;
use verdant::world::chunk::{Chunk, ChunkGrid, Voxel, VoxelType};

fn lighting() -> GiLightingState {
    GiLightingState {
        sun_direction: Vec3::new(0.3, 0.8, 0.2).normalize(),
        sun_color: Vec3::new(1.0, 0.9, 0.8),
        sh_irradiance: [Vec3::splat(0.2); 9],
        gi_strength: 0.7,
        ambient_rebalance: 0.95,
    }
}

// ============================================================================
// Origin math
// ============================================================================

#[test]
fn axis_origin_snaps_to_cells() {
    assert_eq!(axis_origin(10.9, 32.0, 1.0), -22.0);
    assert_eq!(axis_origin(-10.1, 32.0, 1.0), -43.0);
}

#[test]
fn stable_origin_y_applies_hysteresis() {
    assert_eq!(stable_origin_y(100.0, 99.0, true, 2.0), 99.0);
    assert_eq!(stable_origin_y(100.0, 97.0, true, 2.0), 100.0);
    assert_eq!(stable_origin_y(100.0, 0.0, false, 2.0), 100.0);
}

#[test]
fn origin_is_cell_multiple_on_xz_and_hysteretic_on_y() {
    let mut state = GiState::new();
    let (first, moved) = state.update_origin(Vec3::new(5.3, 20.0, -9.9));
    assert!(moved, "first frame always counts as moved");
    assert_eq!(first.x % GI_CELL_SIZE, 0.0);
    assert_eq!(first.z % GI_CELL_SIZE, 0.0);

    // A small vertical drift keeps the previous Y origin.
    let (second, moved) = state.update_origin(Vec3::new(5.3, 21.5, -9.9));
    assert!(!moved);
    assert_eq!(second.y, first.y);

    // A large vertical jump re-snaps Y by at least the follow threshold.
    let (third, moved) = state.update_origin(Vec3::new(5.3, 60.0, -9.9));
    assert!(moved);
    assert!((third.y - first.y).abs() >= 4.0 * GI_CELL_SIZE);
}

// ============================================================================
// Skip policy
// ============================================================================

#[test]
fn unchanged_lighting_skips_compute() {
    let current = lighting();
    let flags = compute_flags(&current, Some(&current), false, false, true);
    assert!(!flags.lighting_changed);
    assert!(!flags.needs_occupancy_upload);
    assert!(!flags.needs_compute_update);
}

#[test]
fn first_frame_always_updates() {
    let flags = compute_flags(&lighting(), None, false, false, false);
    assert!(flags.lighting_changed);
    assert!(flags.needs_occupancy_upload, "uninitialized occupancy must upload");
    assert!(flags.needs_compute_update);
}

#[test]
fn sun_or_grid_change_forces_update() {
    let previous = lighting();
    let mut current = previous;
    current.sun_color.y += 3.0;
    let flags = compute_flags(&current, Some(&previous), true, false, true);
    assert!(flags.grid_moved);
    assert!(flags.lighting_changed);
    assert!(flags.needs_occupancy_upload);
    assert!(flags.needs_compute_update);
}

#[test]
fn sub_threshold_drift_is_ignored() {
    let previous = lighting();
    let mut current = previous;
    current.sun_direction.x += 5e-4;
    current.gi_strength += 5e-4;
    let flags = compute_flags(&current, Some(&previous), false, false, true);
    assert!(!flags.lighting_changed);
    assert!(!flags.needs_compute_update);
}

#[test]
fn world_dirty_uploads_without_lighting_change() {
    let current = lighting();
    let flags = compute_flags(&current, Some(&current), false, true, true);
    assert!(!flags.lighting_changed);
    assert!(flags.needs_occupancy_upload);
    assert!(flags.needs_compute_update);
}

// ============================================================================
// Occupancy packing
// ============================================================================

#[test]
fn occupancy_marks_solids_with_palette_albedo() {
    let mut grid = ChunkGrid::new();
    let mut chunk = Chunk::new(0, 0, 0);
    chunk.set_voxel(3, 4, 5, Voxel::new(VoxelType::Stone, 2));
    grid.insert(chunk);

    let mut palette = [0u32; 16];
    palette[2] = 0x0011_2233;

    let origin = Vec3::ZERO;
    let data = pack_occupancy(&grid, origin, &palette);
    let resolution = GI_GRID_RESOLUTION as usize;
    assert_eq!(data.len(), resolution * resolution * resolution * 4);

    // Cell centers land on voxel (3,4,5) at cell (3,4,5) for origin 0.
    let texel = ((5 * resolution + 4) * resolution + 3) * 4;
    assert_eq!(data[texel], 255, "solid marker");
    assert_eq!(data[texel + 1], 0x11);
    assert_eq!(data[texel + 2], 0x22);
    assert_eq!(data[texel + 3], 0x33);

    // A neighboring empty cell stays zero.
    let empty = ((5 * resolution + 4) * resolution + 4) * 4;
    assert_eq!(&data[empty..empty + 4], &[0, 0, 0, 0]);
}

#[test]
fn occupancy_of_flat_world_has_solid_floor() {
    let mut world = World::new();
    world.regenerate_flat_world();
    let data = pack_occupancy(
        world.chunk_grid(),
        Vec3::new(0.0, -16.0, 0.0),
        &[0xFFFF_FFFF; 16],
    );
    let solid_count = data.chunks_exact(4).filter(|texel| texel[0] == 255).count();
    assert!(solid_count > 0, "the flat world must intersect the volume");
}

// ============================================================================
// Propagation arithmetic
// ============================================================================

#[test]
fn per_iteration_decay_compounds_to_frame_decay() {
    let per_iteration = propagate_iteration_decay();
    let compounded = per_iteration.powi(GI_PROPAGATION_ITERATIONS as i32);
    assert!((compounded - GI_PROPAGATE_FRAME_DECAY).abs() < 1e-5);
}
