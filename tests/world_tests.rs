//! World Tests
//!
//! Tests for:
//! - Binary save/load round-trip
//! - Flat-world fallback on a missing file
//! - Voxel editing idempotence (same-value writes report no change)

use std::path::PathBuf;

use verdant::world::World;
use verdant::world::chunk::{Voxel, VoxelType};

fn temp_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("verdant_test_{}_{name}.bin", std::process::id()));
    path
}

#[test]
fn save_load_round_trips_the_world() {
    let path = temp_path("roundtrip");
    let mut world = World::new();
    world.regenerate_flat_world();
    world.set_voxel_world(5, 16, 9, Voxel::new(VoxelType::Metal, 12));
    world.set_voxel_world(40, 3, 40, Voxel::new(VoxelType::Sand, 6));
    world.save(&path).expect("save must succeed");

    let mut restored = World::new();
    let result = restored.load_or_initialize(&path);
    assert!(result.loaded_from_file);
    assert!(!result.initialized_fallback);

    assert_eq!(
        restored.chunk_grid().chunks().len(),
        world.chunk_grid().chunks().len()
    );
    assert_eq!(
        restored.chunk_grid().voxel_at_world(5, 16, 9),
        Voxel::new(VoxelType::Metal, 12)
    );
    assert_eq!(
        restored.chunk_grid().voxel_at_world(40, 3, 40),
        Voxel::new(VoxelType::Sand, 6)
    );
    // Spot-check a generated voxel too.
    assert_eq!(
        restored.chunk_grid().voxel_at_world(1, 15, 1).ty,
        VoxelType::Grass
    );

    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_file_regenerates_a_flat_world() {
    let path = temp_path("missing");
    let _ = std::fs::remove_file(&path);
    let mut world = World::new();
    let result = world.load_or_initialize(&path);
    assert!(!result.loaded_from_file);
    assert!(result.initialized_fallback);
    assert!(!world.chunk_grid().chunks().is_empty());
    assert!(world.chunk_grid().is_solid_world(1, 0, 1));
    assert!(!world.chunk_grid().is_solid_world(1, 31, 1));
}

#[test]
fn corrupt_file_falls_back() {
    let path = temp_path("corrupt");
    std::fs::write(&path, b"not a world file at all").unwrap();
    let mut world = World::new();
    let result = world.load_or_initialize(&path);
    assert!(result.initialized_fallback);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn same_value_write_is_a_no_op() {
    let mut world = World::new();
    world.regenerate_flat_world();
    let voxel = Voxel::new(VoxelType::Wood, 4);

    let first = world.set_voxel_world(8, 20, 8, voxel);
    assert!(first.is_some(), "first write dirties exactly one chunk");

    let second = world.set_voxel_world(8, 20, 8, voxel);
    assert!(second.is_none(), "identical write must not dirty anything");
}

#[test]
fn out_of_world_write_hits_nothing() {
    let mut world = World::new();
    world.regenerate_flat_world();
    assert!(
        world
            .set_voxel_world(10_000, 0, 0, Voxel::new(VoxelType::Stone, 0))
            .is_none()
    );
}
