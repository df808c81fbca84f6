//! Chunk Mesher Tests
//!
//! Tests for:
//! - Greedy merging of the canonical scenarios (full cube, chessboard)
//! - Determinism of repeated meshing on an unchanged chunk
//! - Quad bounds, index-count multiples, and empty-neighbor culling
//! - Naive vs greedy index accounting

use verdant::world::chunk::{CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z, Chunk, Voxel, VoxelType};
use verdant::world::mesher::{
    CHUNK_MESH_LOD_COUNT, MeshingMode, MeshingOptions, build_chunk_lod_meshes,
};

fn filled_chunk() -> Chunk {
    let mut chunk = Chunk::new(0, 0, 0);
    for y in 0..CHUNK_SIZE_Y {
        for z in 0..CHUNK_SIZE_Z {
            for x in 0..CHUNK_SIZE_X {
                chunk.set_voxel(x, y, z, Voxel::new(VoxelType::Stone, 7));
            }
        }
    }
    chunk
}

fn chessboard_chunk() -> Chunk {
    let mut chunk = Chunk::new(0, 0, 0);
    for y in 0..CHUNK_SIZE_Y {
        for z in 0..CHUNK_SIZE_Z {
            for x in 0..CHUNK_SIZE_X {
                if (x + y + z) % 2 == 0 {
                    chunk.set_voxel(x, y, z, Voxel::new(VoxelType::Dirt, 3));
                }
            }
        }
    }
    chunk
}

fn greedy() -> MeshingOptions {
    MeshingOptions {
        mode: MeshingMode::Greedy,
    }
}

fn naive() -> MeshingOptions {
    MeshingOptions {
        mode: MeshingMode::Naive,
    }
}

// ============================================================================
// Canonical scenarios
// ============================================================================

#[test]
fn full_cube_emits_exactly_six_quads_at_lod0() {
    let meshes = build_chunk_lod_meshes(&filled_chunk(), greedy());
    let lod0 = &meshes.lod_meshes[0];
    assert_eq!(lod0.vertices.len(), 24, "6 quads x 4 vertices");
    assert_eq!(lod0.indices.len(), 36, "6 quads x 6 indices");
}

#[test]
fn chessboard_greedy_reduction_is_zero() {
    let chunk = chessboard_chunk();
    let greedy_meshes = build_chunk_lod_meshes(&chunk, greedy());
    let naive_meshes = build_chunk_lod_meshes(&chunk, naive());
    for lod in 0..CHUNK_MESH_LOD_COUNT {
        assert_eq!(
            greedy_meshes.lod_meshes[lod].indices.len(),
            naive_meshes.lod_meshes[lod].indices.len(),
            "every chessboard face is isolated, lod {lod} must not merge"
        );
    }
}

#[test]
fn empty_chunk_emits_nothing() {
    let meshes = build_chunk_lod_meshes(&Chunk::new(0, 0, 0), greedy());
    for mesh in &meshes.lod_meshes {
        assert!(mesh.vertices.is_empty());
        assert!(mesh.indices.is_empty());
    }
}

// ============================================================================
// Structural invariants
// ============================================================================

#[test]
fn meshing_twice_is_byte_identical() {
    let chunk = chessboard_chunk();
    let first = build_chunk_lod_meshes(&chunk, greedy());
    let second = build_chunk_lod_meshes(&chunk, greedy());
    for lod in 0..CHUNK_MESH_LOD_COUNT {
        assert_eq!(
            first.lod_meshes[lod], second.lod_meshes[lod],
            "mesher output must be deterministic at lod {lod}"
        );
    }
}

#[test]
fn quad_corners_stay_inside_chunk_bounds() {
    let mut chunk = filled_chunk();
    // Carve a cavity so interior faces appear too.
    for y in 8..12 {
        for z in 8..20 {
            for x in 8..20 {
                chunk.set_voxel(x, y, z, Voxel::EMPTY);
            }
        }
    }
    let meshes = build_chunk_lod_meshes(&chunk, greedy());
    for (lod, mesh) in meshes.lod_meshes.iter().enumerate() {
        assert_eq!(mesh.indices.len() % 6, 0, "lod {lod} index count");
        for vertex in &mesh.vertices {
            let (x, y, z) = vertex.local_position();
            assert!(x <= 32 && y <= 32 && z <= 32, "corner ({x},{y},{z}) out of range");
            assert_eq!(vertex.lod(), lod as u32);
        }
        for &index in &mesh.indices {
            assert!((index as usize) < mesh.vertices.len(), "index into own vertex array");
        }
    }
}

#[test]
fn buried_faces_emit_no_quads() {
    // Two voxels side by side share one hidden face pair: 12 - 2 = 10
    // visible faces.
    let mut chunk = Chunk::new(0, 0, 0);
    chunk.set_voxel(4, 4, 4, Voxel::new(VoxelType::Stone, 1));
    chunk.set_voxel(5, 4, 4, Voxel::new(VoxelType::Stone, 1));
    let meshes = build_chunk_lod_meshes(&chunk, naive());
    assert_eq!(meshes.lod_meshes[0].indices.len(), 10 * 6);
}

#[test]
fn greedy_merges_same_key_faces() {
    // A 4x1x4 slab of one material: the top face merges into one quad
    // under greedy, 16 quads under naive.
    let mut chunk = Chunk::new(0, 0, 0);
    for z in 4..8 {
        for x in 4..8 {
            chunk.set_voxel(x, 4, z, Voxel::new(VoxelType::Sand, 6));
        }
    }
    let greedy_mesh = build_chunk_lod_meshes(&chunk, greedy());
    let naive_mesh = build_chunk_lod_meshes(&chunk, naive());
    assert!(
        greedy_mesh.lod_meshes[0].indices.len() < naive_mesh.lod_meshes[0].indices.len(),
        "greedy must merge the slab faces"
    );
}

#[test]
fn different_colors_do_not_merge() {
    let mut chunk = Chunk::new(0, 0, 0);
    chunk.set_voxel(4, 4, 4, Voxel::new(VoxelType::Stone, 1));
    chunk.set_voxel(5, 4, 4, Voxel::new(VoxelType::Stone, 2));
    let greedy_mesh = build_chunk_lod_meshes(&chunk, greedy());
    let naive_mesh = build_chunk_lod_meshes(&chunk, naive());
    assert_eq!(
        greedy_mesh.lod_meshes[0].indices.len(),
        naive_mesh.lod_meshes[0].indices.len(),
        "mask keys differ on color, nothing may merge"
    );
}
