//! Per-frame instance streams and draw-list building.
//!
//! Everything the simulation and interaction layers contribute to a
//! frame — pipes, belts, tracks, cargoes, grass billboards, the voxel
//! preview — is flattened here into plain instance arrays plus indirect
//! draw commands, with chunk-level frustum culling for the main view and
//! per-cascade caster lists for the shadow atlas.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::sim::SimulationFrame;
use crate::world::chunk::{CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z, Chunk, VoxelType};

/// One grass billboard.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GrassBillboardInstance {
    /// xyz = world position, w = yaw radians.
    pub world_pos_yaw: [f32; 4],
    /// rgb = tint, w = atlas tile index.
    pub color_tint: [f32; 4],
}

/// One pipe/belt/track/cargo instance; `params.x` selects the mesh
/// variant inside the shared network shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct NetworkInstance {
    /// xyz = world position, w = yaw radians.
    pub world_pos_yaw: [f32; 4],
    /// x = mesh variant, y = style/kind, z = axis, w unused.
    pub params: [f32; 4],
}

/// Network mesh variants understood by `network.wgsl`.
pub const NETWORK_VARIANT_PIPE: f32 = 0.0;
pub const NETWORK_VARIANT_BELT: f32 = 1.0;
pub const NETWORK_VARIANT_TRACK: f32 = 2.0;
pub const NETWORK_VARIANT_CARGO: f32 = 3.0;

/// One per-draw-range entry of the chunk instance stream; indirect
/// commands select it through `first_instance`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ChunkDrawInstance {
    /// xyz = chunk world offset, w = LOD index as float.
    pub offset_lod: [f32; 4],
}

/// CPU-built indexed indirect command, laid out as the GPU consumes it.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawIndexedIndirect {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

/// Host-supplied voxel preview (placement brush + highlighted face).
#[derive(Debug, Clone, Copy, Default)]
pub struct VoxelPreview {
    pub visible: bool,
    pub world_x: i32,
    pub world_y: i32,
    pub world_z: i32,
    pub brush_size: i32,
    pub removing: bool,
    pub face_visible: bool,
    pub face_x: i32,
    pub face_y: i32,
    pub face_z: i32,
    pub face_id: u32,
}

// ─── Frustum culling ─────────────────────────────────────────────────────────

/// Six clip planes extracted from a view-projection matrix.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [Vec4; 6],
    plane_count: usize,
}

impl Frustum {
    /// Gribb-Hartmann extraction for a [0,1] clip depth range; works for
    /// both standard and reversed depth since both bounding planes are
    /// kept.
    #[must_use]
    pub fn from_view_proj(view_proj: Mat4) -> Self {
        let row = |i: usize| view_proj.row(i);
        let planes = [
            row(3) + row(0),
            row(3) - row(0),
            row(3) + row(1),
            row(3) - row(1),
            row(2),
            row(3) - row(2),
        ];
        Self {
            planes,
            plane_count: 6,
        }
    }

    /// Caster variant: the depth-bound planes are dropped so geometry
    /// toward the light is never culled away from a cascade.
    #[must_use]
    pub fn for_shadow_casters(view_proj: Mat4) -> Self {
        let mut frustum = Self::from_view_proj(view_proj);
        frustum.plane_count = 4;
        frustum
    }

    /// AABB intersection test with an inflation margin.
    #[must_use]
    pub fn intersects_aabb(&self, min: Vec3, max: Vec3, margin: f32) -> bool {
        for plane in &self.planes[..self.plane_count] {
            let normal = Vec3::new(plane.x, plane.y, plane.z);
            // Positive vertex: the corner farthest along the plane normal.
            let positive = Vec3::new(
                if normal.x >= 0.0 { max.x } else { min.x },
                if normal.y >= 0.0 { max.y } else { min.y },
                if normal.z >= 0.0 { max.z } else { min.z },
            );
            if normal.dot(positive) + plane.w + margin < 0.0 {
                return false;
            }
        }
        true
    }
}

/// World-space AABB of a chunk.
#[must_use]
pub fn chunk_aabb(chunk: &Chunk) -> (Vec3, Vec3) {
    let min = Vec3::new(
        (chunk.chunk_x() * CHUNK_SIZE_X) as f32,
        (chunk.chunk_y() * CHUNK_SIZE_Y) as f32,
        (chunk.chunk_z() * CHUNK_SIZE_Z) as f32,
    );
    let max = min + Vec3::new(CHUNK_SIZE_X as f32, CHUNK_SIZE_Y as f32, CHUNK_SIZE_Z as f32);
    (min, max)
}

// ─── Grass placement ─────────────────────────────────────────────────────────

/// Rebuilds the grass billboard list for one chunk.
///
/// Placement is hash-deterministic: grass stays sparse (22 % of eligible
/// voxels) and stable across remeshes, with 2–3 clumped billboards per
/// kept voxel and warm/dry tint variation; a small fraction become
/// flowers.
pub fn rebuild_grass_for_chunk(chunk: &Chunk, instances: &mut Vec<GrassBillboardInstance>) {
    instances.clear();
    instances.reserve(448);

    let chunk_world_x = (chunk.chunk_x() * CHUNK_SIZE_X) as f32;
    let chunk_world_y = (chunk.chunk_y() * CHUNK_SIZE_Y) as f32;
    let chunk_world_z = (chunk.chunk_z() * CHUNK_SIZE_Z) as f32;

    for y in 0..CHUNK_SIZE_Y - 1 {
        for z in 0..CHUNK_SIZE_Z {
            for x in 0..CHUNK_SIZE_X {
                if chunk.voxel_at(x, y, z).ty != VoxelType::Grass {
                    continue;
                }
                if chunk.voxel_at(x, y + 1, z).ty != VoxelType::Empty {
                    continue;
                }

                let hash = (x as u32).wrapping_mul(73_856_093)
                    ^ (y as u32).wrapping_mul(19_349_663)
                    ^ (z as u32).wrapping_mul(83_492_791)
                    ^ ((chunk.chunk_x() + 101) as u32).wrapping_mul(2_654_435_761)
                    ^ ((chunk.chunk_z() + 193) as u32).wrapping_mul(2_246_822_519);
                // Sparse and deterministic so placement stays stable.
                if hash % 100 >= 22 {
                    continue;
                }
                let clump_count = 2 + ((hash >> 24) & 0x1);
                for clump_index in 0..clump_count {
                    let clump_hash = hash ^ 0x9E37_79B9u32.wrapping_mul(clump_index + 1);
                    let rand0 = (clump_hash & 0xFF) as f32 / 255.0;
                    let rand1 = ((clump_hash >> 8) & 0xFF) as f32 / 255.0;
                    let rand2 = ((clump_hash >> 16) & 0xFF) as f32 / 255.0;
                    let rand3 = ((clump_hash >> 24) & 0xFF) as f32 / 255.0;
                    let tint_hash = clump_hash ^ 0x85EB_CA6B;
                    let tint0 = (tint_hash & 0xFF) as f32 / 255.0;
                    let tint1 = ((tint_hash >> 8) & 0xFF) as f32 / 255.0;
                    let tint2 = ((tint_hash >> 16) & 0xFF) as f32 / 255.0;

                    let radial = 0.06 + 0.18 * rand2;
                    let angle = rand1 * std::f32::consts::TAU;
                    let yaw = rand0 * std::f32::consts::TAU;

                    let mut instance = GrassBillboardInstance {
                        world_pos_yaw: [
                            chunk_world_x + x as f32 + 0.5 + angle.cos() * radial,
                            // Lifted above the supporting voxel top to avoid
                            // depth-tie flicker.
                            chunk_world_y + y as f32 + 1.02 + rand3 * 0.08,
                            chunk_world_z + z as f32 + 0.5 + angle.sin() * radial,
                            yaw,
                        ],
                        color_tint: [0.0; 4],
                    };

                    let place_flower = ((clump_hash >> 5) % 100) < 18;
                    if place_flower {
                        // Bias toward poppies, with rarer lighter wildflowers.
                        let choose_poppy = ((clump_hash >> 13) % 100) < 74;
                        let tile = if choose_poppy {
                            5 + ((clump_hash >> 9) & 0x1)
                        } else {
                            7 + ((clump_hash >> 10) & 0x1)
                        };
                        let boost = if choose_poppy {
                            0.92 + tint1 * 0.30
                        } else {
                            0.88 + tint1 * 0.30
                        };
                        if choose_poppy {
                            instance.color_tint = [
                                (1.05 + tint0 * 0.55) * boost,
                                (0.58 + tint2 * 0.38) * boost,
                                (0.40 + tint1 * 0.24) * boost,
                                tile as f32,
                            ];
                        } else {
                            instance.color_tint = [
                                (0.96 + tint0 * 0.42) * boost,
                                (0.96 + tint2 * 0.42) * boost,
                                (0.96 + tint1 * 0.42) * boost,
                                tile as f32,
                            ];
                        }
                    } else {
                        // Golden grass variation.
                        let warm = 0.50 + 0.50 * tint0;
                        let dry = tint2;
                        let brightness = 0.82 + tint1 * 0.32;
                        let red = lerp(0.90, 1.28, warm);
                        let green = lerp(0.98, 1.36, warm * 0.70 + dry * 0.30);
                        let blue = lerp(0.56, 0.20, warm);
                        instance.color_tint = [
                            red * brightness,
                            green * brightness,
                            blue * brightness,
                            4.0,
                        ];
                    }
                    instances.push(instance);
                }
            }
        }
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

// ─── Simulation streams ──────────────────────────────────────────────────────

/// Flattens the simulation's read-only arrays into one network instance
/// stream. Order is pipes, belts, tracks, cargoes; the per-kind ranges
/// are returned so draws can be skipped when a kind is empty.
pub fn build_network_instances(
    simulation: &SimulationFrame,
    instances: &mut Vec<NetworkInstance>,
) -> [std::ops::Range<u32>; 4] {
    instances.clear();
    instances.reserve(
        simulation.pipes.len()
            + simulation.belts.len()
            + simulation.tracks.len()
            + simulation.belt_cargoes.len(),
    );

    let start = instances.len() as u32;
    for pipe in simulation.pipes {
        instances.push(NetworkInstance {
            world_pos_yaw: [
                pipe.world_x as f32 + 0.5,
                pipe.world_y as f32 + 0.5,
                pipe.world_z as f32 + 0.5,
                0.0,
            ],
            params: [
                NETWORK_VARIANT_PIPE,
                f32::from(pipe.style),
                f32::from(pipe.axis),
                0.0,
            ],
        });
    }
    let pipes = start..instances.len() as u32;

    let start = instances.len() as u32;
    for belt in simulation.belts {
        instances.push(NetworkInstance {
            world_pos_yaw: [
                belt.world_x as f32 + 0.5,
                belt.world_y as f32 + 0.5,
                belt.world_z as f32 + 0.5,
                f32::from(belt.direction) * std::f32::consts::FRAC_PI_2,
            ],
            params: [NETWORK_VARIANT_BELT, 0.0, 0.0, 0.0],
        });
    }
    let belts = start..instances.len() as u32;

    let start = instances.len() as u32;
    for track in simulation.tracks {
        instances.push(NetworkInstance {
            world_pos_yaw: [
                track.world_x as f32 + 0.5,
                track.world_y as f32 + 0.5,
                track.world_z as f32 + 0.5,
                f32::from(track.direction) * std::f32::consts::FRAC_PI_2,
            ],
            params: [NETWORK_VARIANT_TRACK, f32::from(track.shape), 0.0, 0.0],
        });
    }
    let tracks = start..instances.len() as u32;

    let start = instances.len() as u32;
    for cargo in simulation.belt_cargoes {
        instances.push(NetworkInstance {
            world_pos_yaw: [cargo.position[0], cargo.position[1], cargo.position[2], 0.0],
            params: [NETWORK_VARIANT_CARGO, f32::from(cargo.item_kind), 0.0, 0.0],
        });
    }
    let cargoes = start..instances.len() as u32;

    [pipes, belts, tracks, cargoes]
}
