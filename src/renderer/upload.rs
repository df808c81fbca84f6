//! Chunk mesh cache and the combined VB/IB upload path.
//!
//! Meshes for all chunks and LODs are cached CPU-side; a remesh touches
//! either the full cache or exactly the dirty subset. Every upload
//! rebuilds one global vertex buffer and one global index buffer sized
//! to the contents, with indices rebased into global vertex space so
//! `vertex_offset` stays 0 in every draw range.
//!
//! Uploads ride a dedicated transfer submission that signals its own
//! timeline value. The frame that consumes the new buffers records that
//! value as its required wait; the previous buffers are released only at
//! `max(last graphics value, previous chunk-ready value)`. A transfer
//! still in flight defers the next upload; an allocation failure rolls
//! back the draw-range mutations so the previous frame's draw state
//! survives.

use glam::Vec3;

use super::core::{
    BufferDesc, BufferHandle, FrameArena, GpuAllocator, TimelineCoordinator, UploadKind,
};
use super::instances::{GrassBillboardInstance, rebuild_grass_for_chunk};
use crate::world::chunk::{CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z, ChunkGrid};
use crate::world::mesher::{
    CHUNK_MESH_LOD_COUNT, ChunkLodMeshes, MeshingMode, MeshingOptions, PackedVoxelVertex,
    build_chunk_lod_meshes,
};

/// Draw parameters for one (chunk, LOD) slice of the global buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkDrawRange {
    pub first_index: u32,
    /// Always 0: indices are rebased into the global vertex buffer.
    pub vertex_offset: i32,
    pub index_count: u32,
    pub world_offset: Vec3,
}

/// Transfer-queue state, polled each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferState {
    #[default]
    Idle,
    InFlight(u64),
}

/// Remesh/upload statistics for the stats overlay.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshingStats {
    pub chunks_remeshed: u32,
    pub active_vertex_count: u32,
    pub active_index_count: u32,
    pub naive_vertex_count: u32,
    pub naive_index_count: u32,
    pub reduction_percent: f32,
    pub uploaded_vertex_count: u32,
    pub uploaded_index_count: u32,
}

/// The chunk meshing cache plus the GPU-side combined buffers.
pub struct ChunkRenderData {
    lod_mesh_cache: Vec<ChunkLodMeshes>,
    cache_valid: bool,
    grass_cache: Vec<Vec<GrassBillboardInstance>>,

    pub meshing_options: MeshingOptions,
    pub draw_ranges: Vec<ChunkDrawRange>,

    pub vertex_buffer: Option<BufferHandle>,
    pub index_buffer: Option<BufferHandle>,
    pub grass_buffer: Option<BufferHandle>,
    pub grass_instance_count: u32,

    /// Timeline value the current VB/IB became valid at.
    pub chunk_ready_value: u64,
    pub transfer: TransferState,
    /// Wait the next graphics frame must honor (0 = none).
    pub pending_transfer_wait: u64,

    pub rebuild_requested: bool,
    pub pending_remesh: Vec<usize>,
    pub stats: MeshingStats,
}

impl Default for ChunkRenderData {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkRenderData {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lod_mesh_cache: Vec::new(),
            cache_valid: false,
            grass_cache: Vec::new(),
            meshing_options: MeshingOptions::default(),
            draw_ranges: Vec::new(),
            vertex_buffer: None,
            index_buffer: None,
            grass_buffer: None,
            grass_instance_count: 0,
            chunk_ready_value: 0,
            transfer: TransferState::Idle,
            pending_transfer_wait: 0,
            rebuild_requested: true,
            pending_remesh: Vec::new(),
            stats: MeshingStats::default(),
        }
    }

    /// Requests a full rebuild; any queued incremental remeshes are
    /// subsumed.
    pub fn request_full_rebuild(&mut self) {
        self.rebuild_requested = true;
        self.pending_remesh.clear();
    }

    /// Queues one chunk for incremental remesh.
    pub fn request_remesh(&mut self, chunk_index: usize, chunk_count: usize) -> bool {
        if chunk_index >= chunk_count {
            return false;
        }
        if self.rebuild_requested {
            return true;
        }
        if !self.pending_remesh.contains(&chunk_index) {
            self.pending_remesh.push(chunk_index);
        }
        true
    }

    /// Switches meshing mode; a mode change invalidates the cache.
    pub fn set_meshing_mode(&mut self, mode: MeshingMode) {
        if self.meshing_options.mode != mode {
            self.meshing_options.mode = mode;
            self.cache_valid = false;
            self.request_full_rebuild();
        }
    }

    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        self.rebuild_requested || !self.pending_remesh.is_empty()
    }

    /// Clears transfer state once its value completed; called at the top
    /// of the frame.
    pub fn poll_transfer(&mut self, timeline: &TimelineCoordinator) {
        if let TransferState::InFlight(value) = self.transfer {
            if timeline.signaled(value) {
                self.transfer = TransferState::Idle;
                self.pending_transfer_wait = 0;
            }
        }
    }

    /// Remeshes (fully or incrementally) and uploads the combined
    /// buffers. Returns `false` when the work was deferred or rolled
    /// back; the previous draw state stays valid either way.
    pub fn create_chunk_buffers(
        &mut self,
        queue: &wgpu::Queue,
        allocator: &mut GpuAllocator,
        arena: &mut FrameArena,
        slot: usize,
        timeline: &mut TimelineCoordinator,
        device: &wgpu::Device,
        grid: &ChunkGrid,
        remesh_indices: &[usize],
        last_graphics_value: u64,
    ) -> bool {
        let chunks = grid.chunks();
        if chunks.is_empty() {
            return false;
        }

        // A transfer still in flight defers this upload entirely.
        if let TransferState::InFlight(value) = self.transfer {
            if !timeline.signaled(value) {
                return false;
            }
            self.transfer = TransferState::Idle;
            self.pending_transfer_wait = 0;
        }
        timeline.collect_completed_releases(device, allocator);

        let previous_draw_ranges = self.draw_ranges.clone();
        let previous_stats = self.stats;

        let expected_ranges = chunks.len() * CHUNK_MESH_LOD_COUNT;
        if self.draw_ranges.len() != expected_ranges {
            self.draw_ranges = vec![ChunkDrawRange::default(); expected_ranges];
        }
        if self.lod_mesh_cache.len() != chunks.len() {
            self.lod_mesh_cache = (0..chunks.len()).map(|_| ChunkLodMeshes::default()).collect();
            self.cache_valid = false;
        }
        if self.grass_cache.len() != chunks.len() {
            self.grass_cache = vec![Vec::new(); chunks.len()];
        }

        // ── Remesh ────────────────────────────────────────────────────

        let full_remesh = !self.cache_valid || remesh_indices.is_empty();
        let remesh_start = std::time::Instant::now();
        let mut remeshed = 0u32;
        let mut active_vertices = 0usize;
        let mut active_indices = 0usize;
        let mut naive_vertices = 0usize;
        let mut naive_indices = 0usize;

        let count_geometry =
            |meshes: &ChunkLodMeshes, vertices: &mut usize, indices: &mut usize| {
                for mesh in &meshes.lod_meshes {
                    *vertices += mesh.vertices.len();
                    *indices += mesh.indices.len();
                }
            };

        let mut remesh_one = |this: &mut Self, chunk_index: usize| {
            this.lod_mesh_cache[chunk_index] =
                build_chunk_lod_meshes(&chunks[chunk_index], this.meshing_options);
            rebuild_grass_for_chunk(&chunks[chunk_index], &mut this.grass_cache[chunk_index]);
            count_geometry(
                &this.lod_mesh_cache[chunk_index],
                &mut active_vertices,
                &mut active_indices,
            );
            if this.meshing_options.mode == MeshingMode::Naive {
                naive_vertices = active_vertices;
                naive_indices = active_indices;
            } else {
                let naive = build_chunk_lod_meshes(
                    &chunks[chunk_index],
                    MeshingOptions {
                        mode: MeshingMode::Naive,
                    },
                );
                count_geometry(&naive, &mut naive_vertices, &mut naive_indices);
            }
        };

        if full_remesh {
            for chunk_index in 0..chunks.len() {
                remesh_one(self, chunk_index);
            }
            remeshed = chunks.len() as u32;
            self.cache_valid = true;
        } else {
            let mut seen = vec![false; chunks.len()];
            for &chunk_index in remesh_indices {
                if chunk_index >= chunks.len() {
                    self.draw_ranges = previous_draw_ranges;
                    self.stats = previous_stats;
                    return false;
                }
                if seen[chunk_index] {
                    continue;
                }
                seen[chunk_index] = true;
                remesh_one(self, chunk_index);
                remeshed += 1;
            }
        }

        self.stats.chunks_remeshed = remeshed;
        self.stats.active_vertex_count = active_vertices as u32;
        self.stats.active_index_count = active_indices as u32;
        self.stats.naive_vertex_count = naive_vertices as u32;
        self.stats.naive_index_count = naive_indices as u32;
        self.stats.reduction_percent = if naive_indices > 0 {
            (100.0 * (1.0 - active_indices as f32 / naive_indices as f32)).clamp(0.0, 100.0)
        } else {
            0.0
        };

        // ── Grass instance buffer ─────────────────────────────────────

        let total_grass: usize = self.grass_cache.iter().map(Vec::len).sum();
        if total_grass == 0 {
            if let Some(handle) = self.grass_buffer.take() {
                timeline.schedule_buffer_release(handle, last_graphics_value);
            }
            self.grass_instance_count = 0;
        } else {
            let mut combined_grass = Vec::with_capacity(total_grass);
            for chunk_grass in &self.grass_cache {
                combined_grass.extend_from_slice(chunk_grass);
            }
            let new_grass = allocator.create_buffer(&BufferDesc {
                label: "mesh.grassBillboard.instances",
                size: std::mem::size_of_val(combined_grass.as_slice()) as u64,
                usage: wgpu::BufferUsages::VERTEX,
                initial_data: Some(bytemuck::cast_slice(&combined_grass)),
            });
            if let Some(new_grass) = new_grass {
                if let Some(old) = self.grass_buffer.replace(new_grass) {
                    timeline.schedule_buffer_release(old, last_graphics_value);
                }
                self.grass_instance_count = combined_grass.len() as u32;
            } else {
                log::error!("grass billboard instance buffer allocation failed");
            }
        }

        // ── Combine vertices/indices and rebuild draw ranges ──────────

        let mut combined_vertices: Vec<PackedVoxelVertex> = Vec::new();
        let mut combined_indices: Vec<u32> = Vec::new();
        let mut uploaded_vertices = 0usize;
        let mut uploaded_indices = 0usize;

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            for lod in 0..CHUNK_MESH_LOD_COUNT {
                let mesh = &self.lod_mesh_cache[chunk_index].lod_meshes[lod];
                let range_index = chunk_index * CHUNK_MESH_LOD_COUNT + lod;
                let range = &mut self.draw_ranges[range_index];
                range.world_offset = Vec3::new(
                    (chunk.chunk_x() * CHUNK_SIZE_X) as f32,
                    (chunk.chunk_y() * CHUNK_SIZE_Y) as f32,
                    (chunk.chunk_z() * CHUNK_SIZE_Z) as f32,
                );
                range.first_index = 0;
                range.vertex_offset = 0;
                range.index_count = 0;

                if mesh.vertices.is_empty() || mesh.indices.is_empty() {
                    continue;
                }

                let base_vertex = combined_vertices.len();
                if base_vertex > u32::MAX as usize {
                    log::error!("chunk mesh vertex offset exceeds u32 range");
                    self.draw_ranges = previous_draw_ranges;
                    self.stats = previous_stats;
                    return false;
                }
                range.first_index = combined_indices.len() as u32;
                range.index_count = mesh.indices.len() as u32;

                combined_vertices.extend_from_slice(&mesh.vertices);
                combined_indices.reserve(mesh.indices.len());
                combined_indices
                    .extend(mesh.indices.iter().map(|&index| index + base_vertex as u32));

                uploaded_vertices += mesh.vertices.len();
                uploaded_indices += mesh.indices.len();
            }
        }
        self.stats.uploaded_vertex_count = uploaded_vertices as u32;
        self.stats.uploaded_index_count = uploaded_indices as u32;

        // ── Device buffers + transfer submission ──────────────────────

        let previous_chunk_ready = self.chunk_ready_value;
        let has_copies = !combined_vertices.is_empty() && !combined_indices.is_empty();
        let mut new_vertex_buffer = None;
        let mut new_index_buffer = None;
        let mut transfer_value = 0u64;

        if has_copies {
            let vertex_bytes: &[u8] = bytemuck::cast_slice(&combined_vertices);
            let index_bytes: &[u8] = bytemuck::cast_slice(&combined_indices);

            let Some(vertex_buffer) = allocator.create_buffer(&BufferDesc {
                label: "chunk.global.vertex",
                size: vertex_bytes.len() as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                initial_data: None,
            }) else {
                log::error!("chunk global vertex buffer allocation failed");
                self.draw_ranges = previous_draw_ranges;
                self.stats = previous_stats;
                return false;
            };
            let Some(index_buffer) = allocator.create_buffer(&BufferDesc {
                label: "chunk.global.index",
                size: index_bytes.len() as u64,
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                initial_data: None,
            }) else {
                log::error!("chunk global index buffer allocation failed");
                allocator.destroy_buffer(vertex_buffer);
                self.draw_ranges = previous_draw_ranges;
                self.stats = previous_stats;
                return false;
            };

            // Staging lives in the frame arena's transient-buffer list;
            // its lifetime is bounded by the slot's timeline value, which
            // the transfer completes before.
            let vertex_staging = arena.create_transient_buffer(
                slot,
                allocator,
                &BufferDesc {
                    label: "chunk.global.vertex.staging",
                    size: vertex_bytes.len() as u64,
                    usage: wgpu::BufferUsages::COPY_SRC,
                    initial_data: Some(vertex_bytes),
                },
            );
            let index_staging = arena.create_transient_buffer(
                slot,
                allocator,
                &BufferDesc {
                    label: "chunk.global.index.staging",
                    size: index_bytes.len() as u64,
                    usage: wgpu::BufferUsages::COPY_SRC,
                    initial_data: Some(index_bytes),
                },
            );
            let (Some(vertex_staging), Some(index_staging)) = (vertex_staging, index_staging)
            else {
                log::error!("chunk upload staging allocation failed");
                allocator.destroy_buffer(vertex_buffer);
                allocator.destroy_buffer(index_buffer);
                self.draw_ranges = previous_draw_ranges;
                self.stats = previous_stats;
                return false;
            };

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("chunk.transfer"),
            });
            {
                let source = allocator
                    .buffer(vertex_staging)
                    .expect("staging buffer created above");
                let target = allocator
                    .buffer(vertex_buffer)
                    .expect("vertex buffer created above");
                encoder.copy_buffer_to_buffer(source, 0, target, 0, vertex_bytes.len() as u64);
            }
            {
                let source = allocator
                    .buffer(index_staging)
                    .expect("staging buffer created above");
                let target = allocator
                    .buffer(index_buffer)
                    .expect("index buffer created above");
                encoder.copy_buffer_to_buffer(source, 0, target, 0, index_bytes.len() as u64);
            }

            transfer_value = timeline.next_value();
            queue.submit(Some(encoder.finish()));
            timeline.register_submission(queue, transfer_value);

            self.chunk_ready_value = transfer_value;
            self.pending_transfer_wait = transfer_value;
            self.transfer = TransferState::InFlight(transfer_value);

            new_vertex_buffer = Some(vertex_buffer);
            new_index_buffer = Some(index_buffer);
        }

        // The old buffers stay alive until both the last graphics frame
        // that drew them and the transfer that replaced them are done.
        let release_value = last_graphics_value.max(previous_chunk_ready);
        if let Some(old) = self.vertex_buffer.take() {
            timeline.schedule_buffer_release(old, release_value);
        }
        if let Some(old) = self.index_buffer.take() {
            timeline.schedule_buffer_release(old, release_value);
        }
        self.vertex_buffer = new_vertex_buffer;
        self.index_buffer = new_index_buffer;

        let remesh_elapsed_ms = remesh_start.elapsed().as_secs_f32() * 1000.0;
        log::debug!(
            "chunk upload queued (ranges={}, remeshedChunks={}, meshingMode={}, vertices={}, indices={}, remeshMs={remesh_elapsed_ms:.2}, {})",
            self.draw_ranges.len(),
            remeshed,
            if self.meshing_options.mode == MeshingMode::Greedy {
                "greedy"
            } else {
                "naive"
            },
            uploaded_vertices,
            uploaded_indices,
            if has_copies {
                format!("timelineValue={transfer_value}")
            } else {
                "immediate=true".to_string()
            }
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::core::TimelineCoordinator;

    #[test]
    fn remesh_requests_deduplicate() {
        let mut data = ChunkRenderData::new();
        data.rebuild_requested = false;
        assert!(data.request_remesh(2, 8));
        assert!(data.request_remesh(2, 8));
        assert!(data.request_remesh(5, 8));
        assert_eq!(data.pending_remesh, vec![2, 5]);
        assert!(!data.request_remesh(8, 8), "out-of-range index rejected");
    }

    #[test]
    fn full_rebuild_subsumes_incremental_requests() {
        let mut data = ChunkRenderData::new();
        data.rebuild_requested = false;
        data.request_remesh(1, 4);
        data.request_full_rebuild();
        assert!(data.pending_remesh.is_empty());
        // Further incremental requests are absorbed by the full rebuild.
        assert!(data.request_remesh(3, 4));
        assert!(data.pending_remesh.is_empty());
    }

    #[test]
    fn mode_switch_invalidates_and_requests_rebuild() {
        let mut data = ChunkRenderData::new();
        data.rebuild_requested = false;
        data.set_meshing_mode(MeshingMode::Greedy);
        assert!(!data.rebuild_requested, "same mode is a no-op");
        data.set_meshing_mode(MeshingMode::Naive);
        assert!(data.rebuild_requested);
    }

    #[test]
    fn transfer_state_clears_once_signaled() {
        let mut data = ChunkRenderData::new();
        let mut timeline = TimelineCoordinator::new();
        let value = timeline.next_value();
        data.transfer = TransferState::InFlight(value);
        data.pending_transfer_wait = value;

        data.poll_transfer(&timeline);
        assert_eq!(data.transfer, TransferState::InFlight(value));

        timeline.completion_token().signal_up_to(value);
        data.poll_transfer(&timeline);
        assert_eq!(data.transfer, TransferState::Idle);
        assert_eq!(data.pending_transfer_wait, 0);
    }
}
