//! Render passes.
//!
//! One module per labeled pass. Passes are plain structs owning their
//! pipelines and static bind groups; recording happens through free
//! functions over [`FrameCtx`] rather than closures over renderer
//! internals, so each pass sees exactly the state it needs.

pub mod bloom;
pub mod exposure;
pub mod main_scene;
pub mod prepass;
pub mod shadow;
pub mod shafts;
pub mod ssao;
pub mod tonemap;

use super::core::{ArenaSlice, BufferHandle, FrameArena, GpuAllocator};
use super::uniforms::{CameraUniform, DRAW_PARAMS_STRIDE, DrawParams};
use crate::renderer::cascades::SHADOW_CASCADE_COUNT;

/// Everything a pass needs to record itself for the current frame.
pub struct FrameCtx<'a> {
    pub device: &'a wgpu::Device,
    pub allocator: &'a GpuAllocator,
    pub arena: &'a FrameArena,
    /// Group 0: camera uniform + draw params, both dynamic-offset.
    pub globals_bind_group: &'a wgpu::BindGroup,
    /// Dynamic offset of this frame's camera uniform slice.
    pub camera_offset: u32,
    /// Dynamic offset of the zeroed default draw-params slice.
    pub default_draw_offset: u32,
}

impl FrameCtx<'_> {
    /// Standard group-0 dynamic offsets for a draw without per-draw
    /// params.
    #[inline]
    #[must_use]
    pub fn default_offsets(&self) -> [u32; 2] {
        [self.camera_offset, self.default_draw_offset]
    }

    /// Group-0 dynamic offsets selecting a specific draw-params slice.
    #[inline]
    #[must_use]
    pub fn offsets_with_draw(&self, draw_offset: u32) -> [u32; 2] {
        [self.camera_offset, draw_offset]
    }
}

/// Builds the shared group-0 layout: camera uniform plus per-draw
/// params, both dynamic-offset slices of the frame arena's primary ring.
#[must_use]
pub fn create_globals_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("globals.layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX
                    | wgpu::ShaderStages::FRAGMENT
                    | wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<CameraUniform>() as u64
                    ),
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<DrawParams>()
                        as u64),
                },
                count: None,
            },
        ],
    })
}

/// Builds the per-slot group-0 bind group over the slot's primary
/// device-local ring buffer.
#[must_use]
pub fn create_globals_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    ring_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("globals.bindGroup"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: ring_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<CameraUniform>() as u64),
                }),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: ring_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(DRAW_PARAMS_STRIDE),
                }),
            },
        ],
    })
}

/// One pre-built instanced mesh draw (imported voxel assets).
#[derive(Debug, Clone, Copy)]
pub struct InstancedDraw {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
    /// Dynamic draw-params offset carrying the world placement.
    pub draw_offset: u32,
}

/// The frame's assembled draw streams, shared by the geometry passes.
pub struct FrameDraws<'a> {
    pub chunk_vertex: Option<&'a wgpu::Buffer>,
    pub chunk_index: Option<&'a wgpu::Buffer>,
    /// Per-draw-range chunk instance stream.
    pub chunk_instances: Option<ArenaSlice>,
    /// Culled main-view indirect commands and their count.
    pub main_indirect: Option<(ArenaSlice, u32)>,
    /// Per-cascade caster indirect commands.
    pub shadow_indirect: [Option<(ArenaSlice, u32)>; SHADOW_CASCADE_COUNT],
    pub network_instances: Option<ArenaSlice>,
    /// Instance ranges for pipes, belts, tracks, cargoes.
    pub network_ranges: [std::ops::Range<u32>; 4],
    pub grass_buffer: Option<&'a wgpu::Buffer>,
    pub grass_instance_count: u32,
    pub instanced: &'a [InstancedDraw],
    /// Draw-params offset of the visible preview, if any.
    pub preview_draw_offset: Option<u32>,
    /// Per-cascade draw-params offsets (payload carries cascade index).
    pub cascade_draw_offsets: [u32; SHADOW_CASCADE_COUNT],
    pub multi_draw_indirect: bool,
}

/// Issues the chunk indirect draws, honoring the multi-draw fallback.
pub fn draw_chunks_indirect(
    pass: &mut wgpu::RenderPass,
    arena: &FrameArena,
    indirect: (ArenaSlice, u32),
    multi_draw_indirect: bool,
) {
    let (slice, count) = indirect;
    if count == 0 {
        return;
    }
    let buffer = arena.device_buffer(slice);
    if multi_draw_indirect {
        pass.multi_draw_indexed_indirect(buffer, slice.offset, count);
    } else {
        const COMMAND_STRIDE: u64 = 20;
        for draw in 0..u64::from(count) {
            pass.draw_indexed_indirect(buffer, slice.offset + draw * COMMAND_STRIDE);
        }
    }
}

/// Vertex layout of the packed voxel vertex stream.
#[must_use]
pub fn packed_voxel_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Uint32x2];
    wgpu::VertexBufferLayout {
        array_stride: 8,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// Instance layout carrying one chunk draw range's world offset + LOD.
#[must_use]
pub fn chunk_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x4];
    wgpu::VertexBufferLayout {
        array_stride: 16,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ATTRIBUTES,
    }
}

/// Instance layout of the network (pipes/belts/tracks/cargo) stream.
#[must_use]
pub fn network_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4];
    wgpu::VertexBufferLayout {
        array_stride: 32,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ATTRIBUTES,
    }
}

/// Instance layout of the grass billboard stream.
#[must_use]
pub fn grass_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4];
    wgpu::VertexBufferLayout {
        array_stride: 32,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ATTRIBUTES,
    }
}
