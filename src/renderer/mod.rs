//! Rendering System
//!
//! The renderer owns the full GPU pipeline: frame pacing against the
//! timeline, the per-frame upload arena, the chunk mesh cache and its
//! transfer path, the shadow/GI/SSAO/post pass roster, and the host
//! surface the application drives it through.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 Frame Orchestrator              │
//! │        (frame slots, pass sequencing)           │
//! ├───────────────────────────────────────────────┤
//! │  FrameGraph    │  Passes (shadow…tonemap)       │
//! ├───────────────────────────────────────────────┤
//! │  FrameArena    │  TimelineCoordinator           │
//! ├───────────────────────────────────────────────┤
//! │  GpuAllocator  │  GpuContext (device/surface)   │
//! └───────────────────────────────────────────────┘
//! ```

pub mod cascades;
pub mod core;
pub mod frame;
pub mod gi;
pub mod graph;
pub mod instances;
pub mod passes;
pub mod settings;
pub mod shaders;
pub mod sky;
pub mod targets;
pub mod uniforms;
pub mod upload;

use std::time::Instant;

use glam::Vec3;

use crate::camera::CameraPose;
use crate::errors::Result;
use crate::sim::SimulationFrame;
use crate::world::World;
use crate::world::mesher::{ChunkMeshData, MeshingMode};

use self::cascades::CascadeState;
use self::core::{
    BufferDesc, BufferHandle, FrameArena, GpuAllocator, GpuContext, GpuTimingInfo, GpuTimings,
    TimelineCoordinator,
};
use self::gi::{GiState, GiVolume};
use self::instances::VoxelPreview;
use self::passes::{
    bloom::BloomChain, exposure::ExposurePass, main_scene::MainScenePass, prepass::PrepassPass,
    shadow::ShadowPass, shafts::ShaftsPass, ssao::SsaoPass, tonemap::TonemapPass,
};
use self::settings::{FRAMES_IN_FLIGHT, RenderSettings, TuningSettings};
use self::shaders::ShaderSet;
use self::targets::FrameTargets;
use self::upload::{ChunkRenderData, MeshingStats};

/// Default voxel base-color palette (RGBA8, alpha unused): earthy tones
/// matching the default flat world.
pub const DEFAULT_VOXEL_PALETTE: [u32; 16] = [
    0x8a8a_8aff, 0x6f9e_44ff, 0x57b8_3cff, 0x8a6b_42ff,
    0x7d59_35ff, 0xb5a8_7cff, 0xd8cf_b0ff, 0x6e6e_78ff,
    0x5c5c_66ff, 0x9c4a_3aff, 0xc27d_4fff, 0x4a6e_8aff,
    0x3f5a_70ff, 0xd9d9_e0ff, 0x2e2e_34ff, 0xefe9_daff,
];

/// Everything the host hands the renderer for one frame.
pub struct FrameInput<'a> {
    pub camera: CameraPose,
    pub world: &'a World,
    pub simulation: SimulationFrame<'a>,
    pub preview: VoxelPreview,
}

/// One imported instanced mesh resident on the GPU.
pub(crate) struct InstancedMeshEntry {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
    pub world_offset: Vec3,
}

/// Internal renderer state, present only between `init` and `shutdown`.
pub(crate) struct RendererState {
    pub ctx: GpuContext,
    pub allocator: GpuAllocator,
    pub arena: FrameArena,
    pub timeline: TimelineCoordinator,
    pub timings: GpuTimings,
    pub targets: FrameTargets,

    pub globals_layout: wgpu::BindGroupLayout,
    pub globals_bind_groups: Vec<wgpu::BindGroup>,

    pub shadow_pass: ShadowPass,
    pub prepass: PrepassPass,
    pub ssao_pass: SsaoPass,
    pub main_pass: MainScenePass,
    pub bloom: BloomChain,
    pub exposure: ExposurePass,
    pub shafts: ShaftsPass,
    pub tonemap: TonemapPass,

    pub gi_volume: GiVolume,
    pub gi_state: GiState,
    pub cascades: CascadeState,
    pub chunks: ChunkRenderData,
    pub instanced_meshes: Vec<InstancedMeshEntry>,
    pub palette: [u32; 16],

    pub frame_slot: usize,
    pub frame_index: u64,
    pub slot_values: [u64; FRAMES_IN_FLIGHT],
    pub last_graphics_value: u64,
    pub last_stall_log: Option<Instant>,
    pub started: Instant,
    pub last_frame_time: Option<Instant>,
    pub frame_ewma_ms: f32,
}

/// The main renderer and its host-facing surface.
pub struct Renderer {
    settings: RenderSettings,
    tuning: TuningSettings,
    state: Option<RendererState>,
    size: (u32, u32),

    debug_ui_visible: bool,
    frame_stats_visible: bool,
    ui_frame_open: bool,
    camera_fov_degrees: f32,
    fov_initialized: bool,
}

impl Renderer {
    /// Stores configuration only; GPU resources arrive with
    /// [`init`](Self::init).
    #[must_use]
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            tuning: TuningSettings::default(),
            state: None,
            size: (0, 0),
            debug_ui_visible: false,
            frame_stats_visible: true,
            ui_frame_open: false,
            camera_fov_degrees: 70.0,
            fov_initialized: false,
        }
    }

    /// Initializes the GPU context, loads shaders, and builds every
    /// pipeline. Returns an error when the device, a shader module, or a
    /// pipeline cannot be created; the host must terminate in that case.
    pub async fn init<W>(&mut self, window: W, width: u32, height: u32) -> Result<()>
    where
        W: wgpu::WindowHandle + 'static,
    {
        if self.state.is_some() {
            return Ok(());
        }
        self.size = (width, height);

        let ctx = GpuContext::new(window, &self.settings, width, height).await?;
        let mut allocator = GpuAllocator::new(ctx.device.clone());
        let arena = FrameArena::new(ctx.device.clone());
        let timeline = TimelineCoordinator::new();
        let timings = GpuTimings::new(
            &ctx.device,
            &ctx.queue,
            ctx.features.timestamp_query,
            FRAMES_IN_FLIGHT,
            frame::TIMED_PASS_COUNT,
        );
        let shaders = ShaderSet::load(&ctx.device, &self.settings.shader_directory)?;

        let targets = FrameTargets::new(
            &ctx.device,
            &mut allocator,
            (width, height),
            self.settings.ao_resolution_scale,
        )
        .ok_or_else(|| crate::errors::RenderError::PipelineCreateFailed("frame targets".into()))?;

        let globals_layout = passes::create_globals_layout(&ctx.device);
        let globals_bind_groups = (0..FRAMES_IN_FLIGHT)
            .map(|slot| {
                passes::create_globals_bind_group(
                    &ctx.device,
                    &globals_layout,
                    arena.primary_device_buffer(slot),
                )
            })
            .collect();

        let shadow_pass = ShadowPass::new(&ctx.device, &shaders, &globals_layout, &self.tuning);
        let prepass = PrepassPass::new(&ctx.device, &shaders, &globals_layout);
        let ssao_pass = SsaoPass::new(&ctx.device, &shaders, &globals_layout);
        let main_pass = MainScenePass::new(&ctx.device, &shaders, &globals_layout);
        let mut bloom = BloomChain::new(&ctx.device, &shaders);
        let mut exposure = ExposurePass::new(&ctx.device, &shaders);
        let shafts = ShaftsPass::new(&ctx.device, &shaders);
        let tonemap = TonemapPass::new(
            &ctx.device,
            &shaders,
            &globals_layout,
            ctx.surface_format(),
        );

        bloom.rebuild_bind_groups(
            &ctx.device,
            &allocator,
            targets.hdr_resolve,
            targets.hdr_mip_count,
            &targets.linear_sampler,
        );
        exposure.rebuild_bind_groups(
            &ctx.device,
            &allocator,
            targets.hdr_resolve,
            targets.hdr_mip_count,
        );

        let shadow_atlas_view = allocator
            .image_view(targets.shadow_atlas)
            .ok_or_else(|| {
                crate::errors::RenderError::PipelineCreateFailed("shadow atlas view".into())
            })?
            .clone();
        let gi_volume = GiVolume::new(
            &ctx.device,
            &mut allocator,
            &shaders,
            &shadow_atlas_view,
            &targets.shadow_sampler,
        )
        .ok_or_else(|| crate::errors::RenderError::PipelineCreateFailed("gi volume".into()))?;

        self.state = Some(RendererState {
            ctx,
            allocator,
            arena,
            timeline,
            timings,
            targets,
            globals_layout,
            globals_bind_groups,
            shadow_pass,
            prepass,
            ssao_pass,
            main_pass,
            bloom,
            exposure,
            shafts,
            tonemap,
            gi_volume,
            gi_state: GiState::new(),
            cascades: CascadeState::new(),
            chunks: ChunkRenderData::new(),
            instanced_meshes: Vec::new(),
            palette: DEFAULT_VOXEL_PALETTE,
            frame_slot: 0,
            frame_index: 0,
            slot_values: [0; FRAMES_IN_FLIGHT],
            last_graphics_value: 0,
            last_stall_log: None,
            started: Instant::now(),
            last_frame_time: None,
            frame_ewma_ms: 0.0,
        });

        log::info!("renderer initialized ({width}x{height})");
        Ok(())
    }

    /// New framebuffer size from the window adapter.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        if width == 0 || height == 0 {
            return;
        }
        let ao_scale = self.settings.ao_resolution_scale;
        if let Some(state) = &mut self.state {
            state.ctx.resize(width, height);
            if state
                .targets
                .rebuild_sized(&state.ctx.device, &mut state.allocator, (width, height), ao_scale)
                .is_none()
            {
                log::error!("frame target rebuild failed at {width}x{height}");
                return;
            }
            state.arena.trim_alias_pool(&mut state.allocator);
            state.bloom.rebuild_bind_groups(
                &state.ctx.device,
                &state.allocator,
                state.targets.hdr_resolve,
                state.targets.hdr_mip_count,
                &state.targets.linear_sampler,
            );
            state.exposure.rebuild_bind_groups(
                &state.ctx.device,
                &state.allocator,
                state.targets.hdr_resolve,
                state.targets.hdr_mip_count,
            );
        }
    }

    /// Prepares the overlay state machine for a new UI frame.
    pub fn begin_ui_frame(&mut self) {
        self.ui_frame_open = true;
    }

    /// Whether a UI frame is open (between `begin_ui_frame` and the next
    /// `render_frame`); the overlay collaborator may only record then.
    #[must_use]
    pub fn is_ui_frame_open(&self) -> bool {
        self.ui_frame_open
    }

    /// Renders one frame. Returns `false` only on fatal device loss;
    /// every other failure logs, skips work, and lets the next iteration
    /// try again.
    pub fn render_frame(&mut self, input: &FrameInput) -> bool {
        // Degenerate framebuffer: nothing to present, nothing submitted.
        if self.size.0 == 0 || self.size.1 == 0 {
            return true;
        }
        let clear_color = self.settings.clear_color;
        let fov = self.effective_fov(input.camera.fov_degrees);
        self.ui_frame_open = false;
        let Some(state) = &mut self.state else {
            return false;
        };
        state.render_frame(input, &self.tuning, fov, clear_color)
    }

    fn effective_fov(&mut self, camera_fov: f32) -> f32 {
        if !self.fov_initialized {
            self.camera_fov_degrees = camera_fov;
            self.fov_initialized = true;
        }
        self.camera_fov_degrees = self.camera_fov_degrees.clamp(20.0, 120.0);
        self.camera_fov_degrees
    }

    /// Releases every GPU resource. Blocks until in-flight work
    /// completes so deferred releases can run.
    pub fn shutdown(&mut self) {
        if let Some(mut state) = self.state.take() {
            let _ = state.ctx.device.poll(wgpu::PollType::wait_indefinitely());
            state
                .timeline
                .collect_completed_releases(&state.ctx.device, &mut state.allocator);
            log::info!(
                "renderer shutdown (resident buffers={}, images={})",
                state.allocator.resident_buffer_count(),
                state.allocator.resident_image_count()
            );
        }
    }

    // ── Chunk mesh maintenance ─────────────────────────────────────────────

    /// Requests a full remesh and upload of every chunk.
    pub fn update_chunk_meshes(&mut self) -> bool {
        let Some(state) = &mut self.state else {
            return false;
        };
        state.chunks.request_full_rebuild();
        state.gi_state.world_dirty = true;
        true
    }

    /// Requests an incremental remesh of one chunk.
    pub fn update_chunk_mesh(&mut self, chunk_index: usize, chunk_count: usize) -> bool {
        let Some(state) = &mut self.state else {
            return false;
        };
        if !state.chunks.request_remesh(chunk_index, chunk_count) {
            return false;
        }
        state.gi_state.world_dirty = true;
        true
    }

    /// Switches between naive and greedy meshing (invalidates the cache).
    pub fn set_meshing_mode(&mut self, mode: MeshingMode) {
        if let Some(state) = &mut self.state {
            state.chunks.set_meshing_mode(mode);
        }
    }

    #[must_use]
    pub fn meshing_stats(&self) -> MeshingStats {
        self.state
            .as_ref()
            .map(|state| state.chunks.stats)
            .unwrap_or_default()
    }

    /// Current-slot arena counters for the stats overlay.
    #[must_use]
    pub fn arena_active_stats(&self) -> self::core::arena::ActiveStats {
        self.state
            .as_ref()
            .map(|state| state.arena.active_stats(state.frame_slot))
            .unwrap_or_default()
    }

    /// Pool-wide arena counters (alias reuses, pooled images).
    #[must_use]
    pub fn arena_resident_stats(&self) -> self::core::arena::ResidentStats {
        self.state
            .as_ref()
            .map(|state| state.arena.resident_stats())
            .unwrap_or_default()
    }

    // ── Imported instanced meshes ──────────────────────────────────────────

    /// Uploads a pre-built instanced mesh (imported voxel asset) placed
    /// at a world offset.
    pub fn upload_instanced_mesh(&mut self, mesh: &ChunkMeshData, world_offset: Vec3) -> bool {
        let Some(state) = &mut self.state else {
            return false;
        };
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return false;
        }
        let Some(vertex_buffer) = state.allocator.create_buffer(&BufferDesc {
            label: "mesh.instanced.vertex",
            size: std::mem::size_of_val(mesh.vertices.as_slice()) as u64,
            usage: wgpu::BufferUsages::VERTEX,
            initial_data: Some(bytemuck::cast_slice(&mesh.vertices)),
        }) else {
            log::error!("instanced mesh vertex buffer allocation failed");
            return false;
        };
        let Some(index_buffer) = state.allocator.create_buffer(&BufferDesc {
            label: "mesh.instanced.index",
            size: std::mem::size_of_val(mesh.indices.as_slice()) as u64,
            usage: wgpu::BufferUsages::INDEX,
            initial_data: Some(bytemuck::cast_slice(&mesh.indices)),
        }) else {
            log::error!("instanced mesh index buffer allocation failed");
            state.allocator.destroy_buffer(vertex_buffer);
            return false;
        };
        state.instanced_meshes.push(InstancedMeshEntry {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            world_offset,
        });
        true
    }

    /// Releases every imported instanced mesh through the timeline.
    pub fn clear_instanced_meshes(&mut self) {
        if let Some(state) = &mut self.state {
            let release_value = state.last_graphics_value;
            for entry in state.instanced_meshes.drain(..) {
                state
                    .timeline
                    .schedule_buffer_release(entry.vertex_buffer, release_value);
                state
                    .timeline
                    .schedule_buffer_release(entry.index_buffer, release_value);
            }
        }
    }

    /// Sets the base-color palette occupancy albedo comes from.
    pub fn set_voxel_base_color_palette(&mut self, palette: [u32; 16]) {
        if let Some(state) = &mut self.state {
            state.palette = palette;
            state.gi_state.world_dirty = true;
        }
    }

    // ── Debug surface ──────────────────────────────────────────────────────

    #[must_use]
    pub fn frame_index(&self) -> u32 {
        self.state
            .as_ref()
            .map_or(0, |state| state.frame_index as u32)
    }

    #[must_use]
    pub fn gpu_timings(&self) -> GpuTimingInfo {
        self.state.as_ref().map_or(
            GpuTimingInfo {
                pass_ms: Vec::new(),
                supported: false,
            },
            |state| state.timings.info(),
        )
    }

    pub fn set_debug_ui_visible(&mut self, visible: bool) {
        self.debug_ui_visible = visible;
    }

    #[must_use]
    pub fn is_debug_ui_visible(&self) -> bool {
        self.debug_ui_visible
    }

    pub fn set_frame_stats_visible(&mut self, visible: bool) {
        self.frame_stats_visible = visible;
    }

    #[must_use]
    pub fn is_frame_stats_visible(&self) -> bool {
        self.frame_stats_visible
    }

    /// Sun orientation: azimuth (yaw) and elevation (pitch), degrees.
    pub fn set_sun_angles(&mut self, azimuth_degrees: f32, elevation_degrees: f32) {
        self.tuning.sun_yaw_degrees = azimuth_degrees;
        self.tuning.sun_pitch_degrees = elevation_degrees;
    }

    #[must_use]
    pub fn camera_fov_degrees(&self) -> f32 {
        self.camera_fov_degrees
    }

    pub fn set_camera_fov_degrees(&mut self, fov_degrees: f32) {
        self.camera_fov_degrees = fov_degrees.clamp(20.0, 120.0);
        self.fov_initialized = true;
    }

    #[must_use]
    pub fn tuning(&self) -> &TuningSettings {
        &self.tuning
    }

    pub fn tuning_mut(&mut self) -> &mut TuningSettings {
        &mut self.tuning
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
