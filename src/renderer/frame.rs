//! Frame Orchestrator
//!
//! Runs the nine-step frame sequence: poll the timeline and gate the
//! frame slot, reset the arena, run any deferred chunk upload, acquire
//! the surface, build the camera uniform and instance streams, record
//! the pass roster in the frame graph's prescribed order, submit, and
//! present. Every non-fatal failure logs and returns so the next
//! iteration can try again; only device loss is terminal.

use std::time::Instant;

use bytemuck::Zeroable;
use glam::{Vec3, Vec4};

use super::RendererState;
use super::cascades::{SHADOW_ATLAS_RECTS, SHADOW_ATLAS_SIZE, SHADOW_CASCADE_COUNT};
use super::core::{ArenaSlice, FrameArena, UploadKind};
use super::gi::{GI_CELL_SIZE, GI_GRID_RESOLUTION, GiLightingState, pack_occupancy};
use super::graph::{FrameGraph, PassDesc, PassId, QueueAffinity};
use super::instances::{
    ChunkDrawInstance, DrawIndexedIndirect, Frustum, build_network_instances, chunk_aabb,
};
use super::passes::{FrameCtx, FrameDraws, InstancedDraw};
use super::settings::{
    TIMELINE_STALL_WARN_COOLDOWN_SECONDS, TIMELINE_STALL_WARN_LAG, TuningSettings,
};
use super::sky;
use super::uniforms::{CameraUniform, DRAW_PARAMS_STRIDE, DrawParams};
use super::upload::TransferState;
use crate::camera;
use crate::renderer::FrameInput;
use crate::world::mesher::CHUNK_MESH_LOD_COUNT;

/// Timed pass indices into the GPU timestamp query sets.
pub const TIMED_PASS_SHADOW: usize = 0;
pub const TIMED_PASS_GI: usize = 1;
pub const TIMED_PASS_PREPASS: usize = 2;
pub const TIMED_PASS_SSAO: usize = 3;
pub const TIMED_PASS_SSAO_BLUR: usize = 4;
pub const TIMED_PASS_MAIN: usize = 5;
pub const TIMED_PASS_POST: usize = 6;
pub const TIMED_PASS_AUTO_EXPOSURE: usize = 7;
pub const TIMED_PASS_SUN_SHAFTS: usize = 8;
pub const TIMED_PASS_TONEMAP: usize = 9;
pub const TIMED_PASS_COUNT: usize = 10;

const CAMERA_NEAR: f32 = 0.1;
const CAMERA_FAR: f32 = 600.0;

/// Caster culling margin around each cascade's clip volume.
const SHADOW_CULL_MARGIN: f32 = 16.0;

/// Distance thresholds selecting the chunk LOD.
const LOD_DISTANCES: [f32; CHUNK_MESH_LOD_COUNT - 1] = [64.0, 128.0, 256.0];

fn lod_for_distance(distance: f32) -> usize {
    LOD_DISTANCES
        .iter()
        .position(|&threshold| distance < threshold)
        .unwrap_or(CHUNK_MESH_LOD_COUNT - 1)
}

/// Records the fixed pass DAG for one frame and validates it.
fn build_frame_graph() -> FrameGraph {
    let mut graph = FrameGraph::new();
    let add = |graph: &mut FrameGraph, name, queue| graph.add_pass(PassDesc { name, queue });

    let shadow = add(&mut graph, "shadow", QueueAffinity::Graphics);
    let gi_surface = add(&mut graph, "gi_surface", QueueAffinity::Compute);
    let gi_inject = add(&mut graph, "gi_inject", QueueAffinity::Compute);
    let gi_propagate = add(&mut graph, "gi_propagate", QueueAffinity::Compute);
    let auto_exposure = add(&mut graph, "auto_exposure", QueueAffinity::Compute);
    let sun_shafts = add(&mut graph, "sun_shafts", QueueAffinity::Compute);
    let prepass = add(&mut graph, "prepass", QueueAffinity::Graphics);
    let ssao = add(&mut graph, "ssao", QueueAffinity::Graphics);
    let ssao_blur = add(&mut graph, "ssao_blur", QueueAffinity::Graphics);
    let main = add(&mut graph, "main", QueueAffinity::Graphics);
    let post = add(&mut graph, "post", QueueAffinity::Graphics);
    let overlay = add(&mut graph, "overlay", QueueAffinity::Graphics);
    let present = add(&mut graph, "present", QueueAffinity::Graphics);

    graph.add_dependency(shadow, prepass);
    graph.add_dependency(gi_surface, gi_inject);
    graph.add_dependency(gi_inject, gi_propagate);
    graph.add_dependency(gi_propagate, main);
    graph.add_dependency(auto_exposure, post);
    graph.add_dependency(sun_shafts, post);
    graph.add_dependency(prepass, ssao);
    graph.add_dependency(ssao, ssao_blur);
    graph.add_dependency(ssao_blur, main);
    graph.add_dependency(main, post);
    graph.add_dependency(post, overlay);
    graph.add_dependency(overlay, present);

    graph
}

/// The prescribed recording order, asserted against the graph's edges:
/// shadow, GI chain, prepass, SSAO, main (whose post-resolve block owns
/// the bloom mip chain), auto-exposure, sun shafts, post, overlay,
/// present.
const PRESCRIBED_ORDER: [usize; 13] = [0, 1, 2, 3, 6, 7, 8, 9, 4, 5, 10, 11, 12];

impl RendererState {
    pub(crate) fn render_frame(
        &mut self,
        input: &FrameInput,
        tuning: &TuningSettings,
        fov_degrees: f32,
        clear_color: wgpu::Color,
    ) -> bool {
        // ── 0. Frame pacing stats ─────────────────────────────────────
        let now = Instant::now();
        if let Some(last) = self.last_frame_time {
            let ms = last.elapsed().as_secs_f32() * 1000.0;
            self.frame_ewma_ms += 0.05 * (ms - self.frame_ewma_ms);
        }
        self.last_frame_time = Some(now);

        // ── 1. Frame graph scaffold: recorded, validated, labeling ────
        let graph = build_frame_graph();
        match graph.validate() {
            Ok(_) => {
                let order: Vec<PassId> = PRESCRIBED_ORDER.iter().map(|&i| PassId(i)).collect();
                debug_assert!(graph.order_satisfies_edges(&order));
            }
            Err(err) => {
                log::error!("frame graph validation failed: {err:?}");
                return true;
            }
        }

        // ── 2. Timeline gate on the frame slot ────────────────────────
        self.timeline
            .collect_completed_releases(&self.ctx.device, &mut self.allocator);
        let slot = self.frame_slot;
        if !self.timeline.signaled(self.slot_values[slot]) {
            let completed = self.timeline.completion_token().completed_value();
            let target = self.slot_values[slot];
            let lag = target.saturating_sub(completed);
            let should_log = lag >= TIMELINE_STALL_WARN_LAG
                && self.last_stall_log.is_none_or(|last| {
                    last.elapsed().as_secs_f64() >= TIMELINE_STALL_WARN_COOLDOWN_SECONDS
                });
            if should_log {
                log::warn!(
                    "frame slot stalled on timeline value {target}, completed={completed}, lag={lag}, frameIndex={slot}"
                );
                self.last_stall_log = Some(now);
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
            return true;
        }
        self.timings.read_completed(slot);
        self.chunks.poll_transfer(&self.timeline);
        self.arena.begin_frame(slot, &mut self.allocator);

        // ── 3. Deferred chunk remesh/upload ───────────────────────────
        if self.chunks.has_pending_work() && self.chunks.transfer == TransferState::Idle {
            let remesh: Vec<usize> = if self.chunks.rebuild_requested {
                Vec::new()
            } else {
                self.chunks.pending_remesh.clone()
            };
            if self.chunks.create_chunk_buffers(
                &self.ctx.queue,
                &mut self.allocator,
                &mut self.arena,
                slot,
                &mut self.timeline,
                &self.ctx.device,
                input.world.chunk_grid(),
                &remesh,
                self.last_graphics_value,
            ) {
                self.chunks.rebuild_requested = false;
                self.chunks.pending_remesh.clear();
            } else if input.world.chunk_grid().chunks().is_empty() {
                // Nothing to upload; drop the request instead of retrying.
                self.chunks.rebuild_requested = false;
                self.chunks.pending_remesh.clear();
            }
        }

        // ── 4. Acquire the swapchain image ────────────────────────────
        let surface_texture = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(texture)
            | wgpu::CurrentSurfaceTexture::Suboptimal(texture) => texture,
            wgpu::CurrentSurfaceTexture::Outdated | wgpu::CurrentSurfaceTexture::Lost => {
                log::info!("surface out of date during acquire, reconfiguring");
                self.ctx.reconfigure();
                return true;
            }
            wgpu::CurrentSurfaceTexture::Timeout => {
                std::thread::sleep(std::time::Duration::from_millis(1));
                return true;
            }
            wgpu::CurrentSurfaceTexture::Occluded | wgpu::CurrentSurfaceTexture::Validation => {
                log::error!("surface acquire failed");
                return true;
            }
        };
        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // ── 5. Camera, sun, cascades, GI bookkeeping ──────────────────
        let eye = input.camera.position;
        let (width, height) = self.targets.extent;
        let aspect = width as f32 / height as f32;
        let fov_y = fov_degrees.to_radians();
        let view = camera::view_matrix(&input.camera);
        let proj = camera::perspective_reverse_z(fov_y, aspect, CAMERA_NEAR, CAMERA_FAR);
        let mvp = proj * view;

        let sun_direction = sky::sun_direction(tuning.sun_yaw_degrees, tuning.sun_pitch_degrees);
        let night = sky::is_night(sun_direction);
        let sun_color = sky::sun_color(sun_direction);
        let sh = sky::sh_irradiance(sun_direction, sun_color);

        let cascade_frame =
            self.cascades
                .update(eye, sun_direction, CAMERA_NEAR, CAMERA_FAR, fov_y, aspect);

        let (gi_origin, gi_moved) = self.gi_state.update_origin(eye);
        let gi_lighting = GiLightingState {
            sun_direction,
            sun_color,
            sh_irradiance: sh,
            gi_strength: tuning.gi_strength,
            ambient_rebalance: tuning.gi_ambient_rebalance,
        };
        let gi_flags = self.gi_state.evaluate(&gi_lighting, gi_moved);

        let gi_occupancy_slice = if gi_flags.needs_occupancy_upload {
            let packed = pack_occupancy(input.world.chunk_grid(), gi_origin, &self.palette);
            let slice = self
                .arena
                .allocate_upload(slot, &packed, 256, UploadKind::Unknown);
            if slice.is_none() {
                log::warn!("gi occupancy upload slice allocation failed, skipping gi update");
            }
            slice
        } else {
            None
        };
        self.gi_volume.write_uniform(
            &self.ctx.queue,
            gi_origin,
            cascade_frame.cascades[SHADOW_CASCADE_COUNT - 1].view_proj,
            sun_direction,
            sun_color,
            &sh,
        );

        // ── 6. Camera uniform + per-draw params ───────────────────────
        let time_seconds = self.started.elapsed().as_secs_f32();
        let mut uniform = CameraUniform::zeroed();
        uniform.mvp = mvp;
        uniform.view = view;
        uniform.proj = proj;
        for cascade in 0..SHADOW_CASCADE_COUNT {
            uniform.light_view_proj[cascade] = cascade_frame.cascades[cascade].view_proj;
            let rect = SHADOW_ATLAS_RECTS[cascade];
            uniform.shadow_atlas_uv_rects[cascade] = Vec4::new(
                rect.x as f32 / SHADOW_ATLAS_SIZE as f32,
                rect.y as f32 / SHADOW_ATLAS_SIZE as f32,
                rect.size as f32 / SHADOW_ATLAS_SIZE as f32,
                rect.size as f32 / SHADOW_ATLAS_SIZE as f32,
            );
        }
        uniform.shadow_cascade_splits = Vec4::from_array(cascade_frame.splits);
        uniform.sun_direction_intensity =
            sun_direction.extend(if night { 0.0 } else { 2.2 });
        uniform.sun_color_shadow = sun_color.extend(1.0);
        for (slot_sh, coefficient) in uniform.sh_irradiance.iter_mut().zip(sh.iter()) {
            *slot_sh = coefficient.extend(0.0);
        }
        uniform.shadow_config0 = Vec4::new(
            tuning.receiver_normal_offset_near,
            tuning.receiver_normal_offset_far,
            tuning.receiver_base_bias_near_texel,
            tuning.receiver_base_bias_far_texel,
        );
        uniform.shadow_config1 = Vec4::new(
            tuning.receiver_slope_bias_near_texel,
            tuning.receiver_slope_bias_far_texel,
            tuning.cascade_blend_min,
            tuning.cascade_blend_factor,
        );
        uniform.shadow_config2 = Vec4::new(
            tuning.ssao_radius,
            tuning.ssao_strength,
            1.0 / self.targets.ao_extent.0 as f32,
            1.0 / self.targets.ao_extent.1 as f32,
        );
        uniform.gi_grid_origin_cell = gi_origin.extend(GI_CELL_SIZE);
        let gi_span = GI_GRID_RESOLUTION as f32 * GI_CELL_SIZE;
        uniform.gi_grid_extent_strength =
            Vec3::new(gi_span, gi_span, gi_span).extend(tuning.gi_strength);
        uniform.gi_params = Vec4::new(
            super::gi::GI_INJECT_SUN_SCALE,
            super::gi::GI_INJECT_SH_SCALE,
            tuning.gi_ambient_rebalance,
            tuning.gi_ambient_floor,
        );
        uniform.debug_flags = [
            tuning.gi_debug_mode.min(4),
            u32::from(tuning.ssao_enabled),
            u32::from(tuning.grass_enabled),
            0,
        ];
        uniform.bloom_config = Vec4::new(
            tuning.bloom_threshold.clamp(0.0, 16.0),
            tuning.bloom_soft_knee.clamp(0.0, 1.0),
            tuning.bloom_base_intensity.clamp(0.0, 2.0),
            tuning.bloom_sun_facing_boost.clamp(0.0, 2.0),
        );
        uniform.exposure_config =
            Vec4::new(tuning.exposure_compensation, time_seconds, 0.0, 0.0);
        uniform.camera_position_fov = eye.extend(fov_y);
        uniform.viewport = Vec4::new(
            width as f32,
            height as f32,
            1.0 / width as f32,
            1.0 / height as f32,
        );

        let Some(camera_slice) = self.arena.allocate_upload(
            slot,
            bytemuck::bytes_of(&uniform),
            256,
            UploadKind::CameraUniform,
        ) else {
            log::error!("failed to allocate camera uniform slice");
            return true;
        };

        let push_draw_params = |arena: &mut FrameArena, params: DrawParams, kind: UploadKind| {
            arena
                .allocate_upload(slot, bytemuck::bytes_of(&params), DRAW_PARAMS_STRIDE, kind)
                .map(|slice| slice.offset as u32)
        };

        let Some(default_draw_offset) = push_draw_params(
            &mut self.arena,
            DrawParams {
                offset: Vec4::ZERO,
                payload: Vec4::ZERO,
            },
            UploadKind::Unknown,
        ) else {
            log::error!("failed to allocate default draw params");
            return true;
        };

        let mut cascade_draw_offsets = [default_draw_offset; SHADOW_CASCADE_COUNT];
        for cascade in 0..SHADOW_CASCADE_COUNT {
            if let Some(offset) = push_draw_params(
                &mut self.arena,
                DrawParams {
                    offset: Vec4::ZERO,
                    payload: Vec4::new(cascade as f32, 0.0, 0.0, 0.0),
                },
                UploadKind::Unknown,
            ) {
                cascade_draw_offsets[cascade] = offset;
            }
        }

        let preview_draw_offset = if input.preview.visible {
            push_draw_params(
                &mut self.arena,
                DrawParams {
                    offset: Vec4::new(
                        input.preview.world_x as f32,
                        input.preview.world_y as f32,
                        input.preview.world_z as f32,
                        input.preview.brush_size.max(1) as f32,
                    ),
                    payload: Vec4::new(
                        f32::from(u8::from(input.preview.removing)),
                        (time_seconds * 4.0).sin() * 0.5 + 0.5,
                        input.preview.face_id as f32,
                        f32::from(u8::from(input.preview.face_visible)),
                    ),
                },
                UploadKind::PreviewData,
            )
        } else {
            None
        };

        let mut instanced_draws = Vec::with_capacity(self.instanced_meshes.len());
        for entry in &self.instanced_meshes {
            if let Some(offset) = push_draw_params(
                &mut self.arena,
                DrawParams {
                    offset: entry.world_offset.extend(1.0),
                    payload: Vec4::ZERO,
                },
                UploadKind::InstanceData,
            ) {
                instanced_draws.push(InstancedDraw {
                    vertex_buffer: entry.vertex_buffer,
                    index_buffer: entry.index_buffer,
                    index_count: entry.index_count,
                    draw_offset: offset,
                });
            }
        }

        // ── 7. Instance streams + culled indirect draw lists ──────────
        let chunks = input.world.chunk_grid().chunks();
        let main_frustum = Frustum::from_view_proj(mvp);

        let mut chunk_instances: Vec<ChunkDrawInstance> = Vec::new();
        let mut main_commands: Vec<DrawIndexedIndirect> = Vec::new();
        let mut cascade_commands: [Vec<DrawIndexedIndirect>; SHADOW_CASCADE_COUNT] =
            std::array::from_fn(|_| Vec::new());
        let cascade_frustums: [Frustum; SHADOW_CASCADE_COUNT] = std::array::from_fn(|cascade| {
            Frustum::for_shadow_casters(cascade_frame.cascades[cascade].view_proj)
        });

        if !self.chunks.draw_ranges.is_empty() {
            for (chunk_index, chunk) in chunks.iter().enumerate() {
                let (min, max) = chunk_aabb(chunk);
                let center = (min + max) * 0.5;
                let lod = lod_for_distance((center - eye).length());
                let range_index = chunk_index * CHUNK_MESH_LOD_COUNT + lod;
                let Some(range) = self.chunks.draw_ranges.get(range_index) else {
                    continue;
                };
                if range.index_count == 0 {
                    continue;
                }

                let instance_index = chunk_instances.len() as u32;
                chunk_instances.push(ChunkDrawInstance {
                    offset_lod: [
                        range.world_offset.x,
                        range.world_offset.y,
                        range.world_offset.z,
                        lod as f32,
                    ],
                });
                let command = DrawIndexedIndirect {
                    index_count: range.index_count,
                    instance_count: 1,
                    first_index: range.first_index,
                    base_vertex: range.vertex_offset,
                    first_instance: instance_index,
                };

                if main_frustum.intersects_aabb(min, max, 0.0) {
                    main_commands.push(command);
                }
                for cascade in 0..SHADOW_CASCADE_COUNT {
                    if cascade_frustums[cascade].intersects_aabb(min, max, SHADOW_CULL_MARGIN) {
                        cascade_commands[cascade].push(command);
                    }
                }
            }
        }

        let upload_pod = |arena: &mut FrameArena,
                          bytes: &[u8],
                          kind: UploadKind|
         -> Option<ArenaSlice> {
            if bytes.is_empty() {
                None
            } else {
                arena.allocate_upload(slot, bytes, 4, kind)
            }
        };

        let chunk_instance_slice = upload_pod(
            &mut self.arena,
            bytemuck::cast_slice(&chunk_instances),
            UploadKind::InstanceData,
        );
        let main_indirect = upload_pod(
            &mut self.arena,
            bytemuck::cast_slice(&main_commands),
            UploadKind::Unknown,
        )
        .map(|slice| (slice, main_commands.len() as u32));
        let shadow_indirect: [Option<(ArenaSlice, u32)>; SHADOW_CASCADE_COUNT] =
            std::array::from_fn(|cascade| {
                upload_pod(
                    &mut self.arena,
                    bytemuck::cast_slice(&cascade_commands[cascade]),
                    UploadKind::Unknown,
                )
                .map(|slice| (slice, cascade_commands[cascade].len() as u32))
            });

        let mut network_instances = Vec::new();
        let network_ranges = build_network_instances(&input.simulation, &mut network_instances);
        let network_slice = upload_pod(
            &mut self.arena,
            bytemuck::cast_slice(&network_instances),
            UploadKind::InstanceData,
        );

        // ── 8. Transient targets + per-frame bind groups ──────────────
        let ssao_raw = self.arena.acquire_transient_image(
            slot,
            &mut self.allocator,
            &self.targets.ssao_raw_desc(),
        );
        let ssao_blur = self.arena.acquire_transient_image(
            slot,
            &mut self.allocator,
            &self.targets.ssao_blur_desc(),
        );
        let shaft_extent = {
            let desc = self.targets.shaft_desc();
            (desc.width, desc.height)
        };
        let shaft_image = self.arena.acquire_transient_image(
            slot,
            &mut self.allocator,
            &self.targets.shaft_desc(),
        );
        let (Some(ssao_raw), Some(ssao_blur), Some(shaft_image)) =
            (ssao_raw, ssao_blur, shaft_image)
        else {
            log::error!("transient target acquisition failed, skipping frame");
            return true;
        };

        self.exposure
            .write_params(&self.ctx.queue, self.targets.extent, self.targets.hdr_mip_count);
        let run_shafts = !night;
        if run_shafts {
            self.shafts.write_params(
                &self.ctx.queue,
                mvp,
                cascade_frame.cascades[SHADOW_CASCADE_COUNT - 1].view_proj,
                sun_direction,
                tuning.bloom_sun_facing_boost,
                eye,
                shaft_extent,
            );
        }

        let device = &self.ctx.device;
        let shadow_atlas_view = self
            .allocator
            .image_view(self.targets.shadow_atlas)
            .cloned();
        let normal_depth_view = self.allocator.image_view(self.targets.normal_depth).cloned();
        let ao_depth_view = self.allocator.image_view(self.targets.ao_depth).cloned();
        let msaa_view = self.allocator.image_view(self.targets.msaa_color).cloned();
        let depth_view = self.allocator.image_view(self.targets.depth).cloned();
        let hdr_mip0_view = self
            .allocator
            .image_mip_view(self.targets.hdr_resolve, 0)
            .cloned();
        let hdr_full_view = self.allocator.image_view(self.targets.hdr_resolve).cloned();
        let ssao_raw_view = self.allocator.image_view(ssao_raw).cloned();
        let ssao_blur_view = self.allocator.image_view(ssao_blur).cloned();
        let shaft_view = self.allocator.image_view(shaft_image).cloned();
        let gi_radiance_view = self
            .allocator
            .image_view(self.gi_volume.sampled_radiance())
            .cloned();
        let (
            Some(shadow_atlas_view),
            Some(normal_depth_view),
            Some(ao_depth_view),
            Some(msaa_view),
            Some(depth_view),
            Some(hdr_mip0_view),
            Some(hdr_full_view),
            Some(ssao_raw_view),
            Some(ssao_blur_view),
            Some(shaft_view),
            Some(gi_radiance_view),
        ) = (
            shadow_atlas_view,
            normal_depth_view,
            ao_depth_view,
            msaa_view,
            depth_view,
            hdr_mip0_view,
            hdr_full_view,
            ssao_raw_view,
            ssao_blur_view,
            shaft_view,
            gi_radiance_view,
        )
        else {
            log::error!("frame target view resolution failed, skipping frame");
            return true;
        };

        let ssao_input = self.ssao_pass.create_input_bind_group(
            device,
            &normal_depth_view,
            &self.targets.linear_sampler,
            "ssao.input.normalDepth",
        );
        let ssao_blur_input = self.ssao_pass.create_input_bind_group(
            device,
            &ssao_raw_view,
            &self.targets.linear_sampler,
            "ssao.input.raw",
        );
        let scene_bind_group = self.main_pass.create_scene_bind_group(
            device,
            &shadow_atlas_view,
            &self.targets.shadow_sampler,
            &gi_radiance_view,
            self.gi_volume.sampler(),
            &ssao_blur_view,
            &self.targets.linear_sampler,
        );
        let shaft_bind_group = run_shafts.then(|| {
            self.shafts.create_bind_group(
                device,
                &shadow_atlas_view,
                &self.targets.shadow_sampler,
                &shaft_view,
            )
        });
        let tonemap_bind_group = self.tonemap.create_bind_group(
            device,
            &hdr_full_view,
            &ssao_blur_view,
            &shaft_view,
            &self.targets.linear_mip_sampler,
            self.exposure.state_buffer(),
        );

        // ── 9. Record the frame in the prescribed order ───────────────
        self.arena.finish_uploads(slot);

        let ctx = FrameCtx {
            device,
            allocator: &self.allocator,
            arena: &self.arena,
            globals_bind_group: &self.globals_bind_groups[slot],
            camera_offset: camera_slice.offset as u32,
            default_draw_offset,
        };
        let draws = FrameDraws {
            chunk_vertex: self
                .chunks
                .vertex_buffer
                .and_then(|handle| self.allocator.buffer(handle)),
            chunk_index: self
                .chunks
                .index_buffer
                .and_then(|handle| self.allocator.buffer(handle)),
            chunk_instances: chunk_instance_slice,
            main_indirect,
            shadow_indirect,
            network_instances: network_slice,
            network_ranges,
            grass_buffer: if tuning.grass_enabled {
                self.chunks
                    .grass_buffer
                    .and_then(|handle| self.allocator.buffer(handle))
            } else {
                None
            },
            grass_instance_count: self.chunks.grass_instance_count,
            instanced: &instanced_draws,
            preview_draw_offset,
            cascade_draw_offsets,
            multi_draw_indirect: self.ctx.features.multi_draw_indirect,
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame.graphics"),
        });
        self.arena.encode_ring_copies(slot, &mut encoder);

        // shadow
        self.shadow_pass.record(
            &ctx,
            &mut encoder,
            &shadow_atlas_view,
            &draws,
            self.timings.render_pass_writes(slot, TIMED_PASS_SHADOW),
        );

        // gi_surface → gi_inject → gi_propagate (or retained volume)
        if gi_flags.needs_compute_update {
            if let Some(slice) = gi_occupancy_slice {
                self.gi_volume.encode_occupancy_upload(
                    &mut encoder,
                    &self.allocator,
                    self.arena.staging_buffer(slice),
                    slice.offset,
                );
            }
            self.gi_volume.record_update(
                &mut encoder,
                self.timings.compute_pass_writes(slot, TIMED_PASS_GI),
            );
        }

        // prepass → ssao → ssao_blur
        self.prepass.record(
            &ctx,
            &mut encoder,
            &normal_depth_view,
            &ao_depth_view,
            &draws,
            self.timings.render_pass_writes(slot, TIMED_PASS_PREPASS),
        );
        if tuning.ssao_enabled {
            self.ssao_pass.record_raw(
                &ctx,
                &mut encoder,
                &ssao_input,
                &ssao_raw_view,
                self.timings.render_pass_writes(slot, TIMED_PASS_SSAO),
            );
            self.ssao_pass.record_blur(
                &ctx,
                &mut encoder,
                &ssao_blur_input,
                &ssao_blur_view,
                self.timings.render_pass_writes(slot, TIMED_PASS_SSAO_BLUR),
            );
        }

        // main
        self.main_pass.record(
            &ctx,
            &mut encoder,
            &msaa_view,
            &hdr_mip0_view,
            &depth_view,
            &scene_bind_group,
            clear_color,
            &draws,
            self.timings.render_pass_writes(slot, TIMED_PASS_MAIN),
        );

        // post: bloom mip chain
        self.bloom.record(
            &ctx,
            &mut encoder,
            &self.allocator,
            self.targets.hdr_resolve,
            self.timings.render_pass_begin_writes(slot, TIMED_PASS_POST),
            self.timings.render_pass_end_writes(slot, TIMED_PASS_POST),
        );

        // auto_exposure
        self.exposure.record(
            &mut encoder,
            self.targets.extent,
            self.targets.hdr_mip_count,
            self.timings
                .compute_pass_writes(slot, TIMED_PASS_AUTO_EXPOSURE),
        );

        // sun_shafts
        if let Some(shaft_bind_group) = &shaft_bind_group {
            self.shafts.record(
                &mut encoder,
                shaft_bind_group,
                shaft_extent,
                self.timings
                    .compute_pass_writes(slot, TIMED_PASS_SUN_SHAFTS),
            );
        }

        // post + overlay target
        self.tonemap.record(
            &ctx,
            &mut encoder,
            &surface_view,
            &tonemap_bind_group,
            self.timings.render_pass_writes(slot, TIMED_PASS_TONEMAP),
        );

        self.timings.encode_resolve(slot, &mut encoder);

        // ── 10. Submit, signal, present ───────────────────────────────
        let frame_value = self.timeline.next_value();
        self.ctx.queue.submit(Some(encoder.finish()));
        self.timeline.register_submission(&self.ctx.queue, frame_value);
        self.slot_values[slot] = frame_value;
        self.last_graphics_value = frame_value;
        // The pending transfer wait is satisfied by queue order; the
        // record is consumed with this frame.
        self.chunks.pending_transfer_wait = 0;
        self.arena.schedule_remap(slot);
        self.timings.after_submit(slot);

        surface_texture.present();

        self.frame_index += 1;
        self.frame_slot = (self.frame_slot + 1) % self.slot_values.len();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prescribed_order_satisfies_graph_edges() {
        let graph = build_frame_graph();
        let order: Vec<PassId> = PRESCRIBED_ORDER.iter().map(|&i| PassId(i)).collect();
        assert!(graph.validate().is_ok());
        assert!(graph.order_satisfies_edges(&order));
    }

    #[test]
    fn lod_selection_monotonic() {
        assert_eq!(lod_for_distance(10.0), 0);
        assert_eq!(lod_for_distance(100.0), 1);
        assert_eq!(lod_for_distance(200.0), 2);
        assert_eq!(lod_for_distance(500.0), 3);
    }
}
