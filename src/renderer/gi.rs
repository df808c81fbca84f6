//! Voxel-grid global illumination.
//!
//! A cubic radiance volume follows the camera clipmap-style: the origin
//! snaps to whole cells on X/Z every frame and on Y only after the
//! camera moves more than four cells vertically, so small jumps do not
//! flush the volume. Occupancy (solid mask + albedo) is re-uploaded only
//! when the world changed, the grid moved, or on first use.
//!
//! The dispatch sequence per update is sky-exposure → per-face surface
//! radiance → inject → N× propagate, ping-ponging two radiance images
//! with a per-iteration decay chosen so one full frame retains
//! [`GI_PROPAGATE_FRAME_DECAY`] of the energy. On frames where nothing
//! relevant changed all four steps are skipped and the previously
//! propagated image keeps feeding the main pass.

use glam::{Vec3, Vec4};

use super::core::{GpuAllocator, ImageDesc, ImageHandle};
use super::shaders::ShaderSet;
use super::uniforms::GiUniform;
use crate::world::chunk::ChunkGrid;

/// Cells per axis of the GI volume.
pub const GI_GRID_RESOLUTION: u32 = 64;

/// World-space size of one GI cell.
pub const GI_CELL_SIZE: f32 = 1.0;

/// Vertical origin hysteresis, in world units.
pub const GI_VERTICAL_FOLLOW_THRESHOLD: f32 = GI_CELL_SIZE * 4.0;

pub const GI_PROPAGATION_ITERATIONS: u32 = 4;
pub const GI_INJECT_SUN_SCALE: f32 = 0.70;
pub const GI_INJECT_SH_SCALE: f32 = 0.95;
/// Total radiance retention across one frame's propagation iterations.
pub const GI_PROPAGATE_FRAME_DECAY: f32 = 0.93;

const GI_GRID_MOVE_THRESHOLD: f32 = 1e-3;
const GI_LIGHTING_CHANGE_THRESHOLD: f32 = 1e-3;
const GI_TUNING_CHANGE_THRESHOLD: f32 = 1e-3;

const GI_WORKGROUP_SIZE: u32 = 4;

/// Per-iteration decay so the whole frame multiplies to the target.
#[must_use]
pub fn propagate_iteration_decay() -> f32 {
    GI_PROPAGATE_FRAME_DECAY
        .clamp(0.0, 1.0)
        .powf(1.0 / GI_PROPAGATION_ITERATIONS as f32)
}

// ─── Origin math ─────────────────────────────────────────────────────────────

/// Cell-snapped origin so the volume covers `[origin, origin + span)`
/// centered on the camera axis.
#[must_use]
pub fn axis_origin(camera_axis: f32, half_span: f32, cell_size: f32) -> f32 {
    ((camera_axis - half_span) / cell_size).floor() * cell_size
}

/// Vertical origin with hysteresis: holds the previous origin until the
/// desired one drifts past the follow threshold.
#[must_use]
pub fn stable_origin_y(
    desired: f32,
    previous: f32,
    has_previous: bool,
    follow_threshold: f32,
) -> f32 {
    if !has_previous {
        return desired;
    }
    if (desired - previous).abs() < follow_threshold {
        previous
    } else {
        desired
    }
}

// ─── Change detection ────────────────────────────────────────────────────────

/// Everything the volume's contents depend on besides occupancy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GiLightingState {
    pub sun_direction: Vec3,
    pub sun_color: Vec3,
    pub sh_irradiance: [Vec3; 9],
    pub gi_strength: f32,
    pub ambient_rebalance: f32,
}

/// Outcome of the per-frame change evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct GiComputeFlags {
    pub grid_moved: bool,
    pub lighting_changed: bool,
    pub needs_occupancy_upload: bool,
    pub needs_compute_update: bool,
}

fn vec3_changed(a: Vec3, b: Vec3, threshold: f32) -> bool {
    (a.x - b.x).abs() > threshold
        || (a.y - b.y).abs() > threshold
        || (a.z - b.z).abs() > threshold
}

/// Pure change evaluation; the skip policy in one place.
#[must_use]
pub fn compute_flags(
    current: &GiLightingState,
    previous: Option<&GiLightingState>,
    grid_moved: bool,
    world_dirty: bool,
    occupancy_initialized: bool,
) -> GiComputeFlags {
    let lighting_changed = match previous {
        None => true,
        Some(previous) => {
            vec3_changed(
                current.sun_direction,
                previous.sun_direction,
                GI_LIGHTING_CHANGE_THRESHOLD,
            ) || vec3_changed(
                current.sun_color,
                previous.sun_color,
                GI_LIGHTING_CHANGE_THRESHOLD,
            ) || current
                .sh_irradiance
                .iter()
                .zip(previous.sh_irradiance.iter())
                .any(|(a, b)| vec3_changed(*a, *b, GI_LIGHTING_CHANGE_THRESHOLD))
                || (current.gi_strength - previous.gi_strength).abs()
                    > GI_TUNING_CHANGE_THRESHOLD
                || (current.ambient_rebalance - previous.ambient_rebalance).abs()
                    > GI_TUNING_CHANGE_THRESHOLD
        }
    };
    let needs_occupancy_upload = world_dirty || grid_moved || !occupancy_initialized;
    GiComputeFlags {
        grid_moved,
        lighting_changed,
        needs_occupancy_upload,
        needs_compute_update: needs_occupancy_upload || lighting_changed,
    }
}

/// Session-persistent GI tracking state.
#[derive(Debug, Default)]
pub struct GiState {
    previous_origin: Option<Vec3>,
    previous_lighting: Option<GiLightingState>,
    pub world_dirty: bool,
    occupancy_initialized: bool,
}

impl GiState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            world_dirty: true,
            ..Self::default()
        }
    }

    /// Computes this frame's snapped grid origin and whether it moved.
    pub fn update_origin(&mut self, camera_position: Vec3) -> (Vec3, bool) {
        let half_span = GI_GRID_RESOLUTION as f32 * GI_CELL_SIZE * 0.5;
        let desired_y = axis_origin(camera_position.y, half_span, GI_CELL_SIZE);
        let previous = self.previous_origin;
        let origin = Vec3::new(
            axis_origin(camera_position.x, half_span, GI_CELL_SIZE),
            stable_origin_y(
                desired_y,
                previous.map_or(0.0, |p| p.y),
                previous.is_some(),
                GI_VERTICAL_FOLLOW_THRESHOLD,
            ),
            axis_origin(camera_position.z, half_span, GI_CELL_SIZE),
        );
        let moved = match previous {
            None => true,
            Some(previous) => vec3_changed(origin, previous, GI_GRID_MOVE_THRESHOLD),
        };
        self.previous_origin = Some(origin);
        (origin, moved)
    }

    /// Evaluates the skip policy and commits the current lighting state
    /// as the new baseline.
    pub fn evaluate(&mut self, lighting: &GiLightingState, grid_moved: bool) -> GiComputeFlags {
        let flags = compute_flags(
            lighting,
            self.previous_lighting.as_ref(),
            grid_moved,
            self.world_dirty,
            self.occupancy_initialized,
        );
        self.previous_lighting = Some(*lighting);
        if flags.needs_occupancy_upload {
            self.occupancy_initialized = true;
        }
        self.world_dirty = false;
        flags
    }
}

// ─── Occupancy packing ───────────────────────────────────────────────────────

/// Packs the occupancy volume: R = 255 marks a solid cell, GBA carries
/// the voxel albedo from the base-color palette.
#[must_use]
pub fn pack_occupancy(grid: &ChunkGrid, origin: Vec3, palette: &[u32; 16]) -> Vec<u8> {
    let resolution = GI_GRID_RESOLUTION as usize;
    let mut data = vec![0u8; resolution * resolution * resolution * 4];

    // Precompute the integer world coordinate of every cell center.
    let mut world_x = [0i32; GI_GRID_RESOLUTION as usize];
    let mut world_y = [0i32; GI_GRID_RESOLUTION as usize];
    let mut world_z = [0i32; GI_GRID_RESOLUTION as usize];
    for i in 0..resolution {
        let offset = (i as f32 + 0.5) * GI_CELL_SIZE;
        world_x[i] = (origin.x + offset).floor() as i32;
        world_y[i] = (origin.y + offset).floor() as i32;
        world_z[i] = (origin.z + offset).floor() as i32;
    }

    for z in 0..resolution {
        for y in 0..resolution {
            let row_base = (z * resolution + y) * resolution;
            for x in 0..resolution {
                let voxel = grid.voxel_at_world(world_x[x], world_y[y], world_z[z]);
                if !voxel.is_solid() {
                    continue;
                }
                let albedo = palette[usize::from(voxel.color & 0x0F)];
                let texel = (row_base + x) * 4;
                data[texel] = 255;
                data[texel + 1] = (albedo >> 16) as u8;
                data[texel + 2] = (albedo >> 8) as u8;
                data[texel + 3] = albedo as u8;
            }
        }
    }
    data
}

// ─── GPU volume ──────────────────────────────────────────────────────────────

/// GPU resources and pipelines of the GI volume.
pub struct GiVolume {
    occupancy: ImageHandle,
    radiance: [ImageHandle; 2],
    faces: [ImageHandle; 6],
    sky_exposure: ImageHandle,
    uniform_buffer: wgpu::Buffer,
    linear_sampler: wgpu::Sampler,

    sky_pipeline: wgpu::ComputePipeline,
    surface_pipeline: wgpu::ComputePipeline,
    inject_pipeline: wgpu::ComputePipeline,
    propagate_pipeline: wgpu::ComputePipeline,

    sky_bind_group: wgpu::BindGroup,
    surface_bind_group: wgpu::BindGroup,
    inject_bind_group: wgpu::BindGroup,
    /// `propagate_bind_groups[i]` reads ping `i` and writes ping `1 - i`.
    propagate_bind_groups: [wgpu::BindGroup; 2],
}

fn volume_desc(
    label: &'static str,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> ImageDesc {
    ImageDesc {
        label,
        format,
        width: GI_GRID_RESOLUTION,
        height: GI_GRID_RESOLUTION,
        depth_or_layers: GI_GRID_RESOLUTION,
        dimension: wgpu::TextureDimension::D3,
        mip_level_count: 1,
        sample_count: 1,
        usage,
    }
}

impl GiVolume {
    pub fn new(
        device: &wgpu::Device,
        allocator: &mut GpuAllocator,
        shaders: &ShaderSet,
        shadow_atlas_view: &wgpu::TextureView,
        shadow_sampler: &wgpu::Sampler,
    ) -> Option<Self> {
        let storage_usage =
            wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING;

        let occupancy = allocator.create_image(&volume_desc(
            "gi.occupancy",
            wgpu::TextureFormat::Rgba8Unorm,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        ))?;
        let radiance = [
            allocator.create_image(&volume_desc(
                "gi.radiance.a",
                wgpu::TextureFormat::Rgba8Unorm,
                storage_usage,
            ))?,
            allocator.create_image(&volume_desc(
                "gi.radiance.b",
                wgpu::TextureFormat::Rgba8Unorm,
                storage_usage,
            ))?,
        ];
        let faces = [
            allocator.create_image(&volume_desc(
                "gi.surface.posX",
                wgpu::TextureFormat::Rgba8Unorm,
                storage_usage,
            ))?,
            allocator.create_image(&volume_desc(
                "gi.surface.negX",
                wgpu::TextureFormat::Rgba8Unorm,
                storage_usage,
            ))?,
            allocator.create_image(&volume_desc(
                "gi.surface.posY",
                wgpu::TextureFormat::Rgba8Unorm,
                storage_usage,
            ))?,
            allocator.create_image(&volume_desc(
                "gi.surface.negY",
                wgpu::TextureFormat::Rgba8Unorm,
                storage_usage,
            ))?,
            allocator.create_image(&volume_desc(
                "gi.surface.posZ",
                wgpu::TextureFormat::Rgba8Unorm,
                storage_usage,
            ))?,
            allocator.create_image(&volume_desc(
                "gi.surface.negZ",
                wgpu::TextureFormat::Rgba8Unorm,
                storage_usage,
            ))?,
        ];
        let sky_exposure = allocator.create_image(&volume_desc(
            "gi.skyExposure",
            wgpu::TextureFormat::R32Float,
            storage_usage,
        ))?;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gi.uniform"),
            size: std::mem::size_of::<GiUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("gi.linearSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // ── Bind group layouts ────────────────────────────────────────

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let texture_3d_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D3,
                multisampled: false,
            },
            count: None,
        };
        let storage_3d_entry = |binding, format| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format,
                view_dimension: wgpu::TextureViewDimension::D3,
            },
            count: None,
        };

        let sky_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gi.sky.layout"),
            entries: &[
                uniform_entry(0),
                texture_3d_entry(1),
                storage_3d_entry(2, wgpu::TextureFormat::R32Float),
            ],
        });

        let mut surface_entries = vec![
            uniform_entry(0),
            texture_3d_entry(1),
            texture_3d_entry(2),
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Depth,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ];
        for face in 0..6u32 {
            surface_entries.push(storage_3d_entry(5 + face, wgpu::TextureFormat::Rgba8Unorm));
        }
        let surface_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gi.surface.layout"),
            entries: &surface_entries,
        });

        let mut inject_entries = vec![uniform_entry(0)];
        for face in 0..6u32 {
            inject_entries.push(texture_3d_entry(1 + face));
        }
        inject_entries.push(storage_3d_entry(7, wgpu::TextureFormat::Rgba8Unorm));
        let inject_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gi.inject.layout"),
            entries: &inject_entries,
        });

        let propagate_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gi.propagate.layout"),
            entries: &[
                uniform_entry(0),
                texture_3d_entry(1),
                texture_3d_entry(2),
                storage_3d_entry(3, wgpu::TextureFormat::Rgba8Unorm),
            ],
        });

        // ── Pipelines ─────────────────────────────────────────────────

        let pipeline = |label: &str, layout: &wgpu::BindGroupLayout, shader: &str| {
            let pipeline_layout =
                device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(label),
                    bind_group_layouts: &[Some(layout)],
                    immediate_size: 0,
                });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: shaders.get(shader),
                entry_point: Some("main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
        };

        let sky_pipeline = pipeline("gi.sky.pipeline", &sky_layout, "gi_sky");
        let surface_pipeline = pipeline("gi.surface.pipeline", &surface_layout, "gi_surface");
        let inject_pipeline = pipeline("gi.inject.pipeline", &inject_layout, "gi_inject");
        let propagate_pipeline =
            pipeline("gi.propagate.pipeline", &propagate_layout, "gi_propagate");

        // ── Bind groups ───────────────────────────────────────────────

        let view = |handle: ImageHandle| allocator.image_view(handle).cloned();
        let occupancy_view = view(occupancy)?;
        let sky_exposure_view = view(sky_exposure)?;
        let radiance_views = [view(radiance[0])?, view(radiance[1])?];
        let face_views = [
            view(faces[0])?,
            view(faces[1])?,
            view(faces[2])?,
            view(faces[3])?,
            view(faces[4])?,
            view(faces[5])?,
        ];

        let sky_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gi.sky.bindGroup"),
            layout: &sky_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&occupancy_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&sky_exposure_view),
                },
            ],
        });

        let mut surface_bindings = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&occupancy_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&sky_exposure_view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(shadow_atlas_view),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(shadow_sampler),
            },
        ];
        for (face, face_view) in face_views.iter().enumerate() {
            surface_bindings.push(wgpu::BindGroupEntry {
                binding: 5 + face as u32,
                resource: wgpu::BindingResource::TextureView(face_view),
            });
        }
        let surface_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gi.surface.bindGroup"),
            layout: &surface_layout,
            entries: &surface_bindings,
        });

        let mut inject_bindings = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        }];
        for (face, face_view) in face_views.iter().enumerate() {
            inject_bindings.push(wgpu::BindGroupEntry {
                binding: 1 + face as u32,
                resource: wgpu::BindingResource::TextureView(face_view),
            });
        }
        inject_bindings.push(wgpu::BindGroupEntry {
            binding: 7,
            resource: wgpu::BindingResource::TextureView(&radiance_views[0]),
        });
        let inject_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gi.inject.bindGroup"),
            layout: &inject_layout,
            entries: &inject_bindings,
        });

        let propagate_bind_group = |input: usize, output: usize, label| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &propagate_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&occupancy_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&radiance_views[input]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&radiance_views[output]),
                    },
                ],
            })
        };
        let propagate_bind_groups = [
            propagate_bind_group(0, 1, "gi.propagate.aToB"),
            propagate_bind_group(1, 0, "gi.propagate.bToA"),
        ];

        Some(Self {
            occupancy,
            radiance,
            faces,
            sky_exposure,
            uniform_buffer,
            linear_sampler,
            sky_pipeline,
            surface_pipeline,
            inject_pipeline,
            propagate_pipeline,
            sky_bind_group,
            surface_bind_group,
            inject_bind_group,
            propagate_bind_groups,
        })
    }

    /// Writes this frame's GI uniform block.
    pub fn write_uniform(
        &self,
        queue: &wgpu::Queue,
        origin: Vec3,
        outer_cascade_view_proj: glam::Mat4,
        sun_direction: Vec3,
        sun_color: Vec3,
        sh_irradiance: &[Vec3; 9],
    ) {
        let mut sh = [Vec4::ZERO; 9];
        for (slot, coefficient) in sh.iter_mut().zip(sh_irradiance.iter()) {
            *slot = coefficient.extend(0.0);
        }
        let uniform = GiUniform {
            light_view_proj: outer_cascade_view_proj,
            grid_origin_cell: origin.extend(GI_CELL_SIZE),
            sun_direction_resolution: sun_direction.extend(GI_GRID_RESOLUTION as f32),
            sun_color_inject: sun_color.extend(GI_INJECT_SUN_SCALE),
            sh_irradiance: sh,
            params: Vec4::new(GI_INJECT_SH_SCALE, propagate_iteration_decay(), 1.0, 0.0),
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    /// Copies the packed occupancy bytes from the upload staging buffer
    /// into the occupancy image.
    pub fn encode_occupancy_upload(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        allocator: &GpuAllocator,
        staging: &wgpu::Buffer,
        staging_offset: u64,
    ) {
        let Some(texture) = allocator.image(self.occupancy) else {
            return;
        };
        encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer: staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: staging_offset,
                    bytes_per_row: Some(GI_GRID_RESOLUTION * 4),
                    rows_per_image: Some(GI_GRID_RESOLUTION),
                },
            },
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: GI_GRID_RESOLUTION,
                height: GI_GRID_RESOLUTION,
                depth_or_array_layers: GI_GRID_RESOLUTION,
            },
        );
    }

    /// Records the full dispatch sequence.
    pub fn record_update(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        timestamp_writes: Option<wgpu::ComputePassTimestampWrites>,
    ) {
        let groups = GI_GRID_RESOLUTION / GI_WORKGROUP_SIZE;
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("gi.update"),
            timestamp_writes,
        });

        pass.set_pipeline(&self.sky_pipeline);
        pass.set_bind_group(0, &self.sky_bind_group, &[]);
        pass.dispatch_workgroups(groups, groups, groups);

        pass.set_pipeline(&self.surface_pipeline);
        pass.set_bind_group(0, &self.surface_bind_group, &[]);
        pass.dispatch_workgroups(groups, groups, groups);

        pass.set_pipeline(&self.inject_pipeline);
        pass.set_bind_group(0, &self.inject_bind_group, &[]);
        pass.dispatch_workgroups(groups, groups, groups);

        pass.set_pipeline(&self.propagate_pipeline);
        let mut input = 0usize;
        for _ in 0..GI_PROPAGATION_ITERATIONS {
            pass.set_bind_group(0, &self.propagate_bind_groups[input], &[]);
            pass.dispatch_workgroups(groups, groups, groups);
            input = 1 - input;
        }
        debug_assert_eq!(input, Self::final_ping());
    }

    /// Which radiance image every update sequence ends on; fixed by the
    /// iteration count's parity (inject seeds image 0).
    #[must_use]
    pub const fn final_ping() -> usize {
        (GI_PROPAGATION_ITERATIONS % 2) as usize
    }

    /// The radiance image the main pass samples.
    #[must_use]
    pub fn sampled_radiance(&self) -> ImageHandle {
        self.radiance[Self::final_ping()]
    }

    #[must_use]
    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.linear_sampler
    }

    /// Handles for teardown.
    #[must_use]
    pub fn image_handles(&self) -> Vec<ImageHandle> {
        let mut handles = vec![self.occupancy, self.sky_exposure];
        handles.extend_from_slice(&self.radiance);
        handles.extend_from_slice(&self.faces);
        handles
    }
}
