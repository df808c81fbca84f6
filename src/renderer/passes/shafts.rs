//! Volumetric sun shafts.
//!
//! A compute pass marches screen-space rays from each pixel toward the
//! sun, sampling the shadow atlas (outer cascade) for visibility, and
//! accumulates an R-channel intensity image the tone mapper composites.
//! Skipped entirely at night or when the output image could not be
//! acquired.

use glam::{Mat4, Vec3, Vec4};

use crate::renderer::shaders::ShaderSet;
use crate::renderer::uniforms::ShaftParams;

const SHAFT_WORKGROUP_SIZE: u32 = 8;
const SHAFT_MARCH_STEPS: f32 = 24.0;

pub struct ShaftsPass {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
}

impl ShaftsPass {
    pub fn new(device: &wgpu::Device, shaders: &ShaderSet) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shafts.layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: crate::renderer::settings::SHAFT_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shafts.pipelineLayout"),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("shafts.pipeline"),
            layout: Some(&pipeline_layout),
            module: shaders.get("sun_shafts"),
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shafts.params"),
            size: std::mem::size_of::<ShaftParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            layout,
            params_buffer,
        }
    }

    pub fn write_params(
        &self,
        queue: &wgpu::Queue,
        view_proj: Mat4,
        outer_cascade_view_proj: Mat4,
        sun_direction: Vec3,
        sun_intensity: f32,
        camera_position: Vec3,
        output_extent: (u32, u32),
    ) {
        let params = ShaftParams {
            inverse_view_proj: view_proj.inverse(),
            light_view_proj: outer_cascade_view_proj,
            sun_direction_intensity: sun_direction.extend(sun_intensity),
            output_size: Vec4::new(
                output_extent.0 as f32,
                output_extent.1 as f32,
                1.0 / output_extent.0 as f32,
                1.0 / output_extent.1 as f32,
            ),
            camera_steps: camera_position.extend(SHAFT_MARCH_STEPS),
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }

    /// Per-frame bind group (the output image is transient).
    #[must_use]
    pub fn create_bind_group(
        &self,
        device: &wgpu::Device,
        shadow_atlas: &wgpu::TextureView,
        shadow_sampler: &wgpu::Sampler,
        output: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("shafts.bindGroup"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(shadow_atlas),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(shadow_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(output),
                },
            ],
        })
    }

    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_group: &wgpu::BindGroup,
        output_extent: (u32, u32),
        timestamp_writes: Option<wgpu::ComputePassTimestampWrites>,
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("pass.sunShafts"),
            timestamp_writes,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(
            output_extent.0.div_ceil(SHAFT_WORKGROUP_SIZE),
            output_extent.1.div_ceil(SHAFT_WORKGROUP_SIZE),
            1,
        );
    }
}
