//! Histogram auto-exposure.
//!
//! Two compute dispatches: a histogram build reading a small mip of the
//! HDR image into a 256-bin log-luminance histogram (zero-filled each
//! frame), then a reduce producing the average luminance and its EMA in
//! a tiny state buffer the tone mapper reads.

use crate::renderer::core::{GpuAllocator, ImageHandle};
use crate::renderer::shaders::ShaderSet;
use crate::renderer::uniforms::ExposureParams;

pub const AUTO_EXPOSURE_HISTOGRAM_BINS: u32 = 256;
pub const AUTO_EXPOSURE_WORKGROUP_SIZE: u32 = 16;
pub const AUTO_EXPOSURE_MIN_LOG_LUMINANCE: f32 = -10.0;
pub const AUTO_EXPOSURE_MAX_LOG_LUMINANCE: f32 = 4.0;
const AUTO_EXPOSURE_EMA_ALPHA: f32 = 0.05;

/// Histogram source mip: small enough to stay cheap, clamped to the
/// actual chain length (a tiny swapchain may only have mip 0).
#[must_use]
pub fn histogram_source_mip(hdr_mip_count: u32) -> u32 {
    3.min(hdr_mip_count.saturating_sub(1))
}

pub struct ExposurePass {
    histogram_pipeline: wgpu::ComputePipeline,
    reduce_pipeline: wgpu::ComputePipeline,
    histogram_layout: wgpu::BindGroupLayout,
    histogram_buffer: wgpu::Buffer,
    state_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    reduce_bind_group: wgpu::BindGroup,
    /// Rebuilt on resize (the HDR mip view changes).
    histogram_bind_group: Option<wgpu::BindGroup>,
}

impl ExposurePass {
    pub fn new(device: &wgpu::Device, shaders: &ShaderSet) -> Self {
        let histogram_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("exposure.histogram"),
            size: u64::from(AUTO_EXPOSURE_HISTOGRAM_BINS) * 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let state_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("exposure.state"),
            size: 16,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("exposure.params"),
            size: std::mem::size_of::<ExposureParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

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
        let storage_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let histogram_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("exposure.histogram.layout"),
            entries: &[
                uniform_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                storage_entry(2),
            ],
        });
        let reduce_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("exposure.reduce.layout"),
            entries: &[uniform_entry(0), storage_entry(1), storage_entry(2)],
        });

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
        let histogram_pipeline =
            pipeline("exposure.histogram.pipeline", &histogram_layout, "exposure_histogram");
        let reduce_pipeline = pipeline("exposure.reduce.pipeline", &reduce_layout, "exposure_reduce");

        let reduce_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("exposure.reduce.bindGroup"),
            layout: &reduce_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: histogram_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: state_buffer.as_entire_binding(),
                },
            ],
        });

        Self {
            histogram_pipeline,
            reduce_pipeline,
            histogram_layout,
            histogram_buffer,
            state_buffer,
            params_buffer,
            reduce_bind_group,
            histogram_bind_group: None,
        }
    }

    /// Rebinds the histogram source mip; called on resize.
    pub fn rebuild_bind_groups(
        &mut self,
        device: &wgpu::Device,
        allocator: &GpuAllocator,
        hdr_image: ImageHandle,
        hdr_mip_count: u32,
    ) {
        let mip = histogram_source_mip(hdr_mip_count);
        let Some(source) = allocator.image_mip_view(hdr_image, mip) else {
            self.histogram_bind_group = None;
            return;
        };
        self.histogram_bind_group =
            Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("exposure.histogram.bindGroup"),
                layout: &self.histogram_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(source),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.histogram_buffer.as_entire_binding(),
                    },
                ],
            }));
    }

    /// Uploads this frame's parameters.
    pub fn write_params(&self, queue: &wgpu::Queue, extent: (u32, u32), hdr_mip_count: u32) {
        let mip = histogram_source_mip(hdr_mip_count);
        let width = (extent.0 >> mip).max(1);
        let height = (extent.1 >> mip).max(1);
        let params = ExposureParams {
            width,
            height,
            total_pixels: width * height,
            bin_count: AUTO_EXPOSURE_HISTOGRAM_BINS,
            min_log_luminance: AUTO_EXPOSURE_MIN_LOG_LUMINANCE,
            inv_log_luminance_range: 1.0
                / (AUTO_EXPOSURE_MAX_LOG_LUMINANCE - AUTO_EXPOSURE_MIN_LOG_LUMINANCE),
            ema_alpha: AUTO_EXPOSURE_EMA_ALPHA,
            source_mip: mip as f32,
        };
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }

    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        extent: (u32, u32),
        hdr_mip_count: u32,
        timestamp_writes: Option<wgpu::ComputePassTimestampWrites>,
    ) {
        let Some(histogram_bind_group) = &self.histogram_bind_group else {
            return;
        };
        encoder.clear_buffer(&self.histogram_buffer, 0, None);

        let mip = histogram_source_mip(hdr_mip_count);
        let width = (extent.0 >> mip).max(1);
        let height = (extent.1 >> mip).max(1);
        let groups_x = width.div_ceil(AUTO_EXPOSURE_WORKGROUP_SIZE);
        let groups_y = height.div_ceil(AUTO_EXPOSURE_WORKGROUP_SIZE);

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("pass.autoExposure"),
            timestamp_writes,
        });
        pass.set_pipeline(&self.histogram_pipeline);
        pass.set_bind_group(0, histogram_bind_group, &[]);
        pass.dispatch_workgroups(groups_x, groups_y, 1);

        pass.set_pipeline(&self.reduce_pipeline);
        pass.set_bind_group(0, &self.reduce_bind_group, &[]);
        pass.dispatch_workgroups(1, 1, 1);
    }

    /// Luminance + EMA state, read by the tone mapper.
    #[must_use]
    pub fn state_buffer(&self) -> &wgpu::Buffer {
        &self.state_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_mip_clamps_to_three() {
        assert_eq!(histogram_source_mip(11), 3);
        assert_eq!(histogram_source_mip(4), 3);
    }

    #[test]
    fn source_mip_handles_single_mip_chain() {
        assert_eq!(histogram_source_mip(1), 0);
        assert_eq!(histogram_source_mip(2), 1);
    }
}
