//! HDR mip-chain build (bloom source).
//!
//! After the MSAA resolve, every mip of the HDR image is filled by a
//! downsample draw from the mip above it — one small render pass per
//! mip, the render-pass equivalent of a blit chain. The tone mapper
//! later samples the chain at several levels and composites them as
//! bloom, weighted by the bloom tuning in the camera uniform.

use super::FrameCtx;
use crate::renderer::core::{GpuAllocator, ImageHandle};
use crate::renderer::settings::HDR_FORMAT;
use crate::renderer::shaders::ShaderSet;

pub struct BloomChain {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    /// `mip_bind_groups[i]` samples mip `i` while rendering mip `i + 1`.
    mip_bind_groups: Vec<wgpu::BindGroup>,
}

impl BloomChain {
    pub fn new(device: &wgpu::Device, shaders: &ShaderSet) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom.layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bloom.pipelineLayout"),
            bind_group_layouts: &[Some(&layout)],
            immediate_size: 0,
        });
        let module = shaders.get("downsample");
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("bloom.downsample"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview_mask: None,
            cache: None,
        });

        Self {
            pipeline,
            layout,
            mip_bind_groups: Vec::new(),
        }
    }

    /// Rebuilds the per-mip bind groups; called whenever the HDR image
    /// is recreated (surface resize).
    pub fn rebuild_bind_groups(
        &mut self,
        device: &wgpu::Device,
        allocator: &GpuAllocator,
        hdr_image: ImageHandle,
        mip_count: u32,
        sampler: &wgpu::Sampler,
    ) {
        self.mip_bind_groups.clear();
        for mip in 0..mip_count.saturating_sub(1) {
            let Some(source) = allocator.image_mip_view(hdr_image, mip) else {
                continue;
            };
            self.mip_bind_groups
                .push(device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("bloom.mipBindGroup"),
                    layout: &self.layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(source),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(sampler),
                        },
                    ],
                }));
        }
    }

    /// Records the full chain. Timestamp begin lands on the first mip
    /// pass and end on the last so the chain reads as one scope.
    pub fn record(
        &self,
        _ctx: &FrameCtx,
        encoder: &mut wgpu::CommandEncoder,
        allocator: &GpuAllocator,
        hdr_image: ImageHandle,
        begin_writes: Option<wgpu::RenderPassTimestampWrites>,
        end_writes: Option<wgpu::RenderPassTimestampWrites>,
    ) {
        let mip_count = self.mip_bind_groups.len();
        let mut begin_writes = begin_writes;
        for (mip, bind_group) in self.mip_bind_groups.iter().enumerate() {
            let Some(target) = allocator.image_mip_view(hdr_image, mip as u32 + 1) else {
                continue;
            };
            let first = mip == 0;
            let last = mip + 1 == mip_count;
            let timestamp_writes = match (first, last) {
                (true, true) => match (begin_writes.take(), end_writes.clone()) {
                    (Some(begin), Some(end)) => Some(wgpu::RenderPassTimestampWrites {
                        query_set: begin.query_set,
                        beginning_of_pass_write_index: begin.beginning_of_pass_write_index,
                        end_of_pass_write_index: end.end_of_pass_write_index,
                    }),
                    _ => None,
                },
                (true, false) => begin_writes.take(),
                (false, true) => end_writes.clone(),
                (false, false) => None,
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pass.bloomMip"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
    }
}
