//! Normal + linear-depth prepass.
//!
//! Draws the lit geometry at AO resolution into an RGBA target encoding
//! the view-space normal and linear depth, with its own reverse-Z depth
//! attachment. SSAO consumes the result.

use super::{
    FrameCtx, FrameDraws, chunk_instance_layout, draw_chunks_indirect, network_instance_layout,
    packed_voxel_vertex_layout,
};
use crate::renderer::settings::{DEPTH_FORMAT, NORMAL_DEPTH_FORMAT};
use crate::renderer::shaders::ShaderSet;

pub struct PrepassPass {
    chunk_pipeline: wgpu::RenderPipeline,
    network_pipeline: wgpu::RenderPipeline,
}

fn prepass_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    vertex_entry: &str,
    buffers: &[wgpu::VertexBufferLayout],
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some(vertex_entry),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers,
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::GreaterEqual),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: NORMAL_DEPTH_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview_mask: None,
        cache: None,
    })
}

impl PrepassPass {
    pub fn new(
        device: &wgpu::Device,
        shaders: &ShaderSet,
        globals_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("prepass.pipelineLayout"),
            bind_group_layouts: &[Some(globals_layout)],
            immediate_size: 0,
        });
        let module = shaders.get("prepass");
        Self {
            chunk_pipeline: prepass_pipeline(
                device,
                &pipeline_layout,
                module,
                "vs_chunk",
                &[packed_voxel_vertex_layout(), chunk_instance_layout()],
                "prepass.chunk",
            ),
            network_pipeline: prepass_pipeline(
                device,
                &pipeline_layout,
                module,
                "vs_network",
                &[network_instance_layout()],
                "prepass.network",
            ),
        }
    }

    pub fn record(
        &self,
        ctx: &FrameCtx,
        encoder: &mut wgpu::CommandEncoder,
        normal_depth_view: &wgpu::TextureView,
        ao_depth_view: &wgpu::TextureView,
        draws: &FrameDraws,
        timestamp_writes: Option<wgpu::RenderPassTimestampWrites>,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pass.prepass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: normal_depth_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    // Mid-gray normal, zero linear depth = "sky".
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.5,
                        g: 0.5,
                        b: 0.5,
                        a: 0.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: ao_depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let offsets = ctx.default_offsets();

        if let (Some(vertex), Some(index), Some(instances), Some(indirect)) = (
            draws.chunk_vertex,
            draws.chunk_index,
            draws.chunk_instances,
            draws.main_indirect,
        ) {
            pass.set_pipeline(&self.chunk_pipeline);
            pass.set_bind_group(0, ctx.globals_bind_group, &offsets);
            pass.set_vertex_buffer(0, vertex.slice(..));
            pass.set_vertex_buffer(
                1,
                ctx.arena
                    .device_buffer(instances)
                    .slice(instances.offset..instances.offset + instances.size),
            );
            pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
            draw_chunks_indirect(&mut pass, ctx.arena, indirect, draws.multi_draw_indirect);
        }

        if let Some(instances) = draws.network_instances {
            let total = draws
                .network_ranges
                .iter()
                .map(|range| range.len() as u32)
                .sum::<u32>();
            if total > 0 {
                pass.set_pipeline(&self.network_pipeline);
                pass.set_bind_group(0, ctx.globals_bind_group, &offsets);
                pass.set_vertex_buffer(
                    0,
                    ctx.arena
                        .device_buffer(instances)
                        .slice(instances.offset..instances.offset + instances.size),
                );
                pass.draw(0..36, 0..total);
            }
        }
    }
}
