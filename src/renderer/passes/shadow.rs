//! Shadow atlas pass.
//!
//! All four cascades render into one depth atlas within a single render
//! pass, each through its own viewport rectangle. wgpu bakes depth bias
//! into pipeline state, so every caster pipeline exists in four
//! variants with `base + cascade * slope` bias (signs flipped for
//! reverse-Z). Cascades below [`GRASS_SHADOW_CASCADE_COUNT`] also
//! receive grass billboards.

use super::{
    FrameCtx, FrameDraws, draw_chunks_indirect, chunk_instance_layout, grass_instance_layout,
    network_instance_layout, packed_voxel_vertex_layout,
};
use crate::renderer::cascades::{
    GRASS_SHADOW_CASCADE_COUNT, SHADOW_ATLAS_RECTS, SHADOW_CASCADE_COUNT,
};
use crate::renderer::settings::{DEPTH_FORMAT, TuningSettings};
use crate::renderer::shaders::ShaderSet;

pub struct ShadowPass {
    chunk_pipelines: [wgpu::RenderPipeline; SHADOW_CASCADE_COUNT],
    network_pipelines: [wgpu::RenderPipeline; SHADOW_CASCADE_COUNT],
    grass_pipelines: [wgpu::RenderPipeline; GRASS_SHADOW_CASCADE_COUNT],
}

fn cascade_bias(tuning: &TuningSettings, cascade: usize) -> wgpu::DepthBiasState {
    // Reverse-Z: push casters toward larger depth (nearer the light).
    let constant = tuning.caster_depth_bias_base + cascade as f32 * tuning.caster_depth_bias_slope;
    wgpu::DepthBiasState {
        constant: -(constant.round() as i32),
        slope_scale: -2.0,
        clamp: 0.0,
    }
}

fn depth_only_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    entry: &str,
    buffers: &[wgpu::VertexBufferLayout],
    bias: wgpu::DepthBiasState,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some(entry),
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
            bias,
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: None,
        multiview_mask: None,
        cache: None,
    })
}

impl ShadowPass {
    pub fn new(
        device: &wgpu::Device,
        shaders: &ShaderSet,
        globals_layout: &wgpu::BindGroupLayout,
        tuning: &TuningSettings,
    ) -> Self {
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow.pipelineLayout"),
            bind_group_layouts: &[Some(globals_layout)],
            immediate_size: 0,
        });
        let module = shaders.get("shadow");

        let chunk_pipelines = std::array::from_fn(|cascade| {
            depth_only_pipeline(
                device,
                &pipeline_layout,
                module,
                "vs_chunk",
                &[packed_voxel_vertex_layout(), chunk_instance_layout()],
                cascade_bias(tuning, cascade),
                "shadow.chunk",
            )
        });
        let network_pipelines = std::array::from_fn(|cascade| {
            depth_only_pipeline(
                device,
                &pipeline_layout,
                module,
                "vs_network",
                &[network_instance_layout()],
                cascade_bias(tuning, cascade),
                "shadow.network",
            )
        });
        let grass_pipelines = std::array::from_fn(|cascade| {
            depth_only_pipeline(
                device,
                &pipeline_layout,
                module,
                "vs_grass",
                &[grass_instance_layout()],
                cascade_bias(tuning, cascade),
                "shadow.grass",
            )
        });

        Self {
            chunk_pipelines,
            network_pipelines,
            grass_pipelines,
        }
    }

    pub fn record(
        &self,
        ctx: &FrameCtx,
        encoder: &mut wgpu::CommandEncoder,
        atlas_view: &wgpu::TextureView,
        draws: &FrameDraws,
        timestamp_writes: Option<wgpu::RenderPassTimestampWrites>,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pass.shadow"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: atlas_view,
                depth_ops: Some(wgpu::Operations {
                    // Reverse-Z clear: far plane is 0.
                    load: wgpu::LoadOp::Clear(0.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        for cascade in 0..SHADOW_CASCADE_COUNT {
            let rect = SHADOW_ATLAS_RECTS[cascade];
            pass.set_viewport(
                rect.x as f32,
                rect.y as f32,
                rect.size as f32,
                rect.size as f32,
                0.0,
                1.0,
            );
            pass.set_scissor_rect(rect.x, rect.y, rect.size, rect.size);
            let offsets = ctx.offsets_with_draw(draws.cascade_draw_offsets[cascade]);

            // Chunk casters via this cascade's culled indirect list.
            if let (Some(vertex), Some(index), Some(instances), Some(indirect)) = (
                draws.chunk_vertex,
                draws.chunk_index,
                draws.chunk_instances,
                draws.shadow_indirect[cascade],
            ) {
                pass.set_pipeline(&self.chunk_pipelines[cascade]);
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

            // Pipe/belt/track/cargo casters.
            if let Some(instances) = draws.network_instances {
                let total = draws.network_ranges.iter().map(|r| r.len() as u32).sum::<u32>();
                if total > 0 {
                    pass.set_pipeline(&self.network_pipelines[cascade]);
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

            // Grass only shadows the near cascades.
            if cascade < GRASS_SHADOW_CASCADE_COUNT {
                if let Some(grass) = draws.grass_buffer {
                    if draws.grass_instance_count > 0 {
                        pass.set_pipeline(&self.grass_pipelines[cascade]);
                        pass.set_bind_group(0, ctx.globals_bind_group, &offsets);
                        pass.set_vertex_buffer(0, grass.slice(..));
                        pass.draw(0..6, 0..draws.grass_instance_count);
                    }
                }
            }
        }
    }
}
