//! Main forward pass.
//!
//! Opaque voxel chunks, imported instanced meshes, network geometry,
//! grass billboards, the sky and the interaction preview all render
//! into a 4× multisampled HDR attachment with an automatic resolve into
//! the single-sample HDR image whose mip chain feeds bloom and
//! auto-exposure.

use super::{
    FrameCtx, FrameDraws, chunk_instance_layout, draw_chunks_indirect, grass_instance_layout,
    network_instance_layout, packed_voxel_vertex_layout,
};
use crate::renderer::settings::{DEPTH_FORMAT, HDR_FORMAT, MSAA_SAMPLES};
use crate::renderer::shaders::ShaderSet;

pub struct MainScenePass {
    chunk_pipeline: wgpu::RenderPipeline,
    instanced_pipeline: wgpu::RenderPipeline,
    network_pipeline: wgpu::RenderPipeline,
    grass_pipeline: wgpu::RenderPipeline,
    sky_pipeline: wgpu::RenderPipeline,
    preview_pipeline: wgpu::RenderPipeline,
    scene_layout: wgpu::BindGroupLayout,
}

struct PipelineSpec<'a> {
    module: &'a wgpu::ShaderModule,
    vertex_entry: &'a str,
    fragment_entry: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    depth_write: bool,
    depth_compare: wgpu::CompareFunction,
    blend: Option<wgpu::BlendState>,
    alpha_to_coverage: bool,
    cull: Option<wgpu::Face>,
    label: &'a str,
}

fn scene_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    spec: &PipelineSpec,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: spec.module,
            entry_point: Some(spec.vertex_entry),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: spec.buffers,
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: spec.cull,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: Some(spec.depth_write),
            depth_compare: Some(spec.depth_compare),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: MSAA_SAMPLES,
            mask: !0,
            alpha_to_coverage_enabled: spec.alpha_to_coverage,
        },
        fragment: Some(wgpu::FragmentState {
            module: spec.module,
            entry_point: Some(spec.fragment_entry),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: HDR_FORMAT,
                blend: spec.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview_mask: None,
        cache: None,
    })
}

impl MainScenePass {
    pub fn new(
        device: &wgpu::Device,
        shaders: &ShaderSet,
        globals_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        // Group 1: shadow atlas, GI volume, blurred AO.
        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("mainScene.sceneLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mainScene.pipelineLayout"),
            bind_group_layouts: &[Some(globals_layout), Some(&scene_layout)],
            immediate_size: 0,
        });

        let chunk_pipeline = scene_pipeline(
            device,
            &pipeline_layout,
            &PipelineSpec {
                module: shaders.get("voxel"),
                vertex_entry: "vs_main",
                fragment_entry: "fs_main",
                buffers: &[packed_voxel_vertex_layout(), chunk_instance_layout()],
                depth_write: true,
                depth_compare: wgpu::CompareFunction::GreaterEqual,
                blend: None,
                alpha_to_coverage: false,
                cull: Some(wgpu::Face::Back),
                label: "mainScene.chunk",
            },
        );
        let instanced_pipeline = scene_pipeline(
            device,
            &pipeline_layout,
            &PipelineSpec {
                module: shaders.get("instanced"),
                vertex_entry: "vs_main",
                fragment_entry: "fs_main",
                buffers: &[packed_voxel_vertex_layout()],
                depth_write: true,
                depth_compare: wgpu::CompareFunction::GreaterEqual,
                blend: None,
                alpha_to_coverage: false,
                cull: Some(wgpu::Face::Back),
                label: "mainScene.instanced",
            },
        );
        let network_pipeline = scene_pipeline(
            device,
            &pipeline_layout,
            &PipelineSpec {
                module: shaders.get("network"),
                vertex_entry: "vs_main",
                fragment_entry: "fs_main",
                buffers: &[network_instance_layout()],
                depth_write: true,
                depth_compare: wgpu::CompareFunction::GreaterEqual,
                blend: None,
                alpha_to_coverage: false,
                cull: Some(wgpu::Face::Back),
                label: "mainScene.network",
            },
        );
        let grass_pipeline = scene_pipeline(
            device,
            &pipeline_layout,
            &PipelineSpec {
                module: shaders.get("grass"),
                vertex_entry: "vs_main",
                fragment_entry: "fs_main",
                buffers: &[grass_instance_layout()],
                depth_write: true,
                depth_compare: wgpu::CompareFunction::GreaterEqual,
                blend: None,
                // MSAA handles the cutout edges.
                alpha_to_coverage: true,
                cull: None,
                label: "mainScene.grass",
            },
        );
        let sky_pipeline = scene_pipeline(
            device,
            &pipeline_layout,
            &PipelineSpec {
                module: shaders.get("sky"),
                vertex_entry: "vs_main",
                fragment_entry: "fs_main",
                buffers: &[],
                depth_write: false,
                // Sky sits at the reverse-Z far plane (0); it only covers
                // pixels no opaque draw touched.
                depth_compare: wgpu::CompareFunction::GreaterEqual,
                blend: None,
                alpha_to_coverage: false,
                cull: None,
                label: "mainScene.sky",
            },
        );
        let preview_pipeline = scene_pipeline(
            device,
            &pipeline_layout,
            &PipelineSpec {
                module: shaders.get("preview"),
                vertex_entry: "vs_main",
                fragment_entry: "fs_main",
                buffers: &[],
                depth_write: false,
                depth_compare: wgpu::CompareFunction::GreaterEqual,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                alpha_to_coverage: false,
                cull: None,
                label: "mainScene.preview",
            },
        );

        Self {
            chunk_pipeline,
            instanced_pipeline,
            network_pipeline,
            grass_pipeline,
            sky_pipeline,
            preview_pipeline,
            scene_layout,
        }
    }

    /// Per-frame scene bind group; the AO view is a transient image.
    #[must_use]
    pub fn create_scene_bind_group(
        &self,
        device: &wgpu::Device,
        shadow_atlas: &wgpu::TextureView,
        shadow_sampler: &wgpu::Sampler,
        gi_radiance: &wgpu::TextureView,
        gi_sampler: &wgpu::Sampler,
        ssao_blur: &wgpu::TextureView,
        linear_sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mainScene.sceneBindGroup"),
            layout: &self.scene_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(shadow_atlas),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(shadow_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(gi_radiance),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(gi_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(ssao_blur),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(linear_sampler),
                },
            ],
        })
    }

    pub fn record(
        &self,
        ctx: &FrameCtx,
        encoder: &mut wgpu::CommandEncoder,
        msaa_view: &wgpu::TextureView,
        resolve_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        scene_bind_group: &wgpu::BindGroup,
        clear_color: wgpu::Color,
        draws: &FrameDraws,
        timestamp_writes: Option<wgpu::RenderPassTimestampWrites>,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pass.main"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: msaa_view,
                depth_slice: None,
                resolve_target: Some(resolve_view),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    store: wgpu::StoreOp::Discard,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
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
            pass.set_bind_group(1, scene_bind_group, &[]);
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

        for instanced in draws.instanced {
            let (Some(vertex), Some(index)) = (
                ctx.allocator.buffer(instanced.vertex_buffer),
                ctx.allocator.buffer(instanced.index_buffer),
            ) else {
                continue;
            };
            pass.set_pipeline(&self.instanced_pipeline);
            pass.set_bind_group(
                0,
                ctx.globals_bind_group,
                &ctx.offsets_with_draw(instanced.draw_offset),
            );
            pass.set_bind_group(1, scene_bind_group, &[]);
            pass.set_vertex_buffer(0, vertex.slice(..));
            pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..instanced.index_count, 0, 0..1);
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
                pass.set_bind_group(1, scene_bind_group, &[]);
                pass.set_vertex_buffer(
                    0,
                    ctx.arena
                        .device_buffer(instances)
                        .slice(instances.offset..instances.offset + instances.size),
                );
                pass.draw(0..36, 0..total);
            }
        }

        if let Some(grass) = draws.grass_buffer {
            if draws.grass_instance_count > 0 {
                pass.set_pipeline(&self.grass_pipeline);
                pass.set_bind_group(0, ctx.globals_bind_group, &offsets);
                pass.set_bind_group(1, scene_bind_group, &[]);
                pass.set_vertex_buffer(0, grass.slice(..));
                pass.draw(0..6, 0..draws.grass_instance_count);
            }
        }

        pass.set_pipeline(&self.sky_pipeline);
        pass.set_bind_group(0, ctx.globals_bind_group, &offsets);
        pass.set_bind_group(1, scene_bind_group, &[]);
        pass.draw(0..3, 0..1);

        if let Some(preview_offset) = draws.preview_draw_offset {
            pass.set_pipeline(&self.preview_pipeline);
            pass.set_bind_group(
                0,
                ctx.globals_bind_group,
                &ctx.offsets_with_draw(preview_offset),
            );
            pass.set_bind_group(1, scene_bind_group, &[]);
            pass.draw(0..36, 0..1);
        }
    }
}
