//! SSAO and its blur.
//!
//! Full-screen triangle sampling the normal-depth prepass with a fixed
//! hemisphere kernel, writing raw single-channel AO; a box blur pass
//! produces the texture the main pass samples. When AO is disabled the
//! passes are skipped and the main pass ignores the (stale) contents.

use super::FrameCtx;
use crate::renderer::settings::AO_FORMAT;
use crate::renderer::shaders::ShaderSet;

pub struct SsaoPass {
    ssao_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    input_layout: wgpu::BindGroupLayout,
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
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
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview_mask: None,
        cache: None,
    })
}

impl SsaoPass {
    pub fn new(
        device: &wgpu::Device,
        shaders: &ShaderSet,
        globals_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        let input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ssao.inputLayout"),
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
            label: Some("ssao.pipelineLayout"),
            bind_group_layouts: &[Some(globals_layout), Some(&input_layout)],
            immediate_size: 0,
        });

        Self {
            ssao_pipeline: fullscreen_pipeline(
                device,
                &pipeline_layout,
                shaders.get("ssao"),
                AO_FORMAT,
                "ssao.raw",
            ),
            blur_pipeline: fullscreen_pipeline(
                device,
                &pipeline_layout,
                shaders.get("ssao_blur"),
                AO_FORMAT,
                "ssao.blur",
            ),
            input_layout,
        }
    }

    /// Builds the per-frame input bind group (the source texture varies:
    /// normal-depth for raw SSAO, raw AO for the blur).
    #[must_use]
    pub fn create_input_bind_group(
        &self,
        device: &wgpu::Device,
        source: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        label: &str,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.input_layout,
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
        })
    }

    fn record_fullscreen(
        ctx: &FrameCtx,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::RenderPipeline,
        input: &wgpu::BindGroup,
        target: &wgpu::TextureView,
        label: &'static str,
        timestamp_writes: Option<wgpu::RenderPassTimestampWrites>,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, ctx.globals_bind_group, &ctx.default_offsets());
        pass.set_bind_group(1, input, &[]);
        pass.draw(0..3, 0..1);
    }

    pub fn record_raw(
        &self,
        ctx: &FrameCtx,
        encoder: &mut wgpu::CommandEncoder,
        normal_depth_input: &wgpu::BindGroup,
        raw_target: &wgpu::TextureView,
        timestamp_writes: Option<wgpu::RenderPassTimestampWrites>,
    ) {
        Self::record_fullscreen(
            ctx,
            encoder,
            &self.ssao_pipeline,
            normal_depth_input,
            raw_target,
            "pass.ssao",
            timestamp_writes,
        );
    }

    pub fn record_blur(
        &self,
        ctx: &FrameCtx,
        encoder: &mut wgpu::CommandEncoder,
        raw_input: &wgpu::BindGroup,
        blur_target: &wgpu::TextureView,
        timestamp_writes: Option<wgpu::RenderPassTimestampWrites>,
    ) {
        Self::record_fullscreen(
            ctx,
            encoder,
            &self.blur_pipeline,
            raw_input,
            blur_target,
            "pass.ssaoBlur",
            timestamp_writes,
        );
    }
}
