//! Persistent render targets.
//!
//! Size-dependent attachments (MSAA color, HDR resolve chain, depth,
//! prepass targets) are rebuilt on surface reconfiguration; the shadow
//! atlas is size-independent and lives for the session. Per-frame
//! transient targets (raw/blurred SSAO, sun shafts) come from the frame
//! arena's alias pool instead.

use super::cascades::SHADOW_ATLAS_SIZE;
use super::core::{GpuAllocator, ImageDesc, ImageHandle};
use super::settings::{
    AO_FORMAT, DEPTH_FORMAT, HDR_FORMAT, MSAA_SAMPLES, NORMAL_DEPTH_FORMAT, SHAFT_FORMAT,
};

/// The session's persistent attachments plus shared samplers.
pub struct FrameTargets {
    pub extent: (u32, u32),
    pub ao_extent: (u32, u32),

    pub msaa_color: ImageHandle,
    pub depth: ImageHandle,
    pub hdr_resolve: ImageHandle,
    pub hdr_mip_count: u32,
    pub shadow_atlas: ImageHandle,
    pub normal_depth: ImageHandle,
    pub ao_depth: ImageHandle,

    pub shadow_sampler: wgpu::Sampler,
    pub linear_sampler: wgpu::Sampler,
    pub linear_mip_sampler: wgpu::Sampler,
}

/// Full mip chain length for an extent.
#[must_use]
pub fn mip_count_for_extent(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

impl FrameTargets {
    pub fn new(
        device: &wgpu::Device,
        allocator: &mut GpuAllocator,
        extent: (u32, u32),
        ao_scale: f32,
    ) -> Option<Self> {
        let shadow_atlas = allocator.create_image(&ImageDesc {
            label: "target.shadowAtlas",
            format: DEPTH_FORMAT,
            width: SHADOW_ATLAS_SIZE,
            height: SHADOW_ATLAS_SIZE,
            depth_or_layers: 1,
            dimension: wgpu::TextureDimension::D2,
            mip_level_count: 1,
            sample_count: 1,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        })?;

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sampler.shadowCompare"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            // Reverse-Z: the lit side has the larger depth value.
            compare: Some(wgpu::CompareFunction::GreaterEqual),
            ..Default::default()
        });
        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sampler.linearClamp"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let linear_mip_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("sampler.linearMip"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        let mut targets = Self {
            extent: (0, 0),
            ao_extent: (0, 0),
            msaa_color: ImageHandle::default(),
            depth: ImageHandle::default(),
            hdr_resolve: ImageHandle::default(),
            hdr_mip_count: 0,
            shadow_atlas,
            normal_depth: ImageHandle::default(),
            ao_depth: ImageHandle::default(),
            shadow_sampler,
            linear_sampler,
            linear_mip_sampler,
        };
        targets.rebuild_sized(device, allocator, extent, ao_scale)?;
        Some(targets)
    }

    /// (Re)creates every size-dependent attachment. Prior images are
    /// destroyed immediately; wgpu defers the actual release until
    /// in-flight work is done.
    pub fn rebuild_sized(
        &mut self,
        _device: &wgpu::Device,
        allocator: &mut GpuAllocator,
        extent: (u32, u32),
        ao_scale: f32,
    ) -> Option<()> {
        if self.extent == extent {
            return Some(());
        }
        for handle in [
            self.msaa_color,
            self.depth,
            self.hdr_resolve,
            self.normal_depth,
            self.ao_depth,
        ] {
            allocator.destroy_image(handle);
        }

        let (width, height) = (extent.0.max(1), extent.1.max(1));
        let ao_width = ((width as f32 * ao_scale) as u32).max(1);
        let ao_height = ((height as f32 * ao_scale) as u32).max(1);
        let mip_count = mip_count_for_extent(width, height);

        self.msaa_color = allocator.create_image(&ImageDesc {
            label: "target.msaaColor",
            format: HDR_FORMAT,
            width,
            height,
            depth_or_layers: 1,
            dimension: wgpu::TextureDimension::D2,
            mip_level_count: 1,
            sample_count: MSAA_SAMPLES,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        })?;
        self.depth = allocator.create_image(&ImageDesc {
            label: "target.depth",
            format: DEPTH_FORMAT,
            width,
            height,
            depth_or_layers: 1,
            dimension: wgpu::TextureDimension::D2,
            mip_level_count: 1,
            sample_count: MSAA_SAMPLES,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        })?;
        self.hdr_resolve = allocator.create_image(&ImageDesc {
            label: "target.hdrResolve",
            format: HDR_FORMAT,
            width,
            height,
            depth_or_layers: 1,
            dimension: wgpu::TextureDimension::D2,
            mip_level_count: mip_count,
            sample_count: 1,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        })?;
        self.normal_depth = allocator.create_image(&ImageDesc {
            label: "target.normalDepth",
            format: NORMAL_DEPTH_FORMAT,
            width: ao_width,
            height: ao_height,
            depth_or_layers: 1,
            dimension: wgpu::TextureDimension::D2,
            mip_level_count: 1,
            sample_count: 1,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        })?;
        self.ao_depth = allocator.create_image(&ImageDesc {
            label: "target.aoDepth",
            format: DEPTH_FORMAT,
            width: ao_width,
            height: ao_height,
            depth_or_layers: 1,
            dimension: wgpu::TextureDimension::D2,
            mip_level_count: 1,
            sample_count: 1,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        })?;

        self.extent = (width, height);
        self.ao_extent = (ao_width, ao_height);
        self.hdr_mip_count = mip_count;
        Some(())
    }

    /// Transient descriptor for the raw SSAO target.
    #[must_use]
    pub fn ssao_raw_desc(&self) -> ImageDesc {
        ImageDesc {
            label: "transient.ssaoRaw",
            format: AO_FORMAT,
            width: self.ao_extent.0,
            height: self.ao_extent.1,
            depth_or_layers: 1,
            dimension: wgpu::TextureDimension::D2,
            mip_level_count: 1,
            sample_count: 1,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        }
    }

    /// Transient descriptor for the blurred SSAO target.
    #[must_use]
    pub fn ssao_blur_desc(&self) -> ImageDesc {
        ImageDesc {
            label: "transient.ssaoBlur",
            ..self.ssao_raw_desc()
        }
    }

    /// Transient descriptor for the sun-shaft output image.
    #[must_use]
    pub fn shaft_desc(&self) -> ImageDesc {
        ImageDesc {
            label: "transient.sunShafts",
            format: SHAFT_FORMAT,
            width: (self.extent.0 / 2).max(1),
            height: (self.extent.1 / 2).max(1),
            depth_or_layers: 1,
            dimension: wgpu::TextureDimension::D2,
            mip_level_count: 1,
            sample_count: 1,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
        }
    }
}
