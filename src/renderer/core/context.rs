//! GPU context: instance, adapter, device, queue, surface.
//!
//! Also probes the optional features the renderer can degrade without:
//! multi-draw-indirect falls back to N single indirect draws, missing
//! timestamp queries make GPU timings read as n/a.

use crate::errors::{RenderError, Result};
use crate::renderer::settings::RenderSettings;

/// Optional-capability probe results.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureSupport {
    pub multi_draw_indirect: bool,
    pub timestamp_query: bool,
}

/// Core GPU context owned by the renderer.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
    pub features: FeatureSupport,
}

impl GpuContext {
    pub async fn new<W>(
        window: W,
        settings: &RenderSettings,
        width: u32,
        height: u32,
    ) -> Result<Self>
    where
        W: wgpu::WindowHandle + raw_window_handle::HasDisplayHandle + 'static,
    {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::AdapterRequestFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: settings.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::AdapterRequestFailed(e.to_string()))?;

        let optional = wgpu::Features::TIMESTAMP_QUERY;
        let granted = adapter.features() & optional;
        let features = FeatureSupport {
            multi_draw_indirect: true,
            timestamp_query: granted.contains(wgpu::Features::TIMESTAMP_QUERY),
        };
        if !features.multi_draw_indirect {
            log::warn!("multi-draw-indirect unsupported, falling back to per-range indirect draws");
        }
        if !features.timestamp_query {
            log::warn!("timestamp queries unsupported, GPU pass timings will read n/a");
        }

        // The GI surface pass writes all six face volumes in one
        // dispatch, which exceeds the WebGPU default of 4 storage
        // textures per stage.
        let required_limits = wgpu::Limits {
            max_storage_textures_per_shader_stage: 8,
            ..wgpu::Limits::default()
        };
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("verdant.device"),
                required_features: granted,
                required_limits,
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        let mut config = surface
            .get_default_config(&adapter, width.max(1), height.max(1))
            .ok_or_else(|| {
                RenderError::AdapterRequestFailed("surface not supported by adapter".to_string())
            })?;
        config.present_mode = if settings.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        surface.configure(&device, &config);

        log::info!(
            "gpu context ready ({}, surface {:?} {}x{})",
            adapter.get_info().name,
            config.format,
            config.width,
            config.height
        );

        Ok(Self {
            device,
            queue,
            surface,
            config,
            features,
        })
    }

    /// Reconfigures the surface for a new framebuffer size. Pipelines
    /// are retained; only size-dependent targets must be rebuilt by the
    /// caller.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Re-applies the current configuration after an out-of-date or lost
    /// surface report.
    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }

    #[inline]
    #[must_use]
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    #[inline]
    #[must_use]
    pub fn surface_extent(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}
