//! Render Settings Configuration
//!
//! Init-time configuration for the renderer plus the runtime tuning
//! block the debug overlay mutates. Fixed pipeline constants (formats,
//! frame count, sample counts) also live here so every pass agrees on
//! them.

/// Frame slots kept in flight. A slot is reused only once the timeline
/// confirms its last signaled value.
pub const FRAMES_IN_FLIGHT: usize = 2;

/// HDR scene color format (MSAA target and resolve chain).
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Reverse-Z depth format for the main and prepass depth attachments.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Normal + linear-depth prepass attachment format.
pub const NORMAL_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Raw and blurred SSAO target format.
pub const AO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Sun-shaft compute output format. Only R carries the shaft intensity;
/// the format is the narrowest core storage format that also filters.
pub const SHAFT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// MSAA sample count of the main scene pass.
pub const MSAA_SAMPLES: u32 = 4;

/// Frame-slot lag (in timeline values) before a stall warning is logged.
pub const TIMELINE_STALL_WARN_LAG: u64 = 3;

/// Minimum seconds between stall warnings.
pub const TIMELINE_STALL_WARN_COOLDOWN_SECONDS: f64 = 5.0;

/// Configuration options for the rendering system.
///
/// | Field | Description | Default |
/// |-------|-------------|---------|
/// | `vsync` | Vertical sync enabled | `true` |
/// | `power_preference` | GPU selection preference | `HighPerformance` |
/// | `clear_color` | Background clear color | Black |
/// | `ao_resolution_scale` | AO render resolution relative to the swapchain | `0.5` |
/// | `shader_directory` | Directory the WGSL modules are loaded from | `"shaders"` |
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Enable vertical synchronization.
    pub vsync: bool,

    /// GPU adapter selection preference.
    pub power_preference: wgpu::PowerPreference,

    /// Background clear color for the main render target.
    pub clear_color: wgpu::Color,

    /// SSAO/prepass resolution as a fraction of the swapchain resolution.
    pub ao_resolution_scale: f32,

    /// Directory containing the compiled shader modules, relative to the
    /// working directory. Read at init and kept for surface recreation.
    pub shader_directory: std::path::PathBuf,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            vsync: true,
            power_preference: wgpu::PowerPreference::HighPerformance,
            clear_color: wgpu::Color {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                a: 1.0,
            },
            ao_resolution_scale: 0.5,
            shader_directory: std::path::PathBuf::from("shaders"),
        }
    }
}

/// Runtime tuning the debug overlay (an external collaborator) mutates
/// through the renderer's setter surface.
#[derive(Debug, Clone)]
pub struct TuningSettings {
    pub sun_yaw_degrees: f32,
    pub sun_pitch_degrees: f32,

    /// Shadow receiver biasing, in texels at the near/far cascade.
    pub receiver_base_bias_near_texel: f32,
    pub receiver_base_bias_far_texel: f32,
    pub receiver_slope_bias_near_texel: f32,
    pub receiver_slope_bias_far_texel: f32,
    pub receiver_normal_offset_near: f32,
    pub receiver_normal_offset_far: f32,
    pub cascade_blend_min: f32,
    pub cascade_blend_factor: f32,

    /// Caster-side polygon depth bias, per cascade: `base + cascade * slope`.
    pub caster_depth_bias_base: f32,
    pub caster_depth_bias_slope: f32,

    pub ssao_enabled: bool,
    pub ssao_radius: f32,
    pub ssao_strength: f32,

    pub gi_strength: f32,
    pub gi_ambient_rebalance: f32,
    pub gi_ambient_floor: f32,
    /// GI visualization mode, 0..=4 (0 = off / normal shading).
    pub gi_debug_mode: u32,

    pub bloom_threshold: f32,
    pub bloom_soft_knee: f32,
    pub bloom_base_intensity: f32,
    pub bloom_sun_facing_boost: f32,

    pub exposure_compensation: f32,
    pub grass_enabled: bool,
}

impl Default for TuningSettings {
    fn default() -> Self {
        Self {
            sun_yaw_degrees: -45.0,
            sun_pitch_degrees: 70.0,

            receiver_base_bias_near_texel: 1.25,
            receiver_base_bias_far_texel: 2.5,
            receiver_slope_bias_near_texel: 2.0,
            receiver_slope_bias_far_texel: 4.0,
            receiver_normal_offset_near: 0.35,
            receiver_normal_offset_far: 1.2,
            cascade_blend_min: 0.85,
            cascade_blend_factor: 8.0,

            caster_depth_bias_base: 1.1,
            caster_depth_bias_slope: 0.55,

            ssao_enabled: true,
            ssao_radius: 0.85,
            ssao_strength: 1.0,

            gi_strength: 0.70,
            gi_ambient_rebalance: 0.95,
            gi_ambient_floor: 0.55,
            gi_debug_mode: 0,

            bloom_threshold: 1.2,
            bloom_soft_knee: 0.6,
            bloom_base_intensity: 0.35,
            bloom_sun_facing_boost: 0.65,

            exposure_compensation: 0.0,
            grass_enabled: true,
        }
    }
}
