//! GPU-visible data structures.
//!
//! Layouts mirror the WGSL declarations in `shaders/`; every struct is
//! `Pod` and 16-byte aligned per std140-compatible packing. Debug and
//! visualization switches are explicit fields here — they are never
//! smuggled through spare geometry channels.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use super::cascades::SHADOW_CASCADE_COUNT;

/// The per-frame camera/lighting uniform block, bound to every pass.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    pub mvp: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
    pub light_view_proj: [Mat4; SHADOW_CASCADE_COUNT],

    /// Cascade far distances, view-space.
    pub shadow_cascade_splits: Vec4,
    /// Per-cascade atlas UV rect: x, y, width, height in [0,1].
    pub shadow_atlas_uv_rects: [Vec4; SHADOW_CASCADE_COUNT],

    /// xyz = direction toward the sun, w = sun intensity (0 at night).
    pub sun_direction_intensity: Vec4,
    /// rgb = sun color, w = shadow strength.
    pub sun_color_shadow: Vec4,
    pub sh_irradiance: [Vec4; 9],

    /// x,y = receiver normal offset near/far; z,w = base bias near/far
    /// in shadow texels.
    pub shadow_config0: Vec4,
    /// x,y = slope bias near/far in texels; z = cascade blend min;
    /// w = cascade blend factor.
    pub shadow_config1: Vec4,
    /// x = SSAO radius, y = SSAO strength, z,w = AO target texel size.
    pub shadow_config2: Vec4,

    /// xyz = GI grid origin, w = cell size.
    pub gi_grid_origin_cell: Vec4,
    /// xyz = grid world extent, w = GI strength.
    pub gi_grid_extent_strength: Vec4,
    /// x = inject sun scale, y = inject SH scale, z = ambient rebalance,
    /// w = ambient floor.
    pub gi_params: Vec4,

    /// x = GI visualization mode (0..=4), y = AO enabled, z = grass
    /// enabled, w unused.
    pub debug_flags: [u32; 4],

    /// x = bloom threshold, y = soft knee, z = base intensity,
    /// w = sun-facing boost.
    pub bloom_config: Vec4,
    /// x = exposure compensation EV, y = frame time seconds, z,w unused.
    pub exposure_config: Vec4,

    /// xyz = camera position, w = vertical FoV in radians.
    pub camera_position_fov: Vec4,
    /// x,y = framebuffer size, z,w = reciprocal.
    pub viewport: Vec4,
}

/// Uniform block for the voxel-GI compute dispatches.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct GiUniform {
    /// Outer cascade light matrix, for per-cell sun visibility.
    pub light_view_proj: Mat4,
    /// xyz = grid origin, w = cell size.
    pub grid_origin_cell: Vec4,
    /// xyz = direction toward the sun, w = grid resolution as f32.
    pub sun_direction_resolution: Vec4,
    /// rgb = sun color, w = inject sun scale.
    pub sun_color_inject: Vec4,
    pub sh_irradiance: [Vec4; 9],
    /// x = inject SH scale, y = per-iteration propagate decay,
    /// z = sky exposure scale, w unused.
    pub params: Vec4,
}

/// Per-draw parameters bound with a dynamic offset (the push-constant
/// replacement). 256-byte stride per slice.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct DrawParams {
    /// xyz = world-space offset, w = auxiliary scalar (mesh scale,
    /// preview pulse, cascade index — pass-specific).
    pub offset: Vec4,
    /// Pass-specific secondary payload.
    pub payload: Vec4,
}

/// Uniform block for the auto-exposure histogram + reduce dispatches.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ExposureParams {
    pub width: u32,
    pub height: u32,
    pub total_pixels: u32,
    pub bin_count: u32,
    pub min_log_luminance: f32,
    pub inv_log_luminance_range: f32,
    pub ema_alpha: f32,
    pub source_mip: f32,
}

/// Uniform block for the sun-shaft march.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ShaftParams {
    pub inverse_view_proj: Mat4,
    pub light_view_proj: Mat4,
    /// xyz = direction toward the sun, w = intensity.
    pub sun_direction_intensity: Vec4,
    /// x,y = output size, z,w = reciprocal.
    pub output_size: Vec4,
    /// xyz = camera position, w = march step count.
    pub camera_steps: Vec4,
}

/// Dynamic-offset stride for [`DrawParams`] slices.
pub const DRAW_PARAMS_STRIDE: u64 = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<CameraUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<GiUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<ShaftParams>() % 16, 0);
        assert_eq!(std::mem::size_of::<ExposureParams>() % 16, 0);
    }

    #[test]
    fn draw_params_fit_their_stride() {
        assert!(std::mem::size_of::<DrawParams>() as u64 <= DRAW_PARAMS_STRIDE);
    }
}
