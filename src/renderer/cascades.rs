//! Shadow cascade fitting.
//!
//! Four concentric cascades share one depth atlas. Stability is the
//! whole game here: splits are quantized and only move past a
//! hysteresis threshold, the bounding radius per cascade never shrinks
//! while projection parameters hold, and the cascade center snaps to
//! per-texel steps along the light's right/up axes so a creeping camera
//! cannot shimmer the shadow edges.

use glam::{Mat4, Vec3};

use crate::camera::orthographic_reverse_z;

pub const SHADOW_CASCADE_COUNT: usize = 4;

/// Side length of the shared depth atlas.
pub const SHADOW_ATLAS_SIZE: u32 = 4096;

/// Atlas rectangle of one cascade.
#[derive(Debug, Clone, Copy)]
pub struct AtlasRect {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

pub const SHADOW_ATLAS_RECTS: [AtlasRect; SHADOW_CASCADE_COUNT] = [
    AtlasRect { x: 0, y: 0, size: 2048 },
    AtlasRect { x: 2048, y: 0, size: 2048 },
    AtlasRect { x: 0, y: 2048, size: 2048 },
    AtlasRect { x: 2048, y: 2048, size: 2048 },
];

pub const SHADOW_CASCADE_RESOLUTION: [u32; SHADOW_CASCADE_COUNT] = [2048, 2048, 2048, 2048];

/// Cascades that also render grass billboards (near cascades only).
pub const GRASS_SHADOW_CASCADE_COUNT: usize = 2;

/// Log/uniform split blend factor.
pub const CASCADE_LAMBDA: f32 = 0.70;

/// Splits snap to this step.
pub const CASCADE_SPLIT_QUANTIZATION: f32 = 0.5;

/// A quantized split only replaces the previous one when it moved by
/// more than this.
pub const CASCADE_SPLIT_UPDATE_THRESHOLD: f32 = 0.5;

/// One fitted cascade for the current frame.
#[derive(Debug, Clone, Copy)]
pub struct CascadeFit {
    pub view_proj: Mat4,
    pub radius: f32,
    pub texel_size: f32,
    pub light_right: Vec3,
    pub light_up: Vec3,
    pub snapped_center: Vec3,
}

/// Per-frame cascade outputs.
#[derive(Debug, Clone, Copy)]
pub struct CascadeFrame {
    pub splits: [f32; SHADOW_CASCADE_COUNT],
    pub cascades: [CascadeFit; SHADOW_CASCADE_COUNT],
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ProjectionParams {
    near: f32,
    far: f32,
    fov_y: f32,
    aspect: f32,
}

/// Session-persistent cascade state.
#[derive(Debug, Default)]
pub struct CascadeState {
    splits: [f32; SHADOW_CASCADE_COUNT],
    stable_radii: [f32; SHADOW_CASCADE_COUNT],
    projection_params: Option<ProjectionParams>,
}

/// Blended log/uniform split before quantization.
#[must_use]
pub fn desired_split(index: usize, count: usize, near: f32, far: f32, lambda: f32) -> f32 {
    let p = (index + 1) as f32 / count as f32;
    let logarithmic = near * (far / near).powf(p);
    let uniform = near + (far - near) * p;
    lambda * logarithmic + (1.0 - lambda) * uniform
}

/// Rounds a split to the quantization step.
#[must_use]
pub fn quantize_split(split: f32) -> f32 {
    (split / CASCADE_SPLIT_QUANTIZATION).round() * CASCADE_SPLIT_QUANTIZATION
}

/// Padded, 1/16-rounded bounding-sphere radius of a cascade sub-frustum.
#[must_use]
pub fn cascade_bounding_radius(cascade_far: f32, tan_half_fov: f32, aspect: f32) -> f32 {
    let far_half_height = cascade_far * tan_half_fov;
    let far_half_width = far_half_height * aspect;
    let radius = (cascade_far * cascade_far
        + far_half_width * far_half_width
        + far_half_height * far_half_height)
        .sqrt();
    let radius = (radius * 1.04).max(24.0);
    (radius * 16.0).ceil() / 16.0
}

/// Light basis for a direction toward the sun, swapping the up-hint when
/// the sun is near the vertical.
#[must_use]
pub fn light_basis(to_sun: Vec3) -> (Vec3, Vec3, Vec3) {
    let forward = (-to_sun).normalize_or_zero();
    let up_hint = if forward.dot(Vec3::Y).abs() > 0.95 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let right = forward.cross(up_hint).normalize();
    let up = right.cross(forward);
    (forward, right, up)
}

/// Snaps a scalar coordinate to whole texel steps.
#[inline]
#[must_use]
pub fn snap_to_texel(value: f32, texel_size: f32) -> f32 {
    (value / texel_size + 0.5).floor() * texel_size
}

impl CascadeState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fits all cascades around the camera for this frame.
    ///
    /// `to_sun` points from the scene toward the sun.
    pub fn update(
        &mut self,
        eye: Vec3,
        to_sun: Vec3,
        near: f32,
        far: f32,
        fov_y_radians: f32,
        aspect: f32,
    ) -> CascadeFrame {
        let params = ProjectionParams {
            near,
            far,
            fov_y: fov_y_radians,
            aspect,
        };
        let projection_changed = self.projection_params != Some(params);
        if projection_changed {
            self.projection_params = Some(params);
            self.stable_radii = [0.0; SHADOW_CASCADE_COUNT];
        }

        // Quantized, hysteresis-damped split distances in strictly
        // increasing order.
        let mut splits = [0.0f32; SHADOW_CASCADE_COUNT];
        for index in 0..SHADOW_CASCADE_COUNT {
            let quantized = quantize_split(desired_split(
                index,
                SHADOW_CASCADE_COUNT,
                near,
                far,
                CASCADE_LAMBDA,
            ));
            let mut split = self.splits[index];
            if projection_changed || (quantized - split).abs() > CASCADE_SPLIT_UPDATE_THRESHOLD {
                split = quantized;
            }
            let previous = if index == 0 { near } else { self.splits[index - 1] };
            split = split.max(previous + CASCADE_SPLIT_QUANTIZATION).min(far);
            self.splits[index] = split;
            splits[index] = split;
        }

        let tan_half_fov = (fov_y_radians * 0.5).tan();
        let (forward, right, up) = light_basis(to_sun);

        let mut cascades = [CascadeFit {
            view_proj: Mat4::IDENTITY,
            radius: 0.0,
            texel_size: 0.0,
            light_right: right,
            light_up: up,
            snapped_center: eye,
        }; SHADOW_CASCADE_COUNT];

        for index in 0..SHADOW_CASCADE_COUNT {
            // Cascade centers follow only the camera position; rotation
            // must not move them or edges swim on look-around.
            let bounding = cascade_bounding_radius(splits[index], tan_half_fov, aspect);
            if self.stable_radii[index] <= 0.0 {
                self.stable_radii[index] = bounding;
            }
            let radius = self.stable_radii[index];
            let ortho_width = 2.0 * radius;
            let texel_size = ortho_width / SHADOW_CASCADE_RESOLUTION[index] as f32;

            let center_right = eye.dot(right);
            let center_up = eye.dot(up);
            let snapped_center = eye
                + right * (snap_to_texel(center_right, texel_size) - center_right)
                + up * (snap_to_texel(center_up, texel_size) - center_up);

            // Light far enough behind the cascade sphere without blowing
            // out the depth span.
            let light_distance = radius * 1.9 + 48.0;
            let light_position = snapped_center - forward * light_distance;
            let view = Mat4::look_at_rh(light_position, snapped_center, up);

            let caster_padding = (radius * 0.35).max(24.0);
            let light_near = (light_distance - radius - caster_padding).max(0.1);
            let light_far = light_distance + radius + caster_padding;
            let projection =
                orthographic_reverse_z(-radius, radius, -radius, radius, light_near, light_far);

            cascades[index] = CascadeFit {
                view_proj: projection * view,
                radius,
                texel_size,
                light_right: right,
                light_up: up,
                snapped_center,
            };
        }

        CascadeFrame { splits, cascades }
    }

    #[must_use]
    pub fn splits(&self) -> [f32; SHADOW_CASCADE_COUNT] {
        self.splits
    }
}
