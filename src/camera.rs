//! Camera pose and per-frame derived camera math.
//!
//! The renderer does not own an input loop; the host hands it a
//! [`CameraPose`] every frame and the functions here derive the view
//! basis, the chunk the camera occupies, and the reverse-Z projection
//! matrices used by every pass.

use glam::{Mat4, Vec3};

use crate::world::chunk::{CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z};

/// Camera pose as supplied by the host each frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraPose {
    pub position: Vec3,
    pub yaw_degrees: f32,
    pub pitch_degrees: f32,
    pub fov_degrees: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 24.0, 0.0),
            yaw_degrees: -90.0,
            pitch_degrees: -12.0,
            fov_degrees: 70.0,
        }
    }
}

/// Values derived from the camera pose once per frame.
#[derive(Debug, Clone, Copy)]
pub struct CameraFrame {
    pub forward: Vec3,
    pub chunk_x: i32,
    pub chunk_y: i32,
    pub chunk_z: i32,
}

/// Forward vector from yaw/pitch in degrees.
#[must_use]
pub fn camera_forward(yaw_degrees: f32, pitch_degrees: f32) -> Vec3 {
    let yaw = yaw_degrees.to_radians();
    let pitch = pitch_degrees.to_radians();
    let cos_pitch = pitch.cos();
    Vec3::new(yaw.cos() * cos_pitch, pitch.sin(), yaw.sin() * cos_pitch)
}

/// Derives the forward vector and integer chunk coordinates of the camera.
#[must_use]
pub fn camera_frame(camera: &CameraPose) -> CameraFrame {
    CameraFrame {
        forward: camera_forward(camera.yaw_degrees, camera.pitch_degrees),
        chunk_x: (camera.position.x / CHUNK_SIZE_X as f32).floor() as i32,
        chunk_y: (camera.position.y / CHUNK_SIZE_Y as f32).floor() as i32,
        chunk_z: (camera.position.z / CHUNK_SIZE_Z as f32).floor() as i32,
    }
}

/// Right-handed view matrix looking along the camera forward vector.
#[must_use]
pub fn view_matrix(camera: &CameraPose) -> Mat4 {
    let forward = camera_forward(camera.yaw_degrees, camera.pitch_degrees);
    Mat4::look_at_rh(camera.position, camera.position + forward, Vec3::Y)
}

/// Reverse-Z perspective projection (near plane maps to depth 1, far to 0)
/// with the Y flip the surface coordinate system expects.
#[must_use]
pub fn perspective_reverse_z(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    // Standard [0,1] projection with near/far swapped gives the reversed
    // depth mapping without a separate remap matrix.
    Mat4::perspective_rh(fov_y_radians, aspect, far, near)
}

/// Reverse-Z orthographic projection for light-space cascade volumes.
#[must_use]
pub fn orthographic_reverse_z(
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
) -> Mat4 {
    Mat4::orthographic_rh(left, right, bottom, top, far, near)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_frame_forward_and_chunk_indices() {
        let pose = CameraPose {
            position: Vec3::new(32.5, -15.2, 15.9),
            yaw_degrees: 90.0,
            pitch_degrees: 0.0,
            fov_degrees: 70.0,
        };
        let frame = camera_frame(&pose);
        assert!((frame.forward - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-5);
        assert_eq!(frame.chunk_x, 1);
        assert_eq!(frame.chunk_y, -1);
        assert_eq!(frame.chunk_z, 0);
    }

    #[test]
    fn reverse_z_perspective_maps_near_to_one() {
        let proj = perspective_reverse_z(70.0_f32.to_radians(), 16.0 / 9.0, 0.1, 600.0);
        let near_clip = proj * glam::Vec4::new(0.0, 0.0, -0.1, 1.0);
        let far_clip = proj * glam::Vec4::new(0.0, 0.0, -600.0, 1.0);
        assert!((near_clip.z / near_clip.w - 1.0).abs() < 1e-4);
        assert!((far_clip.z / far_clip.w).abs() < 1e-4);
    }
}
