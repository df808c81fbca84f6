//! Analytic sun and sky lighting.
//!
//! Sun direction comes from host-supplied yaw/pitch angles; sun color is
//! an analytic fit attenuating toward the horizon; sky irradiance is a
//! 9-coefficient spherical-harmonics set. At night (sun below the
//! horizon) the sun contribution is zeroed and a constant dark-blue
//! ambient takes over the DC band.

use glam::Vec3;

/// Y00 basis constant; the DC irradiance divides by it.
const SH_Y00: f32 = 0.282_095;

/// Constant dark-blue irradiance used at night.
const NIGHT_AMBIENT_IRRADIANCE: Vec3 = Vec3::new(0.050, 0.078, 0.155);

/// Sun direction from yaw/pitch degrees, with a fixed fallback for a
/// degenerate (near-zero) direction.
#[must_use]
pub fn sun_direction(yaw_degrees: f32, pitch_degrees: f32) -> Vec3 {
    let yaw = yaw_degrees.to_radians();
    let pitch = pitch_degrees.to_radians();
    let cos_pitch = pitch.cos();
    let direction = Vec3::new(yaw.cos() * cos_pitch, pitch.sin(), yaw.sin() * cos_pitch);
    if direction.length_squared() <= 1e-4 {
        Vec3::new(-0.58, -0.42, -0.24)
    } else {
        direction
    }
}

/// Whether the sun is below the horizon.
#[inline]
#[must_use]
pub fn is_night(sun_direction: Vec3) -> bool {
    sun_direction.y <= 0.0
}

/// Analytic sun color: warm white overhead, reddened and dimmed at the
/// horizon. Returns black at night.
#[must_use]
pub fn sun_color(sun_direction: Vec3) -> Vec3 {
    let elevation = sun_direction.y.clamp(0.0, 1.0);
    if elevation <= 0.0 {
        return Vec3::ZERO;
    }
    // Horizon factor drives both reddening and extinction.
    let horizon = (1.0 - elevation).powi(3);
    let zenith_color = Vec3::new(1.0, 0.956, 0.89);
    let horizon_color = Vec3::new(1.0, 0.44, 0.18);
    let color = zenith_color.lerp(horizon_color, horizon);
    let extinction = (elevation * 4.5).min(1.0);
    color * extinction
}

/// 9-coefficient SH irradiance for the sky dome.
///
/// The fit treats the sky as a zenith-to-horizon gradient plus a wrapped
/// directional lobe toward the sun; the linear band carries the sun
/// direction so surfaces facing away receive cooler light.
#[must_use]
pub fn sh_irradiance(sun_direction: Vec3, sun_color: Vec3) -> [Vec3; 9] {
    if is_night(sun_direction) {
        let mut coefficients = [Vec3::ZERO; 9];
        coefficients[0] = NIGHT_AMBIENT_IRRADIANCE * (1.0 / SH_Y00);
        return coefficients;
    }

    let elevation = sun_direction.y.clamp(0.0, 1.0);
    let zenith = Vec3::new(0.28, 0.44, 0.80) * (0.35 + 0.65 * elevation);
    let horizon = Vec3::new(0.62, 0.60, 0.55) * (0.25 + 0.55 * elevation);
    let sun = sun_color * 0.18;

    let dir = sun_direction.normalize_or_zero();
    let mut coefficients = [Vec3::ZERO; 9];
    // DC: average of the gradient plus a fraction of the sun lobe.
    coefficients[0] = (zenith * 0.58 + horizon * 0.42 + sun * 0.5) * (1.0 / SH_Y00);
    // Linear band: vertical gradient on Y, sun lobe on all three axes.
    coefficients[1] = (sun * dir.y + (zenith - horizon) * 0.32) * 1.023_328;
    coefficients[2] = sun * dir.z * 1.023_328;
    coefficients[3] = sun * dir.x * 1.023_328;
    // Quadratic band: small sun-aligned terms only.
    coefficients[4] = sun * (dir.x * dir.y) * 0.858_086;
    coefficients[5] = sun * (dir.y * dir.z) * 0.858_086;
    coefficients[6] = sun * (3.0 * dir.y * dir.y - 1.0) * 0.247_708;
    coefficients[7] = sun * (dir.x * dir.z) * 0.858_086;
    coefficients[8] = sun * (dir.x * dir.x - dir.z * dir.z) * 0.429_043;
    coefficients
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sun_direction_from_yaw_pitch() {
        let dir = sun_direction(-90.0, 30.0);
        assert!((dir - Vec3::new(0.0, 0.5, -0.866_025_4)).length() < 1e-5);
    }

    #[test]
    fn vertical_sun_direction_stays_unit_length() {
        let dir = sun_direction(0.0, 90.0);
        assert!((dir.length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn night_zeroes_sun_and_keeps_ambient_dc() {
        let dir = sun_direction(0.0, -20.0);
        assert!(is_night(dir));
        assert_eq!(sun_color(dir), Vec3::ZERO);
        let sh = sh_irradiance(dir, Vec3::ZERO);
        assert!(sh[0].length() > 0.0);
        for coefficient in &sh[1..] {
            assert_eq!(*coefficient, Vec3::ZERO);
        }
    }
}
