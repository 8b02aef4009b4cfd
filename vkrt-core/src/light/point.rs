use std::f32::consts::PI;

use bitflags::bitflags;
use glam::Vec3;

/// Solid angle of the sun as seen from Earth, used as the baseline an
/// environment light's configured solid angle is clamped against so a
/// disk larger than the sun never gets *brighter* per-steradian than the
/// sun itself.
const BASELINE_SOLID_ANGLE: f32 = 6.794e-5;
const BASELINE_COS_THETA: f32 = 1.0 - BASELINE_SOLID_ANGLE / (2.0 * PI);

/// `cos(theta_max)` of the cone an environment light's disk subtends, given
/// its configured solid angle. Clamped to the baseline so a very large
/// configured solid angle never narrows the cone below the baseline.
pub fn environment_cos_theta_max(solid_angle: f32) -> f32 {
    BASELINE_COS_THETA.min(1.0 - solid_angle / (2.0 * PI))
}

/// Scales a color/attenuation value so that the emitted radiance integrated
/// over the disk stays the same regardless of how wide the disk actually
/// is: a bigger disk at the same total power must be dimmer per-steradian.
pub fn environment_radiance_correction(cos_theta_max: f32) -> f32 {
    (1.0 - BASELINE_COS_THETA) / (1.0 - cos_theta_max)
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct PointLightFlags: u32 {
        /// Environment (sun/sky) light: affects every cell, not just the
        /// cells within its origin leaf's PVS.
        const ENVIRONMENT = 1 << 0;
    }
}

/// A point, spot, or environment light.
#[derive(Clone, Copy, Debug)]
pub struct PointLight {
    pub origin: Vec3,
    pub radius: f32,
    /// Color before lightstyle scaling.
    pub base_color: Vec3,
    /// Color after the current frame's lightstyle scaling is applied.
    pub color: Vec3,
    /// Spot direction; unused for plain point lights.
    pub dir: Vec3,
    /// Cosine of the spot's inner cone angle.
    pub stopdot: f32,
    /// Cosine of the spot's outer cone angle, or (for environment lights)
    /// `cos(theta_max)` derived from the configured solid angle.
    pub stopdot2_or_costheta: f32,
    /// Index into the host engine's lightstyle table.
    pub style: u8,
    pub flags: PointLightFlags,
}

impl PointLight {
    pub fn is_environment(&self) -> bool {
        self.flags.contains(PointLightFlags::ENVIRONMENT)
    }

    /// Builds the single environment (sun/sky) light: its cone is derived
    /// from `solid_angle` via [`environment_cos_theta_max`], and `color` is
    /// scaled by [`environment_radiance_correction`] so the disk's total
    /// emitted radiance stays put regardless of how wide the cone ended up.
    pub fn new_environment(origin: Vec3, color: Vec3, radius: f32, solid_angle: f32, style: u8) -> Self {
        let cos_theta_max = environment_cos_theta_max(solid_angle);
        let corrected = color * environment_radiance_correction(cos_theta_max);
        Self {
            origin,
            radius,
            base_color: corrected,
            color: corrected,
            dir: Vec3::ZERO,
            stopdot: -1.0,
            stopdot2_or_costheta: cos_theta_max,
            style,
            flags: PointLightFlags::ENVIRONMENT,
        }
    }

    /// Applies the lightstyle scale for this frame: `base_color * value/255`.
    pub fn apply_lightstyle(&mut self, style_value: u8) {
        let scale = style_value as f32 / 255.0;
        self.color = self.base_color * scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wider_solid_angle_than_the_baseline_still_clamps_to_the_baseline_cone() {
        // A solid angle much larger than the sun's must not widen the cone
        // past the baseline: the clamp always picks the narrower of the two.
        let cos_theta = environment_cos_theta_max(1.0);
        assert_eq!(cos_theta, BASELINE_COS_THETA);
    }

    #[test]
    fn narrower_solid_angle_than_the_baseline_narrows_the_cone_and_brightens_the_correction() {
        let narrow = environment_cos_theta_max(BASELINE_SOLID_ANGLE / 4.0);
        assert!(narrow > BASELINE_COS_THETA, "a smaller disk has a narrower (larger-cosine) cone");
        assert!(environment_radiance_correction(narrow) > 1.0, "a narrower cone needs a brighter per-steradian correction");
    }

    #[test]
    fn baseline_solid_angle_needs_no_correction() {
        let cos_theta = environment_cos_theta_max(BASELINE_SOLID_ANGLE);
        assert!((environment_radiance_correction(cos_theta) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn new_environment_sets_flags_and_omnidirectional_stopdot() {
        let light = PointLight::new_environment(Vec3::new(0.0, 0.0, 1000.0), Vec3::splat(700.0), 2.0, BASELINE_SOLID_ANGLE, 0);
        assert!(light.is_environment());
        assert_eq!(light.stopdot, -1.0);
        assert!((light.stopdot2_or_costheta - BASELINE_COS_THETA).abs() < 1e-4);
    }
}
