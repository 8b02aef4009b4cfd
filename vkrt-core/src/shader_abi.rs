//! Fixed numeric constants shared with shader source. These values cannot be renumbered without updating the shader
//! side in lockstep; they are `static_assertions`-checked against their
//! expected discriminants so an accidental reorder fails to compile instead
//! of silently desyncing host and device.

use bitflags::bitflags;
use static_assertions::const_assert_eq;

/// Render material mode, selects the BSDF/blend behavior a kusok uses.
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MaterialMode {
    Opaque = 0,
    AlphaTest = 1,
    Translucent = 2,
    BlendAdd = 3,
    BlendMix = 4,
    BlendGlow = 5,
}

const_assert_eq!(MaterialMode::Opaque as u32, 0);
const_assert_eq!(MaterialMode::AlphaTest as u32, 1);
const_assert_eq!(MaterialMode::Translucent as u32, 2);
const_assert_eq!(MaterialMode::BlendAdd as u32, 3);
const_assert_eq!(MaterialMode::BlendMix as u32, 4);
const_assert_eq!(MaterialMode::BlendGlow as u32, 5);

bitflags! {
    /// Per-geometry flags passed to `VkAccelerationStructureGeometryKHR`
    /// construction and re-derived by shaders from the kusok record.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct GeometryFlags: u32 {
        const OPAQUE        = 1;
        const ALPHA_TEST    = 2;
        const BLEND         = 4;
        const REFRACTIVE    = 8;
        const CASTS_SHADOW  = 16;
    }
}

/// Legacy fixed-function render type, as produced by the host engine's
/// entity render-mode field. Mapped to [`MaterialMode`] via
/// [`material_mode_for_render_type`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LegacyRenderType {
    Solid,
    AlphaTest,
    /// `A*srcA + (1-srcA)*dst`, depth read+write.
    TransAlphaRw,
    /// `A*srcA + (1-srcA)*dst`, depth read-only.
    TransAlphaRo,
    /// `srcA + dst`, depth read-only.
    TransAddSrcAlphaRo,
    /// `1*src + 1*dst`, depth read-only.
    TransAddOneRo,
    /// Additive, no depth.
    Glow,
}

/// Depth-test behavior associated with a [`MaterialMode`] mapping.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DepthMode {
    /// Depth read and write.
    ReadWrite,
    /// Depth test, no write.
    ReadOnly,
    /// No depth test.
    Off,
}

/// Blend behavior associated with a [`MaterialMode`] mapping.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlendMode {
    Off,
    AlphaTest,
    Over,
    Add,
}

/// Maps a legacy fixed-function render type to `(material_mode, blend, depth)`.
/// The mapping is hard-coded; an unrecognized render type is
/// a fatal error for the calling frame but must not corrupt any cache state,
/// so this returns `None` rather than panicking.
pub fn material_mode_for_render_type(rt: LegacyRenderType) -> Option<(MaterialMode, BlendMode, DepthMode)> {
    use MaterialMode::*;
    Some(match rt {
        LegacyRenderType::Solid => (Opaque, BlendMode::Off, DepthMode::ReadWrite),
        LegacyRenderType::AlphaTest => (AlphaTest, BlendMode::AlphaTest, DepthMode::ReadWrite),
        LegacyRenderType::TransAlphaRw => (Translucent, BlendMode::Over, DepthMode::ReadWrite),
        LegacyRenderType::TransAlphaRo => (Translucent, BlendMode::Over, DepthMode::ReadOnly),
        LegacyRenderType::TransAddSrcAlphaRo => (BlendAdd, BlendMode::Add, DepthMode::ReadOnly),
        LegacyRenderType::TransAddOneRo => (BlendAdd, BlendMode::Add, DepthMode::ReadOnly),
        LegacyRenderType::Glow => (BlendGlow, BlendMode::Add, DepthMode::Off),
    })
}

/// Hit-group slot offsets within the shader binding table, grouped by the
/// two instance groups the TLAS build produces (opaque-ish vs. everything
/// else) and indexed by material kind within a group.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HitGroupOffsets {
    pub regular: u32,
    pub alpha_test: u32,
    pub additive: u32,
}

pub const HIT_GROUPS: [HitGroupOffsets; 2] = [
    HitGroupOffsets { regular: 0, alpha_test: 1, additive: 2 },
    HitGroupOffsets { regular: 3, alpha_test: 4, additive: 5 },
];

/// Miss-shader slot offsets.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MissShaderOffsets {
    pub regular: u32,
    pub shadow: u32,
    pub empty: u32,
}

pub const MISS_SHADERS: MissShaderOffsets = MissShaderOffsets { regular: 0, shadow: 1, empty: 2 };

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mapping_would_be_impossible_because_enum_is_exhaustive() {
        // Every LegacyRenderType variant maps to a mode; a new variant
        // without a match arm fails to compile, not at runtime.
        for rt in [
            LegacyRenderType::Solid,
            LegacyRenderType::AlphaTest,
            LegacyRenderType::TransAlphaRw,
            LegacyRenderType::TransAlphaRo,
            LegacyRenderType::TransAddSrcAlphaRo,
            LegacyRenderType::TransAddOneRo,
            LegacyRenderType::Glow,
        ] {
            assert!(material_mode_for_render_type(rt).is_some());
        }
    }

    #[test]
    fn glow_has_no_depth_and_additive_blend() {
        let (mode, blend, depth) = material_mode_for_render_type(LegacyRenderType::Glow).unwrap();
        assert_eq!(mode, MaterialMode::BlendGlow);
        assert_eq!(blend, BlendMode::Add);
        assert_eq!(depth, DepthMode::Off);
    }
}
