//! Per-surface material record consumed by shaders. Mirrors the layout the
//! GPU-side `Kusok[MAX_KUSOCHKI]` storage buffer expects: a flat struct, no
//! padding surprises, `repr(C)` so its size matches the staging copy size
//! the RT model manager uses directly as a byte count.

use glam::{Mat4, Vec3};

use crate::shader_abi::MaterialMode;

/// Half of the `Kusok[MAX_KUSOCHKI]` buffer reserved for map-load-time
/// (static) geometry; the other half is reused every frame for dynamic
/// draws. The two halves never interleave.
pub const MAX_KUSOCHKI: usize = 1 << 14;

/// Texture handle as exposed to the GPU material record: an index into the
/// host engine's texture table, or `NONE` for an unused slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TextureRef(pub u32);

impl TextureRef {
    pub const NONE: TextureRef = TextureRef(u32::MAX);

    pub fn is_some(&self) -> bool {
        *self != Self::NONE
    }
}

/// Material parameters of a [`Kusok`].
#[derive(Clone, Copy, Debug)]
pub struct KusokMaterial {
    pub tex_base_color: TextureRef,
    pub tex_metalness: TextureRef,
    pub tex_roughness: TextureRef,
    pub tex_normalmap: TextureRef,
    /// `(metalness, roughness, normal_scale, ior)` style scalar factors,
    /// applied on top of whatever the textures above sample.
    pub factors: [f32; 4],
    pub mode: MaterialMode,
}

/// A single per-surface record, one per triangle range of the geometry
/// buffer.
#[derive(Clone, Copy, Debug)]
pub struct Kusok {
    pub index_offset: u32,
    pub vertex_offset: u32,
    pub triangle_count: u32,
    pub emissive: Vec3,
    pub material: KusokMaterial,
    pub model_color: Vec3,
    /// Previous frame's model-to-world transform, for motion-vector
    /// generation and TAA-adjacent reprojection.
    pub prev_transform: Mat4,
}

/// Static/dynamic partitioning of the `Kusok` storage buffer: the same
/// half-and-half split the backend's DE-buffer uses, applied here to the
/// kusochki range specifically.
pub struct KusokAllocator {
    static_next: usize,
    dynamic_next: usize,
    static_len: usize,
}

impl KusokAllocator {
    /// `static_len` is the size of the static half; the dynamic half is
    /// whatever remains of `MAX_KUSOCHKI`.
    pub fn new(static_len: usize) -> Self {
        assert!(static_len <= MAX_KUSOCHKI, "static half must fit in MAX_KUSOCHKI");
        Self { static_next: 0, dynamic_next: static_len, static_len }
    }

    /// The split production code actually uses: an even half-and-half
    /// partition of `MAX_KUSOCHKI`, matching the fixed static/dynamic
    /// allocation the backend's kusok storage buffer is sized for.
    pub fn with_fixed_split() -> Self {
        Self::new(MAX_KUSOCHKI / 2)
    }

    /// Reserves `num_geoms` consecutive static slots at map load. Returns
    /// `None` if the static half is full.
    pub fn reserve_static(&mut self, num_geoms: usize) -> Option<usize> {
        let offset = self.static_next;
        if offset + num_geoms > self.static_len {
            return None;
        }
        self.static_next += num_geoms;
        Some(offset)
    }

    /// Reserves `num_geoms` consecutive dynamic slots; resets to the start of
    /// the dynamic half on [`KusokAllocator::flip`].
    pub fn reserve_dynamic(&mut self, num_geoms: usize) -> Option<usize> {
        let offset = self.dynamic_next;
        if offset + num_geoms > MAX_KUSOCHKI {
            return None;
        }
        self.dynamic_next += num_geoms;
        Some(offset)
    }

    /// Starts a new frame's dynamic allocations from the top of the dynamic half.
    pub fn flip(&mut self) {
        self.dynamic_next = self.static_len;
    }

    pub fn static_len(&self) -> usize {
        self.static_len
    }
}
