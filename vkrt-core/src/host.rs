//! The two boundary traits between the core and the host engine, standing in
//! for the `ref_interface_t`/`ref_api_t` pair of function-pointer tables the
//! host engine's C ABI uses at this seam; this crate models each direction
//! as one object-safe trait so the host engine and the renderer can each
//! hold the other behind a `dyn` reference without generic parameters
//! leaking into every call site.

use glam::{Mat4, Vec3};

use crate::geom::{LeafId, MapTopology, SurfaceId};
use crate::Error;

/// A loaded image as handed back by [`HostEngine::load_image_file`].
pub struct LoadedImage {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub mip_count: u32,
    pub bytes: Vec<u8>,
}

/// Pixel formats the host's file loader may hand back; kept small and
/// explicit rather than wrapping `ash::vk::Format` here, since `vkrt-core`
/// has no Vulkan dependency.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ImageFormat {
    Rgba8Unorm,
    Rgba8Srgb,
    Bc1Unorm,
    Bc3Unorm,
    Bc5Unorm,
    Bc7Unorm,
    Bc7Srgb,
}

/// Read-only per-frame configuration surface the host engine supplies.
/// Parsing the underlying cvars/config files is a host engine concern.
#[derive(Clone, Copy, Debug)]
pub struct RendererConfig {
    pub ray_tracing_enabled: bool,
    pub ray_bounce_count: u32,
    pub debug_validation: bool,
    pub debug_overlay: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self { ray_tracing_enabled: true, ray_bounce_count: 4, debug_validation: false, debug_overlay: false }
    }
}

/// Everything the core calls on the host engine: map/model accessors, file
/// loading, configuration, time/random sources, and a console log sink.
pub trait HostEngine: MapTopology {
    /// Loads an image referenced by a relative path (textures, lightmaps).
    /// Returns `Err` if the file does not exist or fails to decode; the
    /// caller treats that as a recoverable per-texture failure, not fatal.
    fn load_image_file(&self, relative_path: &str) -> Result<LoadedImage, Error>;

    /// Current per-frame configuration snapshot.
    fn config(&self) -> RendererConfig;

    /// Monotonic engine time in seconds, used for dlight lifetime and
    /// staging frame tags.
    fn time_seconds(&self) -> f64;

    /// A host-supplied pseudo-random float in `[0, 1)`, used for TAA jitter
    /// and similar non-deterministic-but-reproducible sampling; the host
    /// owns the RNG so replays/demos stay deterministic across runs.
    fn random_unit(&self) -> f32;

    /// Current value of a lightstyle's brightness table at `style`, already
    /// resolved to `0..=255` for the current frame.
    fn lightstyle_value(&self, style: u8) -> u8;

    /// Surface reference describing emissive surfaces known at the current
    /// map (from the `.rad`-like side channel and per-surface overrides);
    /// parsing those files is a host engine concern, this crate only
    /// receives the resolved records.
    fn emissive_surfaces(&self) -> &[EmissiveSurfaceRecord];

    /// Writes one line to the host's console/log sink, in addition to
    /// whatever this crate's own [`crate::log`] facility records.
    fn console_log(&self, level: crate::log::LogLevel, line: &str);

    /// Resolves `surface` into the world-space vertex loop the light grid
    /// should treat as its polygon.
    fn surface_vertices(&self, surface: SurfaceId) -> &[Vec3];

    /// Index-of this surface into [`HostEngine::emissive_surfaces`], if it is
    /// marked emissive.
    fn emissive_record_for_surface(&self, surface: SurfaceId) -> Option<&EmissiveSurfaceRecord>;
}

/// One resolved emissive-surface entry, after the host has applied the
/// `.rad` side-channel and any per-surface patch overrides.
#[derive(Clone, Copy, Debug)]
pub struct EmissiveSurfaceRecord {
    pub surface: SurfaceId,
    pub radiance: Vec3,
}

/// A view the host asks the renderer to produce a frame for.
#[derive(Clone, Copy, Debug)]
pub struct ViewPass {
    pub origin: Vec3,
    /// Pitch/yaw/roll, in degrees, matching the host engine's entity angle convention.
    pub angles: Vec3,
    pub fov_degrees: f32,
    pub viewport: Viewport,
    pub near_plane: f32,
    pub far_plane: f32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// What kind of renderable an `add_entity` call refers to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EntityKind {
    BrushModel,
    StudioModel,
    Sprite,
    Beam,
}

/// Opaque handle into the host's own entity table; the core never
/// interprets this beyond using it as a cache/lookup key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EntityHandle(pub u32);

/// A texture handle, as returned by [`Renderer::upload_texture_from_memory`]
/// / [`Renderer::upload_texture_from_file`]. Carries two independent
/// refcounts: one for
/// host-engine visibility, one for material references, because the host
/// may re-acquire a texture it has already released on its own side.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TextureHandle(pub u32);

/// What kind of screenshot the host is requesting.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScreenshotKind {
    /// The currently presented frame, as seen on screen.
    Presented,
    /// A render at an arbitrary resolution, independent of the live swapchain.
    Offscreen { width: u32, height: u32 },
}

/// An RGBA8 pixel buffer returned by [`Renderer::screenshot`].
pub struct RgbaBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Material info for a texture, as consumed by legacy/fixed-function code
/// paths that still need to know how a texture's surface behaves.
#[derive(Clone, Copy, Debug)]
pub struct MaterialInfo {
    pub mode: crate::shader_abi::MaterialMode,
    pub emissive: Vec3,
}

bitflags::bitflags! {
    /// Flags passed alongside a [`Renderer::get_material_for_texture`] query.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct MaterialQueryFlags: u32 {
        const FORCE_OPAQUE = 1 << 0;
    }
}

/// Everything the host engine calls on the core. Object-safe so the host holds this behind a single
/// `dyn Renderer` regardless of backend.
pub trait Renderer {
    fn begin_frame(&mut self, clear_scene: bool) -> Result<(), Error>;
    fn render_frame(&mut self, view: ViewPass) -> Result<(), Error>;
    fn end_frame(&mut self) -> Result<(), Error>;

    fn add_entity(&mut self, kind: EntityKind, handle: EntityHandle);
    fn clear_scene(&mut self);
    fn push_scene(&mut self);
    fn pop_scene(&mut self);

    fn screenshot(&mut self, kind: ScreenshotKind) -> Result<RgbaBuffer, Error>;

    fn upload_texture_from_memory(&mut self, name: &str, image: LoadedImage) -> Result<TextureHandle, Error>;
    fn upload_texture_from_file(&mut self, relative_path: &str) -> Result<TextureHandle, Error>;
    /// Releases one reference. The texture's backing memory is freed only
    /// once both the host-visibility and material-reference counts reach
    /// zero.
    fn free_texture(&mut self, handle: TextureHandle);

    fn get_material_for_texture(&self, handle: TextureHandle, flags: MaterialQueryFlags) -> Option<MaterialInfo>;
}

/// Model-to-world transform convenience, shared by both directions of the
/// boundary (entities report these, the RT model manager consumes them).
pub fn transform_to_3x4(m: Mat4) -> [[f32; 4]; 3] {
    let cols = m.transpose().to_cols_array_2d();
    [cols[0], cols[1], cols[2]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_to_3x4_drops_the_bottom_row() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let rows = transform_to_3x4(m);
        assert_eq!(rows[0][3], 1.0);
        assert_eq!(rows[1][3], 2.0);
        assert_eq!(rows[2][3], 3.0);
    }
}
