//! RT model & TLAS manager: a fixed-size BLAS cache keyed by geometry
//! signature, per-frame kusok upload with change-detection skipping, the
//! render-type→material-mode mapping, and TLAS build from visible draws.

use ash::extensions::khr::AccelerationStructure;
use ash::vk;
use glam::{Mat4, Vec3};

use vkrt_core::log::{LogCategory, LogThrottle};
use vkrt_core::log_warning;
use vkrt_core::shader_abi::MaterialMode;

use crate::error::Result;

const LOG: LogCategory = LogCategory::new("model_cache");

/// One `(type, flags, max_vertex, stride, formats)` entry of a geometry
/// signature.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GeomDesc {
    pub geom_type: u32,
    pub flags: u32,
    pub max_vertex: u32,
    pub stride: u32,
    pub vertex_format: u32,
}

/// A model's geometry signature: two cache entries with equal signatures
/// are considered interchangeable for BLAS reuse.
pub type GeometrySignature = Vec<GeomDesc>;

/// An opaque `(slot, block)`-style handle into the backing AS memory
/// allocation; the cache does not interpret it beyond tracking ranges for
/// the debug-only overlap assertion.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AsRange {
    pub slot_index: usize,
    pub offset: u64,
    pub size: u64,
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub taken: bool,
    pub dynamic: bool,
    pub geometry: GeometrySignature,
    pub as_range: AsRange,
    pub max_prims: u32,
    pub kusochki_offset: usize,
    pub material_mode: MaterialMode,
    pub color: Vec3,
    pub prev_transform: Mat4,
}

/// A request to find-or-create a cache entry.
pub struct ModelRequest {
    pub geometry: GeometrySignature,
    pub dynamic: bool,
    pub material_mode: MaterialMode,
    pub color: Vec3,
    pub prev_transform: Mat4,
}

pub struct ModelCache {
    entries: Vec<CacheEntry>,
    capacity: usize,
    throttle: LogThrottle,
}

impl ModelCache {
    pub fn new(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity), capacity, throttle: LogThrottle::new(std::time::Duration::from_secs(5)) }
    }

    fn signature_matches(a: &GeometrySignature, b: &GeometrySignature) -> bool {
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
    }

    /// Walks the cache for a free slot with a matching signature; if none
    /// matches and an empty slot exists, allocates a fresh entry via
    /// `build_blas`. Returns the slot index, or `None` if the cache is full
    /// and no matching free slot exists, which is non-fatal: the caller just
    /// drops the draw for this frame.
    ///
    /// `reserve_kusochki` reserves `geometry.len()` consecutive kusochki
    /// slots via the caller's DE-buffer allocator, keyed by the request's
    /// `dynamic` flag.
    pub fn get_or_create(
        &mut self,
        req: ModelRequest,
        reserve_kusochki: impl FnOnce(usize) -> Option<usize>,
        build_blas: impl FnOnce(&GeometrySignature) -> (AsRange, u32),
    ) -> Option<usize> {
        if let Some(index) = self
            .entries
            .iter()
            .position(|e| !e.taken && Self::signature_matches(&e.geometry, &req.geometry))
        {
            let entry = &mut self.entries[index];
            entry.taken = true;
            entry.dynamic = req.dynamic;
            entry.material_mode = req.material_mode;
            entry.color = req.color;
            entry.prev_transform = req.prev_transform;
            return Some(index);
        }

        if self.entries.len() >= self.capacity {
            if self.throttle.should_log("blas_cache_full", std::time::Instant::now()) {
                log_warning!(LOG, "BLAS cache full ({} entries), dropping model request", self.capacity);
            }
            return None;
        }

        let Some(kusochki_offset) = reserve_kusochki(req.geometry.len()) else {
            return None;
        };
        let (as_range, max_prims) = build_blas(&req.geometry);

        let index = self.entries.len();
        self.entries.push(CacheEntry {
            taken: true,
            dynamic: req.dynamic,
            geometry: req.geometry,
            as_range,
            max_prims,
            kusochki_offset,
            material_mode: req.material_mode,
            color: req.color,
            prev_transform: req.prev_transform,
        });
        Some(index)
    }

    /// At frame end: every cache entry flagged dynamic is marked
    /// `taken=false`; static entries remain taken across frames.
    pub fn release_dynamic_for_frame(&mut self) {
        for entry in &mut self.entries {
            if entry.dynamic {
                entry.taken = false;
            }
        }
    }

    pub fn entry(&self, index: usize) -> &CacheEntry {
        &self.entries[index]
    }

    /// Whether this model's `(material_mode, color, prev_transform)` tuple
    /// changed since last time, i.e. a re-upload is warranted.
    pub fn needs_kusok_reupload(&self, index: usize, material_mode: MaterialMode, color: Vec3, prev_transform: Mat4) -> bool {
        let entry = &self.entries[index];
        entry.material_mode != material_mode || entry.color != color || entry.prev_transform != prev_transform
    }

    /// Enumerates draw records `(slot, transform, material_mode)` for the
    /// TLAS build, dropping entries beyond `max_draws` with a log message.
    pub fn build_tlas(&self, candidates: &[usize], max_draws: usize, debug_validate: bool) -> Vec<usize> {
        let accepted: Vec<usize> = candidates.iter().copied().take(max_draws).collect();
        if candidates.len() > max_draws && self.throttle.should_log("tlas_draw_overflow", std::time::Instant::now()) {
            log_warning!(LOG, "dropping {} draw records beyond the configured TLAS limit of {max_draws}", candidates.len() - max_draws);
        }

        if debug_validate {
            for &index in &accepted {
                assert!(self.entries[index].taken, "TLAS references BLAS slot {index} that is not taken");
            }
            assert!(!has_overlapping_as_ranges(&accepted, &self.entries), "two taken BLAS slots alias their backing AS memory");
            assert!(!has_overlapping_kusochki_ranges(&accepted, &self.entries), "two taken BLAS slots alias their kusochki range");
        }

        accepted
    }
}

/// The real `build_blas` callback [`ModelCache::get_or_create`] expects:
/// sizes the acceleration structure via `vkGetAccelerationStructureBuildSizesKHR`,
/// places it in `as_buffer` at `as_buffer_offset`, and records the build
/// command into `combuf`. Returns the created handle and the AS size, so
/// the caller can place the next BLAS right after it in the same buffer.
///
/// # Safety
/// `as_buffer` must have room for the reported size at `as_buffer_offset`,
/// and `scratch_buffer_address` must address a scratch buffer at least as
/// large as the reported scratch size.
pub unsafe fn build_blas_on_device(
    as_loader: &AccelerationStructure,
    combuf: vk::CommandBuffer,
    geometries: &[vk::AccelerationStructureGeometryKHR],
    primitive_counts: &[u32],
    as_buffer: vk::Buffer,
    as_buffer_offset: u64,
    scratch_buffer_address: vk::DeviceAddress,
) -> Result<(vk::AccelerationStructureKHR, u64)> {
    let build_info = vk::AccelerationStructureBuildGeometryInfoKHR::builder()
        .ty(vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL)
        .flags(vk::BuildAccelerationStructureFlagsKHR::PREFER_FAST_TRACE)
        .mode(vk::BuildAccelerationStructureModeKHR::BUILD)
        .geometries(geometries);

    let size_info = as_loader.get_acceleration_structure_build_sizes(vk::AccelerationStructureBuildTypeKHR::DEVICE, &build_info, primitive_counts);

    let create_info = vk::AccelerationStructureCreateInfoKHR::builder()
        .buffer(as_buffer)
        .offset(as_buffer_offset)
        .size(size_info.acceleration_structure_size)
        .ty(vk::AccelerationStructureTypeKHR::BOTTOM_LEVEL);
    let handle = as_loader.create_acceleration_structure(&create_info, None)?;

    let build_info = build_info.dst_acceleration_structure(handle).scratch_data(vk::DeviceOrHostAddressKHR { device_address: scratch_buffer_address });

    let range_infos: Vec<vk::AccelerationStructureBuildRangeInfoKHR> =
        primitive_counts.iter().map(|&count| vk::AccelerationStructureBuildRangeInfoKHR::builder().primitive_count(count).build()).collect();

    as_loader.cmd_build_acceleration_structures(combuf, std::slice::from_ref(&build_info), &[&range_infos[..]]);

    Ok((handle, size_info.acceleration_structure_size))
}

fn has_overlapping_as_ranges(indices: &[usize], entries: &[CacheEntry]) -> bool {
    let mut ranges: Vec<(usize, u64, u64)> = indices
        .iter()
        .map(|&i| (entries[i].as_range.slot_index, entries[i].as_range.offset, entries[i].as_range.offset + entries[i].as_range.size))
        .collect();
    ranges.sort();
    ranges.windows(2).any(|w| w[0].0 == w[1].0 && w[0].2 > w[1].1)
}

fn has_overlapping_kusochki_ranges(indices: &[usize], entries: &[CacheEntry]) -> bool {
    let mut ranges: Vec<(usize, usize)> = indices.iter().map(|&i| (entries[i].kusochki_offset, entries[i].kusochki_offset + entries[i].geometry.len())).collect();
    ranges.sort();
    ranges.windows(2).any(|w| w[0].1 > w[1].0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom(seed: u32) -> GeometrySignature {
        vec![GeomDesc { geom_type: 0, flags: 0, max_vertex: seed, stride: 32, vertex_format: 0 }]
    }

    fn request(sig: GeometrySignature, dynamic: bool) -> ModelRequest {
        ModelRequest { geometry: sig, dynamic, material_mode: MaterialMode::Opaque, color: Vec3::ONE, prev_transform: Mat4::IDENTITY }
    }

    fn build_stub(slot: usize) -> impl FnOnce(&GeometrySignature) -> (AsRange, u32) {
        move |sig| (AsRange { slot_index: slot, offset: 0, size: 1024 }, sig.len() as u32 * 2)
    }

    #[test]
    fn reusing_the_same_dynamic_model_across_frames_returns_the_same_slot() {
        let mut cache = ModelCache::new(4);
        let sig = geom(100);

        let first = cache.get_or_create(request(sig.clone(), true), |_| Some(0), build_stub(0)).unwrap();
        cache.release_dynamic_for_frame();
        let second = cache.get_or_create(request(sig, true), |_| Some(0), build_stub(0)).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn a_distinct_signature_allocates_a_different_slot() {
        let mut cache = ModelCache::new(4);
        let a = cache.get_or_create(request(geom(1), true), |_| Some(0), build_stub(0)).unwrap();
        let b = cache.get_or_create(request(geom(2), true), |_| Some(1), build_stub(1)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn static_entries_remain_taken_after_release_dynamic() {
        let mut cache = ModelCache::new(4);
        let index = cache.get_or_create(request(geom(1), false), |_| Some(0), build_stub(0)).unwrap();
        cache.release_dynamic_for_frame();
        assert!(cache.entry(index).taken);
    }

    #[test]
    fn cache_full_with_no_matching_free_slot_returns_none() {
        let mut cache = ModelCache::new(1);
        cache.get_or_create(request(geom(1), false), |_| Some(0), build_stub(0)).unwrap();
        assert!(cache.get_or_create(request(geom(2), false), |_| Some(1), build_stub(1)).is_none());
    }

    #[test]
    fn tlas_build_drops_records_beyond_the_configured_limit() {
        let mut cache = ModelCache::new(8);
        let mut indices = Vec::new();
        for i in 0..5u32 {
            indices.push(cache.get_or_create(request(geom(i), false), move |_| Some(i as usize), build_stub(i as usize)).unwrap());
        }
        let accepted = cache.build_tlas(&indices, 3, false);
        assert_eq!(accepted.len(), 3);
    }
}
