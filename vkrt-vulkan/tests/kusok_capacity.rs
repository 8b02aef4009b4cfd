//! Drives `ModelCache` against the real, fixed-split `KusokAllocator`
//! (rather than a test-only stub closure) the way `VulkanRenderer::register_model`
//! wires them together in production: static geometry reserved at map load,
//! dynamic geometry re-reserved from the top of its half every frame.

use glam::{Mat4, Vec3};

use vkrt_core::kusok::{KusokAllocator, MAX_KUSOCHKI};
use vkrt_core::shader_abi::MaterialMode;
use vkrt_vulkan::model_cache::{AsRange, GeomDesc, GeometrySignature, ModelCache, ModelRequest};

fn geom(seed: u32) -> GeometrySignature {
    vec![GeomDesc { geom_type: 0, flags: 0, max_vertex: seed, stride: 32, vertex_format: 0 }]
}

fn request(sig: GeometrySignature, dynamic: bool) -> ModelRequest {
    ModelRequest { geometry: sig, dynamic, material_mode: MaterialMode::Opaque, color: Vec3::ONE, prev_transform: Mat4::IDENTITY }
}

fn build_stub(slot: usize) -> impl FnOnce(&GeometrySignature) -> (AsRange, u32) {
    move |sig| (AsRange { slot_index: slot, offset: 0, size: 1024 }, sig.len() as u32)
}

#[test]
fn static_map_geometry_then_per_frame_dynamic_draws_never_cross_the_fixed_split() {
    let mut cache = ModelCache::new(256);
    let mut alloc = KusokAllocator::with_fixed_split();
    assert_eq!(alloc.static_len(), MAX_KUSOCHKI / 2);

    // Map load: 100 distinct static geometries, each one kusok slot.
    for i in 0..100u32 {
        let slot = cache
            .get_or_create(request(geom(i), false), |count| alloc.reserve_static(count), build_stub(i as usize))
            .expect("static load has ample room in the first 100 slots of the static half");
        let offset = cache.entry(slot).kusochki_offset;
        assert!(offset < MAX_KUSOCHKI / 2, "static geometry must land in the static half");
    }

    // Ten frames, each submitting 10 freshly-signatured dynamic draws, so
    // every one is a genuine new reservation against the allocator rather
    // than a cache hit reusing last frame's slot.
    for frame in 0..10u64 {
        alloc.flip();
        let mut dynamic_offsets = Vec::new();
        for i in 0..10u32 {
            let seed = 1000 + frame as u32 * 100 + i;
            let slot = cache
                .get_or_create(request(geom(seed), true), |count| alloc.reserve_dynamic(count), build_stub(100 + seed as usize))
                .unwrap_or_else(|| panic!("frame {frame}: dynamic draw {i} should fit comfortably in the dynamic half"));
            let offset = cache.entry(slot).kusochki_offset;
            assert!(offset >= MAX_KUSOCHKI / 2, "dynamic geometry must land in the dynamic half");
            dynamic_offsets.push(offset);
        }
        cache.release_dynamic_for_frame();
        assert_eq!(dynamic_offsets.len(), 10);
    }
}

#[test]
fn a_single_request_that_would_overrun_the_dynamic_half_is_rejected() {
    let mut cache = ModelCache::new(4);
    let mut alloc = KusokAllocator::with_fixed_split();

    // Consume the entire dynamic half with one big request.
    let big = alloc.reserve_dynamic(MAX_KUSOCHKI / 2);
    assert!(big.is_some());

    let result = cache.get_or_create(request(geom(1), true), |count| alloc.reserve_dynamic(count), build_stub(0));
    assert!(result.is_none(), "a request that would overrun MAX_KUSOCHKI must be rejected, not silently truncated");
}
