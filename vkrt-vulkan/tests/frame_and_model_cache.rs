//! Drives the frame controller and the BLAS model cache together across
//! several frames the way a render loop would, using fakes for every real
//! Vulkan call so the state machine and cache logic are exercised without a
//! live device.

use std::cell::Cell;

use ash::vk;
use glam::{Mat4, Vec3};

use vkrt_vulkan::combuf::Combuf;
use vkrt_vulkan::frame::{AcquireOutcome, FrameController, FramePhase, FrameSlot, SwapchainBackend, N_CONCURRENT};
use vkrt_vulkan::model_cache::{GeomDesc, ModelCache, ModelRequest};
use vkrt_core::shader_abi::MaterialMode;

struct FakeSwapchain {
    extent: (u32, u32),
    recreated: Cell<u32>,
}

impl SwapchainBackend for FakeSwapchain {
    fn current_extent(&self) -> (u32, u32) {
        self.extent
    }
    fn surface_extent(&self) -> (u32, u32) {
        self.extent
    }
    fn recreate(&mut self, width: u32, height: u32) {
        self.extent = (width, height);
        self.recreated.set(self.recreated.get() + 1);
    }
    fn acquire_next_image(&mut self, _sem: vk::Semaphore) -> std::result::Result<u32, vk::Result> {
        Ok(0)
    }
    fn queue_present(&mut self, _image_index: u32, _wait_sem: vk::Semaphore) -> std::result::Result<(), vk::Result> {
        Ok(())
    }
    fn swapchain_image(&self, _index: u32) -> vk::Image {
        vk::Image::null()
    }
}

fn make_slot() -> FrameSlot {
    FrameSlot::new(Combuf::new(vk::CommandBuffer::null()), vk::Fence::null(), vk::Semaphore::null(), vk::Semaphore::null(), vk::Semaphore::null())
}

fn world_geometry() -> Vec<GeomDesc> {
    vec![GeomDesc { geom_type: 0, flags: 0, max_vertex: 4096, stride: 32, vertex_format: 0 }]
}

#[test]
fn a_recurring_dynamic_model_reuses_its_blas_across_several_frames() {
    let mut controller = FrameController::new(
        (0..N_CONCURRENT).map(|_| make_slot()).collect(),
        FakeSwapchain { extent: (1280, 720), recreated: Cell::new(0) },
    );
    let mut cache = ModelCache::new(8);
    let mut blas_builds = 0u32;

    for frame in 0..4u64 {
        let acquired = controller.begin_frame(|_fence| Ok(())).unwrap();
        assert!(matches!(acquired, AcquireOutcome::Acquired { image_index: 0 }));

        let slot = cache
            .get_or_create(
                ModelRequest { geometry: world_geometry(), dynamic: true, material_mode: MaterialMode::Opaque, color: Vec3::ONE, prev_transform: Mat4::IDENTITY },
                |count| Some(count * frame as usize),
                |sig| {
                    blas_builds += 1;
                    (vkrt_vulkan::model_cache::AsRange { slot_index: 0, offset: 0, size: 4096 }, sig.len() as u32)
                },
            )
            .unwrap();
        assert_eq!(slot, 0, "the same geometry signature always reuses cache slot 0");
        assert!(cache.entry(slot).taken);

        controller.mark_rendered();
        controller.end_frame(acquired, |_current, _previous| Ok(())).unwrap();
        assert_eq!(controller.phase(), FramePhase::Idle);

        // A real render loop releases dynamic entries once the frame's
        // draws are recorded, ready for next frame's re-request.
        cache.release_dynamic_for_frame();
    }

    assert_eq!(blas_builds, 1, "the BLAS is only built on the model's first request");
}
