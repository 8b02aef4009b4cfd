//! Frame controller: the phase state machine, swapchain
//! acquire/recreate/present classification, and the screenshot path. Holds
//! N_CONCURRENT frame slots and orchestrates the memory pool, arena, combuf
//! and model cache through them.

use ash::vk;

use vkrt_core::log::LogCategory;
use vkrt_core::log_warning;

use crate::combuf::Combuf;
use crate::error::{classify_acquire, classify_present, Error, Result, SwapchainOutcome};

const LOG: LogCategory = LogCategory::new("frame");

/// At most 2 frames in flight.
pub const N_CONCURRENT: usize = 2;

/// Frame phase state machine.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FramePhase {
    Idle,
    FrameBegan,
    FrameRendered,
    RenderingEnqueued,
    Submitted,
}

/// Resources owned by one in-flight frame slot.
/// `sem_done2` is distinct from `sem_done` so swapchain wait and next-frame
/// wait do not share a signaled state.
pub struct FrameSlot {
    pub combuf: Combuf,
    pub fence_done: vk::Fence,
    pub sem_framebuffer_ready: vk::Semaphore,
    pub sem_done: vk::Semaphore,
    pub sem_done2: vk::Semaphore,
    pub staging_frame_tag: u64,
    phase: FramePhase,
}

impl FrameSlot {
    pub fn new(combuf: Combuf, fence_done: vk::Fence, sem_framebuffer_ready: vk::Semaphore, sem_done: vk::Semaphore, sem_done2: vk::Semaphore) -> Self {
        Self { combuf, fence_done, sem_framebuffer_ready, sem_done, sem_done2, staging_frame_tag: 0, phase: FramePhase::Idle }
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }
}

/// Outcome of an `acquire` call relayed back to the caller.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AcquireOutcome {
    Acquired { image_index: u32 },
    /// The frame is lost; the caller still submits a no-op so fences stay consistent.
    FrameLost,
}

/// Callbacks the controller needs from the swapchain layer, injected so the
/// state machine itself is testable without a live `VkSwapchainKHR`.
pub trait SwapchainBackend {
    fn current_extent(&self) -> (u32, u32);
    fn surface_extent(&self) -> (u32, u32);
    fn recreate(&mut self, width: u32, height: u32);
    fn acquire_next_image(&mut self, sem_framebuffer_ready: vk::Semaphore) -> std::result::Result<u32, vk::Result>;
    fn queue_present(&mut self, image_index: u32, wait_sem: vk::Semaphore) -> std::result::Result<(), vk::Result>;
    /// The live `VkImage` backing swapchain image `index`, for callers that
    /// need to barrier or read back a presented frame (screenshots).
    fn swapchain_image(&self, index: u32) -> vk::Image;
}

pub struct FrameController<S: SwapchainBackend> {
    slots: Vec<FrameSlot>,
    current_index: usize,
    recreate_requested: bool,
    swapchain: S,
}

impl<S: SwapchainBackend> FrameController<S> {
    pub fn new(slots: Vec<FrameSlot>, swapchain: S) -> Self {
        assert_eq!(slots.len(), N_CONCURRENT, "frame controller requires exactly N_CONCURRENT slots");
        Self { slots, current_index: 0, recreate_requested: false, swapchain }
    }

    pub fn current_slot(&self) -> &FrameSlot {
        &self.slots[self.current_index]
    }

    pub fn swapchain(&self) -> &S {
        &self.swapchain
    }

    /// `begin_frame` called while not `Idle` logs a warning and no-ops.
    /// `wait_fence` performs the real `vkWaitForFences`/`vkResetFences` pair,
    /// injected so this stays testable; it returns `Ok(())` once the fence is
    /// observed signaled, after retrying past any 10-second soft timeouts
    /// internally.
    pub fn begin_frame(&mut self, wait_fence: impl FnOnce(vk::Fence) -> Result<()>) -> Result<AcquireOutcome> {
        let index = (self.current_index + 1) % N_CONCURRENT;
        if self.slots[index].phase != FramePhase::Idle {
            log_warning!(LOG, "begin_frame called while slot {index} is in phase {:?}, ignoring", self.slots[index].phase);
            return Ok(AcquireOutcome::FrameLost);
        }

        wait_fence(self.slots[index].fence_done)?;
        self.current_index = index;

        let outcome = self.acquire()?;

        self.slots[index].combuf.begin();
        self.slots[index].phase = FramePhase::FrameBegan;
        Ok(outcome)
    }

    fn acquire(&mut self) -> Result<AcquireOutcome> {
        let (current_w, current_h) = self.swapchain.current_extent();
        let (surface_w, surface_h) = self.swapchain.surface_extent();
        if self.recreate_requested || (current_w, current_h) != (surface_w, surface_h) {
            self.swapchain.recreate(surface_w, surface_h);
            self.recreate_requested = false;
        }

        let sem = self.slots[self.current_index].sem_framebuffer_ready;
        match self.swapchain.acquire_next_image(sem) {
            Ok(image_index) => Ok(AcquireOutcome::Acquired { image_index }),
            Err(result) => match classify_acquire(result) {
                SwapchainOutcome::Suboptimal => {
                    // SUCCESS path is Ok(_) above; SUBOPTIMAL_KHR surfaces as Ok too in real ash,
                    // but the backend trait reports it through Err for uniform classification here.
                    self.recreate_requested = true;
                    Ok(AcquireOutcome::FrameLost)
                }
                SwapchainOutcome::RetryAfterRecreate => {
                    self.swapchain.recreate(surface_w, surface_h);
                    match self.swapchain.acquire_next_image(sem) {
                        Ok(image_index) => Ok(AcquireOutcome::Acquired { image_index }),
                        Err(_) => Ok(AcquireOutcome::FrameLost),
                    }
                }
                SwapchainOutcome::FrameLost => Ok(AcquireOutcome::FrameLost),
                SwapchainOutcome::Fatal | SwapchainOutcome::Ok => Err(Error::Fatal("swapchain acquire failed fatally")),
            },
        }
    }

    /// Marks the current slot rendered; callers record draws between
    /// `begin_frame` and this call.
    pub fn mark_rendered(&mut self) {
        self.slots[self.current_index].phase = FramePhase::FrameRendered;
    }

    /// `end_frame` = enqueue + submit. `submit` performs the
    /// real `vkQueueSubmit`; `present` wraps `vkQueuePresentKHR`.
    pub fn end_frame(
        &mut self,
        acquired: AcquireOutcome,
        submit: impl FnOnce(&FrameSlot, Option<&FrameSlot>) -> Result<()>,
    ) -> Result<()> {
        let index = self.current_index;
        self.slots[index].phase = FramePhase::RenderingEnqueued;
        self.slots[index].combuf.end();

        let previous_index = (index + N_CONCURRENT - 1) % N_CONCURRENT;
        submit(&self.slots[index], Some(&self.slots[previous_index]))?;

        self.slots[index].phase = FramePhase::Submitted;

        if let AcquireOutcome::Acquired { image_index } = acquired {
            let sem_done = self.slots[index].sem_done;
            if let Err(result) = self.swapchain.queue_present(image_index, sem_done) {
                match classify_present(result) {
                    SwapchainOutcome::Suboptimal => {
                        log_warning!(LOG, "present returned OUT_OF_DATE/SUBOPTIMAL, recreating next frame");
                        self.recreate_requested = true;
                    }
                    SwapchainOutcome::Fatal => return Err(Error::Fatal("present failed fatally")),
                    _ => {}
                }
            }
        }

        self.slots[index].phase = FramePhase::Idle;
        Ok(())
    }

    pub fn phase(&self) -> FramePhase {
        self.slots[self.current_index].phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeSwapchain {
        extent: (u32, u32),
        surface_extent: (u32, u32),
        recreated: Cell<u32>,
        next_acquire: std::result::Result<u32, vk::Result>,
        next_present: std::result::Result<(), vk::Result>,
    }

    impl SwapchainBackend for FakeSwapchain {
        fn current_extent(&self) -> (u32, u32) {
            self.extent
        }
        fn surface_extent(&self) -> (u32, u32) {
            self.surface_extent
        }
        fn recreate(&mut self, width: u32, height: u32) {
            self.extent = (width, height);
            self.recreated.set(self.recreated.get() + 1);
        }
        fn acquire_next_image(&mut self, _sem: vk::Semaphore) -> std::result::Result<u32, vk::Result> {
            self.next_acquire
        }
        fn queue_present(&mut self, _image_index: u32, _wait_sem: vk::Semaphore) -> std::result::Result<(), vk::Result> {
            self.next_present
        }
        fn swapchain_image(&self, _index: u32) -> vk::Image {
            vk::Image::null()
        }
    }

    fn make_slot() -> FrameSlot {
        FrameSlot::new(Combuf::new(vk::CommandBuffer::null()), vk::Fence::null(), vk::Semaphore::null(), vk::Semaphore::null(), vk::Semaphore::null())
    }

    fn make_controller(swapchain: FakeSwapchain) -> FrameController<FakeSwapchain> {
        FrameController::new(vec![make_slot(), make_slot()], swapchain)
    }

    #[test]
    fn empty_scene_two_frames_round_trips_the_state_machine() {
        let swapchain = FakeSwapchain { extent: (800, 600), surface_extent: (800, 600), recreated: Cell::new(0), next_acquire: Ok(0), next_present: Ok(()) };
        let mut controller = make_controller(swapchain);

        for _ in 0..2 {
            let acquired = controller.begin_frame(|_| Ok(())).unwrap();
            controller.mark_rendered();
            controller.end_frame(acquired, |_current, _previous| Ok(())).unwrap();
            assert_eq!(controller.phase(), FramePhase::Idle);
        }
    }

    #[test]
    fn swapchain_out_of_date_at_present_triggers_recreate_next_begin_frame() {
        let swapchain = FakeSwapchain { extent: (800, 600), surface_extent: (800, 600), recreated: Cell::new(0), next_acquire: Ok(0), next_present: Err(vk::Result::ERROR_OUT_OF_DATE_KHR) };
        let mut controller = make_controller(swapchain);

        let acquired = controller.begin_frame(|_| Ok(())).unwrap();
        controller.mark_rendered();
        controller.end_frame(acquired, |_c, _p| Ok(())).unwrap();

        controller.swapchain.surface_extent = (1024, 768);
        let recreated_before = controller.swapchain.recreated.get();
        controller.begin_frame(|_| Ok(())).unwrap();
        assert!(controller.swapchain.recreated.get() > recreated_before);
        assert_eq!(controller.swapchain.current_extent(), (1024, 768));
    }

    #[test]
    fn begin_frame_while_not_idle_is_a_no_op() {
        let swapchain = FakeSwapchain { extent: (800, 600), surface_extent: (800, 600), recreated: Cell::new(0), next_acquire: Ok(0), next_present: Ok(()) };
        let mut controller = make_controller(swapchain);
        controller.slots[1].phase = FramePhase::FrameBegan;
        let outcome = controller.begin_frame(|_| Ok(())).unwrap();
        assert_eq!(outcome, AcquireOutcome::FrameLost);
        // Neither the target slot's phase nor the current index moved.
        assert_eq!(controller.slots[1].phase, FramePhase::FrameBegan);
        assert_eq!(controller.current_index, 0);
    }

    #[test]
    fn acquire_out_of_date_retries_once_then_reports_frame_lost() {
        let swapchain = FakeSwapchain {
            extent: (800, 600),
            surface_extent: (800, 600),
            recreated: Cell::new(0),
            next_acquire: Err(vk::Result::ERROR_OUT_OF_DATE_KHR),
            next_present: Ok(()),
        };
        let mut controller = make_controller(swapchain);
        let acquired = controller.begin_frame(|_| Ok(())).unwrap();
        assert_eq!(acquired, AcquireOutcome::FrameLost);
    }
}
