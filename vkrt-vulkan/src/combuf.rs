//! Combined command-buffer: one combuf per in-flight frame, wrapping a
//! `VkCommandBuffer` with debug-label/timestamp scopes and the barrier
//! tracker that is the single source of truth for image/buffer sync state
//! inside a frame.

use std::collections::HashMap;

use ash::vk;

use crate::arena::ImageSync;

/// Opaque image identity the barrier tracker keys its sync state on. The
/// Vulkan backend's image arena hands these out; this crate never
/// interprets the value beyond equality/hashing.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ImageId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BufferId(pub u32);

#[derive(Clone, Copy, Default, Debug)]
struct BufferSync {
    last_access: vk::AccessFlags,
    last_stage: vk::PipelineStageFlags,
}

/// A requested synchronization state for one image or buffer, passed to
/// [`Combuf::issue_barrier`].
#[derive(Clone, Copy, Debug)]
pub struct ImageBarrierRequest {
    pub image: ImageId,
    pub layout: vk::ImageLayout,
    pub access: vk::AccessFlags,
}

#[derive(Clone, Copy, Debug)]
pub struct BufferBarrierRequest {
    pub buffer: BufferId,
    pub access: vk::AccessFlags,
}

/// One emitted (but not-yet-submitted) pipeline barrier, diffed against the
/// previously recorded sync state.
#[derive(Clone, Copy, Debug)]
pub struct EmittedImageBarrier {
    pub image: ImageId,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
}

/// A named debug scope with matching GPU timestamp query indices, exposed as
/// a profiler scope set.
#[derive(Clone, Debug)]
pub struct ProfilerScope {
    pub label: String,
    pub begin_query: u32,
    pub end_query: u32,
}

/// The barrier tracker: the single source of truth for image/buffer sync
/// state inside a frame. External callers never construct
/// `VkImageMemoryBarrier` directly.
#[derive(Default)]
pub struct BarrierTracker {
    images: HashMap<ImageId, ImageSync>,
    buffers: HashMap<BufferId, BufferSync>,
}

impl BarrierTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image_sync(&self, image: ImageId) -> ImageSync {
        self.images.get(&image).copied().unwrap_or_default()
    }

    /// Diffs `requests` against tracked state and returns the barriers that
    /// must be issued, updating tracked state as it goes.
    pub fn diff_images(&mut self, stage: vk::PipelineStageFlags, requests: &[ImageBarrierRequest]) -> Vec<EmittedImageBarrier> {
        let mut barriers = Vec::new();
        for req in requests {
            let current = self.images.entry(req.image).or_default();
            if current.layout != req.layout || !current.last_write_access.is_empty() || current.last_read_access.intersects(req.access) {
                barriers.push(EmittedImageBarrier {
                    image: req.image,
                    old_layout: current.layout,
                    new_layout: req.layout,
                    src_access: current.last_write_access | current.last_read_access,
                    dst_access: req.access,
                });
            }
            current.layout = req.layout;
            current.last_stage = stage;
            if is_write_access(req.access) {
                current.last_write_access = req.access;
                current.last_read_access = vk::AccessFlags::empty();
            } else {
                current.last_read_access |= req.access;
            }
        }
        barriers
    }

    pub fn diff_buffers(&mut self, stage: vk::PipelineStageFlags, requests: &[BufferBarrierRequest]) -> Vec<BufferId> {
        let mut changed = Vec::new();
        for req in requests {
            let current = self.buffers.entry(req.buffer).or_default();
            if current.last_access != req.access {
                changed.push(req.buffer);
            }
            current.last_access = req.access;
            current.last_stage = stage;
        }
        changed
    }
}

fn is_write_access(access: vk::AccessFlags) -> bool {
    access.intersects(
        vk::AccessFlags::SHADER_WRITE
            | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
            | vk::AccessFlags::TRANSFER_WRITE
            | vk::AccessFlags::HOST_WRITE
            | vk::AccessFlags::MEMORY_WRITE,
    )
}

/// One combuf per in-flight frame.
pub struct Combuf {
    pub handle: vk::CommandBuffer,
    pub barriers: BarrierTracker,
    label_stack: Vec<String>,
    scopes: Vec<ProfilerScope>,
    next_query: u32,
    recording: bool,
}

impl Combuf {
    pub fn new(handle: vk::CommandBuffer) -> Self {
        Self { handle, barriers: BarrierTracker::new(), label_stack: Vec::new(), scopes: Vec::new(), next_query: 0, recording: false }
    }

    pub fn begin(&mut self) {
        debug_assert!(!self.recording, "combuf begin() called while already recording");
        self.recording = true;
        self.scopes.clear();
        self.next_query = 0;
    }

    pub fn end(&mut self) {
        debug_assert!(self.recording, "combuf end() called while not recording");
        debug_assert!(self.label_stack.is_empty(), "debug label stack not balanced at end()");
        self.recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Pushes a debug label and opens a matching timestamp scope.
    pub fn push_label(&mut self, label: &str) -> u32 {
        self.label_stack.push(label.to_owned());
        let begin_query = self.next_query;
        self.next_query += 1;
        begin_query
    }

    /// Pops the most recently pushed debug label, closing its timestamp scope.
    pub fn pop_label(&mut self, begin_query: u32) {
        let label = self.label_stack.pop().expect("pop_label without a matching push_label");
        let end_query = self.next_query;
        self.next_query += 1;
        self.scopes.push(ProfilerScope { label, begin_query, end_query });
    }

    pub fn profiler_scopes(&self) -> &[ProfilerScope] {
        &self.scopes
    }

    pub fn issue_barrier(&mut self, stage: vk::PipelineStageFlags, images: &[ImageBarrierRequest], buffers: &[BufferBarrierRequest]) -> (Vec<EmittedImageBarrier>, Vec<BufferId>) {
        (self.barriers.diff_images(stage, images), self.barriers.diff_buffers(stage, buffers))
    }

    /// Records the `vkCmdPipelineBarrier` for a batch of [`EmittedImageBarrier`]s
    /// already paired with their real `vk::Image` handle by the caller (the
    /// image arena owns that mapping, not the combuf).
    ///
    /// # Safety
    /// Must be called while `self` is recording, with images that are still
    /// alive.
    pub unsafe fn record_image_barriers(
        &self,
        device: &ash::Device,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barriers: &[(EmittedImageBarrier, vk::Image)],
    ) {
        if barriers.is_empty() {
            return;
        }
        let vk_barriers: Vec<vk::ImageMemoryBarrier> = barriers
            .iter()
            .map(|(b, image)| {
                vk::ImageMemoryBarrier::builder()
                    .old_layout(b.old_layout)
                    .new_layout(b.new_layout)
                    .src_access_mask(b.src_access)
                    .dst_access_mask(b.dst_access)
                    .image(*image)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: vk::REMAINING_MIP_LEVELS,
                        base_array_layer: 0,
                        layer_count: vk::REMAINING_ARRAY_LAYERS,
                    })
                    .build()
            })
            .collect();
        device.cmd_pipeline_barrier(self.handle, src_stage, dst_stage, vk::DependencyFlags::empty(), &[], &[], &vk_barriers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_transition_to_a_layout_always_emits_a_barrier() {
        let mut tracker = BarrierTracker::new();
        let barriers = tracker.diff_images(
            vk::PipelineStageFlags::TRANSFER,
            &[ImageBarrierRequest { image: ImageId(0), layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL, access: vk::AccessFlags::TRANSFER_WRITE }],
        );
        assert_eq!(barriers.len(), 1);
        assert_eq!(barriers[0].old_layout, vk::ImageLayout::UNDEFINED);
    }

    #[test]
    fn repeating_the_same_read_after_a_read_does_not_re_barrier() {
        let mut tracker = BarrierTracker::new();
        let req = ImageBarrierRequest { image: ImageId(0), layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, access: vk::AccessFlags::SHADER_READ };
        tracker.diff_images(vk::PipelineStageFlags::FRAGMENT_SHADER, &[req]);
        let second = tracker.diff_images(vk::PipelineStageFlags::FRAGMENT_SHADER, &[req]);
        assert!(second.is_empty());
    }

    #[test]
    fn label_push_pop_produces_a_balanced_profiler_scope() {
        let mut combuf = Combuf::new(vk::CommandBuffer::null());
        combuf.begin();
        let q = combuf.push_label("shadow pass");
        combuf.pop_label(q);
        combuf.end();
        assert_eq!(combuf.profiler_scopes().len(), 1);
        assert_eq!(combuf.profiler_scopes()[0].label, "shadow pass");
    }

    #[test]
    #[should_panic]
    fn end_with_unbalanced_labels_panics_in_debug() {
        let mut combuf = Combuf::new(vk::CommandBuffer::null());
        combuf.begin();
        combuf.push_label("unbalanced");
        combuf.end();
    }
}
