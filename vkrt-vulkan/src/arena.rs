//! Buffer & image arena: the flipping allocator, the double-ended (DE)
//! buffer built on top of it, staging with frame tags, and per-image sync
//! records the combuf consults to compute barriers.

use ash::vk;

use vkrt_core::log::{LogCategory, LogThrottle};
use vkrt_core::log_warning;

const LOG: LogCategory = LogCategory::new("arena");

/// A linear bump allocator with two halves swapped each frame; allocations
/// from the half not currently active are never touched until the next
/// `flip()`.
pub struct FlippingAllocator {
    half_size: u64,
    cursor: u64,
    active_half: usize,
}

/// Distinguishable failure for a flipping-allocator request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AllocFailed;

impl FlippingAllocator {
    pub fn new(half_size: u64) -> Self {
        Self { half_size, cursor: 0, active_half: 0 }
    }

    /// Offset of the current half within the backing buffer.
    pub fn half_base(&self) -> u64 {
        self.active_half as u64 * self.half_size
    }

    /// Allocates `size` bytes aligned to `alignment` from the active half.
    pub fn allocate(&mut self, size: u64, alignment: u64) -> Result<u64, AllocFailed> {
        let aligned = align_up(self.cursor, alignment);
        if aligned + size > self.half_size {
            return Err(AllocFailed);
        }
        self.cursor = aligned + size;
        Ok(self.half_base() + aligned)
    }

    /// Swaps halves and resets the bump cursor; the half that was just
    /// active becomes the "previous-frame" watermark and must not be
    /// allocated over until the *next* `flip()`.
    pub fn flip(&mut self) {
        self.active_half = 1 - self.active_half;
        self.cursor = 0;
    }

    pub fn watermark(&self) -> u64 {
        self.cursor
    }
}

bitflags::bitflags! {
    /// Lifetime tag for one allocation in a [`DeBuffer`].
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Lifetime: u32 {
        const STATIC = 1 << 0;
        const DYNAMIC = 1 << 1;
    }
}

/// One buffer carrying a static prefix (grows only at map load) and a
/// dynamic, per-frame-flipped suffix.
pub struct DeBuffer {
    total_size: u64,
    static_next: u64,
    dynamic: FlippingAllocator,
}

impl DeBuffer {
    /// `static_capacity` is reserved at the front; everything after it is
    /// split into the flipping allocator's two halves.
    pub fn new(static_capacity: u64, dynamic_half_size: u64) -> Self {
        Self { total_size: static_capacity + dynamic_half_size * 2, static_next: 0, dynamic: FlippingAllocator::new(dynamic_half_size) }
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn static_capacity(&self) -> u64 {
        self.total_size - self.dynamic.half_size * 2
    }

    /// Grows the static prefix; only valid at map load, never mid-frame.
    pub fn allocate_static(&mut self, size: u64, alignment: u64) -> Result<u64, AllocFailed> {
        let aligned = align_up(self.static_next, alignment);
        if aligned + size > self.static_capacity() {
            return Err(AllocFailed);
        }
        self.static_next = aligned + size;
        Ok(aligned)
    }

    pub fn allocate_dynamic(&mut self, size: u64, alignment: u64) -> Result<u64, AllocFailed> {
        self.dynamic.allocate(size, alignment).map(|offset| self.static_capacity() + offset)
    }

    pub fn allocate(&mut self, lifetime: Lifetime, size: u64, alignment: u64) -> Result<u64, AllocFailed> {
        if lifetime.contains(Lifetime::STATIC) {
            self.allocate_static(size, alignment)
        } else {
            self.allocate_dynamic(size, alignment)
        }
    }

    pub fn flip(&mut self) {
        self.dynamic.flip();
    }
}

/// Monotonic tag identifying a staging commit; reclaimed once the GPU work
/// that consumed it has retired.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct StagingFrameTag(pub u64);

/// Process-wide host-visible staging region. A commit reserves a byte range
/// and returns the tag the frame controller later reclaims up to once its
/// fence is signaled.
pub struct StagingArena {
    capacity: u64,
    cursor: u64,
    next_tag: u64,
    /// Reclaim watermark: bytes below this offset are free to reuse.
    reclaimed_up_to: u64,
    throttle: LogThrottle,
}

impl StagingArena {
    pub fn new(capacity: u64) -> Self {
        Self { capacity, cursor: 0, next_tag: 1, reclaimed_up_to: 0, throttle: LogThrottle::new(std::time::Duration::from_secs(5)) }
    }

    /// Reserves `size` bytes, wrapping back to the start once reclaimed
    /// space allows it. Returns `(offset, tag)`.
    pub fn commit(&mut self, size: u64) -> Option<(u64, StagingFrameTag)> {
        if self.cursor + size > self.capacity {
            if size > self.reclaimed_up_to {
                if self.throttle.should_log("staging_full", std::time::Instant::now()) {
                    log_warning!(LOG, "staging arena exhausted, dropping a {size}-byte commit");
                }
                return None;
            }
            self.cursor = 0;
        } else if self.cursor + size > self.reclaimed_up_to && self.cursor > 0 {
            // Still within un-reclaimed territory from a previous wrap; caller must wait.
        }

        let offset = self.cursor;
        self.cursor += size;
        let tag = StagingFrameTag(self.next_tag);
        self.next_tag += 1;
        Some((offset, tag))
    }

    /// Marks everything up to and including `tag` as reclaimable, once the
    /// frame controller has observed the corresponding fence signaled.
    pub fn reclaim_up_to(&mut self, offset_after_tag: u64) {
        self.reclaimed_up_to = self.reclaimed_up_to.max(offset_after_tag);
    }
}

/// Sync state tracked per image, the single source of truth the combuf
/// diffs against to compute barriers.
#[derive(Clone, Copy, Debug)]
pub struct ImageSync {
    pub layout: vk::ImageLayout,
    pub last_write_access: vk::AccessFlags,
    pub last_read_access: vk::AccessFlags,
    pub last_stage: vk::PipelineStageFlags,
}

impl Default for ImageSync {
    fn default() -> Self {
        Self {
            layout: vk::ImageLayout::UNDEFINED,
            last_write_access: vk::AccessFlags::empty(),
            last_read_access: vk::AccessFlags::empty(),
            last_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
        }
    }
}

bitflags::bitflags! {
    /// Extra view requests for an image creation.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct ImageCreateFlags: u32 {
        const EXTRA_UNORM_VIEW = 1 << 0;
    }
}

/// Parameters for creating an image through the arena.
#[derive(Clone, Copy, Debug)]
pub struct ImageCreateRequest {
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub layers: u32,
    pub mips: u32,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
    pub memory_props: vk::MemoryPropertyFlags,
    pub flags: ImageCreateFlags,
}

fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_does_not_clobber_previous_half_until_called() {
        let mut alloc = FlippingAllocator::new(256);
        let a = alloc.allocate(64, 16).unwrap();
        alloc.flip();
        let b = alloc.allocate(64, 16).unwrap();
        // Different halves: offsets cannot coincide.
        assert_ne!(a / 256, b / 256);
        alloc.flip();
        let c = alloc.allocate(64, 16).unwrap();
        assert_eq!(a / 256, c / 256);
    }

    #[test]
    fn flipping_allocator_fails_when_half_is_full() {
        let mut alloc = FlippingAllocator::new(64);
        alloc.allocate(64, 16).unwrap();
        assert_eq!(alloc.allocate(1, 16), Err(AllocFailed));
    }

    #[test]
    fn de_buffer_static_half_never_overlaps_dynamic_half() {
        let mut buf = DeBuffer::new(1024, 256);
        let static_offset = buf.allocate(Lifetime::STATIC, 100, 16).unwrap();
        let dynamic_offset = buf.allocate(Lifetime::DYNAMIC, 100, 16).unwrap();
        assert!(static_offset < buf.static_capacity());
        assert!(dynamic_offset >= buf.static_capacity());
    }

    #[test]
    fn de_buffer_dynamic_allocations_flip_independently_of_static() {
        let mut buf = DeBuffer::new(0, 128);
        let a = buf.allocate_dynamic(32, 16).unwrap();
        buf.flip();
        let b = buf.allocate_dynamic(32, 16).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn staging_commit_returns_increasing_tags() {
        let mut arena = StagingArena::new(4096);
        let (_, tag1) = arena.commit(100).unwrap();
        let (_, tag2) = arena.commit(100).unwrap();
        assert!(tag2 > tag1);
    }
}
