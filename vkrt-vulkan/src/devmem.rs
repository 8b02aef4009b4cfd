//! Device-memory pool. Holds at most [`MAX_SLOTS`] slabs, one per
//! `(memory_type, allocate_flags, property_flags)` triple, each backed by a
//! free-list sub-allocator.

use ash::vk;
use parking_lot::Mutex;

use vkrt_core::log::LogCategory;
use vkrt_core::{log_debug, log_info};

use crate::error::{Error, Result};
use crate::suballoc::FreeListAllocator;

const LOG: LogCategory = LogCategory::new("devmem");

/// Slot table size.
pub const MAX_SLOTS: usize = 16;

/// Default slab size for a freshly created slot.
pub const DEFAULT_SLAB_SIZE: u64 = 64 * 1024 * 1024;

/// Minimum alignment the sub-allocator guarantees regardless of the
/// requested alignment.
pub const MIN_ALIGNMENT: u64 = 16;

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct AllocateFlags: u32 {
        const DEVICE_ADDRESS = 1 << 0;
    }
}

/// Key identifying a slot: one slab is created per distinct triple.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SlotKey {
    pub memory_type_index: u32,
    pub allocate_flags: AllocateFlags,
    pub property_flags: vk::MemoryPropertyFlags,
}

/// A device allocation request.
#[derive(Clone, Copy, Debug)]
pub struct AllocationRequest {
    pub size: u64,
    pub alignment: u64,
    pub property_flags: vk::MemoryPropertyFlags,
    pub allocate_flags: AllocateFlags,
    pub memory_type_bits: u32,
}

/// Handle to a live allocation: `(slot_index, block_index, block_size)`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DeviceAllocation {
    pub slot_index: usize,
    pub block_index: u32,
    pub offset: u64,
    pub size: u64,
}

struct Slot {
    key: SlotKey,
    memory: vk::DeviceMemory,
    size: u64,
    mapped_ptr: Option<*mut u8>,
    refcount: u32,
    suballocator: FreeListAllocator,
}

// SAFETY: `mapped_ptr` is only ever dereferenced by the caller holding the
// same `&mut DeviceMemoryPool` that owns it; the pool itself never touches
// the pointee.
unsafe impl Send for Slot {}

/// Picks the memory type satisfying both the type-bit mask and the
/// requested properties.
pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required_properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..props.memory_type_count).find(|&i| {
        let type_supported = (type_bits & (1 << i)) != 0;
        let props_supported = props.memory_types[i as usize].property_flags.contains(required_properties);
        type_supported && props_supported
    })
}

pub struct DeviceMemoryPool {
    slots: Mutex<Vec<Slot>>,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl DeviceMemoryPool {
    pub fn new(memory_properties: vk::PhysicalDeviceMemoryProperties) -> Self {
        Self { slots: Mutex::new(Vec::with_capacity(MAX_SLOTS)), memory_properties }
    }

    /// Scans slots for one matching `(type_index, alloc_flags ⊇ requested,
    /// prop_flags ⊇ requested)`; returns its index if found.
    fn find_matching_slot(slots: &[Slot], type_index: u32, req: &AllocationRequest) -> Option<usize> {
        slots.iter().position(|slot| {
            slot.key.memory_type_index == type_index
                && slot.key.allocate_flags.contains(req.allocate_flags)
                && slot.key.property_flags.contains(req.property_flags)
        })
    }

    /// Allocates `req`, creating a new slab if no existing slot has room.
    /// The `create_slab` callback performs the actual `vkAllocateMemory` (and
    /// `vkMapMemory` if host-visible) and returns the raw handle plus an
    /// optional mapped pointer; it is injected so this type stays testable
    /// without a live device.
    pub fn allocate(
        &self,
        req: AllocationRequest,
        create_slab: impl FnOnce(u32, u64) -> Result<(vk::DeviceMemory, Option<*mut u8>)>,
    ) -> Result<DeviceAllocation> {
        let type_index = find_memory_type(&self.memory_properties, req.memory_type_bits, req.property_flags)
            .ok_or(Error::NoMatchingMemoryType)?;

        let mut slots = self.slots.lock();

        if let Some(slot_index) = Self::find_matching_slot(&slots, type_index, &req) {
            let slot = &mut slots[slot_index];
            if let Some((block_index, offset)) = slot.suballocator.allocate(req.size, req.alignment.max(MIN_ALIGNMENT)) {
                slot.refcount += 1;
                return Ok(DeviceAllocation { slot_index, block_index, offset, size: req.size });
            }
        }

        if slots.len() >= MAX_SLOTS {
            return Err(Error::SlotTableFull);
        }

        let slab_size = req.size.max(DEFAULT_SLAB_SIZE);
        let host_visible = req.property_flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE);
        let (memory, mapped_ptr) = create_slab(type_index, slab_size)?;

        log_info!(
            LOG,
            "created slab: type={type_index} size={slab_size} flags={:?} host_visible={host_visible}",
            req.property_flags
        );

        let mut suballocator = FreeListAllocator::new(slab_size);
        let (block_index, offset) = suballocator
            .allocate(req.size, req.alignment.max(MIN_ALIGNMENT))
            .ok_or(Error::AllocationRejected { requested: req.size })?;

        let slot_index = slots.len();
        slots.push(Slot {
            key: SlotKey { memory_type_index: type_index, allocate_flags: req.allocate_flags, property_flags: req.property_flags },
            memory,
            size: slab_size,
            mapped_ptr,
            refcount: 1,
            suballocator,
        });

        log_debug!(LOG, "slot {slot_index} allocated block {block_index} at offset {offset}");

        Ok(DeviceAllocation { slot_index, block_index, offset, size: req.size })
    }

    /// Releases `alloc`: the block returns to its slot's sub-allocator;
    /// slabs are never freed until shutdown.
    pub fn free(&self, alloc: DeviceAllocation) {
        let mut slots = self.slots.lock();
        let slot = &mut slots[alloc.slot_index];
        slot.suballocator.free(alloc.block_index);
        slot.refcount -= 1;
    }

    pub fn mapped_ptr(&self, slot_index: usize) -> Option<*mut u8> {
        self.slots.lock()[slot_index].mapped_ptr
    }

    pub fn slab_memory(&self, slot_index: usize) -> vk::DeviceMemory {
        self.slots.lock()[slot_index].memory
    }

    pub fn slab_size(&self, slot_index: usize) -> u64 {
        self.slots.lock()[slot_index].size
    }

    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }
}

/// The real `create_slab` callback [`DeviceMemoryPool::allocate`] expects:
/// `vkAllocateMemory`, plus `vkMapMemory` for host-visible requests.
/// Separated from `DeviceMemoryPool` itself so the pool's allocation logic
/// stays testable without a live `ash::Device`.
///
/// # Safety
/// `device` must be a valid, live logical device; `type_index` must be one
/// of its memory types.
pub unsafe fn alloc_slab_memory(device: &ash::Device, type_index: u32, size: u64, allocate_flags: AllocateFlags, host_visible: bool) -> Result<(vk::DeviceMemory, Option<*mut u8>)> {
    let mut vk_flags = vk::MemoryAllocateFlags::empty();
    if allocate_flags.contains(AllocateFlags::DEVICE_ADDRESS) {
        vk_flags |= vk::MemoryAllocateFlags::DEVICE_ADDRESS;
    }
    let mut flags_info = vk::MemoryAllocateFlagsInfo::builder().flags(vk_flags);

    let mut alloc_info = vk::MemoryAllocateInfo::builder().allocation_size(size).memory_type_index(type_index);
    if !vk_flags.is_empty() {
        alloc_info = alloc_info.push_next(&mut flags_info);
    }

    let memory = device.allocate_memory(&alloc_info, None)?;

    let mapped_ptr = if host_visible {
        match device.map_memory(memory, 0, size, vk::MemoryMapFlags::empty()) {
            Ok(ptr) => Some(ptr as *mut u8),
            Err(err) => {
                device.free_memory(memory, None);
                return Err(err.into());
            }
        }
    } else {
        None
    };

    Ok((memory, mapped_ptr))
}

/// Releases one slab back to the driver; `mapped_ptr` is implicitly
/// unmapped by `vkFreeMemory` so there is no separate unmap step.
///
/// # Safety
/// `memory` must not still be bound to any live resource.
pub unsafe fn free_slab_memory(device: &ash::Device, memory: vk::DeviceMemory) {
    device.free_memory(memory, None);
}

impl std::fmt::Display for AllocateFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_memory_properties(type_count: u32) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = type_count;
        for i in 0..type_count as usize {
            props.memory_types[i] = vk::MemoryType {
                property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                heap_index: 0,
            };
        }
        props
    }

    fn stub_create_slab(_type_index: u32, _size: u64) -> Result<(vk::DeviceMemory, Option<*mut u8>)> {
        Ok((vk::DeviceMemory::null(), None))
    }

    #[test]
    fn second_allocation_reuses_the_slot_created_by_the_first() {
        let pool = DeviceMemoryPool::new(dummy_memory_properties(1));
        let req = AllocationRequest {
            size: 1024,
            alignment: 16,
            property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE,
            allocate_flags: AllocateFlags::empty(),
            memory_type_bits: 0b1,
        };

        let a = pool.allocate(req, stub_create_slab).unwrap();
        let b = pool.allocate(req, stub_create_slab).unwrap();

        assert_eq!(a.slot_index, b.slot_index);
        assert_eq!(pool.slot_count(), 1);
        assert_ne!(a.block_index, b.block_index);
    }

    #[test]
    fn no_memory_type_satisfying_request_fails() {
        let pool = DeviceMemoryPool::new(dummy_memory_properties(1));
        let req = AllocationRequest {
            size: 1024,
            alignment: 16,
            property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE,
            allocate_flags: AllocateFlags::empty(),
            memory_type_bits: 0, // no bits set: no type matches
        };
        assert_eq!(pool.allocate(req, stub_create_slab), Err(Error::NoMatchingMemoryType));
    }

    #[test]
    fn slot_table_full_once_max_slots_distinct_types_are_used() {
        let pool = DeviceMemoryPool::new(dummy_memory_properties(MAX_SLOTS as u32 + 1));
        for i in 0..MAX_SLOTS {
            let req = AllocationRequest {
                size: 1024,
                alignment: 16,
                property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE,
                allocate_flags: AllocateFlags::empty(),
                memory_type_bits: 1 << i,
            };
            pool.allocate(req, stub_create_slab).unwrap();
        }
        let overflow_req = AllocationRequest {
            size: 1024,
            alignment: 16,
            property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE,
            allocate_flags: AllocateFlags::empty(),
            memory_type_bits: 1 << MAX_SLOTS,
        };
        assert_eq!(pool.allocate(overflow_req, stub_create_slab), Err(Error::SlotTableFull));
    }

    #[test]
    fn freeing_then_reallocating_the_same_size_reuses_the_block() {
        let pool = DeviceMemoryPool::new(dummy_memory_properties(1));
        let req = AllocationRequest {
            size: 256,
            alignment: 16,
            property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE,
            allocate_flags: AllocateFlags::empty(),
            memory_type_bits: 0b1,
        };
        let a = pool.allocate(req, stub_create_slab).unwrap();
        pool.free(a);
        let b = pool.allocate(req, stub_create_slab).unwrap();
        assert_eq!(a.offset, b.offset);
    }
}
