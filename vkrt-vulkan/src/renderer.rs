//! The concrete Vulkan [`Renderer`]: owns the device-memory pool, the
//! geometry/staging arenas, the RT model/TLAS cache, the light grid and the
//! frame controller, and is the one place in this crate that implements
//! `vkrt_core::host::Renderer` against a live `ash::Device` rather than
//! exercising those pieces through injected closures.

use std::collections::HashMap;

use ash::vk;
use glam::Vec3;

use vkrt_core::geom::Aabb;
use vkrt_core::host::{
    EntityHandle, EntityKind, HostEngine, ImageFormat, LoadedImage, MaterialInfo, MaterialQueryFlags, Renderer,
    RgbaBuffer, ScreenshotKind, TextureHandle, ViewPass,
};
use vkrt_core::kusok::KusokAllocator;
use vkrt_core::light::{LightGrid, DEFAULT_CELL_SIZE};
use vkrt_core::log::LogCategory;
use vkrt_core::shader_abi::MaterialMode;
use vkrt_core::{log_debug, log_warning};
use vkrt_core::Error as CoreError;

use crate::arena::{DeBuffer, StagingArena};
use crate::combuf::Combuf;
use crate::devmem::{self, AllocateFlags, AllocationRequest, DeviceAllocation, DeviceMemoryPool};
use crate::frame::{AcquireOutcome, FrameController, FrameSlot, SwapchainBackend, N_CONCURRENT};
use crate::model_cache::{AsRange, GeometrySignature, ModelCache, ModelRequest};

const LOG: LogCategory = LogCategory::new("renderer");

/// Sizes [`VulkanRenderer::new`] uses to configure the backing arenas.
pub struct VulkanRendererLimits {
    pub static_geometry_capacity: u64,
    pub dynamic_geometry_half_size: u64,
    pub staging_capacity: u64,
    pub model_cache_capacity: usize,
    pub world_bounds: Aabb,
}

struct TextureEntry {
    image: vk::Image,
    view: vk::ImageView,
    allocation: DeviceAllocation,
    /// Single refcount: nothing in the host/renderer boundary currently
    /// acquires a material reference independent of the host's own upload
    /// reference, so the two-counter scheme `TextureHandle` is documented
    /// for collapses to this one.
    refs: u32,
    material: MaterialInfo,
}

fn image_format_to_vk(format: ImageFormat) -> vk::Format {
    match format {
        ImageFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        ImageFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
        ImageFormat::Bc1Unorm => vk::Format::BC1_RGBA_UNORM_BLOCK,
        ImageFormat::Bc3Unorm => vk::Format::BC3_UNORM_BLOCK,
        ImageFormat::Bc5Unorm => vk::Format::BC5_UNORM_BLOCK,
        ImageFormat::Bc7Unorm => vk::Format::BC7_UNORM_BLOCK,
        ImageFormat::Bc7Srgb => vk::Format::BC7_SRGB_BLOCK,
    }
}

/// Composes every backend piece behind `vkrt_core::host::Renderer`. Generic
/// over the host engine and the swapchain so tests can substitute fakes for
/// both without this type itself changing.
pub struct VulkanRenderer<H: HostEngine, S: SwapchainBackend> {
    host: H,
    device: ash::Device,
    transfer_queue: vk::Queue,
    upload_pool: vk::CommandPool,
    upload_combuf: vk::CommandBuffer,
    upload_fence: vk::Fence,

    memory_pool: DeviceMemoryPool,
    geometry_buffer: DeBuffer,
    staging: StagingArena,
    staging_buffer: vk::Buffer,
    staging_allocation: DeviceAllocation,
    staging_ptr: *mut u8,

    kusok_alloc: KusokAllocator,
    model_cache: ModelCache,
    light_grid: LightGrid,
    frame: FrameController<S>,

    textures: HashMap<u32, TextureEntry>,
    next_texture_id: u32,
    scene_stack: Vec<Vec<(EntityKind, EntityHandle)>>,
    entities: Vec<(EntityKind, EntityHandle)>,
    frame_counter: u64,
    pending_acquire: Option<AcquireOutcome>,
    last_presented_image: Option<vk::Image>,
}

impl<H: HostEngine, S: SwapchainBackend> VulkanRenderer<H, S> {
    /// # Safety
    /// `device` must be a valid logical device created against
    /// `memory_properties`'s physical device; `transfer_queue` and every
    /// frame slot's sync objects allocated from it must support both
    /// graphics and transfer operations.
    pub unsafe fn new(
        host: H,
        device: ash::Device,
        memory_properties: vk::PhysicalDeviceMemoryProperties,
        queue_family_index: u32,
        transfer_queue: vk::Queue,
        swapchain: S,
        limits: VulkanRendererLimits,
    ) -> crate::Result<Self> {
        let memory_pool = DeviceMemoryPool::new(memory_properties);

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let upload_pool = device.create_command_pool(&pool_info, None)?;

        let mut slots = Vec::with_capacity(N_CONCURRENT);
        for _ in 0..N_CONCURRENT {
            let alloc_info = vk::CommandBufferAllocateInfo::builder().command_pool(upload_pool).level(vk::CommandBufferLevel::PRIMARY).command_buffer_count(1);
            let combuf_handle = device.allocate_command_buffers(&alloc_info)?[0];
            let fence = device.create_fence(&vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED), None)?;
            let sem_info = vk::SemaphoreCreateInfo::builder();
            slots.push(FrameSlot::new(
                Combuf::new(combuf_handle),
                fence,
                device.create_semaphore(&sem_info, None)?,
                device.create_semaphore(&sem_info, None)?,
                device.create_semaphore(&sem_info, None)?,
            ));
        }
        let frame = FrameController::new(slots, swapchain);

        let upload_alloc_info = vk::CommandBufferAllocateInfo::builder().command_pool(upload_pool).level(vk::CommandBufferLevel::PRIMARY).command_buffer_count(1);
        let upload_combuf = device.allocate_command_buffers(&upload_alloc_info)?[0];
        let upload_fence = device.create_fence(&vk::FenceCreateInfo::builder(), None)?;

        let staging_buffer_info = vk::BufferCreateInfo::builder().size(limits.staging_capacity).usage(vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST).sharing_mode(vk::SharingMode::EXCLUSIVE);
        let staging_buffer = device.create_buffer(&staging_buffer_info, None)?;
        let staging_reqs = device.get_buffer_memory_requirements(staging_buffer);
        let staging_allocation = memory_pool.allocate(
            AllocationRequest {
                size: staging_reqs.size,
                alignment: staging_reqs.alignment,
                property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                allocate_flags: AllocateFlags::empty(),
                memory_type_bits: staging_reqs.memory_type_bits,
            },
            |type_index, size| unsafe { devmem::alloc_slab_memory(&device, type_index, size, AllocateFlags::empty(), true) },
        )?;
        device.bind_buffer_memory(staging_buffer, memory_pool.slab_memory(staging_allocation.slot_index), staging_allocation.offset)?;
        let slab_ptr = memory_pool.mapped_ptr(staging_allocation.slot_index).ok_or(crate::Error::Fatal("staging slab is not host-visible"))?;
        let staging_ptr = slab_ptr.add(staging_allocation.offset as usize);

        Ok(Self {
            host,
            device,
            transfer_queue,
            upload_pool,
            upload_combuf,
            upload_fence,
            memory_pool,
            geometry_buffer: DeBuffer::new(limits.static_geometry_capacity, limits.dynamic_geometry_half_size),
            staging: StagingArena::new(limits.staging_capacity),
            staging_buffer,
            staging_allocation,
            staging_ptr,
            kusok_alloc: KusokAllocator::with_fixed_split(),
            model_cache: ModelCache::new(limits.model_cache_capacity),
            light_grid: LightGrid::new(limits.world_bounds, DEFAULT_CELL_SIZE),
            frame,
            textures: HashMap::new(),
            next_texture_id: 0,
            scene_stack: Vec::new(),
            entities: Vec::new(),
            frame_counter: 0,
            pending_acquire: None,
            last_presented_image: None,
        })
    }

    /// Records `record` into the dedicated upload command buffer and blocks
    /// until it retires. Used for texture uploads and screenshot readback,
    /// neither of which is on the per-frame critical path.
    unsafe fn immediate_submit(&self, record: impl FnOnce(&ash::Device, vk::CommandBuffer)) -> crate::Result<()> {
        self.device.reset_command_buffer(self.upload_combuf, vk::CommandBufferResetFlags::empty())?;
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device.begin_command_buffer(self.upload_combuf, &begin_info)?;
        record(&self.device, self.upload_combuf);
        self.device.end_command_buffer(self.upload_combuf)?;

        let combufs = [self.upload_combuf];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&combufs);
        self.device.reset_fences(&[self.upload_fence])?;
        self.device.queue_submit(self.transfer_queue, &[submit_info.build()], self.upload_fence)?;
        self.device.wait_for_fences(&[self.upload_fence], true, u64::MAX)?;
        Ok(())
    }

    fn upload_image(&mut self, image: LoadedImage) -> crate::Result<TextureHandle> {
        let format = image_format_to_vk(image.format);
        let extent = vk::Extent3D { width: image.width, height: image.height, depth: 1 };
        let create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(extent)
            .mip_levels(image.mip_count.max(1))
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let vk_image = unsafe { self.device.create_image(&create_info, None)? };
        let reqs = unsafe { self.device.get_image_memory_requirements(vk_image) };

        let device = &self.device;
        let allocation = match self.memory_pool.allocate(
            AllocationRequest {
                size: reqs.size,
                alignment: reqs.alignment,
                property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
                allocate_flags: AllocateFlags::empty(),
                memory_type_bits: reqs.memory_type_bits,
            },
            |type_index, size| unsafe { devmem::alloc_slab_memory(device, type_index, size, AllocateFlags::empty(), false) },
        ) {
            Ok(a) => a,
            Err(err) => {
                unsafe { self.device.destroy_image(vk_image, None) };
                return Err(err);
            }
        };
        unsafe { self.device.bind_image_memory(vk_image, self.memory_pool.slab_memory(allocation.slot_index), allocation.offset)? };

        let Some((staging_offset, tag)) = self.staging.commit(image.bytes.len() as u64) else {
            unsafe { self.device.destroy_image(vk_image, None) };
            self.memory_pool.free(allocation);
            return Err(crate::Error::AllocationRejected { requested: image.bytes.len() as u64 });
        };
        let _ = tag;
        unsafe {
            std::ptr::copy_nonoverlapping(image.bytes.as_ptr(), self.staging_ptr.add(staging_offset as usize), image.bytes.len());
        }

        let staging_buffer = self.staging_buffer;
        unsafe {
            self.immediate_submit(|device, cmd| {
                let to_dst = vk::ImageMemoryBarrier::builder()
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .src_access_mask(vk::AccessFlags::empty())
                    .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .image(vk_image)
                    .subresource_range(vk::ImageSubresourceRange { aspect_mask: vk::ImageAspectFlags::COLOR, base_mip_level: 0, level_count: vk::REMAINING_MIP_LEVELS, base_array_layer: 0, layer_count: vk::REMAINING_ARRAY_LAYERS })
                    .build();
                device.cmd_pipeline_barrier(cmd, vk::PipelineStageFlags::TOP_OF_PIPE, vk::PipelineStageFlags::TRANSFER, vk::DependencyFlags::empty(), &[], &[], &[to_dst]);

                let region = vk::BufferImageCopy::builder()
                    .buffer_offset(staging_offset)
                    .image_subresource(vk::ImageSubresourceLayers { aspect_mask: vk::ImageAspectFlags::COLOR, mip_level: 0, base_array_layer: 0, layer_count: 1 })
                    .image_extent(extent)
                    .build();
                device.cmd_copy_buffer_to_image(cmd, staging_buffer, vk_image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[region]);

                let to_read = vk::ImageMemoryBarrier::builder()
                    .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .dst_access_mask(vk::AccessFlags::SHADER_READ)
                    .image(vk_image)
                    .subresource_range(vk::ImageSubresourceRange { aspect_mask: vk::ImageAspectFlags::COLOR, base_mip_level: 0, level_count: vk::REMAINING_MIP_LEVELS, base_array_layer: 0, layer_count: vk::REMAINING_ARRAY_LAYERS })
                    .build();
                device.cmd_pipeline_barrier(cmd, vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::FRAGMENT_SHADER, vk::DependencyFlags::empty(), &[], &[], &[to_read]);
            })?;
        }
        self.staging.reclaim_up_to(staging_offset + image.bytes.len() as u64);

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(vk_image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange { aspect_mask: vk::ImageAspectFlags::COLOR, base_mip_level: 0, level_count: vk::REMAINING_MIP_LEVELS, base_array_layer: 0, layer_count: 1 });
        let view = unsafe { self.device.create_image_view(&view_info, None)? };

        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(id, TextureEntry { image: vk_image, view, allocation, refs: 1, material: MaterialInfo { mode: MaterialMode::Opaque, emissive: Vec3::ZERO } });
        Ok(TextureHandle(id))
    }

    /// Finds or creates a BLAS cache entry for `req`, reserving its
    /// kusochki range from the real static/dynamic `KusokAllocator` rather
    /// than a test-only stand-in. The shader-binding layer that walks
    /// `self.entities` into draw records each frame calls this once per
    /// distinct model.
    pub fn register_model(&mut self, req: ModelRequest, build_blas: impl FnOnce(&GeometrySignature) -> (AsRange, u32)) -> Option<usize> {
        let dynamic = req.dynamic;
        let count = req.geometry.len();
        let kusok_alloc = &mut self.kusok_alloc;
        self.model_cache.get_or_create(req, |_| if dynamic { kusok_alloc.reserve_dynamic(count) } else { kusok_alloc.reserve_static(count) }, build_blas)
    }

    fn release_texture_ref(&mut self, handle: TextureHandle) -> Result<(), CoreError> {
        let entry = self.textures.get_mut(&handle.0).ok_or(CoreError::NotFound("texture handle"))?;
        if entry.refs == 0 {
            return Err(CoreError::UseAfterRelease("texture already released by the host"));
        }
        entry.refs -= 1;
        if entry.refs == 0 {
            let entry = self.textures.remove(&handle.0).expect("checked above");
            unsafe {
                self.device.destroy_image_view(entry.view, None);
                self.device.destroy_image(entry.image, None);
            }
            self.memory_pool.free(entry.allocation);
        }
        Ok(())
    }
}

impl<H: HostEngine, S: SwapchainBackend> Renderer for VulkanRenderer<H, S> {
    fn begin_frame(&mut self, clear_scene: bool) -> Result<(), CoreError> {
        if clear_scene {
            Renderer::clear_scene(self);
        }
        self.light_grid.frame_begin(self.frame_counter);

        let device = &self.device;
        let outcome = self
            .frame
            .begin_frame(|fence| unsafe {
                device.wait_for_fences(&[fence], true, u64::MAX)?;
                device.reset_fences(&[fence])?;
                Ok(())
            })
            .map_err(|e| CoreError::Other(e.to_string()))?;
        self.pending_acquire = Some(outcome);
        Ok(())
    }

    fn render_frame(&mut self, view: ViewPass) -> Result<(), CoreError> {
        // Acceleration-structure build, descriptor updates and the
        // `vkCmdTraceRaysKHR` dispatch itself belong to the shader-binding
        // layer above this crate; this records nothing beyond bookkeeping
        // until that layer exists.
        if let Some(AcquireOutcome::Acquired { image_index }) = self.pending_acquire {
            log_debug!(LOG, "render_frame: {} entities, view origin ({:.1}, {:.1}, {:.1}), swapchain image {image_index}", self.entities.len(), view.origin.x, view.origin.y, view.origin.z);
        }
        self.frame.mark_rendered();
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), CoreError> {
        let acquired = self.pending_acquire.take().unwrap_or(AcquireOutcome::FrameLost);
        let queue = self.transfer_queue;
        let device = &self.device;
        self.frame
            .end_frame(acquired, |slot, _previous| unsafe {
                let wait_sems = [slot.sem_framebuffer_ready];
                let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
                let signal_sems = [slot.sem_done, slot.sem_done2];
                let combufs = [slot.combuf.handle];
                let submit_info = vk::SubmitInfo::builder()
                    .wait_semaphores(&wait_sems)
                    .wait_dst_stage_mask(&wait_stages)
                    .command_buffers(&combufs)
                    .signal_semaphores(&signal_sems);
                device.queue_submit(queue, &[submit_info.build()], slot.fence_done)?;
                Ok(())
            })
            .map_err(|e| CoreError::Other(e.to_string()))?;

        if let AcquireOutcome::Acquired { image_index } = acquired {
            self.last_presented_image = Some(self.frame.swapchain().swapchain_image(image_index));
        }

        self.geometry_buffer.flip();
        self.kusok_alloc.flip();
        self.model_cache.release_dynamic_for_frame();
        self.frame_counter += 1;
        Ok(())
    }

    fn add_entity(&mut self, kind: EntityKind, handle: EntityHandle) {
        self.entities.push((kind, handle));
    }

    fn clear_scene(&mut self) {
        self.entities.clear();
    }

    fn push_scene(&mut self) {
        self.scene_stack.push(std::mem::take(&mut self.entities));
    }

    fn pop_scene(&mut self) {
        self.entities = self.scene_stack.pop().unwrap_or_default();
    }

    fn screenshot(&mut self, kind: ScreenshotKind) -> Result<RgbaBuffer, CoreError> {
        let ScreenshotKind::Presented = kind else {
            return Err(CoreError::InvalidParameter("offscreen screenshots need a dedicated render target, not yet wired up"));
        };
        let Some(image) = self.last_presented_image else {
            return Err(CoreError::NotFound("a presented frame to read back"));
        };
        let (width, height) = self.frame.swapchain().current_extent();
        let byte_len = width as u64 * height as u64 * 4;
        let Some((staging_offset, _tag)) = self.staging.commit(byte_len) else {
            return Err(CoreError::CapacityExceeded { what: "staging arena", limit: 0 });
        };

        let staging_buffer = self.staging_buffer;
        let result = unsafe {
            self.immediate_submit(|device, cmd| {
                let to_src = vk::ImageMemoryBarrier::builder()
                    .old_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                    .new_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                    .src_access_mask(vk::AccessFlags::empty())
                    .dst_access_mask(vk::AccessFlags::TRANSFER_READ)
                    .image(image)
                    .subresource_range(vk::ImageSubresourceRange { aspect_mask: vk::ImageAspectFlags::COLOR, base_mip_level: 0, level_count: 1, base_array_layer: 0, layer_count: 1 })
                    .build();
                device.cmd_pipeline_barrier(cmd, vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::TRANSFER, vk::DependencyFlags::empty(), &[], &[], &[to_src]);

                let region = vk::BufferImageCopy::builder()
                    .buffer_offset(staging_offset)
                    .image_subresource(vk::ImageSubresourceLayers { aspect_mask: vk::ImageAspectFlags::COLOR, mip_level: 0, base_array_layer: 0, layer_count: 1 })
                    .image_extent(vk::Extent3D { width, height, depth: 1 })
                    .build();
                device.cmd_copy_image_to_buffer(cmd, image, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, staging_buffer, &[region]);

                let back_to_present = vk::ImageMemoryBarrier::builder()
                    .old_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                    .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                    .src_access_mask(vk::AccessFlags::TRANSFER_READ)
                    .dst_access_mask(vk::AccessFlags::empty())
                    .image(image)
                    .subresource_range(vk::ImageSubresourceRange { aspect_mask: vk::ImageAspectFlags::COLOR, base_mip_level: 0, level_count: 1, base_array_layer: 0, layer_count: 1 })
                    .build();
                device.cmd_pipeline_barrier(cmd, vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::BOTTOM_OF_PIPE, vk::DependencyFlags::empty(), &[], &[], &[back_to_present]);
            })
        };
        if let Err(err) = result {
            return Err(CoreError::Other(err.to_string()));
        }

        let mut pixels = vec![0u8; byte_len as usize];
        unsafe {
            std::ptr::copy_nonoverlapping(self.staging_ptr.add(staging_offset as usize), pixels.as_mut_ptr(), byte_len as usize);
        }
        self.staging.reclaim_up_to(staging_offset + byte_len);
        Ok(RgbaBuffer { width, height, pixels })
    }

    fn upload_texture_from_memory(&mut self, name: &str, image: LoadedImage) -> Result<TextureHandle, CoreError> {
        self.upload_image(image).map_err(|e| {
            log_warning!(LOG, "upload_texture_from_memory({name}) failed: {e}");
            CoreError::Other(e.to_string())
        })
    }

    fn upload_texture_from_file(&mut self, relative_path: &str) -> Result<TextureHandle, CoreError> {
        let image = self.host.load_image_file(relative_path)?;
        self.upload_image(image).map_err(|e| {
            log_warning!(LOG, "upload_texture_from_file({relative_path}) failed: {e}");
            CoreError::Other(e.to_string())
        })
    }

    fn free_texture(&mut self, handle: TextureHandle) {
        if let Err(err) = self.release_texture_ref(handle) {
            log_warning!(LOG, "free_texture({}): {err}", handle.0);
        }
    }

    fn get_material_for_texture(&self, handle: TextureHandle, flags: MaterialQueryFlags) -> Option<MaterialInfo> {
        let entry = self.textures.get(&handle.0)?;
        let mut material = entry.material;
        if flags.contains(MaterialQueryFlags::FORCE_OPAQUE) {
            material.mode = MaterialMode::Opaque;
        }
        Some(material)
    }
}

impl<H: HostEngine, S: SwapchainBackend> Drop for VulkanRenderer<H, S> {
    fn drop(&mut self) {
        // SAFETY: dropping implies the host is done submitting frames; wait
        // idle before tearing down resources the GPU might still reference.
        unsafe {
            let _ = self.device.device_wait_idle();
            for (_, entry) in self.textures.drain() {
                self.device.destroy_image_view(entry.view, None);
                self.device.destroy_image(entry.image, None);
            }
            self.device.destroy_buffer(self.staging_buffer, None);
            self.device.destroy_fence(self.upload_fence, None);
            self.device.destroy_command_pool(self.upload_pool, None);
        }
    }
}
