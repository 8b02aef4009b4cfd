//! Real ash-backed swapchain: creation, resize, and the acquire/present
//! calls [`crate::frame::FrameController`]'s `SwapchainBackend` trait wraps.
//! Everything else in this crate treats the swapchain through that trait so
//! the frame state machine stays testable without a live surface; this is
//! the one implementation of it that actually talks to the driver.

use ash::extensions::khr;
use ash::vk;

use vkrt_core::log::LogCategory;
use vkrt_core::log_error;

use crate::error::Result;
use crate::frame::SwapchainBackend;

const LOG: LogCategory = LogCategory::new("swapchain");

pub struct VulkanSwapchain {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    loader: khr::Swapchain,
    surface_loader: khr::Surface,
    surface: vk::SurfaceKHR,
    present_queue: vk::Queue,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    swapchain: vk::SwapchainKHR,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
}

impl VulkanSwapchain {
    /// # Safety
    /// `physical_device` must be the device `surface` was queried against,
    /// and `present_queue` must support presenting to it.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn new(
        instance: &ash::Instance,
        device: ash::Device,
        physical_device: vk::PhysicalDevice,
        surface_loader: khr::Surface,
        surface: vk::SurfaceKHR,
        present_queue: vk::Queue,
        format: vk::SurfaceFormatKHR,
        present_mode: vk::PresentModeKHR,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let loader = khr::Swapchain::new(instance, &device);
        let mut swapchain = Self {
            device,
            physical_device,
            loader,
            surface_loader,
            surface,
            present_queue,
            format,
            present_mode,
            swapchain: vk::SwapchainKHR::null(),
            extent: vk::Extent2D { width, height },
            images: Vec::new(),
        };
        swapchain.create_swapchain(width, height)?;
        Ok(swapchain)
    }

    unsafe fn create_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        let capabilities = self.surface_loader.get_physical_device_surface_capabilities(self.physical_device, self.surface)?;
        let extent = vk::Extent2D {
            width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width.max(1)),
            height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height.max(1)),
        };
        let image_count = if capabilities.max_image_count == 0 {
            capabilities.min_image_count + 1
        } else {
            (capabilities.min_image_count + 1).min(capabilities.max_image_count)
        };

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(self.format.format)
            .image_color_space(self.format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = self.loader.create_swapchain(&create_info, None)?;
        if old_swapchain != vk::SwapchainKHR::null() {
            self.loader.destroy_swapchain(old_swapchain, None);
        }

        self.images = self.loader.get_swapchain_images(swapchain)?;
        self.swapchain = swapchain;
        self.extent = extent;
        Ok(())
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        // SAFETY: nothing else references `self.swapchain` once this type is dropped.
        unsafe {
            if self.swapchain != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.swapchain, None);
            }
        }
    }
}

impl SwapchainBackend for VulkanSwapchain {
    fn current_extent(&self) -> (u32, u32) {
        (self.extent.width, self.extent.height)
    }

    fn surface_extent(&self) -> (u32, u32) {
        // SAFETY: read-only query, valid as long as `self.surface` is alive.
        let capabilities = unsafe { self.surface_loader.get_physical_device_surface_capabilities(self.physical_device, self.surface) };
        match capabilities {
            Ok(c) => (c.current_extent.width, c.current_extent.height),
            Err(_) => self.current_extent(),
        }
    }

    fn recreate(&mut self, width: u32, height: u32) {
        // SAFETY: recreate is only called between frames, never while a
        // combuf referencing the old images is in flight.
        if let Err(err) = unsafe { self.create_swapchain(width, height) } {
            log_error!(LOG, "swapchain recreate failed: {err}");
        }
    }

    fn acquire_next_image(&mut self, sem_framebuffer_ready: vk::Semaphore) -> std::result::Result<u32, vk::Result> {
        // SAFETY: `self.swapchain` is live and `sem_framebuffer_ready` is unsignaled.
        unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, sem_framebuffer_ready, vk::Fence::null())
                .map(|(index, _suboptimal)| index)
        }
    }

    fn queue_present(&mut self, image_index: u32, wait_sem: vk::Semaphore) -> std::result::Result<(), vk::Result> {
        let swapchains = [self.swapchain];
        let indices = [image_index];
        let wait = [wait_sem];
        let present_info = vk::PresentInfoKHR::builder().wait_semaphores(&wait).swapchains(&swapchains).image_indices(&indices);
        // SAFETY: `self.present_queue` supports presenting to `self.surface`.
        unsafe { self.loader.queue_present(self.present_queue, &present_info).map(|_suboptimal| ()) }
    }

    fn swapchain_image(&self, index: u32) -> vk::Image {
        self.images[index as usize]
    }
}
