//! Vulkan backend for the ray-traced scene core: device-memory pool,
//! buffer/image arena, combined command-buffer, RT model/TLAS manager, and
//! the frame controller. Built on `ash`; the backend-agnostic data model
//! and host/renderer traits live in `vkrt-core`.

pub mod arena;
pub mod combuf;
pub mod devmem;
pub mod error;
pub mod frame;
pub mod model_cache;
pub mod renderer;
pub mod suballoc;
pub mod swapchain;

pub use error::{Error, Result};
pub use renderer::VulkanRenderer;
