use core::fmt;

/// Error produced by the Vulkan backend. Mirrors `vkrt_core::Error`'s shape
/// (manual `Display`, no `thiserror`) plus a fatal/transient split specific
/// to swapchain and device-memory failures.
#[derive(Clone, PartialEq, Debug)]
pub enum Error {
    /// Out-of-device-memory, device-lost, or an explicitly-fatal validation
    /// error: the caller crashes with this as the diagnostic.
    Fatal(&'static str),
    /// Swapchain out-of-date/timeout/not-ready/surface-lost: the frame is
    /// dropped, the state machine still advances.
    FrameLost(&'static str),
    /// No memory type satisfies the request, the slot table is full, or the
    /// underlying allocator rejected the size.
    NoMatchingMemoryType,
    SlotTableFull,
    AllocationRejected { requested: u64 },
    /// Propagated from `vkrt_core`.
    Core(vkrt_core::Error),
    VkResult(ash::vk::Result),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Fatal(reason) => write!(f, "fatal device error: {reason}"),
            Error::FrameLost(reason) => write!(f, "frame lost: {reason}"),
            Error::NoMatchingMemoryType => f.write_str("no memory type satisfies the request"),
            Error::SlotTableFull => f.write_str("device memory slot table is full"),
            Error::AllocationRejected { requested } => write!(f, "allocator rejected request for {requested} bytes"),
            Error::Core(e) => write!(f, "{e}"),
            Error::VkResult(r) => write!(f, "vulkan result: {r}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<vkrt_core::Error> for Error {
    fn from(e: vkrt_core::Error) -> Self {
        Error::Core(e)
    }
}

impl From<ash::vk::Result> for Error {
    fn from(r: ash::vk::Result) -> Self {
        Error::VkResult(r)
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// Classification of a swapchain `acquire`/`present` `vk::Result`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SwapchainOutcome {
    Ok,
    /// Continue this frame, but flag a swapchain recreate for next frame.
    Suboptimal,
    /// Retry once after recreating; if it still fails, the frame is lost.
    RetryAfterRecreate,
    /// Frame is lost; caller still submits a no-op.
    FrameLost,
    /// Unrecoverable; the caller should crash.
    Fatal,
}

pub fn classify_acquire(result: ash::vk::Result) -> SwapchainOutcome {
    use ash::vk::Result as R;
    match result {
        R::SUCCESS => SwapchainOutcome::Ok,
        R::SUBOPTIMAL_KHR => SwapchainOutcome::Suboptimal,
        R::ERROR_OUT_OF_DATE_KHR | R::ERROR_SURFACE_LOST_KHR => SwapchainOutcome::RetryAfterRecreate,
        R::TIMEOUT | R::NOT_READY => SwapchainOutcome::FrameLost,
        R::ERROR_OUT_OF_HOST_MEMORY | R::ERROR_OUT_OF_DEVICE_MEMORY | R::ERROR_DEVICE_LOST => SwapchainOutcome::Fatal,
        _ => SwapchainOutcome::Fatal,
    }
}

/// `present` uses a looser classification than `acquire`: `OUT_OF_DATE` just
/// logs and requests a recreate next frame, it never retries inline.
pub fn classify_present(result: ash::vk::Result) -> SwapchainOutcome {
    use ash::vk::Result as R;
    match result {
        R::SUCCESS => SwapchainOutcome::Ok,
        R::SUBOPTIMAL_KHR | R::ERROR_OUT_OF_DATE_KHR => SwapchainOutcome::Suboptimal,
        R::ERROR_OUT_OF_HOST_MEMORY | R::ERROR_OUT_OF_DEVICE_MEMORY | R::ERROR_DEVICE_LOST => SwapchainOutcome::Fatal,
        _ => SwapchainOutcome::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_out_of_date_asks_for_retry_after_recreate() {
        assert_eq!(classify_acquire(ash::vk::Result::ERROR_OUT_OF_DATE_KHR), SwapchainOutcome::RetryAfterRecreate);
    }

    #[test]
    fn present_out_of_date_is_non_fatal() {
        assert_eq!(classify_present(ash::vk::Result::ERROR_OUT_OF_DATE_KHR), SwapchainOutcome::Suboptimal);
    }

    #[test]
    fn device_lost_is_always_fatal() {
        assert_eq!(classify_acquire(ash::vk::Result::ERROR_DEVICE_LOST), SwapchainOutcome::Fatal);
        assert_eq!(classify_present(ash::vk::Result::ERROR_DEVICE_LOST), SwapchainOutcome::Fatal);
    }
}
