//! Crate-wide error taxonomy
//!
//! Each subsystem owns a focused `thiserror` enum (`GpuError`,
//! `SwapchainError`, `MarshalError`, `BvhError`, ...); this module defines
//! the kinds shared across all of them and the top-level error that bridges
//! subsystem errors together the way [`crate::engine`] bridges `EngineError`
//! into `AppError` in the teacher engine.

use ash::vk;
use thiserror::Error;

/// Raw Vulkan API failure, carrying the result code for diagnostics.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Vulkan API error: {0:?}")]
pub struct ApiError(pub vk::Result);

impl From<vk::Result> for ApiError {
    fn from(result: vk::Result) -> Self {
        Self(result)
    }
}

/// Error kinds shared by every subsystem in this crate (see spec §7).
#[derive(Error, Debug)]
pub enum RenderKernelError {
    /// Device, instance, or pipeline bring-up failed.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// A named resource (pipeline, image, handle) could not be located.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// A resource load or decode failed outside this crate's boundary.
    #[error("resource load failed: {0}")]
    ResourceLoadFailed(String),

    /// Host or device memory allocation failed.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// The logical device was lost (`VK_ERROR_DEVICE_LOST`). Fatal.
    #[error("device lost")]
    DeviceLost,

    /// The presentation surface was lost (`VK_ERROR_SURFACE_LOST_KHR`). Fatal.
    #[error("surface lost")]
    SurfaceLost,

    /// Acquire/present reported `OUT_OF_DATE_KHR`; recovered locally by the caller.
    #[error("swapchain out of date")]
    OutOfDate,

    /// An operation was attempted from an invalid state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The requested operation is not supported by this device/build.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// A wait operation exceeded its timeout.
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Configuration or asset file I/O failed.
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker thread pool has shut down and can no longer accept work.
    #[error("thread pool shut down")]
    ThreadPoolShutdown,

    /// A dispatched work item (BVH build, secondary recording) failed.
    #[error("work item failed: {0}")]
    WorkItemFailed(String),

    /// Raw Vulkan API error, propagated from a `vk::Result`.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Config parse/serialize error.
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Bridged from `gpu::GpuError` (device/queue/command-pool layer).
    #[error(transparent)]
    Gpu(#[from] crate::gpu::GpuError),

    /// Bridged from `swapchain::SwapchainError`.
    #[error(transparent)]
    Swapchain(#[from] crate::swapchain::SwapchainError),

    /// Bridged from `command::MarshalError`.
    #[error(transparent)]
    Marshal(#[from] crate::command::MarshalError),

    /// Bridged from `rt::BvhError`.
    #[error(transparent)]
    Bvh(#[from] crate::rt::BvhError),

    /// Bridged from `layer::LayerError`.
    #[error(transparent)]
    Layer(#[from] crate::layer::LayerError),

    /// Bridged from `frame::FrameLoopError`.
    #[error(transparent)]
    FrameLoop(#[from] crate::frame::FrameLoopError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RenderKernelError>;

impl From<vk::Result> for RenderKernelError {
    fn from(result: vk::Result) -> Self {
        Self::Api(ApiError(result))
    }
}

/// Recovery strategy for a failed operation (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Retry the operation, up to the configured retry count.
    Retry,
    /// Fall back to a degraded but valid state.
    Fallback,
    /// Skip the operation for this frame and continue.
    Skip,
    /// Abort: propagate the error to the caller.
    Abort,
}

/// Tracks retries for a recoverable operation with a default cap of 3.
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    remaining: u32,
}

impl RetryBudget {
    /// Default retry budget (3 attempts), matching spec §7.
    pub const DEFAULT_RETRIES: u32 = 3;

    /// Create a new budget with the default retry count.
    #[must_use]
    pub fn new() -> Self {
        Self {
            remaining: Self::DEFAULT_RETRIES,
        }
    }

    /// Create a budget with a custom retry count.
    #[must_use]
    pub const fn with_retries(retries: u32) -> Self {
        Self { remaining: retries }
    }

    /// Consume one retry attempt. Returns `true` if an attempt remains.
    pub fn try_consume(&mut self) -> bool {
        if self.remaining == 0 {
            false
        } else {
            self.remaining -= 1;
            true
        }
    }

    /// Remaining attempts.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_budget_exhausts_after_default_count() {
        let mut budget = RetryBudget::new();
        for _ in 0..RetryBudget::DEFAULT_RETRIES {
            assert!(budget.try_consume());
        }
        assert!(!budget.try_consume());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn custom_retry_budget() {
        let mut budget = RetryBudget::with_retries(1);
        assert!(budget.try_consume());
        assert!(!budget.try_consume());
    }
}
