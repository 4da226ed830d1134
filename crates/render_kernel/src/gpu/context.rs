//! Device, queue, and command-pool ownership (spec §4.1)

use std::sync::Mutex;

use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use thiserror::Error;

use crate::error::ApiError;

use super::command_pool::ThreadPoolRegistry;

/// Errors local to the GPU bring-up and submission layer, grounded on the
/// teacher's `VulkanError` in
/// `render/backends/vulkan/initialization/context.rs`.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Raw Vulkan API failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Instance/device/surface bring-up failed.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// No queue family satisfies the requested capability set.
    #[error("no suitable queue family for {0}")]
    NoSuitableQueueFamily(&'static str),

    /// No memory type satisfies the requested property flags.
    #[error("no suitable memory type")]
    NoSuitableMemoryType,

    /// A named GPU resource could not be located.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
}

/// Queue family indices selected at device-creation time. Present and
/// compute may alias graphics when the device exposes a single universal
/// family, per spec §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    /// Graphics queue family index.
    pub graphics: u32,
    /// Present queue family index (may equal `graphics`).
    pub present: u32,
    /// Compute queue family index (may equal `graphics`).
    pub compute: u32,
}

impl QueueFamilies {
    /// Whether the present queue shares a family with graphics.
    #[must_use]
    pub const fn present_aliases_graphics(&self) -> bool {
        self.present == self.graphics
    }

    /// Whether the compute queue shares a family with graphics.
    #[must_use]
    pub const fn compute_aliases_graphics(&self) -> bool {
        self.compute == self.graphics
    }
}

/// Stable handles for the logical device, its three queues, a thread-keyed
/// command-pool registry, and the mutex that serializes queue access.
///
/// The GPU API requires external synchronization on queue submission,
/// waiting, and presentation; every path that touches a `vk::Queue` in this
/// crate goes through [`GpuContext::queue_submit`],
/// [`GpuContext::queue_wait_idle`], or [`GpuContext::queue_present`] so that
/// requirement is centralized in one place instead of scattered locks.
pub struct GpuContext {
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    swapchain_loader: ash::extensions::khr::Swapchain,
    acceleration_structure_loader: ash::extensions::khr::AccelerationStructure,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    families: QueueFamilies,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    compute_queue: vk::Queue,
    queue_mutex: Mutex<()>,
    pools: ThreadPoolRegistry,
}

impl GpuContext {
    /// Build a context from an already-selected physical device and its
    /// queue families. Surface/window creation and device/physical-device
    /// selection themselves are out of scope (spec §1 Non-goals); callers
    /// hand in a window only to build the presentation surface.
    pub fn new<W>(
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        families: QueueFamilies,
        _window: &W,
    ) -> Result<Self, GpuError>
    where
        W: HasRawWindowHandle + HasRawDisplayHandle,
    {
        let swapchain_loader = ash::extensions::khr::Swapchain::new(&instance, &device);
        let acceleration_structure_loader =
            ash::extensions::khr::AccelerationStructure::new(&instance, &device);
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };
        let compute_queue = unsafe { device.get_device_queue(families.compute, 0) };

        let pools = ThreadPoolRegistry::new(device.clone(), families.graphics)?;

        Ok(Self {
            instance,
            physical_device,
            device,
            swapchain_loader,
            acceleration_structure_loader,
            memory_properties,
            families,
            graphics_queue,
            present_queue,
            compute_queue,
            queue_mutex: Mutex::new(()),
            pools,
        })
    }

    /// The logical device.
    #[must_use]
    pub const fn device(&self) -> &ash::Device {
        &self.device
    }

    /// The Vulkan instance (needed for extension loaders owned elsewhere).
    #[must_use]
    pub const fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// The physical device backing this context.
    #[must_use]
    pub const fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// The swapchain extension loader, shared so `Swapchain` does not
    /// re-load it.
    #[must_use]
    pub const fn swapchain_loader(&self) -> &ash::extensions::khr::Swapchain {
        &self.swapchain_loader
    }

    /// The acceleration-structure extension loader, used by
    /// [`crate::rt::BvhBuilder`] to build BLAS/TLAS handles.
    #[must_use]
    pub const fn acceleration_structure_loader(&self) -> &ash::extensions::khr::AccelerationStructure {
        &self.acceleration_structure_loader
    }

    /// Selected queue family indices.
    #[must_use]
    pub const fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    /// Device memory properties, used by [`super::allocate_memory`].
    #[must_use]
    pub const fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// The thread-keyed command-pool registry.
    #[must_use]
    pub const fn command_pools(&self) -> &ThreadPoolRegistry {
        &self.pools
    }

    /// Submit to the graphics queue, serialized by `queue_mutex`.
    pub fn queue_submit(
        &self,
        submits: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> Result<(), GpuError> {
        let _guard = self.queue_mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe { self.device.queue_submit(self.graphics_queue, submits, fence) }
            .map_err(|e| GpuError::Api(e.into()))
    }

    /// Submit to the compute queue, serialized by the same `queue_mutex`
    /// even when compute aliases the graphics family.
    pub fn queue_submit_compute(
        &self,
        submits: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> Result<(), GpuError> {
        let _guard = self.queue_mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe { self.device.queue_submit(self.compute_queue, submits, fence) }
            .map_err(|e| GpuError::Api(e.into()))
    }

    /// Wait for the graphics queue to go idle.
    pub fn queue_wait_idle(&self) -> Result<(), GpuError> {
        let _guard = self.queue_mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe { self.device.queue_wait_idle(self.graphics_queue) }
            .map_err(|e| GpuError::Api(e.into()))
    }

    /// Present `image_index`, serialized by `queue_mutex`.
    pub fn queue_present(
        &self,
        present_info: &vk::PresentInfoKHR,
    ) -> Result<bool, GpuError> {
        let _guard = self.queue_mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe { self.swapchain_loader.queue_present(self.present_queue, present_info) }
            .map_err(|e| GpuError::Api(e.into()))
    }

    /// Wait for the full device to go idle (used at shutdown/recreate).
    pub fn device_wait_idle(&self) -> Result<(), GpuError> {
        unsafe { self.device.device_wait_idle() }.map_err(|e| GpuError::Api(e.into()))
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        let _ = self.device_wait_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn present_and_compute_alias_detection() {
        let families = QueueFamilies {
            graphics: 0,
            present: 0,
            compute: 1,
        };
        assert!(families.present_aliases_graphics());
        assert!(!families.compute_aliases_graphics());
    }
}
