//! Per-thread command pool ownership (spec §4.1, Design Notes §9)

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use ash::vk;

use super::context::GpuError;

/// RAII command pool, grounded on the teacher's `CommandPool` in
/// `render/vulkan/commands.rs`.
pub struct CommandPool {
    device: ash::Device,
    handle: vk::CommandPool,
}

impl CommandPool {
    /// Create a new command pool for `queue_family_index`, resettable per buffer.
    pub fn new(device: ash::Device, queue_family_index: u32) -> Result<Self, GpuError> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let handle = unsafe { device.create_command_pool(&create_info, None) }
            .map_err(|e| GpuError::Api(e.into()))?;

        Ok(Self { device, handle })
    }

    /// The raw pool handle.
    #[must_use]
    pub const fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    /// Allocate `count` command buffers at the given level.
    pub fn allocate_command_buffers(
        &self,
        count: u32,
        level: vk::CommandBufferLevel,
    ) -> Result<Vec<vk::CommandBuffer>, GpuError> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.handle)
            .level(level)
            .command_buffer_count(count);

        unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(|e| GpuError::Api(e.into()))
    }

    /// Reset the pool, implicitly resetting every buffer allocated from it.
    ///
    /// Only safe to call when no command buffer from this pool is being
    /// recorded on another thread; callers must hold a [`QuiescedWorkers`]
    /// token to call this through [`ThreadPoolRegistry::reset_all`].
    pub fn reset(&self) -> Result<(), GpuError> {
        unsafe {
            self.device
                .reset_command_pool(self.handle, vk::CommandPoolResetFlags::empty())
        }
        .map_err(|e| GpuError::Api(e.into()))
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.handle, None);
        }
    }
}

/// Proof that no worker thread is currently recording into a pool owned by
/// [`ThreadPoolRegistry`]. The render thread must construct one (by
/// quiescing workers through whatever scheduler drives them) before calling
/// [`ThreadPoolRegistry::reset_all`], per Design Notes §9.
pub struct QuiescedWorkers {
    _private: (),
}

impl QuiescedWorkers {
    /// Assert that workers are quiesced. Callers are responsible for the
    /// actual synchronization (e.g. draining the marshal and joining or
    /// parking every worker) before constructing this token.
    #[must_use]
    pub const fn assert_quiesced() -> Self {
        Self { _private: () }
    }
}

/// Thread-keyed registry of command pools: each worker thread owns exactly
/// one pool, created on first use and never shared across threads, matching
/// the ownership-per-thread registry called for in Design Notes §9.
pub struct ThreadPoolRegistry {
    device: ash::Device,
    queue_family_index: u32,
    main_thread: ThreadId,
    main_pool: Arc<CommandPool>,
    worker_pools: Mutex<HashMap<ThreadId, Arc<CommandPool>>>,
}

impl ThreadPoolRegistry {
    /// Create the registry, eagerly building the main-thread pool.
    pub fn new(device: ash::Device, queue_family_index: u32) -> Result<Self, GpuError> {
        let main_pool = Arc::new(CommandPool::new(device.clone(), queue_family_index)?);
        Ok(Self {
            device,
            queue_family_index,
            main_thread: std::thread::current().id(),
            main_pool,
            worker_pools: Mutex::new(HashMap::new()),
        })
    }

    /// Return the pool for the calling thread, creating one on first use if
    /// the caller is not the designated main thread.
    pub fn pool_for_current_thread(&self) -> Result<Arc<CommandPool>, GpuError> {
        let current = std::thread::current().id();
        if current == self.main_thread {
            return Ok(Arc::clone(&self.main_pool));
        }

        let mut pools = self
            .worker_pools
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(pool) = pools.get(&current) {
            return Ok(Arc::clone(pool));
        }

        let pool = Arc::new(CommandPool::new(self.device.clone(), self.queue_family_index)?);
        pools.insert(current, Arc::clone(&pool));
        Ok(pool)
    }

    /// Drop a worker's pool, e.g. from that thread's cleanup hook.
    pub fn release_current_thread(&self) {
        let current = std::thread::current().id();
        let mut pools = self
            .worker_pools
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        pools.remove(&current);
    }

    /// Reset every worker pool. Requires proof that no worker is recording.
    pub fn reset_all(&self, _proof: &QuiescedWorkers) -> Result<(), GpuError> {
        let pools = self
            .worker_pools
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for pool in pools.values() {
            pool.reset()?;
        }
        Ok(())
    }

    /// Number of worker pools currently registered (for diagnostics/tests).
    #[must_use]
    pub fn worker_pool_count(&self) -> usize {
        self.worker_pools
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiesced_token_can_be_constructed_without_unsafe() {
        let _token = QuiescedWorkers::assert_quiesced();
    }
}
