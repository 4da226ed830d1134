//! Double-buffered collection of worker-recorded secondary command buffers
//!
//! New relative to the teacher (it has no worker-recording precedent), but
//! built from the same RAII/error idiom as `render/vulkan/commands.rs`
//! (`CommandPool`, `CommandRecorder`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ash::vk;
use thiserror::Error;

use crate::error::ApiError;
use crate::gpu::CommandPool;

/// Errors local to the marshal.
#[derive(Error, Debug)]
pub enum MarshalError {
    /// Raw Vulkan API failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A method requiring an active recording was called without one.
    #[error("secondary command buffer is not recording")]
    NotRecording,

    /// `clear_pending` or a worker-pool reset was attempted while a worker
    /// still held an active recorder.
    #[error("cannot reset while a worker is recording")]
    WorkerStillRecording,

    /// Allocating the secondary command buffer itself failed.
    #[error("failed to allocate secondary command buffer: {0}")]
    Gpu(#[from] crate::gpu::GpuError),
}

/// A buffer/memory pair kept alive until the GPU is known to be finished
/// with the secondary that referenced it (typically a staging buffer).
pub type PendingResource = (vk::Buffer, vk::DeviceMemory);

/// A recorded-but-not-yet-submitted secondary command buffer.
pub struct SecondaryCmd {
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
    pending_resources: Vec<PendingResource>,
    owning_pool_is_main: bool,
    /// The frame slot this secondary was appended under, set once it
    /// reaches the submitted list.
    frame_slot: Option<usize>,
}

impl SecondaryCmd {
    /// The recorded secondary command buffer.
    #[must_use]
    pub const fn buffer(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// Whether this secondary was allocated from the main thread's pool
    /// rather than a worker pool.
    #[must_use]
    pub const fn owning_pool_is_main(&self) -> bool {
        self.owning_pool_is_main
    }
}

/// An in-progress secondary recording, returned by
/// [`SecondaryCmdMarshal::begin_secondary`]. Must be finished with
/// [`SecondaryRecorder::end_secondary`] to be appended to the marshal.
pub struct SecondaryRecorder<'a> {
    device: &'a ash::Device,
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
    pending_resources: Vec<PendingResource>,
    owning_pool_is_main: bool,
    ended: bool,
}

impl<'a> SecondaryRecorder<'a> {
    /// Register a resource (typically a staging buffer) to be freed once
    /// the GPU has finished executing this secondary.
    pub fn add_pending_resource(&mut self, resource: PendingResource) {
        self.pending_resources.push(resource);
    }

    /// The secondary command buffer being recorded, for issuing `cmd_*` calls.
    #[must_use]
    pub const fn buffer(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// End recording and hand the record back to the marshal to append.
    pub fn end_secondary(mut self) -> Result<SecondaryCmd, MarshalError> {
        unsafe { self.device.end_command_buffer(self.buffer) }
            .map_err(|e| MarshalError::Api(e.into()))?;
        self.ended = true;

        Ok(SecondaryCmd {
            pool: self.pool,
            buffer: self.buffer,
            pending_resources: std::mem::take(&mut self.pending_resources),
            owning_pool_is_main: self.owning_pool_is_main,
            frame_slot: None,
        })
    }
}

impl Drop for SecondaryRecorder<'_> {
    fn drop(&mut self) {
        debug_assert!(
            self.ended,
            "SecondaryRecorder dropped without calling end_secondary"
        );
    }
}

/// Collects secondary command buffers recorded by worker threads into a
/// double buffer, and lets the render thread splice them into a primary
/// command buffer once per frame without taking a lock on the read side.
pub struct SecondaryCmdMarshal {
    pending: [Mutex<Vec<SecondaryCmd>>; 2],
    write_index: AtomicUsize,
    submitted: Mutex<Vec<SecondaryCmd>>,
}

impl SecondaryCmdMarshal {
    /// Create an empty marshal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: [Mutex::new(Vec::new()), Mutex::new(Vec::new())],
            write_index: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Begin recording a secondary command buffer from `pool`, with
    /// `{one_time_submit, simultaneous_use}` flags and a null render-pass
    /// inheritance record, per spec §4.2 step 1.
    pub fn begin_secondary<'a>(
        &self,
        device: &'a ash::Device,
        pool: &CommandPool,
        owning_pool_is_main: bool,
    ) -> Result<SecondaryRecorder<'a>, MarshalError> {
        let buffers = pool.allocate_command_buffers(1, vk::CommandBufferLevel::SECONDARY)?;
        let buffer = buffers[0];

        let inheritance = vk::CommandBufferInheritanceInfo::builder()
            .render_pass(vk::RenderPass::null())
            .subpass(0)
            .framebuffer(vk::Framebuffer::null());

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(
                vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT
                    | vk::CommandBufferUsageFlags::SIMULTANEOUS_USE,
            )
            .inheritance_info(&inheritance);

        unsafe { device.begin_command_buffer(buffer, &begin_info) }
            .map_err(|e| MarshalError::Api(e.into()))?;

        Ok(SecondaryRecorder {
            device,
            pool: pool.handle(),
            buffer,
            pending_resources: Vec::new(),
            owning_pool_is_main,
            ended: false,
        })
    }

    /// Append a finished secondary to the current write slot.
    pub fn append(&self, cmd: SecondaryCmd) {
        let slot = self.write_index.load(Ordering::Acquire);
        self.pending[slot]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(cmd);
    }

    /// Atomically swap the write slot and return the previous slot's
    /// secondaries for execution. No lock is needed on the read side: the
    /// swap transfers ownership of that slot's contents to the caller.
    fn take_read_slot(&self) -> Vec<SecondaryCmd> {
        let previous = self.write_index.swap(1 - self.write_index.load(Ordering::Acquire), Ordering::AcqRel);
        std::mem::take(
            &mut *self.pending[previous]
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }

    /// Splice every secondary recorded since the last call into `primary`
    /// via `cmd_execute_commands`, then move them to the submitted list
    /// tagged with `frame_slot` for later retirement.
    pub fn execute_collected(
        &self,
        device: &ash::Device,
        primary: vk::CommandBuffer,
        frame_slot: usize,
    ) -> Result<usize, MarshalError> {
        let mut secondaries = self.take_read_slot();
        if secondaries.is_empty() {
            return Ok(0);
        }

        let buffers: Vec<vk::CommandBuffer> = secondaries.iter().map(SecondaryCmd::buffer).collect();
        unsafe {
            device.cmd_execute_commands(primary, &buffers);
        }

        let executed = secondaries.len();
        for cmd in &mut secondaries {
            cmd.frame_slot = Some(frame_slot);
        }

        self.submitted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend(secondaries);

        Ok(executed)
    }

    /// Retire every submitted secondary tagged with `frame_slot`: this must
    /// only be called once the matching `frame_fence[frame_slot]` from a
    /// later reuse has signaled, guaranteeing the GPU is done with them.
    /// Destroys each secondary's pending resources; the command buffers
    /// themselves are reclaimed later by a pool reset, not freed here.
    pub fn retire_slot(&self, device: &ash::Device, frame_slot: usize) {
        let mut submitted = self
            .submitted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let (retiring, remaining): (Vec<_>, Vec<_>) = submitted
            .drain(..)
            .partition(|cmd| cmd.frame_slot == Some(frame_slot));
        *submitted = remaining;
        drop(submitted);

        for cmd in retiring {
            for (buffer, memory) in cmd.pending_resources {
                unsafe {
                    device.destroy_buffer(buffer, None);
                    device.free_memory(memory, None);
                }
            }
        }
    }

    /// Discard every undispatched record in both write slots, for use when
    /// switching rendering modes. Does not touch the submitted list or
    /// reset worker pools; callers combine this with
    /// [`crate::gpu::ThreadPoolRegistry::reset_all`].
    pub fn clear_pending(&self) {
        for slot in &self.pending {
            slot.lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clear();
        }
    }

    /// Number of secondaries waiting in the submitted list (diagnostics/tests).
    #[must_use]
    pub fn submitted_count(&self) -> usize {
        self.submitted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Number of secondaries queued in the current write slot (diagnostics/tests).
    #[must_use]
    pub fn pending_count(&self) -> usize {
        let slot = self.write_index.load(Ordering::Acquire);
        self.pending[slot]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl Default for SecondaryCmdMarshal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_cmd(pool: vk::CommandPool, buffer: vk::CommandBuffer) -> SecondaryCmd {
        SecondaryCmd {
            pool,
            buffer,
            pending_resources: Vec::new(),
            owning_pool_is_main: false,
            frame_slot: None,
        }
    }

    #[test]
    fn append_goes_to_current_write_slot() {
        let marshal = SecondaryCmdMarshal::new();
        let pool = vk::CommandPool::null();
        marshal.append(fake_cmd(pool, vk::CommandBuffer::from_raw(1)));
        marshal.append(fake_cmd(pool, vk::CommandBuffer::from_raw(2)));
        assert_eq!(marshal.pending_count(), 2);
    }

    #[test]
    fn take_read_slot_swaps_and_empties_previous_slot() {
        let marshal = SecondaryCmdMarshal::new();
        let pool = vk::CommandPool::null();
        marshal.append(fake_cmd(pool, vk::CommandBuffer::from_raw(1)));
        marshal.append(fake_cmd(pool, vk::CommandBuffer::from_raw(2)));

        let taken = marshal.take_read_slot();
        assert_eq!(taken.len(), 2);
        assert_eq!(marshal.pending_count(), 0);

        marshal.append(fake_cmd(pool, vk::CommandBuffer::from_raw(3)));
        assert_eq!(marshal.pending_count(), 1);
    }

    #[test]
    fn clear_pending_discards_both_slots() {
        let marshal = SecondaryCmdMarshal::new();
        let pool = vk::CommandPool::null();
        marshal.append(fake_cmd(pool, vk::CommandBuffer::from_raw(1)));
        let _ = marshal.take_read_slot();
        marshal.append(fake_cmd(pool, vk::CommandBuffer::from_raw(2)));

        marshal.clear_pending();
        assert_eq!(marshal.pending_count(), 0);
    }
}
