//! Shader binding table construction (spec §4.7)
//!
//! New relative to the teacher; buffer/memory allocation grounded on
//! `render/vulkan/buffer.rs`.

use ash::vk;

use crate::error::ApiError;
use crate::gpu::{allocate_memory, GpuContext};

use super::bvh_builder::BvhError;

/// Minimum number of records a shader binding table holds, even if the
/// pipeline defines fewer groups (raygen, miss, closest-hit).
pub const MIN_RECORDS: usize = 3;

fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// Host-visible buffer of shader-group handle records, one entry per
/// ray-tracing shader group, stride-aligned to the device's base alignment
/// requirement. Entries for groups the pipeline doesn't define are
/// zero-padded (resolving the spec's Open Question on unused-group
/// handling) rather than omitted, so every record lands at the same stride
/// and an `sbt_offset` of `0` is always valid.
pub struct ShaderBindingTable {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    stride: u64,
    record_count: usize,
}

impl ShaderBindingTable {
    /// Build a table of `record_count` records (at least [`MIN_RECORDS`])
    /// from `handles`, one `handle_size`-byte shader-group handle per
    /// record. Handles beyond `handles.len()` (including the padding up to
    /// `MIN_RECORDS`) are left zeroed.
    pub fn build(
        ctx: &GpuContext,
        handles: &[u8],
        handle_size: u64,
        base_alignment: u64,
        requested_record_count: usize,
    ) -> Result<Self, BvhError> {
        let record_count = requested_record_count.max(MIN_RECORDS);
        let stride = align_up(handle_size, base_alignment);
        let total_size = stride * record_count as u64;

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(total_size)
            .usage(vk::BufferUsageFlags::SHADER_BINDING_TABLE_KHR | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { ctx.device().create_buffer(&buffer_info, None) }
            .map_err(|e| BvhError::Api(ApiError::from(e)))?;

        let requirements = unsafe { ctx.device().get_buffer_memory_requirements(buffer) };
        let memory = allocate_memory(
            ctx.device(),
            ctx.memory_properties(),
            requirements,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            Some(vk::MemoryAllocateFlags::DEVICE_ADDRESS),
        )
        .map_err(BvhError::Gpu)?;

        unsafe { ctx.device().bind_buffer_memory(buffer, memory, 0) }
            .map_err(|e| BvhError::Api(ApiError::from(e)))?;

        let table = Self {
            buffer,
            memory,
            stride,
            record_count,
        };
        table.write_records(ctx, handles, handle_size)?;
        Ok(table)
    }

    fn write_records(&self, ctx: &GpuContext, handles: &[u8], handle_size: u64) -> Result<(), BvhError> {
        let total_size = self.stride * self.record_count as u64;
        let ptr = unsafe {
            ctx.device()
                .map_memory(self.memory, 0, total_size, vk::MemoryMapFlags::empty())
        }
        .map_err(|e| BvhError::Api(ApiError::from(e)))?;

        // SAFETY: `ptr` is a valid, uniquely-owned mapping of `total_size`
        // bytes for the lifetime of this call.
        unsafe {
            std::ptr::write_bytes(ptr.cast::<u8>(), 0, total_size as usize);

            let group_count = (handles.len() as u64 / handle_size.max(1)) as usize;
            for group in 0..group_count.min(self.record_count) {
                let src = &handles[group * handle_size as usize..(group + 1) * handle_size as usize];
                let dst = ptr.cast::<u8>().add(group * self.stride as usize);
                std::ptr::copy_nonoverlapping(src.as_ptr(), dst, handle_size as usize);
            }

            ctx.device().unmap_memory(self.memory);
        }

        Ok(())
    }

    /// The backing buffer.
    #[must_use]
    pub const fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    /// Stride between consecutive records, in bytes.
    #[must_use]
    pub const fn stride(&self) -> u64 {
        self.stride
    }

    /// Number of records in the table (at least [`MIN_RECORDS`]).
    #[must_use]
    pub const fn record_count(&self) -> usize {
        self.record_count
    }

    /// Device address + stride + size for the raygen region (record 0).
    #[must_use]
    pub fn raygen_region(&self, device_address: vk::DeviceAddress) -> vk::StridedDeviceAddressRegionKHR {
        vk::StridedDeviceAddressRegionKHR {
            device_address,
            stride: self.stride,
            size: self.stride,
        }
    }

    /// Destroy the underlying buffer and free its memory. Must only be
    /// called once the device has finished using this table.
    ///
    /// # Safety
    /// The caller must ensure no in-flight command buffer references this
    /// table's buffer.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_buffer(self.buffer, None);
        device.free_memory(self.memory, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_is_aligned_up_to_base_alignment() {
        assert_eq!(align_up(32, 64), 64);
        assert_eq!(align_up(65, 64), 128);
        assert_eq!(align_up(64, 64), 64);
    }

    #[test]
    fn record_count_is_never_below_minimum() {
        assert_eq!(1usize.max(MIN_RECORDS), MIN_RECORDS);
        assert_eq!(5usize.max(MIN_RECORDS), 5);
    }
}
