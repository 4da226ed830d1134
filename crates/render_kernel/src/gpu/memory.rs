//! Device memory allocation (spec §4.1)

use ash::vk;

use super::context::GpuError;

/// Linear scan of memory types for the first one matching both the
/// requirement's type bits and the requested property flags, grounded on
/// the teacher's `find_memory_type` in `render/vulkan/buffer.rs`.
pub fn allocate_memory(
    device: &ash::Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    requirements: vk::MemoryRequirements,
    flags: vk::MemoryPropertyFlags,
    allocate_flags: Option<vk::MemoryAllocateFlags>,
) -> Result<vk::DeviceMemory, GpuError> {
    let memory_type_index = find_memory_type(memory_properties, requirements.memory_type_bits, flags)?;

    let mut alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    let mut flags_info;
    if let Some(allocate_flags) = allocate_flags {
        flags_info = vk::MemoryAllocateFlagsInfo::builder().flags(allocate_flags);
        alloc_info = alloc_info.push_next(&mut flags_info);
    }

    unsafe { device.allocate_memory(&alloc_info, None) }
        .map_err(|e| GpuError::Api(e.into()))
}

fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Result<u32, GpuError> {
    for i in 0..memory_properties.memory_type_count {
        let is_candidate = (type_filter & (1 << i)) != 0;
        let has_properties =
            memory_properties.memory_types[i as usize].property_flags.contains(properties);
        if is_candidate && has_properties {
            return Ok(i);
        }
    }

    Err(GpuError::NoSuitableMemoryType)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties_with_types(
        types: &[(vk::MemoryPropertyFlags, u32)],
    ) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = types.len() as u32;
        for (idx, (flags, heap_index)) in types.iter().enumerate() {
            props.memory_types[idx] = vk::MemoryType {
                property_flags: *flags,
                heap_index: *heap_index,
            };
        }
        props
    }

    #[test]
    fn finds_first_matching_type() {
        let props = memory_properties_with_types(&[
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, 0),
            (
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                1,
            ),
        ]);

        let index = find_memory_type(
            &props,
            0b11,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .expect("match found");
        assert_eq!(index, 1);
    }

    #[test]
    fn rejects_type_not_in_filter_bitmask() {
        let props = memory_properties_with_types(&[(
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            0,
        )]);

        let result = find_memory_type(&props, 0b0, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(result, Err(GpuError::NoSuitableMemoryType)));
    }

    #[test]
    fn errors_when_no_type_satisfies_properties() {
        let props = memory_properties_with_types(&[(vk::MemoryPropertyFlags::DEVICE_LOCAL, 0)]);

        let result = find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(result, Err(GpuError::NoSuitableMemoryType)));
    }
}
