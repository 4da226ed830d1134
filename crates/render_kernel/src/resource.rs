//! Tagged resource/binding pair replacing reflection-based descriptor
//! writing (Design Notes §9)

use ash::vk;

/// A GPU resource a descriptor binding can point at, tagged rather than
/// discovered through shader reflection.
#[derive(Debug, Clone)]
pub enum Resource {
    /// A single buffer.
    Buffer(vk::Buffer),
    /// An array of buffers, e.g. one per frame in flight.
    BufferArray([vk::Buffer; crate::swapchain::MAX_FRAMES_IN_FLIGHT]),
    /// A single image, viewed through `view` in the given `layout`.
    Image {
        /// Image view bound to the descriptor.
        view: vk::ImageView,
        /// Layout the image is expected to be in when read.
        layout: vk::ImageLayout,
    },
    /// An array of images.
    ImageArray {
        /// One view per array element.
        views: Vec<vk::ImageView>,
        /// Layout shared by every element.
        layout: vk::ImageLayout,
    },
    /// A top-level acceleration structure.
    AccelerationStructure(vk::AccelerationStructureKHR),
}

/// A binding within a descriptor set, paired with the resource it should
/// currently point at. The descriptor updater pattern-matches on
/// [`Resource`] instead of relying on reflected shader metadata.
#[derive(Debug, Clone)]
pub struct ResourceBinding {
    /// Descriptor set index.
    pub set: u32,
    /// Binding index within the set.
    pub binding: u32,
    /// The resource currently bound.
    pub resource: Resource,
}
