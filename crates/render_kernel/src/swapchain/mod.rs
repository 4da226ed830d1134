//! Swapchain and frame-pacing state machine (spec §4.3)
//!
//! Generalizes the teacher's `render/backends/vulkan/state` swapchain/sync
//! pair and the older `render/vulkan/swapchain.rs` into one triple-buffered
//! state machine with HDR intermediates and a compute branch.

mod formats;

pub use formats::{select_depth_format, select_present_mode, select_surface_format};

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use thiserror::Error;

use crate::error::ApiError;
use crate::gpu::{allocate_memory, transition_image_layout, GpuContext};

/// Number of frames the pipeline keeps in flight concurrently (spec §3).
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Errors local to the swapchain/frame-pacing layer.
#[derive(Error, Debug)]
pub enum SwapchainError {
    /// Raw Vulkan API failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Bridged from the GPU layer (queue submission, memory allocation).
    #[error(transparent)]
    Gpu(#[from] crate::gpu::GpuError),

    /// Acquire or present reported the surface needs recreation.
    #[error("swapchain out of date")]
    OutOfDate,

    /// The device or surface was lost; fatal.
    #[error("device or surface lost")]
    Lost,

    /// A wait on a fence exceeded its timeout.
    #[error("timed out waiting on frame fence")]
    Timeout,

    /// No format in a ranked preference list is supported by this device.
    #[error("no supported format for {0}")]
    Unsupported(&'static str),
}

/// One image in the swapchain's ring: the presentable color image plus a
/// matching depth target.
pub struct SwapImage {
    /// Presentable color image (owned by the swapchain, not by us).
    pub color_image: vk::Image,
    /// View over `color_image`.
    pub color_view: vk::ImageView,
    /// Per-image depth buffer.
    pub depth_image: vk::Image,
    /// View over `depth_image`.
    pub depth_view: vk::ImageView,
    /// Memory backing `depth_image`.
    pub depth_memory: vk::DeviceMemory,
    /// Signaled by the graphics submit for this image, waited on by present.
    pub render_finished: vk::Semaphore,
}

/// Off-screen HDR target rendered into before tone-mapping to the
/// presented surface, one per frame slot (spec GLOSSARY: HDR intermediate).
pub struct HdrIntermediate {
    /// HDR color image.
    pub image: vk::Image,
    /// View over `image`.
    pub view: vk::ImageView,
    /// Memory backing `image`.
    pub memory: vk::DeviceMemory,
}

/// Pure frame-slot counter, isolated from any Vulkan state so the advance
/// rule (spec §8: `begin_frame` then `end_frame` advances `current_frame`
/// by 1 mod `MAX_FRAMES_IN_FLIGHT` exactly once) can be tested directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlotCycle {
    current: usize,
    max_frames_in_flight: usize,
}

impl FrameSlotCycle {
    /// Create a cycle over `max_frames_in_flight` slots, starting at slot 0.
    #[must_use]
    pub const fn new(max_frames_in_flight: usize) -> Self {
        Self {
            current: 0,
            max_frames_in_flight: if max_frames_in_flight == 0 { 1 } else { max_frames_in_flight },
        }
    }

    /// The current frame slot.
    #[must_use]
    pub const fn current(&self) -> usize {
        self.current
    }

    /// Advance to the next slot, wrapping modulo the slot count.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.max_frames_in_flight;
    }
}

/// Triple-buffered swapchain and frame-pacing state machine.
pub struct Swapchain {
    loader: SwapchainLoader,
    handle: vk::SwapchainKHR,
    surface: vk::SurfaceKHR,
    format: vk::SurfaceFormatKHR,
    depth_format: vk::Format,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    images: Vec<SwapImage>,
    hdr_intermediates: Vec<HdrIntermediate>,

    image_acquired: [vk::Semaphore; MAX_FRAMES_IN_FLIGHT],
    frame_fence: [vk::Fence; MAX_FRAMES_IN_FLIGHT],
    compute_finished: [vk::Semaphore; MAX_FRAMES_IN_FLIGHT],
    compute_fence: [vk::Fence; MAX_FRAMES_IN_FLIGHT],

    cycle: FrameSlotCycle,
    acquired_image_index: Option<u32>,
}

/// Outcome of [`Swapchain::begin_frame`]: either the frame is ready to
/// record, or the window currently has a zero extent and the caller should
/// skip this frame entirely (spec §8 boundary behavior).
pub enum BeginFrameOutcome {
    /// Frame is ready; `image_index` is valid until the matching `end_frame`.
    Ready {
        /// Acquired swapchain image index.
        image_index: u32,
        /// Current frame slot, `0..MAX_FRAMES_IN_FLIGHT`.
        frame_slot: usize,
    },
    /// The window has a zero-sized extent; nothing to render this frame.
    Skip,
}

impl Swapchain {
    /// Build a swapchain over `surface`: query its capabilities/formats/
    /// present modes, select the highest-ranked ones via
    /// [`select_surface_format`]/[`select_present_mode`]/[`select_depth_format`],
    /// then allocate the `SwapImage` ring, the HDR intermediates, and the
    /// per-slot sync primitives (spec §4.3).
    pub fn new(
        ctx: &GpuContext,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
        window_extent: vk::Extent2D,
    ) -> Result<Self, SwapchainError> {
        let loader = SwapchainLoader::new(ctx.instance(), ctx.device());

        let surface_caps = unsafe {
            surface_loader.get_physical_device_surface_capabilities(ctx.physical_device(), surface)
        }
        .map_err(|e| SwapchainError::Api(e.into()))?;

        let surface_formats = unsafe {
            surface_loader.get_physical_device_surface_formats(ctx.physical_device(), surface)
        }
        .map_err(|e| SwapchainError::Api(e.into()))?;
        let format = select_surface_format(&surface_formats);

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(ctx.physical_device(), surface)
        }
        .map_err(|e| SwapchainError::Api(e.into()))?;
        let present_mode = select_present_mode(&present_modes);

        let depth_format = select_depth_format(ctx.instance(), ctx.physical_device())
            .ok_or(SwapchainError::Unsupported("depth format"))?;

        let extent = Self::choose_extent(&surface_caps, window_extent);
        let handle = Self::create_handle(
            &loader,
            surface,
            &surface_caps,
            format,
            present_mode,
            extent,
            vk::SwapchainKHR::null(),
        )?;

        let images = Self::build_swap_images(ctx, &loader, handle, format.format, depth_format, extent)?;
        let hdr_intermediates = Self::build_hdr_intermediates(ctx, extent)?;
        let (image_acquired, frame_fence, compute_finished, compute_fence) =
            Self::build_sync_primitives(ctx)?;

        Ok(Self {
            loader,
            handle,
            surface,
            format,
            depth_format,
            present_mode,
            extent,
            images,
            hdr_intermediates,
            image_acquired,
            frame_fence,
            compute_finished,
            compute_fence,
            cycle: FrameSlotCycle::new(MAX_FRAMES_IN_FLIGHT),
            acquired_image_index: None,
        })
    }

    fn choose_extent(surface_caps: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
        if surface_caps.current_extent.width != u32::MAX {
            surface_caps.current_extent
        } else {
            vk::Extent2D {
                width: window_extent
                    .width
                    .clamp(surface_caps.min_image_extent.width.max(1), surface_caps.max_image_extent.width.max(1)),
                height: window_extent.height.clamp(
                    surface_caps.min_image_extent.height.max(1),
                    surface_caps.max_image_extent.height.max(1),
                ),
            }
        }
    }

    fn choose_image_count(surface_caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
        let preferred = surface_caps.min_image_count + 1;
        if surface_caps.max_image_count > 0 {
            preferred.min(surface_caps.max_image_count)
        } else {
            preferred
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn create_handle(
        loader: &SwapchainLoader,
        surface: vk::SurfaceKHR,
        surface_caps: &vk::SurfaceCapabilitiesKHR,
        format: vk::SurfaceFormatKHR,
        present_mode: vk::PresentModeKHR,
        extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<vk::SwapchainKHR, SwapchainError> {
        let image_count = Self::choose_image_count(surface_caps);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::STORAGE)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        unsafe { loader.create_swapchain(&create_info, None) }.map_err(|e| SwapchainError::Api(e.into()))
    }

    fn build_swap_images(
        ctx: &GpuContext,
        loader: &SwapchainLoader,
        handle: vk::SwapchainKHR,
        color_format: vk::Format,
        depth_format: vk::Format,
        extent: vk::Extent2D,
    ) -> Result<Vec<SwapImage>, SwapchainError> {
        let raw_images =
            unsafe { loader.get_swapchain_images(handle) }.map_err(|e| SwapchainError::Api(e.into()))?;

        raw_images
            .into_iter()
            .map(|color_image| {
                let color_view = Self::create_view(ctx.device(), color_image, color_format, vk::ImageAspectFlags::COLOR)?;
                let (depth_image, depth_memory) =
                    Self::create_image(ctx, extent, depth_format, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)?;
                let depth_view = Self::create_view(ctx.device(), depth_image, depth_format, vk::ImageAspectFlags::DEPTH)?;
                let render_finished = Self::create_semaphore(ctx.device())?;

                Ok(SwapImage {
                    color_image,
                    color_view,
                    depth_image,
                    depth_view,
                    depth_memory,
                    render_finished,
                })
            })
            .collect()
    }

    fn build_hdr_intermediates(
        ctx: &GpuContext,
        extent: vk::Extent2D,
    ) -> Result<Vec<HdrIntermediate>, SwapchainError> {
        (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| {
                let (image, memory) = Self::create_image(
                    ctx,
                    extent,
                    formats::HDR_INTERMEDIATE_FORMAT,
                    vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
                )?;
                let view = Self::create_view(ctx.device(), image, formats::HDR_INTERMEDIATE_FORMAT, vk::ImageAspectFlags::COLOR)?;
                Ok(HdrIntermediate { image, view, memory })
            })
            .collect()
    }

    fn build_sync_primitives(
        ctx: &GpuContext,
    ) -> Result<
        (
            [vk::Semaphore; MAX_FRAMES_IN_FLIGHT],
            [vk::Fence; MAX_FRAMES_IN_FLIGHT],
            [vk::Semaphore; MAX_FRAMES_IN_FLIGHT],
            [vk::Fence; MAX_FRAMES_IN_FLIGHT],
        ),
        SwapchainError,
    > {
        let mut image_acquired = [vk::Semaphore::null(); MAX_FRAMES_IN_FLIGHT];
        let mut frame_fence = [vk::Fence::null(); MAX_FRAMES_IN_FLIGHT];
        let mut compute_finished = [vk::Semaphore::null(); MAX_FRAMES_IN_FLIGHT];
        let mut compute_fence = [vk::Fence::null(); MAX_FRAMES_IN_FLIGHT];

        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            image_acquired[slot] = Self::create_semaphore(ctx.device())?;
            frame_fence[slot] = Self::create_fence(ctx.device(), true)?;
            compute_finished[slot] = Self::create_semaphore(ctx.device())?;
            compute_fence[slot] = Self::create_fence(ctx.device(), true)?;
        }

        Ok((image_acquired, frame_fence, compute_finished, compute_fence))
    }

    fn create_image(
        ctx: &GpuContext,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
    ) -> Result<(vk::Image, vk::DeviceMemory), SwapchainError> {
        let create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe { ctx.device().create_image(&create_info, None) }
            .map_err(|e| SwapchainError::Api(e.into()))?;
        let requirements = unsafe { ctx.device().get_image_memory_requirements(image) };
        let memory = allocate_memory(
            ctx.device(),
            ctx.memory_properties(),
            requirements,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            None,
        )
        .map_err(SwapchainError::Gpu)?;
        unsafe { ctx.device().bind_image_memory(image, memory, 0) }
            .map_err(|e| SwapchainError::Api(e.into()))?;

        Ok((image, memory))
    }

    fn create_view(
        device: &ash::Device,
        image: vk::Image,
        format: vk::Format,
        aspect_mask: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView, SwapchainError> {
        let range = vk::ImageSubresourceRange::builder()
            .aspect_mask(aspect_mask)
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1)
            .build();

        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(range);

        unsafe { device.create_image_view(&create_info, None) }.map_err(|e| SwapchainError::Api(e.into()))
    }

    fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore, SwapchainError> {
        let info = vk::SemaphoreCreateInfo::builder();
        unsafe { device.create_semaphore(&info, None) }.map_err(|e| SwapchainError::Api(e.into()))
    }

    fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence, SwapchainError> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe { device.create_fence(&info, None) }.map_err(|e| SwapchainError::Api(e.into()))
    }

    /// Current frame slot.
    #[must_use]
    pub const fn current_frame(&self) -> usize {
        self.cycle.current()
    }

    /// Current swapchain extent.
    #[must_use]
    pub const fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// The swap images.
    #[must_use]
    pub fn images(&self) -> &[SwapImage] {
        &self.images
    }

    /// Wait for `frame_fence[slot]` (and `compute_fence[slot]` if `wait_compute`),
    /// then acquire the next image, matching spec §4.3's per-slot sequence.
    /// If the window currently reports a zero extent, returns `Skip` instead.
    pub fn begin_frame(
        &mut self,
        ctx: &GpuContext,
        wait_compute: bool,
        window_extent: vk::Extent2D,
    ) -> Result<BeginFrameOutcome, SwapchainError> {
        if window_extent.width == 0 || window_extent.height == 0 {
            return Ok(BeginFrameOutcome::Skip);
        }

        let slot = self.cycle.current();
        let device = ctx.device();

        unsafe {
            device.wait_for_fences(&[self.frame_fence[slot]], true, u64::MAX)
        }
        .map_err(|e| SwapchainError::Api(e.into()))?;

        if wait_compute {
            unsafe { device.wait_for_fences(&[self.compute_fence[slot]], true, u64::MAX) }
                .map_err(|e| SwapchainError::Api(e.into()))?;
        }

        let (image_index, suboptimal) = match unsafe {
            self.loader.acquire_next_image(
                self.handle,
                u64::MAX,
                self.image_acquired[slot],
                vk::Fence::null(),
            )
        } {
            Ok(result) => result,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Err(SwapchainError::OutOfDate),
            Err(e) => return Err(SwapchainError::Api(e.into())),
        };

        if suboptimal {
            return Err(SwapchainError::OutOfDate);
        }

        unsafe { device.reset_fences(&[self.frame_fence[slot]]) }
            .map_err(|e| SwapchainError::Api(e.into()))?;

        self.acquired_image_index = Some(image_index);

        Ok(BeginFrameOutcome::Ready {
            image_index,
            frame_slot: slot,
        })
    }

    /// Transition the acquired swap image `UNDEFINED -> GENERAL`, the first
    /// recording step in the per-frame sequence.
    pub fn transition_to_general(
        &self,
        ctx: &GpuContext,
        graphics_cmd: vk::CommandBuffer,
        image_index: u32,
    ) -> Result<(), SwapchainError> {
        let range = vk::ImageSubresourceRange::builder()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1)
            .build();

        transition_image_layout(
            ctx.device(),
            graphics_cmd,
            self.images[image_index as usize].color_image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::GENERAL,
            range,
        )
        .map_err(SwapchainError::Gpu)
    }

    /// Transition the acquired swap image `GENERAL -> PRESENT_SRC`, submit
    /// the graphics work, and present, advancing `current_frame` exactly
    /// once (spec §8 round-trip property).
    #[allow(clippy::too_many_arguments)]
    pub fn end_frame(
        &mut self,
        ctx: &GpuContext,
        graphics_cmd: vk::CommandBuffer,
        compute_submitted: bool,
    ) -> Result<(), SwapchainError> {
        let slot = self.cycle.current();
        let image_index = self
            .acquired_image_index
            .take()
            .ok_or(SwapchainError::OutOfDate)?;

        let range = vk::ImageSubresourceRange::builder()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1)
            .build();

        transition_image_layout(
            ctx.device(),
            graphics_cmd,
            self.images[image_index as usize].color_image,
            vk::ImageLayout::GENERAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            range,
        )
        .map_err(SwapchainError::Gpu)?;

        unsafe { ctx.device().end_command_buffer(graphics_cmd) }
            .map_err(|e| SwapchainError::Api(e.into()))?;

        let mut wait_semaphores = vec![self.image_acquired[slot]];
        let mut wait_stages = vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        if compute_submitted {
            wait_semaphores.push(self.compute_finished[slot]);
            wait_stages.push(vk::PipelineStageFlags::COMPUTE_SHADER);
        }
        let signal_semaphores = [self.images[image_index as usize].render_finished];
        let command_buffers = [graphics_cmd];

        let submit = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        ctx.queue_submit(&[submit], self.frame_fence[slot])
            .map_err(SwapchainError::Gpu)?;

        let wait_semaphores = [self.images[image_index as usize].render_finished];
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match ctx.queue_present(&present_info) {
            Ok(suboptimal) if suboptimal => return Err(SwapchainError::OutOfDate),
            Ok(_) => {}
            Err(crate::gpu::GpuError::Api(api))
                if api.0 == vk::Result::ERROR_OUT_OF_DATE_KHR =>
            {
                return Err(SwapchainError::OutOfDate)
            }
            Err(e) => return Err(SwapchainError::Gpu(e)),
        }

        self.cycle.advance();
        Ok(())
    }

    /// Wait for every frame and compute fence, then rebuild the swapchain
    /// handle from the same surface at `new_extent`, passing the old handle
    /// in as `old_swapchain`, and rebuild the per-image and HDR resources
    /// against it. The format, present mode, and sync primitives are
    /// preserved (spec §4.3).
    pub fn recreate(
        &mut self,
        ctx: &GpuContext,
        surface_loader: &Surface,
        new_extent: vk::Extent2D,
    ) -> Result<(), SwapchainError> {
        unsafe {
            ctx.device()
                .wait_for_fences(&self.frame_fence, true, u64::MAX)
                .map_err(|e| SwapchainError::Api(e.into()))?;
            ctx.device()
                .wait_for_fences(&self.compute_fence, true, u64::MAX)
                .map_err(|e| SwapchainError::Api(e.into()))?;
        }

        let surface_caps = unsafe {
            surface_loader.get_physical_device_surface_capabilities(ctx.physical_device(), self.surface)
        }
        .map_err(|e| SwapchainError::Api(e.into()))?;
        let extent = Self::choose_extent(&surface_caps, new_extent);

        let old_handle = self.handle;
        let new_handle = Self::create_handle(
            &self.loader,
            self.surface,
            &surface_caps,
            self.format,
            self.present_mode,
            extent,
            old_handle,
        )?;

        self.destroy_per_image_resources(ctx);
        unsafe { self.loader.destroy_swapchain(old_handle, None) };

        self.images = Self::build_swap_images(ctx, &self.loader, new_handle, self.format.format, self.depth_format, extent)?;
        self.hdr_intermediates = Self::build_hdr_intermediates(ctx, extent)?;
        self.handle = new_handle;
        self.extent = extent;

        Ok(())
    }

    fn destroy_per_image_resources(&mut self, ctx: &GpuContext) {
        let device = ctx.device();
        for image in self.images.drain(..) {
            unsafe {
                device.destroy_image_view(image.color_view, None);
                device.destroy_image_view(image.depth_view, None);
                device.destroy_image(image.depth_image, None);
                device.free_memory(image.depth_memory, None);
                device.destroy_semaphore(image.render_finished, None);
            }
        }
        for hdr in self.hdr_intermediates.drain(..) {
            unsafe {
                device.destroy_image_view(hdr.view, None);
                device.destroy_image(hdr.image, None);
                device.free_memory(hdr.memory, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_advances_modulo_slot_count() {
        let mut cycle = FrameSlotCycle::new(MAX_FRAMES_IN_FLIGHT);
        let mut seen = Vec::new();
        for _ in 0..7 {
            seen.push(cycle.current());
            cycle.advance();
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn single_frame_in_flight_still_advances_without_deadlock() {
        let mut cycle = FrameSlotCycle::new(1);
        for _ in 0..5 {
            assert_eq!(cycle.current(), 0);
            cycle.advance();
        }
    }

    #[test]
    fn zero_is_coerced_to_one_slot() {
        let cycle = FrameSlotCycle::new(0);
        assert_eq!(cycle.current(), 0);
    }
}
