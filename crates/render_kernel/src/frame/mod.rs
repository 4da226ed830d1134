//! Per-frame context and the frame loop that drives layers through it (spec §3, §4.4)

mod loop_;

pub use loop_::{FrameLoop, FrameLoopError};

use ash::vk;

/// Per-frame context passed through the layer lifecycle. Created by
/// [`FrameLoop`] once per frame; mutated only by the loop and the swapchain
/// (`current_frame` advance); destroyed with the loop.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    /// Frame slot, `0..MAX_FRAMES_IN_FLIGHT`.
    pub current_frame: usize,
    /// Primary graphics command buffer for this frame.
    pub graphics_cmd: vk::CommandBuffer,
    /// Primary compute command buffer for this frame, if the compute
    /// branch is enabled.
    pub compute_cmd: Option<vk::CommandBuffer>,
    /// Current swapchain extent.
    pub extent: vk::Extent2D,
    /// Delta time since the previous frame, in seconds.
    pub dt: f32,
}

/// Per-phase timing recorded by a layer, in nanoseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseTimings {
    /// Time spent in `begin`.
    pub begin_ns: u64,
    /// Time spent in `update`.
    pub update_ns: u64,
    /// Time spent in `render`.
    pub render_ns: u64,
    /// Time spent in `end`.
    pub end_ns: u64,
}
