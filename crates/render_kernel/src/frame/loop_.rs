//! Per-frame orchestrator (spec §4.4)
//!
//! Generalizes the teacher's `Engine::run` loop (`engine.rs`) from a single
//! application callback into the nine-step sequence an ordered layer stack
//! requires.

use std::sync::Arc;

use ash::extensions::khr::Surface;
use ash::vk;
use thiserror::Error;

use crate::command::SecondaryCmdMarshal;
use crate::events::{Event, EventBus, EventDispatchTarget};
use crate::foundation::time::Timer;
use crate::gpu::GpuContext;
use crate::layer::LayerStack;
use crate::swapchain::{BeginFrameOutcome, Swapchain};

use super::FrameInfo;

/// Errors raised while driving a frame through the loop.
#[derive(Error, Debug)]
pub enum FrameLoopError {
    /// A layer phase failed.
    #[error(transparent)]
    Layer(#[from] crate::layer::LayerError),

    /// The swapchain reported a fatal or recoverable error.
    #[error(transparent)]
    Swapchain(#[from] crate::swapchain::SwapchainError),

    /// Recording the primary command buffer failed.
    #[error(transparent)]
    Gpu(#[from] crate::gpu::GpuError),

    /// Splicing worker secondaries into the primary command buffer failed.
    #[error(transparent)]
    Marshal(#[from] crate::command::MarshalError),
}

/// Drives the per-frame sequence: poll -> drain events -> begin -> prepare
/// -> update -> render -> splice worker commands -> end.
pub struct FrameLoop {
    ctx: Arc<GpuContext>,
    swapchain: Swapchain,
    surface_loader: Surface,
    event_bus: Arc<EventBus>,
    marshal: Arc<SecondaryCmdMarshal>,
    layers: LayerStack,
    timer: Timer,
    primary_graphics_cmds: Vec<vk::CommandBuffer>,
    primary_compute_cmds: Vec<vk::CommandBuffer>,
    enable_compute: bool,
    should_close: bool,
}

impl FrameLoop {
    /// Build a frame loop over an already-constructed swapchain, event bus,
    /// and marshal, allocating one primary graphics (and, if enabled,
    /// compute) command buffer per frame slot from the context's main pool.
    /// `surface_loader` is kept so a lost swapchain can be recreated
    /// locally (spec §7) without the caller's involvement.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: Arc<GpuContext>,
        swapchain: Swapchain,
        surface_loader: Surface,
        event_bus: Arc<EventBus>,
        marshal: Arc<SecondaryCmdMarshal>,
        frame_slots: usize,
        enable_compute: bool,
    ) -> Result<Self, FrameLoopError> {
        let pool = ctx.command_pools().pool_for_current_thread()?;
        let primary_graphics_cmds =
            pool.allocate_command_buffers(frame_slots as u32, vk::CommandBufferLevel::PRIMARY)?;
        let primary_compute_cmds = if enable_compute {
            pool.allocate_command_buffers(frame_slots as u32, vk::CommandBufferLevel::PRIMARY)?
        } else {
            Vec::new()
        };

        Ok(Self {
            ctx,
            swapchain,
            surface_loader,
            event_bus,
            marshal,
            layers: LayerStack::new(),
            timer: Timer::new(),
            primary_graphics_cmds,
            primary_compute_cmds,
            enable_compute,
            should_close: false,
        })
    }

    /// The layer stack driven by this loop.
    pub fn layers_mut(&mut self) -> &mut LayerStack {
        &mut self.layers
    }

    /// Whether the window close event has been observed.
    #[must_use]
    pub const fn should_close(&self) -> bool {
        self.should_close
    }

    /// Run one iteration of the nine-step sequence from spec §4.4.
    ///
    /// Step 1 (poll OS events) is the caller's responsibility: whatever
    /// owns the window pumps its event loop and calls
    /// [`EventBus::queue`] before invoking this method.
    pub fn run_frame(&mut self, window_extent: vk::Extent2D) -> Result<(), FrameLoopError> {
        // Step 2: drain events into the layer stack (and observe close).
        let event_bus = Arc::clone(&self.event_bus);
        event_bus.drain(self);

        // Step 3: timing, command-buffer assignment, extent propagation.
        let dt = self.timer.tick();
        let outcome = match self.swapchain.begin_frame(&self.ctx, self.enable_compute, window_extent) {
            Ok(outcome) => outcome,
            Err(crate::swapchain::SwapchainError::OutOfDate) => {
                self.recreate_swapchain(window_extent)?;
                self.swapchain.begin_frame(&self.ctx, self.enable_compute, window_extent)?
            }
            Err(e) => return Err(e.into()),
        };

        let (image_index, frame_slot) = match outcome {
            BeginFrameOutcome::Ready { image_index, frame_slot } => (image_index, frame_slot),
            BeginFrameOutcome::Skip => return Ok(()),
        };

        // `begin_frame` just waited on `frame_fence[frame_slot]` from this
        // slot's previous occupant, so the GPU is now known to be done with
        // whatever that occupant's primary command buffer carried — only
        // now is it safe to retire the secondaries it spliced in.
        self.marshal.retire_slot(self.ctx.device(), frame_slot);

        let graphics_cmd = self.primary_graphics_cmds[frame_slot];
        let compute_cmd = self.enable_compute.then(|| self.primary_compute_cmds[frame_slot]);

        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe { self.ctx.device().begin_command_buffer(graphics_cmd, &begin_info) }
            .map_err(|e| crate::gpu::GpuError::Api(e.into()))?;
        if let Some(compute_cmd) = compute_cmd {
            unsafe { self.ctx.device().begin_command_buffer(compute_cmd, &begin_info) }
                .map_err(|e| crate::gpu::GpuError::Api(e.into()))?;
        }

        let frame = FrameInfo {
            current_frame: frame_slot,
            graphics_cmd,
            compute_cmd,
            extent: self.swapchain.extent(),
            dt,
        };

        // Step 4: begin — a built-in render layer invokes Swapchain::begin_frame.
        self.swapchain.transition_to_general(&self.ctx, graphics_cmd, image_index)?;
        self.layers.begin(&frame)?;

        // Step 5: prepare — main-thread-only, no GPU recording.
        self.layers.prepare(dt)?;

        // Step 6: update — may record GPU work.
        self.layers.update(&frame)?;

        // Step 7: render — main GPU recording.
        self.layers.render(&frame)?;

        // Step 8: splice worker secondaries into the frame.
        self.marshal.execute_collected(self.ctx.device(), graphics_cmd, frame_slot)?;

        // Step 9: end — a built-in render layer invokes Swapchain::end_frame.
        self.layers.end(&frame)?;
        match self.swapchain.end_frame(&self.ctx, graphics_cmd, compute_cmd.is_some()) {
            Ok(()) => {}
            Err(crate::swapchain::SwapchainError::OutOfDate) => {
                self.recreate_swapchain(window_extent)?;
            }
            Err(e) => return Err(e.into()),
        }

        Ok(())
    }

    /// Recover from a lost swapchain by recreating it at `window_extent`
    /// (spec §7: "recovered locally — swapchain recreated, acquire
    /// retried"; spec §8 scenarios 2 and 5).
    fn recreate_swapchain(&mut self, window_extent: vk::Extent2D) -> Result<(), FrameLoopError> {
        self.swapchain
            .recreate(&self.ctx, &self.surface_loader, window_extent)
            .map_err(FrameLoopError::from)
    }
}

impl EventDispatchTarget for FrameLoop {
    fn dispatch_event(&mut self, event: &Event) -> bool {
        if matches!(event, Event::WindowClose) {
            self.should_close = true;
        }
        self.layers.dispatch_event(event)
    }
}
