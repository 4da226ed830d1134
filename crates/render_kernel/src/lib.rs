//! # Render Kernel
//!
//! The frame orchestration core of a real-time Vulkan renderer: swapchain
//! and frame-pacing state, a layered frame lifecycle, the event bus that
//! feeds it, an asynchronous ray-tracing acceleration-structure builder,
//! and the command-buffer marshal that lets worker threads contribute to a
//! frame without touching the primary command buffer directly.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use render_kernel::prelude::*;
//! use std::sync::Arc;
//!
//! struct HelloLayer;
//!
//! impl Layer for HelloLayer {
//!     fn name(&self) -> &str {
//!         "hello"
//!     }
//!
//!     fn begin(&mut self, _frame: &FrameInfo) -> Result<(), LayerError> {
//!         Ok(())
//!     }
//!     fn update(&mut self, _frame: &FrameInfo) -> Result<(), LayerError> {
//!         Ok(())
//!     }
//!     fn render(&mut self, _frame: &FrameInfo) -> Result<(), LayerError> {
//!         Ok(())
//!     }
//!     fn end(&mut self, _frame: &FrameInfo) -> Result<(), LayerError> {
//!         Ok(())
//!     }
//! }
//!
//! fn build(
//!     ctx: Arc<GpuContext>,
//!     surface: ash::vk::SurfaceKHR,
//!     surface_loader: ash::extensions::khr::Surface,
//!     window_extent: ash::vk::Extent2D,
//! ) -> Result<FrameLoop, RenderKernelError> {
//!     let swapchain = Swapchain::new(&ctx, surface, &surface_loader, window_extent)?;
//!     let event_bus = Arc::new(EventBus::new());
//!     let marshal = Arc::new(SecondaryCmdMarshal::new());
//!     let mut frame_loop =
//!         FrameLoop::new(ctx, swapchain, surface_loader, event_bus, marshal, MAX_FRAMES_IN_FLIGHT, false)?;
//!     frame_loop.layers_mut().push_layer(Box::new(HelloLayer))?;
//!     Ok(frame_loop)
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;

pub mod config;
pub mod error;
pub mod gpu;
pub mod swapchain;
pub mod command;
pub mod events;
pub mod layer;
pub mod frame;
pub mod rt;
pub mod resource;

pub use error::{RenderKernelError, Result};

/// Common imports for consumers of this crate.
pub mod prelude {
    pub use crate::{
        command::{SecondaryCmd, SecondaryCmdMarshal, SecondaryRecorder},
        config::{frame_config::FrameConfig, Config},
        error::{RenderKernelError, Result},
        events::{Category, Event, EventBus, EventDispatchTarget},
        frame::{FrameInfo, FrameLoop, PhaseTimings},
        gpu::{GpuContext, QueueFamilies},
        layer::{Layer, LayerError, LayerStack},
        resource::{Resource, ResourceBinding},
        rt::{
            BvhBuilder, BvhCompletionHandler, BvhCompletionResult, RaytracingCompletionHandler,
            RaytracingCore, RaytracingLayer, ShaderBindingTable,
        },
        swapchain::{Swapchain, MAX_FRAMES_IN_FLIGHT},
    };
}
