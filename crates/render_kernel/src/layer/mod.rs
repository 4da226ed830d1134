//! Layered frame lifecycle: an ordered stack of layers driven through
//! attach -> prepare -> begin -> update -> render -> end -> detach (spec §4.4)
//!
//! Generalizes the teacher's `Application` trait (`application.rs`) from a
//! single application callback into an ordered stack, the way a windowing
//! layer stacks UI/game/render layers.

use std::time::Instant;
use thiserror::Error;

use crate::events::{Event, EventDispatchTarget};
use crate::frame::{FrameInfo, PhaseTimings};

/// Errors a layer may raise from any lifecycle phase.
#[derive(Error, Debug)]
pub enum LayerError {
    /// `attach` failed; the layer is not inserted into the stack.
    #[error("layer attach failed: {0}")]
    AttachFailed(String),

    /// A per-frame phase (`begin`/`update`/`render`/`end`) failed.
    #[error("layer {phase} failed: {reason}")]
    PhaseFailed {
        /// Which phase failed.
        phase: &'static str,
        /// Failure detail.
        reason: String,
    },
}

/// Capability set a layer implements. `prepare` is optional (default
/// no-op); the rest are required. `enabled` gates every phase except
/// `attach`/`detach`.
pub trait Layer {
    /// Human-readable name, used for diagnostics.
    fn name(&self) -> &str;

    /// Called once when the layer is pushed onto the stack.
    fn attach(&mut self) -> Result<(), LayerError> {
        Ok(())
    }

    /// Called once when the layer is removed from the stack (on shutdown,
    /// in reverse attach order).
    fn detach(&mut self) {}

    /// Main-thread-only preparation step; no GPU recording. Optional.
    fn prepare(&mut self, _dt: f32) -> Result<(), LayerError> {
        Ok(())
    }

    /// Start of the frame: a built-in render layer invokes
    /// `Swapchain::begin_frame` here.
    fn begin(&mut self, frame: &FrameInfo) -> Result<(), LayerError>;

    /// Per-frame update; may record GPU work.
    fn update(&mut self, frame: &FrameInfo) -> Result<(), LayerError>;

    /// Main GPU recording for this layer.
    fn render(&mut self, frame: &FrameInfo) -> Result<(), LayerError>;

    /// End of the frame: a built-in render layer invokes
    /// `Swapchain::end_frame` here.
    fn end(&mut self, frame: &FrameInfo) -> Result<(), LayerError>;

    /// Handle an event dispatched by the stack. Return `true` to mark it
    /// handled and stop forwarding to layers behind this one.
    fn on_event(&mut self, _event: &Event) -> bool {
        false
    }

    /// Whether this layer currently participates in per-frame phases.
    fn enabled(&self) -> bool {
        true
    }
}

struct LayerEntry {
    layer: Box<dyn Layer>,
    attached: bool,
    timings: PhaseTimings,
}

/// Ordered stack of layers. Non-overlay layers live before
/// `overlay_insert_index`; overlays always sit behind nothing (on top).
pub struct LayerStack {
    entries: Vec<LayerEntry>,
    overlay_insert_index: usize,
}

impl LayerStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            overlay_insert_index: 0,
        }
    }

    /// Attach `layer` and insert it before the first overlay.
    pub fn push_layer(&mut self, mut layer: Box<dyn Layer>) -> Result<(), LayerError> {
        layer.attach().map_err(|e| LayerError::AttachFailed(e.to_string()))?;
        self.entries.insert(
            self.overlay_insert_index,
            LayerEntry {
                layer,
                attached: true,
                timings: PhaseTimings::default(),
            },
        );
        self.overlay_insert_index += 1;
        Ok(())
    }

    /// Attach `layer` and append it as an overlay, always on top.
    pub fn push_overlay(&mut self, mut layer: Box<dyn Layer>) -> Result<(), LayerError> {
        layer.attach().map_err(|e| LayerError::AttachFailed(e.to_string()))?;
        self.entries.push(LayerEntry {
            layer,
            attached: true,
            timings: PhaseTimings::default(),
        });
        Ok(())
    }

    /// Detach every layer in reverse attach order. Idempotent.
    pub fn shutdown(&mut self) {
        for entry in self.entries.iter_mut().rev() {
            if entry.attached {
                entry.layer.detach();
                entry.attached = false;
            }
        }
    }

    /// Run `begin` on every enabled, attached layer in stack order.
    pub fn begin(&mut self, frame: &FrameInfo) -> Result<(), LayerError> {
        self.run_phase("begin", frame, |layer, timings, frame| {
            let start = Instant::now();
            let result = layer.begin(frame);
            timings.begin_ns = start.elapsed().as_nanos() as u64;
            result
        })
    }

    /// Run `prepare` (main-thread-only, no GPU recording) on every enabled,
    /// attached layer in stack order.
    pub fn prepare(&mut self, dt: f32) -> Result<(), LayerError> {
        for entry in &mut self.entries {
            if entry.attached && entry.layer.enabled() {
                entry.layer.prepare(dt)?;
            }
        }
        Ok(())
    }

    /// Run `update` on every enabled, attached layer in stack order.
    pub fn update(&mut self, frame: &FrameInfo) -> Result<(), LayerError> {
        self.run_phase("update", frame, |layer, timings, frame| {
            let start = Instant::now();
            let result = layer.update(frame);
            timings.update_ns = start.elapsed().as_nanos() as u64;
            result
        })
    }

    /// Run `render` on every enabled, attached layer in stack order.
    pub fn render(&mut self, frame: &FrameInfo) -> Result<(), LayerError> {
        self.run_phase("render", frame, |layer, timings, frame| {
            let start = Instant::now();
            let result = layer.render(frame);
            timings.render_ns = start.elapsed().as_nanos() as u64;
            result
        })
    }

    /// Run `end` on every enabled, attached layer in stack order.
    pub fn end(&mut self, frame: &FrameInfo) -> Result<(), LayerError> {
        self.run_phase("end", frame, |layer, timings, frame| {
            let start = Instant::now();
            let result = layer.end(frame);
            timings.end_ns = start.elapsed().as_nanos() as u64;
            result
        })
    }

    fn run_phase(
        &mut self,
        phase: &'static str,
        frame: &FrameInfo,
        mut call: impl FnMut(&mut dyn Layer, &mut PhaseTimings, &FrameInfo) -> Result<(), LayerError>,
    ) -> Result<(), LayerError> {
        for entry in &mut self.entries {
            if entry.attached && entry.layer.enabled() {
                call(entry.layer.as_mut(), &mut entry.timings, frame).map_err(|e| {
                    LayerError::PhaseFailed {
                        phase,
                        reason: e.to_string(),
                    }
                })?;
            }
        }
        Ok(())
    }

    /// Most recently recorded per-phase timings for layer at `index`.
    #[must_use]
    pub fn timings(&self, index: usize) -> Option<PhaseTimings> {
        self.entries.get(index).map(|entry| entry.timings)
    }

    /// Number of layers currently on the stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the stack has no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LayerStack {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl EventDispatchTarget for LayerStack {
    fn dispatch_event(&mut self, event: &Event) -> bool {
        for entry in &mut self.entries {
            if entry.attached && entry.layer.enabled() && entry.layer.on_event(event) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use std::sync::Arc;

    struct CountingLayer {
        name: &'static str,
        calls: Arc<Mutex<Vec<&'static str>>>,
        enabled: bool,
        consume_events: bool,
    }

    use std::sync::Mutex;

    impl Layer for CountingLayer {
        fn name(&self) -> &str {
            self.name
        }

        fn attach(&mut self) -> Result<(), LayerError> {
            self.calls.lock().unwrap().push("attach");
            Ok(())
        }

        fn detach(&mut self) {
            self.calls.lock().unwrap().push("detach");
        }

        fn begin(&mut self, _frame: &FrameInfo) -> Result<(), LayerError> {
            self.calls.lock().unwrap().push("begin");
            Ok(())
        }

        fn update(&mut self, _frame: &FrameInfo) -> Result<(), LayerError> {
            self.calls.lock().unwrap().push("update");
            Ok(())
        }

        fn render(&mut self, _frame: &FrameInfo) -> Result<(), LayerError> {
            self.calls.lock().unwrap().push("render");
            Ok(())
        }

        fn end(&mut self, _frame: &FrameInfo) -> Result<(), LayerError> {
            self.calls.lock().unwrap().push("end");
            Ok(())
        }

        fn on_event(&mut self, _event: &Event) -> bool {
            self.consume_events
        }

        fn enabled(&self) -> bool {
            self.enabled
        }
    }

    fn fake_frame() -> FrameInfo {
        FrameInfo {
            current_frame: 0,
            graphics_cmd: vk::CommandBuffer::null(),
            compute_cmd: None,
            extent: vk::Extent2D { width: 1280, height: 720 },
            dt: 1.0 / 60.0,
        }
    }

    #[test]
    fn push_layer_inserts_before_overlays() {
        let mut stack = LayerStack::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        stack
            .push_overlay(Box::new(CountingLayer {
                name: "overlay",
                calls: Arc::clone(&calls),
                enabled: true,
                consume_events: false,
            }))
            .unwrap();
        stack
            .push_layer(Box::new(CountingLayer {
                name: "base",
                calls: Arc::clone(&calls),
                enabled: true,
                consume_events: false,
            }))
            .unwrap();

        assert_eq!(stack.entries[0].layer.name(), "base");
        assert_eq!(stack.entries[1].layer.name(), "overlay");
    }

    #[test]
    fn phases_run_only_after_attach_and_before_detach() {
        let mut stack = LayerStack::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        stack
            .push_layer(Box::new(CountingLayer {
                name: "layer",
                calls: Arc::clone(&calls),
                enabled: true,
                consume_events: false,
            }))
            .unwrap();

        let frame = fake_frame();
        stack.begin(&frame).unwrap();
        stack.update(&frame).unwrap();
        stack.render(&frame).unwrap();
        stack.end(&frame).unwrap();
        stack.shutdown();

        let recorded = calls.lock().unwrap().clone();
        assert_eq!(recorded, vec!["attach", "begin", "update", "render", "end", "detach"]);
    }

    #[test]
    fn disabled_layer_skips_phases_but_not_attach_detach() {
        let mut stack = LayerStack::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        stack
            .push_layer(Box::new(CountingLayer {
                name: "layer",
                calls: Arc::clone(&calls),
                enabled: false,
                consume_events: false,
            }))
            .unwrap();

        let frame = fake_frame();
        stack.begin(&frame).unwrap();
        stack.shutdown();

        let recorded = calls.lock().unwrap().clone();
        assert_eq!(recorded, vec!["attach", "detach"]);
    }

    #[test]
    fn dispatch_stops_at_first_layer_that_marks_event_handled() {
        let mut stack = LayerStack::new();
        let calls_a = Arc::new(Mutex::new(Vec::new()));
        let calls_b = Arc::new(Mutex::new(Vec::new()));

        stack
            .push_layer(Box::new(CountingLayer {
                name: "a",
                calls: Arc::clone(&calls_a),
                enabled: true,
                consume_events: true,
            }))
            .unwrap();
        stack
            .push_layer(Box::new(CountingLayer {
                name: "b",
                calls: Arc::clone(&calls_b),
                enabled: true,
                consume_events: true,
            }))
            .unwrap();

        let handled = stack.dispatch_event(&Event::SceneLoaded);
        assert!(handled);
    }
}
