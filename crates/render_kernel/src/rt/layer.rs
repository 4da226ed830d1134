//! Glue layer wiring `Event::PathTracingToggled` and scene-digest changes
//! into the BVH build pipeline (spec §8 scenario 3).
//!
//! Without this, `BvhBuilder`/`RaytracingCore` are individually tested but
//! nothing in the crate ever drives a build end to end; this layer is the
//! "built-in render layer" spec §4.4 already assumes exists for the
//! swapchain, generalized to ray tracing.

use std::sync::Arc;

use crate::command::SecondaryCmdMarshal;
use crate::events::Event;
use crate::frame::FrameInfo;
use crate::gpu::GpuContext;
use crate::layer::{Layer, LayerError};

use super::bvh_builder::{BvhBuilder, GeometryData, InstanceData, Priority};
use super::raytracing_core::{RaytracingCompletionHandler, RaytracingCore, SceneDigest};

struct SceneSnapshot {
    geometries: Vec<GeometryData>,
    instances: Vec<InstanceData>,
    digest: SceneDigest,
}

/// Drives `RaytracingCore`'s rebuild decision from the event bus and the
/// caller's latest scene snapshot. Toggled on/off by
/// [`Event::PathTracingToggled`]; the geometry/instance data itself is an
/// external collaborator (spec §1's asset/scene-graph Non-goal) supplied
/// through [`RaytracingLayer::set_scene_snapshot`].
pub struct RaytracingLayer {
    ctx: Arc<GpuContext>,
    marshal: Arc<SecondaryCmdMarshal>,
    builder: Arc<BvhBuilder>,
    core: Arc<RaytracingCore>,
    enabled: bool,
    scene: Option<SceneSnapshot>,
}

impl RaytracingLayer {
    /// Build a layer over an existing builder/core pair, disabled until a
    /// [`Event::PathTracingToggled`] event enables it.
    #[must_use]
    pub fn new(
        ctx: Arc<GpuContext>,
        marshal: Arc<SecondaryCmdMarshal>,
        builder: Arc<BvhBuilder>,
        core: Arc<RaytracingCore>,
    ) -> Self {
        Self {
            ctx,
            marshal,
            builder,
            core,
            enabled: false,
            scene: None,
        }
    }

    /// Replace the geometry/instance snapshot this layer builds from and
    /// the digest `RaytracingCore` compares against. Called by the owning
    /// application whenever its scene changes.
    pub fn set_scene_snapshot(&mut self, geometries: Vec<GeometryData>, instances: Vec<InstanceData>, digest: SceneDigest) {
        self.scene = Some(SceneSnapshot { geometries, instances, digest });
    }
}

impl Layer for RaytracingLayer {
    fn name(&self) -> &str {
        "raytracing"
    }

    fn begin(&mut self, _frame: &FrameInfo) -> Result<(), LayerError> {
        Ok(())
    }

    fn update(&mut self, _frame: &FrameInfo) -> Result<(), LayerError> {
        let Some(scene) = &self.scene else {
            return Ok(());
        };

        // Spec §8 boundary: zero scene geometry must not start a build.
        if scene.geometries.is_empty() {
            return Ok(());
        }

        if !self.core.should_start_rebuild(&scene.digest) {
            return Ok(());
        }

        let handler = Arc::new(RaytracingCompletionHandler::new(Arc::clone(&self.core), scene.digest.clone()));
        let instances = (!scene.instances.is_empty()).then(|| scene.instances.clone());

        self.builder
            .submit_blas_batch(
                Arc::clone(&self.ctx),
                Arc::clone(&self.marshal),
                scene.geometries.clone(),
                instances,
                Priority::Normal,
                handler,
            )
            .map_err(|e| LayerError::PhaseFailed {
                phase: "update",
                reason: e.to_string(),
            })
    }

    fn render(&mut self, _frame: &FrameInfo) -> Result<(), LayerError> {
        Ok(())
    }

    fn end(&mut self, _frame: &FrameInfo) -> Result<(), LayerError> {
        Ok(())
    }

    fn on_event(&mut self, event: &Event) -> bool {
        if let Event::PathTracingToggled(enabled) = event {
            self.enabled = *enabled;
            true
        } else {
            false
        }
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}
