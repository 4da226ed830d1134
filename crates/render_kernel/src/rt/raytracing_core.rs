//! Published ray-tracing state and rebuild-decision logic (spec §4.7)
//!
//! New relative to the teacher; grounded on [`super::bvh_builder`]'s worker
//! pool (itself grounded on the `ThreadPool`/`Worker` pattern in
//! `ecs/scheduler.rs`), generalizing its completion-handler callback from a
//! single result into the published-state store a render thread reads from.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ash::vk;
use slotmap::{new_key_type, SlotMap};

use super::bvh_builder::{BlasResult, BvhCompletionHandler, BvhCompletionResult, TlasResult};

new_key_type! {
    /// Stable handle to a published BLAS, valid across rebuilds.
    pub struct BlasHandle;
}

/// Opaque snapshot of whatever the caller considers "the scene" for the
/// purpose of deciding whether the acceleration structure needs a rebuild.
/// Resolves the spec's Open Question: this crate does not compute scene
/// digests itself (that requires mesh/transform knowledge outside its
/// Non-goals) — callers supply a deterministic digest and a comparator.
#[derive(Debug, Clone)]
pub struct SceneDigest(pub Vec<u8>);

/// Caller-supplied comparator deciding whether two digests represent the
/// same built scene. Must be deterministic: equal scenes must always
/// compare equal, and the comparison must not depend on build order.
pub trait SceneDigestComparator: Send + Sync {
    /// Returns `true` if `a` and `b` describe the same acceleration
    /// structure contents and no rebuild is needed.
    fn digests_equal(&self, a: &SceneDigest, b: &SceneDigest) -> bool;
}

/// Byte-equality comparator; correct whenever the caller's digest already
/// canonicalizes ordering (e.g. a sorted hash of geometry ids).
pub struct ByteEqualityComparator;

impl SceneDigestComparator for ByteEqualityComparator {
    fn digests_equal(&self, a: &SceneDigest, b: &SceneDigest) -> bool {
        a.0 == b.0
    }
}

struct PublishedState {
    blas: SlotMap<BlasHandle, BlasResult>,
    tlas: Option<TlasResult>,
    sbt: Option<vk::Buffer>,
    output_image: Option<vk::Image>,
    last_digest: Option<SceneDigest>,
}

impl Default for PublishedState {
    fn default() -> Self {
        Self {
            blas: SlotMap::with_key(),
            tlas: None,
            sbt: None,
            output_image: None,
            last_digest: None,
        }
    }
}

/// Owns the published TLAS/BLAS set, the shader binding table, and the
/// output storage image, and decides when a rebuild is warranted.
///
/// Builds are published only from the [`crate::rt::BvhCompletionHandler`]
/// completion callback; nothing here mutates published state from a worker
/// thread directly (spec §4.7: "publication happens only on the completion
/// callback, never speculatively mid-build").
pub struct RaytracingCore {
    state: Mutex<PublishedState>,
    build_in_progress: AtomicBool,
    rebuild_pending: AtomicBool,
    descriptors_dirty: AtomicBool,
    comparator: Box<dyn SceneDigestComparator>,
}

impl RaytracingCore {
    /// Create an empty core using `comparator` to decide rebuild necessity.
    #[must_use]
    pub fn new(comparator: Box<dyn SceneDigestComparator>) -> Self {
        Self {
            state: Mutex::new(PublishedState::default()),
            build_in_progress: AtomicBool::new(false),
            rebuild_pending: AtomicBool::new(false),
            descriptors_dirty: AtomicBool::new(false),
            comparator,
        }
    }

    /// Whether a build is currently outstanding on the [`crate::rt::BvhBuilder`].
    #[must_use]
    pub fn build_in_progress(&self) -> bool {
        self.build_in_progress.load(Ordering::Acquire)
    }

    /// Whether descriptor sets referencing the published TLAS/output image
    /// need to be rewritten before the next render.
    #[must_use]
    pub fn descriptors_dirty(&self) -> bool {
        self.descriptors_dirty.load(Ordering::Acquire)
    }

    /// Clear the descriptors-dirty flag once the caller has rewritten them.
    pub fn clear_descriptors_dirty(&self) {
        self.descriptors_dirty.store(false, Ordering::Release);
    }

    /// Evaluate whether `digest` warrants starting a rebuild.
    ///
    /// - No build in flight and the digest changed: caller should submit a
    ///   new batch via [`crate::rt::BvhBuilder`] and this returns `true`.
    /// - A build is already in flight: the request is remembered as
    ///   `rebuild_pending` and retried once the in-flight build completes;
    ///   this returns `false` so the caller does not double-submit.
    /// - Digest unchanged: no rebuild needed, returns `false`.
    pub fn should_start_rebuild(&self, digest: &SceneDigest) -> bool {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let unchanged = state
            .last_digest
            .as_ref()
            .is_some_and(|last| self.comparator.digests_equal(last, digest));
        drop(state);

        if unchanged {
            return false;
        }

        if self.build_in_progress.swap(true, Ordering::AcqRel) {
            self.rebuild_pending.store(true, Ordering::Release);
            false
        } else {
            true
        }
    }

    /// Publish a completed BLAS batch (and optional TLAS), matching spec
    /// §4.7's "publication is atomic from the caller's point of view."
    /// Returns `true` if, due to a digest change observed while this build
    /// was in flight, the caller should immediately start another rebuild.
    pub fn publish_blas(&self, digest: SceneDigest, results: Vec<BlasResult>, tlas: Option<TlasResult>) -> bool {
        {
            let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            state.blas.clear();
            for result in results {
                state.blas.insert(result);
            }
            if let Some(tlas) = tlas {
                state.tlas = Some(tlas);
            }
            state.last_digest = Some(digest);
        }

        self.descriptors_dirty.store(true, Ordering::Release);
        self.build_in_progress.store(false, Ordering::Release);
        self.rebuild_pending.swap(false, Ordering::AcqRel)
    }

    /// Record a failed build (spec §7): the old BVH remains published and
    /// no partial publication occurs. Clears `build_in_progress` so the
    /// next scene-digest change can retry. Returns `true` if a rebuild was
    /// requested while this build was in flight — the caller should
    /// immediately resubmit against the latest scene snapshot.
    pub fn fail_build(&self) -> bool {
        self.build_in_progress.store(false, Ordering::Release);
        self.rebuild_pending.swap(false, Ordering::AcqRel)
    }

    /// Publish a standalone completed TLAS.
    pub fn publish_tlas(&self, tlas: TlasResult) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.tlas = Some(tlas);
        drop(state);
        self.descriptors_dirty.store(true, Ordering::Release);
    }

    /// Record the shader binding table buffer backing the currently
    /// published pipeline.
    pub fn set_sbt(&self, sbt: vk::Buffer) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.sbt = Some(sbt);
        drop(state);
        self.descriptors_dirty.store(true, Ordering::Release);
    }

    /// Record the output storage image the ray-tracing pipeline writes into.
    pub fn set_output_image(&self, image: vk::Image) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.output_image = Some(image);
        drop(state);
        self.descriptors_dirty.store(true, Ordering::Release);
    }

    /// The currently published TLAS, if any build has completed.
    #[must_use]
    pub fn published_tlas(&self) -> Option<vk::AccelerationStructureKHR> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.tlas.as_ref().map(|t| t.acceleration_structure)
    }

    /// Number of currently published BLAS entries.
    #[must_use]
    pub fn blas_count(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.blas.len()
    }
}

/// Forwards a [`BvhCompletionHandler`] callback into
/// [`RaytracingCore::publish_blas`]/[`RaytracingCore::publish_tlas`]/
/// [`RaytracingCore::fail_build`], closing the loop spec §9's Design Notes
/// call for between the builder's completion callback and the published
/// state the render thread reads between frames. Carries the scene digest
/// the build was started from, since a completion result on its own has no
/// notion of which scene it was building.
pub struct RaytracingCompletionHandler {
    core: Arc<RaytracingCore>,
    digest: SceneDigest,
}

impl RaytracingCompletionHandler {
    /// Bind a handler to `core` for a build started against `digest`.
    #[must_use]
    pub fn new(core: Arc<RaytracingCore>, digest: SceneDigest) -> Self {
        Self { core, digest }
    }
}

impl BvhCompletionHandler for RaytracingCompletionHandler {
    fn on_complete(&self, result: BvhCompletionResult) {
        match result {
            BvhCompletionResult::Blas { results, tlas } => {
                let _retry_now = self.core.publish_blas(self.digest.clone(), results, tlas);
            }
            BvhCompletionResult::Tlas(tlas) => {
                self.core.publish_tlas(tlas);
            }
            BvhCompletionResult::Failed(reason) => {
                log::warn!("BVH build failed, keeping previously published BVH: {reason}");
                let _retry_now = self.core.fail_build();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(bytes: &[u8]) -> SceneDigest {
        SceneDigest(bytes.to_vec())
    }

    #[test]
    fn first_digest_always_triggers_a_rebuild() {
        let core = RaytracingCore::new(Box::new(ByteEqualityComparator));
        assert!(core.should_start_rebuild(&digest(b"scene-a")));
    }

    #[test]
    fn unchanged_digest_after_publish_does_not_rebuild() {
        let core = RaytracingCore::new(Box::new(ByteEqualityComparator));
        assert!(core.should_start_rebuild(&digest(b"scene-a")));
        core.publish_blas(digest(b"scene-a"), Vec::new(), None);
        assert!(!core.should_start_rebuild(&digest(b"scene-a")));
    }

    #[test]
    fn changed_digest_while_build_in_flight_sets_pending_and_retries_on_publish() {
        let core = RaytracingCore::new(Box::new(ByteEqualityComparator));
        assert!(core.should_start_rebuild(&digest(b"scene-a")));
        // A second change arrives before the first build completes.
        assert!(!core.should_start_rebuild(&digest(b"scene-b")));
        let retry = core.publish_blas(digest(b"scene-a"), Vec::new(), None);
        assert!(retry, "pending rebuild must be signaled on publish");
        assert!(!core.build_in_progress());
    }

    #[test]
    fn publish_marks_descriptors_dirty() {
        let core = RaytracingCore::new(Box::new(ByteEqualityComparator));
        assert!(!core.descriptors_dirty());
        core.publish_blas(digest(b"scene-a"), Vec::new(), None);
        assert!(core.descriptors_dirty());
        core.clear_descriptors_dirty();
        assert!(!core.descriptors_dirty());
    }

    #[test]
    fn failed_build_clears_in_progress_and_keeps_old_bvh_published() {
        let core = RaytracingCore::new(Box::new(ByteEqualityComparator));
        assert!(core.should_start_rebuild(&digest(b"scene-a")));
        core.publish_blas(digest(b"scene-a"), vec![], None);
        assert_eq!(core.blas_count(), 0);

        assert!(core.should_start_rebuild(&digest(b"scene-b")));
        assert!(core.build_in_progress());
        let retry = core.fail_build();
        assert!(!retry, "no rebuild was requested while this build failed");
        assert!(!core.build_in_progress());

        // The next scene change retries, as spec §7 requires.
        assert!(core.should_start_rebuild(&digest(b"scene-c")));
    }

    #[test]
    fn failed_build_with_pending_rebuild_signals_retry() {
        let core = RaytracingCore::new(Box::new(ByteEqualityComparator));
        assert!(core.should_start_rebuild(&digest(b"scene-a")));
        // A second change arrives before the first build's failure is reported.
        assert!(!core.should_start_rebuild(&digest(b"scene-b")));
        let retry = core.fail_build();
        assert!(retry, "pending rebuild must be signaled even when the in-flight build failed");
        assert!(!core.build_in_progress());
    }
}
