//! Timeline Coordinator
//!
//! One process-wide monotonic 64-bit counter orders every submission.
//! Graphics frames and transfer uploads each signal their own value; the
//! completed value advances when the GPU reports a submission finished.
//! All deferred destruction reduces to "destroy when completed ≥ value".
//!
//! The completed counter is a shared atomic advanced from
//! `Queue::on_submitted_work_done` callbacks, so `signaled` is a plain
//! non-blocking load. Once submitted, nothing is rescinded — the
//! coordinator only delays destruction.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::allocator::{BufferHandle, GpuAllocator, ImageHandle};

/// Shared view of the GPU-completed timeline value.
///
/// Clones observe and advance the same counter; submission callbacks and
/// tests drive it the same way.
#[derive(Clone, Default)]
pub struct CompletionToken {
    completed: Arc<AtomicU64>,
}

impl CompletionToken {
    /// Current completed value (non-blocking).
    #[inline]
    #[must_use]
    pub fn completed_value(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Advances the completed value to at least `value`. Monotonic:
    /// lower values are ignored.
    pub fn signal_up_to(&self, value: u64) {
        self.completed.fetch_max(value, Ordering::AcqRel);
    }
}

/// A resource queued for destroy-on-completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseResource {
    Buffer(BufferHandle),
    Image(ImageHandle),
}

struct PendingRelease {
    resource: ReleaseResource,
    release_value: u64,
}

/// Monotonic timeline values plus the destroy-on-completion queue.
pub struct TimelineCoordinator {
    next_value: u64,
    token: CompletionToken,
    releases: Vec<PendingRelease>,
}

impl Default for TimelineCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_value: 1,
            token: CompletionToken::default(),
            releases: Vec::new(),
        }
    }

    /// Returns the next unused timeline value. Strictly increasing.
    pub fn next_value(&mut self) -> u64 {
        let value = self.next_value;
        self.next_value += 1;
        value
    }

    /// The most recently issued value (0 before the first issue).
    #[inline]
    #[must_use]
    pub fn last_issued(&self) -> u64 {
        self.next_value - 1
    }

    /// Whether the GPU has completed `value`. Value 0 counts as reached.
    #[inline]
    #[must_use]
    pub fn signaled(&self, value: u64) -> bool {
        value == 0 || self.token.completed_value() >= value
    }

    /// Shared completed-counter handle for submission callbacks.
    #[must_use]
    pub fn completion_token(&self) -> CompletionToken {
        self.token.clone()
    }

    /// Registers the completion callback for a submission that signals
    /// `value`. Must be called right after the `Queue::submit` the value
    /// was issued for, while no later submission is in between.
    pub fn register_submission(&self, queue: &wgpu::Queue, value: u64) {
        let token = self.token.clone();
        queue.on_submitted_work_done(move || token.signal_up_to(value));
    }

    /// Enqueues a buffer for destruction once `value` completes.
    pub fn schedule_buffer_release(&mut self, handle: BufferHandle, release_value: u64) {
        self.releases.push(PendingRelease {
            resource: ReleaseResource::Buffer(handle),
            release_value,
        });
    }

    /// Enqueues an image for destruction once `value` completes.
    pub fn schedule_image_release(&mut self, handle: ImageHandle, release_value: u64) {
        self.releases.push(PendingRelease {
            resource: ReleaseResource::Image(handle),
            release_value,
        });
    }

    /// Destroys every queued resource whose release value is reached.
    ///
    /// Called at the top of every frame and before any allocation that
    /// must reuse memory. `device` is polled first so completion
    /// callbacks that are already finished on the GPU get to run.
    pub fn collect_completed_releases(&mut self, device: &wgpu::Device, allocator: &mut GpuAllocator) {
        let _ = device.poll(wgpu::PollType::Poll);
        self.drain_reached(allocator);
    }

    /// Release-queue drain without the device poll.
    pub fn drain_reached(&mut self, allocator: &mut GpuAllocator) {
        self.drain_reached_with(|resource| {
            match resource {
                ReleaseResource::Buffer(handle) => allocator.destroy_buffer(handle),
                ReleaseResource::Image(handle) => allocator.destroy_image(handle),
            };
        });
    }

    /// Drains every reached release into `destroy`; the destruction
    /// policy is the caller's (tests drive this directly through the
    /// completion token).
    pub fn drain_reached_with(&mut self, mut destroy: impl FnMut(ReleaseResource)) {
        let completed = self.token.completed_value();
        self.releases.retain(|pending| {
            if pending.release_value > completed {
                return true;
            }
            destroy(pending.resource);
            false
        });
    }

    /// Number of queued, not-yet-reached releases (observability).
    #[must_use]
    pub fn pending_release_count(&self) -> usize {
        self.releases.len()
    }
}
