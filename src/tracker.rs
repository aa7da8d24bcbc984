//! Shutdown-time release of GPU-owning objects.
//!
//! Every wrapper in this crate releases its handles on `Drop`, so leaks
//! cannot happen through normal ownership. The [`ResourceTracker`] exists
//! for the resources whose owners live as long as the process: the
//! embedder registers them explicitly and runs one sweep at controlled
//! shutdown, while the graphics context is still valid. Registration is a
//! visible call at the composing site; constructors never self-register,
//! so units can be built in isolation without global side effects.
//!
//! Shutdown order the embedder is expected to follow: stop the frame
//! loop, call [`ResourceTracker::cleanup_all`], destroy the window and
//! context, then call [`ResourceTracker::run_finalizers`] for any raw
//! callbacks that must outlive the context teardown.

use std::sync::Arc;

/// Implemented by every wrapper that owns native GPU handles.
///
/// `release` must be idempotent: the first call frees the handles, later
/// calls do nothing. Using a wrapper after release is a programming error
/// and fails fast.
pub trait GpuResource {
    /// Debug label of the resource.
    fn label(&self) -> &str;
    /// Frees the owned GPU handles. Safe to call more than once.
    fn release(&self);
    /// Whether `release` has run.
    fn released(&self) -> bool;
}

/// A process-lifetime registry of releasable GPU resources.
#[derive(Default)]
pub struct ResourceTracker {
    resources: Vec<Arc<dyn GpuResource>>,
    finalizers: Vec<Box<dyn FnOnce()>>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource for the shutdown sweep.
    pub fn track(&mut self, resource: Arc<dyn GpuResource>) {
        self.resources.push(resource);
    }

    /// Registers a raw callback to run after context teardown, for
    /// resources not modeled as [`GpuResource`].
    pub fn defer(&mut self, finalizer: impl FnOnce() + 'static) {
        self.finalizers.push(Box::new(finalizer));
    }

    /// Number of tracked resources that have not been released yet.
    pub fn live_count(&self) -> usize {
        self.resources.iter().filter(|r| !r.released()).count()
    }

    /// Releases every tracked resource exactly once and clears the
    /// registry. Resources already released are skipped by their own
    /// disposal flag. Calling this on an empty registry is a no-op.
    pub fn cleanup_all(&mut self) {
        for resource in self.resources.drain(..) {
            if !resource.released() {
                log::debug!("releasing '{}' at shutdown", resource.label());
                resource.release();
            }
        }
    }

    /// Runs the deferred raw callbacks, in registration order.
    pub fn run_finalizers(&mut self) {
        for finalizer in self.finalizers.drain(..) {
            finalizer();
        }
    }
}

impl Drop for ResourceTracker {
    fn drop(&mut self) {
        // Catch leaks early in debug builds instead of relying on process
        // teardown to reclaim driver handles.
        debug_assert!(
            self.live_count() == 0,
            "resource tracker dropped with {} unreleased resources",
            self.live_count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Probe {
        releases: Rc<Cell<u32>>,
        flag: Cell<bool>,
    }

    impl Probe {
        fn new(releases: Rc<Cell<u32>>) -> Self {
            Self {
                releases,
                flag: Cell::new(false),
            }
        }
    }

    impl GpuResource for Probe {
        fn label(&self) -> &str {
            "probe"
        }

        fn release(&self) {
            if !self.flag.get() {
                self.flag.set(true);
                self.releases.set(self.releases.get() + 1);
            }
        }

        fn released(&self) -> bool {
            self.flag.get()
        }
    }

    #[test]
    fn every_tracked_resource_is_released_exactly_once() {
        let releases = Rc::new(Cell::new(0));
        let mut tracker = ResourceTracker::new();
        for _ in 0..5 {
            tracker.track(Arc::new(Probe::new(releases.clone())));
        }
        assert_eq!(tracker.live_count(), 5);

        tracker.cleanup_all();
        assert_eq!(releases.get(), 5);
        assert_eq!(tracker.live_count(), 0);
    }

    #[test]
    fn second_cleanup_on_empty_registry_is_a_noop() {
        let releases = Rc::new(Cell::new(0));
        let mut tracker = ResourceTracker::new();
        tracker.track(Arc::new(Probe::new(releases.clone())));

        tracker.cleanup_all();
        tracker.cleanup_all();
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn already_released_resources_are_skipped() {
        let releases = Rc::new(Cell::new(0));
        let probe = Arc::new(Probe::new(releases.clone()));
        let mut tracker = ResourceTracker::new();
        tracker.track(probe.clone());

        probe.release();
        probe.release();
        assert_eq!(releases.get(), 1);

        tracker.cleanup_all();
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn finalizers_run_in_registration_order() {
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut tracker = ResourceTracker::new();
        for i in 0..3 {
            let order = order.clone();
            tracker.defer(move || order.borrow_mut().push(i));
        }

        tracker.run_finalizers();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }
}
