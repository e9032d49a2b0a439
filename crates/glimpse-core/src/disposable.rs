//! Handles that release a resource when disposed or dropped.

use std::fmt;

/// Runs its cleanup exactly once: on [`Disposable::dispose`] or on drop.
#[must_use = "dropping a Disposable releases the resource immediately"]
pub struct Disposable {
    cleanup: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Disposable {
    pub fn new(cleanup: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Self { cleanup: None }
    }

    pub fn dispose(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl Drop for Disposable {
    fn drop(&mut self) {
        self.run();
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("live", &self.cleanup.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cleanup_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = Disposable::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        handle.dispose();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let c = count.clone();
        drop(Disposable::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
