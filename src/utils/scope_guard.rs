/// Runs a closure exactly once when dropped.
pub struct ScopeGuard<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> ScopeGuard<F> {
    pub fn new(f: F) -> Self {
        Self(Some(f))
    }

    /// Run the closure now instead of at drop
    pub fn release(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl<F: FnOnce()> Drop for ScopeGuard<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn runs_once_on_drop_or_release() {
        let runs = Arc::new(AtomicUsize::new(0));

        let counter = runs.clone();
        drop(ScopeGuard::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let counter = runs.clone();
        ScopeGuard::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .release();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
