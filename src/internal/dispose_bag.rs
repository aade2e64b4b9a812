//! Internal disposal bag for captured disposables.

use std::sync::Arc;

use crate::traits::Dispose;

/// Disposables captured by one scope, in capture order.
#[derive(Default)]
pub(crate) struct DisposeBag {
    items: Vec<Arc<dyn Dispose>>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, item: Arc<dyn Dispose>) {
        self.items.push(item);
    }

    /// Takes every captured disposable, leaving the bag empty.
    pub(crate) fn take(&mut self) -> Vec<Arc<dyn Dispose>> {
        std::mem::take(&mut self.items)
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}
