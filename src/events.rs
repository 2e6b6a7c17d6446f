//! Observable lifecycle events emitted by the book coordinator.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ArtifactKind, PreloadError};
use crate::frame::PageFrame;
use crate::model::BookInfo;

/// Lifecycle notifications a host application can subscribe to instead of
/// polling coordinator state.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum CoreEvent {
    /// A book was opened and its virtual page list built.
    BookOpen(BookInfo),
    /// The open book was closed.
    BookClose,
    /// The current page changed, carrying the new virtual index and the
    /// frame now displayed there (`None` when the list is empty).
    PageChange(usize, Option<Arc<PageFrame>>),
    /// The virtual page list was rebuilt (sort/filter/config/size change).
    PagesRebuilt,
    /// Coarse progress while a book is being opened, in `[0.0, 1.0]`.
    LoadProgress(f64),
    /// A preload task began loading.
    PreloadTaskStart(ArtifactKind, usize),
    /// A preload task finished, successfully or not.
    PreloadTaskComplete(ArtifactKind, usize, Result<(), PreloadError>),
    /// The set of in-flight/queued preload tasks changed size.
    PreloadQueueChange(usize),
    /// The preload focus index changed.
    PreloadFocusChange(i64),
}

type Observer = Box<dyn Fn(&CoreEvent) + Send + Sync>;

/// Ordered list of observer callbacks, invoked synchronously in
/// registration order. A plain `Vec` of closures under a lock is enough
/// for this crate's single-process scope.
#[derive(Default)]
pub struct EventBus {
    observers: Mutex<Vec<Observer>>,
}

impl EventBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; returns nothing, as there is no unsubscribe
    /// mechanism.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&CoreEvent) + Send + Sync + 'static,
    {
        self.observers.lock().push(Box::new(observer));
    }

    /// Invoke every observer, in registration order, with `event`.
    pub fn emit(&self, event: CoreEvent) {
        for observer in self.observers.lock().iter() {
            observer(&event);
        }
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    /// Whether no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.observers.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_observers_invoked_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        bus.subscribe(move |_| o1.lock().push(1));
        bus.subscribe(move |_| o2.lock().push(2));
        bus.emit(CoreEvent::BookOpen(BookInfo {
            locator: "book".into(),
            is_archive: false,
            page_count: 1,
        }));
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn test_emit_with_no_observers_is_noop() {
        let bus = EventBus::new();
        bus.emit(CoreEvent::BookClose);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_counts_all_emits() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(CoreEvent::PageChange(3, None));
        bus.emit(CoreEvent::PageChange(4, None));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
