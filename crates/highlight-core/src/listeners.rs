//! Listeners notified when style ranges change.

use crate::style::StyleRange;

/// Handle returned by [`StyleListeners::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Callback receiving the style ranges whose classification changed.
///
/// A later notification for the same bytes supersedes an earlier one; a notification never
/// claims the document is completely classified.
pub type StyleListener = Box<dyn FnMut(&[StyleRange]) + Send>;

/// Ordered set of style change listeners.
///
/// Listeners run in registration order. Unsubscribing is idempotent.
#[derive(Default)]
pub struct StyleListeners {
    next_id: u64,
    listeners: Vec<(ListenerId, StyleListener)>,
}

impl StyleListeners {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` and return its handle.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&[StyleRange]) + Send + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered (or already removed).
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Invoke every listener with `ranges`. Empty notifications are not delivered.
    pub fn notify(&mut self, ranges: &[StyleRange]) {
        if ranges.is_empty() {
            return;
        }
        for (_, listener) in &mut self.listeners {
            listener(ranges);
        }
    }
}

impl std::fmt::Debug for StyleListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleListeners")
            .field("next_id", &self.next_id)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_listeners_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = StyleListeners::new();
        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            listeners.subscribe(move |ranges| log.lock().unwrap().push((name, ranges.len())));
        }

        listeners.notify(&[StyleRange::unclassified(0..4)]);
        assert_eq!(
            *log.lock().unwrap(),
            vec![("first", 1), ("second", 1), ("third", 1)]
        );
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let calls = Arc::new(Mutex::new(0));
        let mut listeners = StyleListeners::new();
        let counter = Arc::clone(&calls);
        let id = listeners.subscribe(move |_| *counter.lock().unwrap() += 1);

        assert!(listeners.unsubscribe(id));
        assert!(!listeners.unsubscribe(id));
        listeners.notify(&[StyleRange::styled(0..1, 1)]);
        assert_eq!(*calls.lock().unwrap(), 0);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut listeners = StyleListeners::new();
        let a = listeners.subscribe(|_| {});
        listeners.unsubscribe(a);
        let b = listeners.subscribe(|_| {});
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_notifications_are_skipped() {
        let calls = Arc::new(Mutex::new(0));
        let mut listeners = StyleListeners::new();
        let counter = Arc::clone(&calls);
        listeners.subscribe(move |_| *counter.lock().unwrap() += 1);
        listeners.notify(&[]);
        assert_eq!(*calls.lock().unwrap(), 0);
    }
}
