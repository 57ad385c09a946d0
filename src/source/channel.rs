//! Consumer side of the view-model channel.
//!
//! The reconciler publishes every new [`ViewModel`] into a tokio watch
//! channel. Readers hold a [`ViewReceiver`] and either poll for changes
//! from a render loop or await the next change.

use std::sync::Arc;

use tokio::sync::watch;

use crate::data::ViewModel;

/// A read handle on the latest published view model.
///
/// Cloning is cheap; each clone tracks changes independently.
#[derive(Debug, Clone)]
pub struct ViewReceiver {
    receiver: watch::Receiver<Arc<ViewModel>>,
    /// Track if we've returned the initial value yet
    initial_returned: bool,
}

impl ViewReceiver {
    pub(crate) fn new(receiver: watch::Receiver<Arc<ViewModel>>) -> Self {
        Self {
            receiver,
            initial_returned: false,
        }
    }

    /// The most recently published view model.
    pub fn latest(&self) -> Arc<ViewModel> {
        self.receiver.borrow().clone()
    }

    /// Returns the view model if it changed since the last call, without blocking.
    ///
    /// The first call always returns the current value.
    pub fn poll(&mut self) -> Option<Arc<ViewModel>> {
        if !self.initial_returned {
            self.initial_returned = true;
            self.receiver.mark_changed();
        }

        if self.receiver.has_changed().unwrap_or(false) {
            Some(self.receiver.borrow_and_update().clone())
        } else {
            None
        }
    }

    /// Wait for the next published view model.
    ///
    /// Returns `None` once the publisher has gone away.
    pub async fn changed(&mut self) -> Option<Arc<ViewModel>> {
        self.initial_returned = true;
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Reconciler;
    use crate::data::Update;

    #[test]
    fn test_poll_returns_initial_then_changes() {
        let (mut reconciler, mut view) = Reconciler::new(10);

        let first = view.poll();
        assert!(first.is_some());
        assert_eq!(first.unwrap().configured_window_size, 10);

        // No change, so poll returns None
        assert!(view.poll().is_none());

        reconciler.apply(Update::WindowConfigured(24));

        let next = view.poll();
        assert_eq!(next.map(|v| v.configured_window_size), Some(24));
        assert!(view.poll().is_none());
    }

    #[tokio::test]
    async fn test_changed_wakes_on_publish() {
        let (mut reconciler, mut view) = Reconciler::new(10);

        let waiter = tokio::spawn(async move { view.changed().await });
        tokio::task::yield_now().await;
        reconciler.apply(Update::ServerRunning(true));

        let published = waiter.await.unwrap().expect("publisher still alive");
        assert!(published.server.running);
    }

    #[tokio::test]
    async fn test_changed_ends_when_publisher_dropped() {
        let (reconciler, mut view) = Reconciler::new(10);
        drop(reconciler);
        assert!(view.changed().await.is_none());
    }

    #[test]
    fn test_latest_does_not_consume_change() {
        let (mut reconciler, mut view) = Reconciler::new(10);
        view.poll();

        reconciler.apply(Update::WindowConfigured(4));
        assert_eq!(view.latest().configured_window_size, 4);
        assert!(view.poll().is_some());
    }
}
