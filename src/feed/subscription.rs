use std::fmt;

use tokio::sync::mpsc;

use super::ChangeEvent;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// A live change subscription.
///
/// Released exactly once: either explicitly through [`Subscription::release`],
/// which consumes it, or when it is dropped. After release no further event
/// is delivered.
pub struct Subscription {
    rx: mpsc::Receiver<ChangeEvent>,
    release: Option<ReleaseHook>,
}

impl Subscription {
    pub fn new(
        rx: mpsc::Receiver<ChangeEvent>,
        on_release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            release: Some(Box::new(on_release)),
        }
    }

    /// Waits for the next change. `None` once the feed side has gone away.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    /// Returns an already queued change without waiting.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.rx.try_recv().ok()
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(hook) = self.release.take() {
            self.rx.close();
            while self.rx.try_recv().is_ok() {}
            hook();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.release.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Table;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn delivers_queued_events() {
        let (tx, rx) = mpsc::channel(4);
        let (_count, hook) = counting();
        let mut sub = Subscription::new(rx, hook);

        tx.send(ChangeEvent::detected(Table::ProductionLogs)).await.unwrap();
        let event = sub.next().await.unwrap();
        assert_eq!(event.table, Table::ProductionLogs);
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn release_runs_hook_once() {
        let (_tx, rx) = mpsc::channel(4);
        let (count, hook) = counting();
        let sub = Subscription::new(rx, hook);

        sub.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases() {
        let (_tx, rx) = mpsc::channel(4);
        let (count, hook) = counting();
        {
            let _sub = Subscription::new(rx, hook);
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sender_sees_closed_channel_after_release() {
        let (tx, rx) = mpsc::channel(4);
        let (_count, hook) = counting();
        Subscription::new(rx, hook).release();

        assert!(tx.try_send(ChangeEvent::detected(Table::ProductionTimers)).is_err());
        assert!(tx.is_closed());
    }
}
