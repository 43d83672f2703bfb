//! Voice catalog with asynchronous readiness.
//!
//! The platform may enumerate voices lazily: the first query can return an
//! empty list and the real list arrives later through a change notification.
//! The catalog moves `Empty -> Populated` the first time a non-empty list is
//! seen and never goes back; later non-empty lists replace the snapshot.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::voice::types::Voice;

/// Platform enumeration of installed voices.
pub trait VoiceSource: Send + Sync {
    /// Current platform voice list. May be empty while the platform loads.
    fn voices(&self) -> Vec<Voice>;
}

/// Fixed voice list, e.g. from configuration.
#[derive(Clone, Debug, Default)]
pub struct StaticVoiceSource {
    voices: Vec<Voice>,
}

impl StaticVoiceSource {
    /// Create a source returning `voices` on every query.
    #[must_use]
    pub const fn new(voices: Vec<Voice>) -> Self {
        Self { voices }
    }
}

impl VoiceSource for StaticVoiceSource {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }
}

/// Shared-read, single-writer voice catalog.
pub struct VoiceCatalog {
    source: Arc<dyn VoiceSource>,
    snapshot: watch::Sender<Arc<[Voice]>>,
}

impl VoiceCatalog {
    /// Create an empty catalog and query the source once.
    #[must_use]
    pub fn new(source: Arc<dyn VoiceSource>) -> Self {
        let (snapshot, _) = watch::channel(Arc::from(Vec::new()));
        let catalog = Self { source, snapshot };
        catalog.refresh();
        catalog
    }

    /// Query the platform and publish the result if it is non-empty.
    pub fn refresh(&self) {
        let voices = self.source.voices();
        self.publish(voices);
    }

    /// Platform hook for "voice list changed" notifications.
    pub fn on_voices_changed(&self) {
        debug!("Voice catalog change notification");
        self.refresh();
    }

    /// Publish a voice list pushed by the platform.
    ///
    /// Empty lists are ignored so a populated catalog never reverts.
    pub fn publish(&self, voices: Vec<Voice>) {
        if voices.is_empty() {
            return;
        }
        let first = !self.is_ready();
        let count = voices.len();
        self.snapshot.send_replace(Arc::from(voices));
        if first {
            info!(count, "Voice catalog populated");
        } else {
            debug!(count, "Voice catalog refreshed");
        }
    }

    /// Current voice list, possibly empty.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[Voice]> {
        Arc::clone(&*self.snapshot.borrow())
    }

    /// Whether the catalog has been populated.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.snapshot.borrow().is_empty()
    }

    /// Wait until the catalog is populated and return the snapshot.
    ///
    /// Resolves immediately, without querying the platform, once populated.
    /// Any number of callers may wait; all resolve on the same transition.
    pub async fn await_ready(&self) -> Arc<[Voice]> {
        let mut rx = self.snapshot.subscribe();
        if rx.borrow().is_empty() {
            self.refresh();
        }
        match rx.wait_for(|voices| !voices.is_empty()).await {
            Ok(voices) => Arc::clone(&*voices),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => self.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Source that starts empty and counts queries.
    #[derive(Default)]
    struct LazySource {
        voices: Mutex<Vec<Voice>>,
        queries: AtomicUsize,
    }

    impl LazySource {
        fn load(&self, voices: Vec<Voice>) {
            *self.voices.lock().unwrap() = voices;
        }
    }

    impl VoiceSource for LazySource {
        fn voices(&self) -> Vec<Voice> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.voices.lock().unwrap().clone()
        }
    }

    #[test]
    fn test_static_source_is_ready_immediately() {
        let catalog = VoiceCatalog::new(Arc::new(StaticVoiceSource::new(vec![Voice::new(
            "Aria", "en-US",
        )])));
        assert!(catalog.is_ready());
        assert_eq!(catalog.snapshot().len(), 1);
    }

    #[test]
    fn test_empty_publish_does_not_revert() {
        let catalog = VoiceCatalog::new(Arc::new(StaticVoiceSource::default()));
        assert!(!catalog.is_ready());
        catalog.publish(vec![Voice::new("Aria", "en-US")]);
        assert!(catalog.is_ready());
        catalog.publish(Vec::new());
        assert!(catalog.is_ready());
        assert_eq!(catalog.snapshot()[0].name, "Aria");
    }

    #[tokio::test]
    async fn test_await_ready_after_population_does_not_requery() {
        let source = Arc::new(LazySource::default());
        source.load(vec![Voice::new("Aria", "en-US")]);
        let catalog = VoiceCatalog::new(source.clone());
        let before = source.queries.load(Ordering::SeqCst);

        let voices = catalog.await_ready().await;
        assert_eq!(voices.len(), 1);
        assert_eq!(source.queries.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_waiters_resolve_on_change_notification() {
        let source = Arc::new(LazySource::default());
        let catalog = Arc::new(VoiceCatalog::new(source.clone()));

        let first = tokio::spawn({
            let catalog = Arc::clone(&catalog);
            async move { catalog.await_ready().await.len() }
        });
        let second = tokio::spawn({
            let catalog = Arc::clone(&catalog);
            async move { catalog.await_ready().await.len() }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        source.load(vec![Voice::new("Aria", "en-US"), Voice::new("Daniel", "en-GB")]);
        catalog.on_voices_changed();

        let a = tokio::time::timeout(Duration::from_secs(1), first).await;
        let b = tokio::time::timeout(Duration::from_secs(1), second).await;
        assert!(matches!(a, Ok(Ok(2))));
        assert!(matches!(b, Ok(Ok(2))));
    }
}
