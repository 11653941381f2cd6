use moka::sync::Cache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::doc_store::DocStore;
use crate::live::{FanOutReport, SessionRegistry};
use crate::models::UpdateEvent;

const NOTICE_QUEUE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSource {
    /// Emitted by the write endpoint after persisting
    Write,
    /// Seen by the directory watcher
    Watch,
}

/// "The document for `token` changed." Carries no content; the observer
/// always re-reads the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotice {
    pub token: String,
    pub origin: Option<String>,
    pub source: NoticeSource,
}

/// Last write made through the endpoint: author session and content digest
type WriteRecord = (Option<String>, u64);

/// Sending side of the change queue, shared by the write path and the watcher
#[derive(Clone)]
pub struct ChangeNotifier {
    tx: mpsc::Sender<ChangeNotice>,
    writes: Cache<String, WriteRecord>,
}

impl ChangeNotifier {
    /// Remember that `session` is about to store `content` for `token`.
    ///
    /// Must be called before the store write so the watcher cannot see the
    /// file first and mistake it for an external edit.
    pub fn record_write(&self, token: &str, session: Option<&str>, content: &str) {
        self.writes
            .insert(token.to_string(), (session.map(str::to_string), digest(content)));
    }

    /// Queue a change made through the write endpoint
    pub async fn notify_written(&self, token: &str, origin: Option<String>) {
        let notice = ChangeNotice {
            token: token.to_string(),
            origin,
            source: NoticeSource::Write,
        };
        if self.tx.send(notice).await.is_err() {
            debug!("Change observer stopped, dropping notice for token {}", token);
        }
    }

    /// Queue a change seen on disk. Called from the watcher thread, so it
    /// never waits; a full queue drops the notice.
    pub fn notify_watched(&self, token: &str) {
        let notice = ChangeNotice {
            token: token.to_string(),
            origin: None,
            source: NoticeSource::Watch,
        };
        match self.tx.try_send(notice) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Dropped filesystem change for token {} due to full queue", token)
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Background task turning change notices into fan-out events
pub struct ChangeObserver {
    rx: mpsc::Receiver<ChangeNotice>,
    store: DocStore,
    registry: SessionRegistry,
    writes: Cache<String, WriteRecord>,
    /// Digest of the last content published per token
    published: Cache<String, u64>,
}

/// Create the change queue
pub fn change_channel(store: DocStore, registry: SessionRegistry) -> (ChangeNotifier, ChangeObserver) {
    let (tx, rx) = mpsc::channel(NOTICE_QUEUE);
    let writes = Cache::builder()
        .max_capacity(100_000)
        .time_to_idle(Duration::from_secs(60 * 60))
        .build();
    let published = Cache::builder()
        .max_capacity(100_000)
        .time_to_idle(Duration::from_secs(60 * 60))
        .build();

    let notifier = ChangeNotifier {
        tx,
        writes: writes.clone(),
    };
    let observer = ChangeObserver {
        rx,
        store,
        registry,
        writes,
        published,
    };
    (notifier, observer)
}

impl ChangeObserver {
    /// Process notices until shutdown or until every notifier is gone
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Change observer started");
        loop {
            let notice = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                notice = self.rx.recv() => match notice {
                    Some(notice) => notice,
                    None => break,
                },
            };
            self.process(notice).await;
        }
        info!("Change observer stopped");
    }

    /// Re-read the document and fan it out, excluding its author.
    ///
    /// Returns `None` when the notice was dropped: unreadable document, or a
    /// watch notice for content that was already published or that came in
    /// through the write endpoint (its own write notice publishes it). Any
    /// other watch notice is an external edit and goes to every session.
    pub async fn process(&self, notice: ChangeNotice) -> Option<FanOutReport> {
        let ChangeNotice { token, origin, source } = notice;

        let content = match self.store.read(&token).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Error reading jot for token {}: {}", token, e);
                return None;
            }
        };

        let digest = digest(&content);
        let origin = match source {
            NoticeSource::Write => origin,
            NoticeSource::Watch => {
                if self.published.get(&token) == Some(digest) {
                    debug!("Watch notice for token {} carries no new content", token);
                    return None;
                }
                if let Some((session, written)) = self.writes.get(&token) {
                    if written == digest {
                        debug!(
                            "Watch notice for token {} matches write by session {:?}",
                            token, session
                        );
                        return None;
                    }
                }
                self.writes.invalidate(&token);
                None
            }
        };
        self.published.insert(token.clone(), digest);

        let exclude = origin.clone();
        let event = UpdateEvent::content(&token, content, origin);
        let report = self.registry.fan_out(&token, event, exclude.as_deref());
        debug!(
            "Change for token {} ({:?}) delivered to {} sessions, dropped for {}",
            token, source, report.delivered, report.dropped
        );
        Some(report)
    }
}

fn digest(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::Subscription;

    async fn setup() -> (tempfile::TempDir, DocStore, SessionRegistry, ChangeNotifier, ChangeObserver) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocStore::open(dir.path()).await.unwrap();
        let registry = SessionRegistry::new(10);
        let (notifier, observer) = change_channel(store.clone(), registry.clone());
        (dir, store, registry, notifier, observer)
    }

    fn notice(token: &str, origin: Option<&str>, source: NoticeSource) -> ChangeNotice {
        ChangeNotice {
            token: token.to_string(),
            origin: origin.map(str::to_string),
            source,
        }
    }

    async fn received(sub: &mut Subscription) -> Option<String> {
        tokio::time::timeout(Duration::from_millis(100), sub.recv())
            .await
            .ok()
            .flatten()
            .map(|event| event.content.clone())
    }

    #[tokio::test]
    async fn write_notice_rereads_and_excludes_origin() {
        let (_dir, store, registry, _notifier, observer) = setup().await;
        let mut s1 = registry.subscribe("abc", "s1");
        let mut s2 = registry.subscribe("abc", "s2");

        store.write("abc", "hello").await.unwrap();
        let report = observer.process(notice("abc", Some("s2"), NoticeSource::Write)).await;
        assert_eq!(report, Some(FanOutReport { delivered: 1, dropped: 0 }));

        assert_eq!(received(&mut s1).await.as_deref(), Some("hello"));
        assert_eq!(received(&mut s2).await, None);
    }

    #[tokio::test]
    async fn unreadable_document_is_dropped() {
        let (_dir, _store, registry, _notifier, observer) = setup().await;
        let _sub = registry.subscribe("gone", "s1");
        assert_eq!(observer.process(notice("gone", None, NoticeSource::Write)).await, None);
    }

    #[tokio::test]
    async fn watch_notice_skips_content_from_the_write_endpoint() {
        let (_dir, store, registry, notifier, observer) = setup().await;
        let mut s1 = registry.subscribe("abc", "s1");
        let mut s2 = registry.subscribe("abc", "s2");

        // Watcher got there before the write notice
        notifier.record_write("abc", Some("s1"), "from s1");
        store.write("abc", "from s1").await.unwrap();
        assert_eq!(observer.process(notice("abc", None, NoticeSource::Watch)).await, None);

        observer.process(notice("abc", Some("s1"), NoticeSource::Write)).await.unwrap();
        assert_eq!(received(&mut s2).await.as_deref(), Some("from s1"));
        assert_eq!(received(&mut s1).await, None);

        // Same bytes seen again on disk: nothing new to publish
        assert_eq!(observer.process(notice("abc", None, NoticeSource::Watch)).await, None);

        // Repeated explicit writes always go out
        observer.process(notice("abc", Some("s1"), NoticeSource::Write)).await.unwrap();
        assert_eq!(received(&mut s2).await.as_deref(), Some("from s1"));
        assert_eq!(received(&mut s1).await, None);
    }

    #[tokio::test]
    async fn external_edit_after_a_write_reaches_its_author() {
        let (_dir, store, registry, notifier, observer) = setup().await;
        let mut s1 = registry.subscribe("abc", "s1");
        let mut s2 = registry.subscribe("abc", "s2");

        notifier.record_write("abc", Some("s1"), "from s1");
        store.write("abc", "from s1").await.unwrap();
        observer.process(notice("abc", Some("s1"), NoticeSource::Write)).await.unwrap();
        assert_eq!(received(&mut s2).await.as_deref(), Some("from s1"));

        store.write("abc", "external edit").await.unwrap();
        let report = observer.process(notice("abc", None, NoticeSource::Watch)).await;
        assert_eq!(report, Some(FanOutReport { delivered: 2, dropped: 0 }));
        assert_eq!(received(&mut s1).await.as_deref(), Some("external edit"));
        assert_eq!(received(&mut s2).await.as_deref(), Some("external edit"));

        // Reverting to the old web content is still an external edit
        store.write("abc", "from s1").await.unwrap();
        let report = observer.process(notice("abc", None, NoticeSource::Watch)).await;
        assert_eq!(report, Some(FanOutReport { delivered: 2, dropped: 0 }));
    }

    #[tokio::test]
    async fn run_loop_survives_bad_notices_and_stops_on_shutdown() {
        let (_dir, store, registry, notifier, observer) = setup().await;
        let mut s1 = registry.subscribe("abc", "s1");
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(observer.run(shutdown.clone()));

        notifier.notify_written("missing", None).await;
        store.write("abc", "after failure").await.unwrap();
        notifier.notify_written("abc", Some("s2".into())).await;

        let event = tokio::time::timeout(Duration::from_secs(2), s1.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.content, "after failure");
        assert_eq!(event.origin.as_deref(), Some("s2"));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn updates_for_one_token_arrive_in_order() {
        let (_dir, store, registry, notifier, observer) = setup().await;
        let mut s1 = registry.subscribe("abc", "s1");
        let shutdown = CancellationToken::new();
        tokio::spawn(observer.run(shutdown.clone()));

        for i in 0..5 {
            store.write("abc", &format!("v{i}")).await.unwrap();
            notifier.notify_written("abc", Some("writer".into())).await;
            let event = tokio::time::timeout(Duration::from_secs(2), s1.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(event.content, format!("v{i}"));
        }
        shutdown.cancel();
    }
}
