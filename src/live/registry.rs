use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info};

use crate::models::UpdateEvent;
use crate::utils::scope_guard::ScopeGuard;

type EventTx = mpsc::Sender<Arc<UpdateEvent>>;
type EventRx = mpsc::Receiver<Arc<UpdateEvent>>;

struct Subscriber {
    /// Distinguishes a reconnect of the same session from the stale entry
    generation: u64,
    tx: EventTx,
    missed: Arc<AtomicBool>,
}

struct RegistryInner {
    tokens: Mutex<HashMap<String, HashMap<String, Subscriber>>>,
    capacity: usize,
    next_generation: AtomicU64,
}

impl RegistryInner {
    fn tokens(&self) -> MutexGuard<'_, HashMap<String, HashMap<String, Subscriber>>> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove `session` from `token`; with a generation, only if it still
    /// owns the slot. Drops the token entry once it is empty.
    fn remove(&self, token: &str, session: &str, generation: Option<u64>) -> bool {
        let mut tokens = self.tokens();
        let Some(sessions) = tokens.get_mut(token) else {
            return false;
        };
        let owned = sessions
            .get(session)
            .is_some_and(|sub| generation.map_or(true, |g| sub.generation == g));
        if owned {
            sessions.remove(session);
        }
        if sessions.is_empty() {
            tokens.remove(token);
        }
        owned
    }
}

/// Outcome of one fan-out call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Per-token map of session id to outbound channel.
///
/// The map is owned behind a single mutex and only reachable through the
/// methods below. Delivery is best effort: a full channel drops the newest
/// message for that session and flags it so the stream can catch up.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                tokens: Mutex::new(HashMap::new()),
                capacity: capacity.max(1),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Register `session` under `token`.
    ///
    /// An existing channel for the same session is replaced; its receiver sees
    /// the channel close. The returned subscription unregisters on drop.
    pub fn subscribe(&self, token: &str, session: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let missed = Arc::new(AtomicBool::new(false));
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);

        let replaced = self
            .inner
            .tokens()
            .entry(token.to_string())
            .or_default()
            .insert(
                session.to_string(),
                Subscriber {
                    generation,
                    tx,
                    missed: missed.clone(),
                },
            )
            .is_some();
        if replaced {
            info!("Session {} re-subscribed to token {}, replacing old stream", session, token);
        }

        let inner = self.inner.clone();
        let (guard_token, guard_session) = (token.to_string(), session.to_string());
        let release: Box<dyn FnOnce() + Send> = Box::new(move || {
            if inner.remove(&guard_token, &guard_session, Some(generation)) {
                debug!("Session {} unsubscribed from token {}", guard_session, guard_token);
            }
        });

        Subscription {
            token: token.to_string(),
            session: session.to_string(),
            rx,
            missed,
            release: Some(ScopeGuard::new(release)),
        }
    }

    /// Remove a session regardless of which connection holds it. No-op if absent.
    pub fn unsubscribe(&self, token: &str, session: &str) {
        self.inner.remove(token, session, None);
    }

    /// Deliver `event` to every session of `token` except `exclude`.
    ///
    /// Never waits on a recipient.
    pub fn fan_out(&self, token: &str, event: Arc<UpdateEvent>, exclude: Option<&str>) -> FanOutReport {
        let mut report = FanOutReport::default();
        let tokens = self.inner.tokens();
        let Some(sessions) = tokens.get(token) else {
            return report;
        };

        for (session, sub) in sessions {
            if exclude == Some(session.as_str()) {
                continue;
            }
            match sub.tx.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    sub.missed.store(true, Ordering::Release);
                    report.dropped += 1;
                }
                // Stream is unwinding; its guard removes the entry
                Err(TrySendError::Closed(_)) => {}
            }
        }
        report
    }

    /// Number of live sessions for `token`
    pub fn live_count(&self, token: &str) -> usize {
        self.inner.tokens().get(token).map_or(0, HashMap::len)
    }

    pub fn token_count(&self) -> usize {
        self.inner.tokens().len()
    }

    pub fn session_count(&self) -> usize {
        self.inner.tokens().values().map(HashMap::len).sum()
    }
}

/// Receiving half of a registration. Dropping it unsubscribes.
pub struct Subscription {
    token: String,
    session: String,
    rx: EventRx,
    missed: Arc<AtomicBool>,
    release: Option<ScopeGuard<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Next event, or `None` once the registry replaced this subscription
    pub async fn recv(&mut self) -> Option<Arc<UpdateEvent>> {
        self.rx.recv().await
    }

    /// Whether fan-out dropped anything for us since the last call
    pub fn take_missed(&self) -> bool {
        self.missed.swap(false, Ordering::AcqRel)
    }

    /// Unsubscribe now rather than on drop. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(guard) = self.release.take() {
            guard.release();
        }
    }
}
