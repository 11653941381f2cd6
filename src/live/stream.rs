use futures_util::{stream, Stream};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::Subscription;
use crate::models::{Frame, UpdateEvent};
use crate::services::doc_store::DocStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connecting,
    Streaming,
    Closed,
}

enum Wake {
    Shutdown,
    Event(Option<Arc<UpdateEvent>>),
    Tick,
}

struct LiveStream {
    phase: Phase,
    sub: Subscription,
    store: DocStore,
    ticker: Interval,
    shutdown: CancellationToken,
    /// Full-content frame owed after a dropped update
    catch_up: Option<Frame>,
}

/// Frames for one connected client.
///
/// Starts with a `connected` frame, then relays fan-out events and emits a
/// heartbeat every `heartbeat`. Ends on server shutdown or when the
/// subscription is superseded; dropping the stream (client gone) has the
/// same effect. The subscription is released exactly once in every case.
pub fn live_stream(
    sub: Subscription,
    store: DocStore,
    heartbeat: Duration,
    shutdown: CancellationToken,
) -> impl Stream<Item = Frame> + Send + 'static {
    let mut ticker = time::interval_at(Instant::now() + heartbeat, heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = LiveStream {
        phase: Phase::Connecting,
        sub,
        store,
        ticker,
        shutdown,
        catch_up: None,
    };

    stream::unfold(state, |mut state| async move {
        let frame = state.next_frame().await?;
        Some((frame, state))
    })
}

impl LiveStream {
    async fn next_frame(&mut self) -> Option<Frame> {
        match self.phase {
            Phase::Connecting => {
                self.phase = Phase::Streaming;
                info!(
                    "Live stream opened for token {} session {}",
                    self.sub.token(),
                    self.sub.session()
                );
                Some(Frame::connected(self.sub.session()))
            }
            Phase::Streaming => {
                if let Some(frame) = self.catch_up.take() {
                    return Some(frame);
                }

                let wake = tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => Wake::Shutdown,
                    event = self.sub.recv() => Wake::Event(event),
                    _ = self.ticker.tick() => Wake::Tick,
                };

                match wake {
                    Wake::Shutdown => self.close("server shutting down"),
                    Wake::Event(Some(event)) => Some(Frame::from(event.as_ref())),
                    Wake::Event(None) => self.close("superseded by a newer connection"),
                    Wake::Tick => {
                        if self.sub.take_missed() {
                            let (store, token) = (self.store.clone(), self.sub.token().to_string());
                            self.catch_up = catch_up_frame(store, token).await;
                        }
                        Some(Frame::heartbeat())
                    }
                }
            }
            Phase::Closed => None,
        }
    }

    fn close(&mut self, reason: &str) -> Option<Frame> {
        debug!("Closing live stream for session {}: {}", self.sub.session(), reason);
        self.phase = Phase::Closed;
        self.sub.release();
        None
    }
}

async fn catch_up_frame(store: DocStore, token: String) -> Option<Frame> {
    match store.read(&token).await {
        Ok(content) => {
            debug!("Sending catch-up content for token {}", token);
            Some(Frame::Content { content })
        }
        Err(e) => {
            warn!("Catch-up read failed for token {}: {}", token, e);
            None
        }
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        info!(
            "Live stream closed for token {} session {}",
            self.sub.token(),
            self.sub.session()
        );
    }
}
