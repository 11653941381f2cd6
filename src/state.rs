use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::live::SessionRegistry;
use crate::services::change_observer::{change_channel, ChangeNotifier, ChangeObserver};
use crate::services::doc_store::DocStore;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: DocStore,
    pub registry: SessionRegistry,
    pub changes: ChangeNotifier,
    /// Cancelled once on server shutdown; every live stream watches it
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Open the store and wire up the registry and change queue.
    ///
    /// The returned observer must be spawned for writes to reach anyone.
    pub async fn new(config: Config) -> std::io::Result<(Self, ChangeObserver)> {
        let store = DocStore::open(config.dir.clone()).await?;
        let registry = SessionRegistry::new(config.channel_capacity);
        let (changes, observer) = change_channel(store.clone(), registry.clone());

        let state = Self {
            config: Arc::new(config),
            store,
            registry,
            changes,
            shutdown: CancellationToken::new(),
        };
        Ok((state, observer))
    }
}
