use notify::{
    event::ModifyKind, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::Path;
use tracing::{info, warn};

use super::change_observer::ChangeNotifier;
use super::doc_store::DocStore;
use crate::error::{JotError, JotResult};

/// Keeps the directory watch alive; dropping it stops watching.
pub struct DirWatcher {
    _watcher: RecommendedWatcher,
}

/// Watch `dir` for document files changed by anyone, including editors
/// outside this process, and queue a change notice per affected token.
///
/// Setup failures are returned; errors reported later by the watcher are
/// logged and watching continues.
pub fn watch_dir(dir: &Path, notifier: ChangeNotifier) -> JotResult<DirWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if !is_content_change(&event.kind) {
                return;
            }
            for path in &event.paths {
                if let Some(token) = DocStore::token_from_path(path) {
                    notifier.notify_watched(&token);
                }
            }
        }
        Err(e) => warn!("Watcher error: {}", JotError::Watch(e)),
    })?;

    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    info!("Watching {} for jot changes", dir.display());
    Ok(DirWatcher { _watcher: watcher })
}

fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}
