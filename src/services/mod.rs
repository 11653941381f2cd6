pub mod change_observer;
pub mod doc_store;
pub mod fs_watcher;
pub mod token_service;
