use axum::{extract::State, http::StatusCode, Json};
use std::sync::{Mutex, OnceLock};
use sysinfo::System;
use tracing::info;

use crate::models::DiagnosticsResponse;
use crate::state::AppState;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Live stream counts and process load. Only served in development.
pub async fn diagnostics(State(state): State<AppState>) -> Result<Json<DiagnosticsResponse>, StatusCode> {
    if !state.config.is_development() {
        return Err(StatusCode::NOT_FOUND);
    }

    let n_tokens = state.registry.token_count() as u32;
    let n_sessions = state.registry.session_count() as u32;

    let (cpu_usage, memory_used, memory_free, memory_total) = {
        let sys_lock = SYSTEM_MONITOR.get_or_init(|| Mutex::new(System::new_all()));
        match sys_lock.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu();
                sys.refresh_memory();
                (
                    sys.global_cpu_info().cpu_usage(),
                    sys.used_memory(),
                    sys.free_memory(),
                    sys.total_memory(),
                )
            }
            Err(_) => (0.0, 0, 0, 0),
        }
    };

    info!(
        "Diagnostics: CPU: {:.2}%, Mem: {}/{} MB, Tokens: {}, Sessions: {}",
        cpu_usage,
        memory_used / 1024 / 1024,
        memory_total / 1024 / 1024,
        n_tokens,
        n_sessions
    );

    Ok(Json(DiagnosticsResponse {
        n_tokens,
        n_sessions,
        cpu_usage,
        memory_used,
        memory_total,
        memory_free,
    }))
}
