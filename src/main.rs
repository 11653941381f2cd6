use axum_server::{tls_rustls::RustlsConfig, Handle};
use jotter::config::Config;
use jotter::routes::create_routes;
use jotter::services::fs_watcher::watch_dir;
use jotter::state::AppState;
use std::net::SocketAddr;
use std::panic;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "jotter=debug,tower_http=debug,axum::rejection=trace,info".into()
        }))
        .init();

    info!("Starting server...");

    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });
    let grace = config.shutdown_grace();

    let (state, observer) = match AppState::new(config).await {
        Ok(parts) => parts,
        Err(e) => {
            error!("Failed to open jot directory: {}", e);
            std::process::exit(1);
        }
    };
    let config = state.config.clone();
    let shutdown = state.shutdown.clone();
    info!("Storing jots in {}", state.store.dir().display());

    let observer_task = tokio::spawn(observer.run(shutdown.clone()));

    // Held for the lifetime of the server
    let _watcher = if config.watch {
        match watch_dir(state.store.dir(), state.changes.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                error!("Failed to watch jot directory: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        warn!("Directory watch disabled, external edits will not be pushed");
        None
    };

    let app = create_routes(state);
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let mut server = if let (Some(cert), Some(key)) = (&config.cert_file, &config.key_file) {
        let tls = match RustlsConfig::from_pem_file(cert, key).await {
            Ok(tls) => tls,
            Err(e) => {
                error!("Failed to load TLS certificate or key: {}", e);
                std::process::exit(1);
            }
        };
        let addr: SocketAddr = match config.server_address().parse() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Invalid listen address {}: {}", config.server_address(), e);
                std::process::exit(1);
            }
        };

        let handle = Handle::new();
        let shutdown_handle = handle.clone();
        let token = shutdown.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            shutdown_handle.graceful_shutdown(Some(grace));
        });

        info!("🚀 Server running on https://{}", addr);
        tokio::spawn(async move {
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        })
    } else {
        let listener = match tokio::net::TcpListener::bind(config.server_address()).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind to {}: {}", config.server_address(), e);
                std::process::exit(1);
            }
        };

        info!("🚀 Server running on http://{}", config.server_address());
        let token = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
        })
    };
    info!("Share link base: {}", config.base_url());

    tokio::select! {
        res = &mut server => {
            shutdown.cancel();
            let _ = observer_task.await;
            match res {
                Ok(Ok(())) => info!("Server stopped"),
                Ok(Err(e)) => {
                    error!("Server error: {}", e);
                    std::process::exit(1);
                }
                Err(e) => {
                    error!("Server task failed: {}", e);
                    std::process::exit(1);
                }
            }
            return;
        }
        _ = shutdown.cancelled() => {}
    }

    info!("Shutting down, waiting up to {:?} for connections to close", grace);
    if tokio::time::timeout(grace, &mut server).await.is_err() {
        warn!("Connections still open after grace period, closing them");
        server.abort();
    }
    let _ = observer_task.await;
    info!("Shutdown complete");
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
    shutdown.cancel();
}
