//! LocalWeb server binary.
//!
//! Shares one directory over HTTP and HTTPS behind a single Basic credential.
//! The main entry point builds the Axum router, loads TLS material, and starts
//! the plaintext and secure listeners.

mod app;
mod atomic;
mod auth;
mod config;
mod error;
mod files;
mod frontend;
mod http;
mod logging;
mod storage;
mod tls;
mod tree;
mod upload;

use axum_server::Handle;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use crate::auth::AuthConfig;
use crate::config::Args;
use crate::http::AccessLog;
use crate::storage::Storage;

/// Starts the LocalWeb server and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let storage = Arc::new(
        Storage::new(PathBuf::from(&args.dir)).with_max_tree_depth(args.max_tree_depth),
    );
    storage.ensure_root().await?;
    let auth_config = Arc::new(AuthConfig::new(args.user.clone(), args.password.clone()));
    let access_log = Arc::new(match args.access_log.as_deref() {
        Some(path) => AccessLog::open(Path::new(path)).await?,
        None => AccessLog::disabled(),
    });
    info!(root = %storage.root_path().display(), "sharing directory");

    let app = app::build_router(storage, auth_config, access_log);

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let http_addr = SocketAddr::new(host, args.http_port);
    let handle = Handle::new();

    info!("Starting HTTP server at {}", http_addr);
    let http_server = axum_server::bind(http_addr)
        .handle(handle.clone())
        .serve(app.clone().into_make_service_with_connect_info::<SocketAddr>());

    if args.no_tls {
        tokio::select! {
            result = http_server => result?,
            _ = shutdown_signal(handle) => {}
        }
        return Ok(());
    }

    let https_addr = SocketAddr::new(host, args.https_port);
    let tls_config = tls::build_rustls_config(&args, host).await?;
    info!("Starting HTTPS server at {}", https_addr);
    let https_server = axum_server::bind_rustls(https_addr, tls_config)
        .handle(handle.clone())
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());

    tokio::select! {
        result = http_server => result?,
        result = https_server => result?,
        _ = shutdown_signal(handle) => {}
    }

    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
