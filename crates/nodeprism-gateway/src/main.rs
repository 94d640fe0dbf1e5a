//! nodeprism gateway
//!
//! - Metrics endpoint with per-request `collect[]` / `exclude[]` filtering
//! - Landing page at `/`
//! - IP allow-list on every route; denied clients see a dropped connection

use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use nodeprism_gateway::{app_state, config, router, transport};

const DEFAULT_CONFIG_PATH: &str = "nodeprism.yaml";

fn main() -> ExitCode {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // Config (strict parsing + validate)
    let cfg = match config::load_from_file(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("nodeprism-gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log.level));
    fmt().with_env_filter(filter).init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path,
        "Starting nodeprism-gateway"
    );

    let worker_threads = cfg.runtime.worker_threads;
    tracing::debug!(worker_threads, "Tokio worker threads");
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(err = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(cfg))
}

async fn run(cfg: config::ExporterConfig) -> ExitCode {
    if running_as_root() {
        tracing::warn!("nodeprism is running as root user. This exporter is designed to run as unprivileged user, root is not required.");
    }

    let listen = match cfg.web.listen_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(err = %e, "invalid listen address");
            return ExitCode::FAILURE;
        }
    };
    let telemetry_path = cfg.web.telemetry_path.clone();

    // Everything the handlers read is built here, before the first accept.
    let state = match app_state::AppState::new(cfg) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(err = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };
    let app = router::build_router(state);

    let listener = match tokio::net::TcpListener::bind(listen).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%listen, err = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%listen, path = %telemetry_path, "Listening");

    if let Err(e) = transport::serve(listener, app, shutdown_signal()).await {
        tracing::error!(err = %e, "server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(target_os = "linux")]
fn running_as_root() -> bool {
    use std::os::unix::fs::MetadataExt;
    // /proc/self is owned by the effective uid of the process.
    std::fs::metadata("/proc/self")
        .map(|m| m.uid() == 0)
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn running_as_root() -> bool {
    false
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(err = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!(err = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
