use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biblioteca_xonler::{
    config,
    db::{schema::init_schema, Database},
    middleware::rate_limit::spawn_cleanup,
    routes,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging (stdout + tägliche Datei-Rotation unter ./logs)
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "biblioteca-xonler.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info,sqlx=warn".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Guards am Leben halten, damit die Non-Blocking Writer beim Beenden flushen
    let _log_guards = (stdout_guard, file_guard);

    // Embedded defaults -> biblioteca.toml -> XONLER_CONFIG -> XONLER__* -> DB_*/NODE_ENV/PORT
    let app_cfg = match config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };
    let env = app_cfg.environment();
    info!(environment = env.as_str(), "Configuration loaded");

    // Single process-wide pool; TLS material is mandatory in production
    let db = match Database::connect(&app_cfg.database, env).await {
        Ok(db) => db,
        Err(e) => {
            error!("Database pool could not be created: {}", e);
            std::process::exit(1);
        }
    };
    if !db.test_connection().await {
        error!("Database is not reachable at {}:{}", app_cfg.database.host, app_cfg.database.port);
        db.close().await;
        std::process::exit(1);
    }

    if app_cfg.database.auto_migrate {
        init_schema(&db).await?;
    }
    if routes::auth::bootstrap_admin(&db, &app_cfg.auth).await? {
        info!("Initial admin account created");
    }

    let cleanup_every = app_cfg.rate_limit.cleanup_interval_secs;
    let addr: SocketAddr = format!("{}:{}", app_cfg.server.host, app_cfg.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", app_cfg.server.host, app_cfg.server.port, e))?;

    let state = AppState::new(Arc::new(db.clone()), app_cfg);
    let cleanup = spawn_cleanup(&state, cleanup_every);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Biblioteca Xonler listening on http://{}", listener.local_addr()?);
    let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    cleanup.abort();
    db.close().await;
    served?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
