//! `report2pdf-server`: HTTP front door for the report export pipeline.
//!
//! Configuration is read once at startup from the environment and an
//! optional `app.env` file; see [`report2pdf_api::config::env`].

use tokio::signal;

use report2pdf_api::config::env::bind_address_from_env;
use report2pdf_api::integrations::axum::{EXPORT_PATH, HEALTH_PATH, router};

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("❌ Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("❌ Failed to install SIGTERM handler: {}", e);
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

    log::info!("Shutdown signal received, draining in-flight exports...");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let exporter = report2pdf_api::init_exporter()?;
    let app = router(exporter);

    let addr = bind_address_from_env();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("🚀 report2pdf-server listening on http://{}", addr);
    log::info!("   - Export: GET {}?attemptId=<id>&lang=en|ar", EXPORT_PATH);
    log::info!("   - Health: GET {}", HEALTH_PATH);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped");
    Ok(())
}
