//! forumd - real-time presence and direct chat daemon.

use forumd::config::Config;
use forumd::config::validation::validate;
use forumd::{Server, http, metrics};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "Refusing to start with {} configuration error(s). See messages above.",
            errors.len()
        ));
    }

    info!(
        server = %config.server.name,
        listen = %config.listen.address,
        path = %config.listen.path,
        "Starting forumd"
    );

    // Convention: metrics_port = 0 disables the HTTP endpoint.
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port != 0 {
        metrics::init();
        info!("Metrics initialized");
    }

    let mut server = Server::start(&config).await?;
    info!(address = %server.local_addr(), "Accepting connections");

    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        let hub = server.hub().clone();
        tokio::spawn(async move {
            http::run_http_server(metrics_port, hub).await;
        });
        info!(port = metrics_port, "HTTP metrics server started");
    }

    tokio::select! {
        result = server.wait() => {
            if let Err(e) = result {
                error!(error = %e, "Gateway stopped");
                return Err(e);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown requested");
        }
    }

    server.shutdown().await;
    Ok(())
}
