use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use voxend_server::config::ServerConfig;
use voxend_server::session::Server;

#[tokio::main]
async fn main() {
    let config = match ServerConfig::load("voxend.toml") {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load voxend.toml: {e}");
            std::process::exit(1);
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        "voxend server v{} starting on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.server.address,
        config.server.port
    );
    info!(
        "world: {} (seed: {}, load distance: {})",
        config.world.directory, config.world.seed, config.world.load_distance
    );

    let addr: SocketAddr = format!("{}:{}", config.server.address, config.server.port)
        .parse()
        .expect("invalid bind address");
    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let server = Server::new(config);
    server.run(listener, shutdown_rx).await;
    info!("Server shut down.");
}
