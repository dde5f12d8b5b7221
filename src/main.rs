use std::{error::Error, net::SocketAddr};

use axum::Router;
use dotenv::dotenv;
use image_uploader::{build_router, ReceiverConfig};
use tokio::fs;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn run(app: Router, port: u16) -> Result<(), Box<dyn Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let server = axum::Server::try_bind(&addr)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to listen for shutdown signal");
            }
        });

    info!("Server listening on port {}", port);
    server.await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    drop(dotenv());

    let config = ReceiverConfig::from_env()?;
    init_tracing(config.log_json);

    fs::create_dir_all(&config.uploads_dir).await?;

    let port = config.port;
    run(build_router(config), port).await?;
    Ok(())
}
