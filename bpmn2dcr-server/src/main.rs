use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod routes;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let addr = bind_addr();

    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("bpmn2dcr-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Parse bind address from `--bind-addr <addr>` CLI arg or `BIND_ADDR`
/// env var, falling back to a fixed default.
fn bind_addr() -> SocketAddr {
    let args: Vec<String> = std::env::args().collect();
    let from_flag = args
        .windows(2)
        .find(|w| w[0] == "--bind-addr")
        .map(|w| w[1].clone());

    from_flag
        .or_else(|| std::env::var("BIND_ADDR").ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| "0.0.0.0:8000".parse().expect("valid default address"))
}
