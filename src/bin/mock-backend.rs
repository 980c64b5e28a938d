use std::net::SocketAddr;

use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;

#[derive(Parser)]
#[command(name = "mock-backend")]
#[command(about = "Trivial backend for exercising the ring proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value_t = 5001)]
    port: u16,

    /// Answer health checks with 503
    #[arg(long)]
    fail_health: bool,
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let cli = Cli::parse();
    let port = cli.port;
    let health = if cli.fail_health {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let app = Router::new()
        .route("/", get(move || async move { format!("server running on port {}", port) }))
        .route("/health", get(move || async move { health }));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("mock backend listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
