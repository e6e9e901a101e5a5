//! Mock backend for exercising the gateway's circuit breakers by hand.
//!
//! `GET /test` fails with a 500 at the configured rate.

use std::net::SocketAddr;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use clap::Parser;
use rand::Rng;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "mock-backend")]
#[command(about = "Test backend with random failures", long_about = None)]
struct Cli {
    #[arg(short, long, default_value_t = 8001)]
    port: u16,

    /// Probability in [0, 1] that `GET /test` returns 500.
    #[arg(short, long, default_value_t = 0.2)]
    failure_rate: f64,
}

async fn get_test(State(failure_rate): State<f64>) -> (StatusCode, Json<Value>) {
    if rand::thread_rng().gen_bool(failure_rate) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "Simulated backend failure" })),
        )
    } else {
        (StatusCode::OK, Json(json!({ "message": "Backend response" })))
    }
}

async fn post_test() -> Json<Value> {
    Json(json!({ "message": "Backend POST response" }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if !(0.0..=1.0).contains(&cli.failure_rate) {
        return Err(format!("failure rate {} is outside [0, 1]", cli.failure_rate).into());
    }

    tracing_subscriber::fmt().with_env_filter("mock_backend=info").init();

    let app = Router::new()
        .route("/test", get(get_test).post(post_test))
        .route("/health", get(|| async { "ok" }))
        .with_state(cli.failure_rate);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, failure_rate = cli.failure_rate, "Mock backend listening");

    axum::serve(listener, app).await?;
    Ok(())
}
