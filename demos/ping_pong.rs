// ABOUTME: Minimal example showing a single request/reply call through the engine

use resp3_client::{Engine, PoolConfig};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let host = std::env::var("RESP3_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("RESP3_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(6379);

    let engine = Engine::new(PoolConfig::new(host, port));
    let reply = engine.call(b"PING", &[]).await?;
    println!("PING -> {reply:?}");

    Ok(())
}
