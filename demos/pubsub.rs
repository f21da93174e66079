// ABOUTME: Shows registering a push callback alongside ordinary request/reply calls

use resp3_client::{Engine, PoolConfig, Value};
use std::sync::Arc;
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

    engine
        .register_push_callback(
            b"message".to_vec(),
            Arc::new(|value: Value| {
                println!("push received: {value:?}");
            }),
        )
        .await;

    let reply = engine.call(b"SUBSCRIBE", &[b"news"]).await?;
    println!("SUBSCRIBE -> {reply:?}");

    // SUBSCRIBE's connection is released back to the pool once the call
    // returns, like any other call. With a single caller and no concurrent
    // traffic it is the only idle connection, so every later call reacquires
    // it and keeps seeing pushes for the channel subscribed on it.
    loop {
        let reply = engine.call(b"PING", &[]).await?;
        println!("PING -> {reply:?}");
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    }
}
