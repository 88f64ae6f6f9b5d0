//! Ping a Neural Unit.
//!
//! ```text
//! RUST_LOG=neural_link=debug cargo run --example ping -- link.json [count]
//! ```
//!
//! `link.json` is a [`SessionConfig`] with at least `port` and `request_timeout_ms`.

use neural_link::{NeuralUnit, SessionConfig};

#[tokio::main]
async fn main() -> neural_link::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "link.json".to_string());
    let count: u32 = args.next().and_then(|n| n.parse().ok()).unwrap_or(4);

    let config = SessionConfig::from_json_file(&config_path)?;
    tracing::info!(port = ?config.port, baud = config.baud_rate, "connecting");

    let unit = NeuralUnit::connect(&config)?;
    for seq in 1..=count {
        match unit.ping().await {
            Ok(latency) => println!("pong seq={} time={:?}", seq, latency),
            Err(e) => println!("no pong seq={}: {}", seq, e),
        }
    }

    println!("trust: {:.3}", unit.get_trust().await?);
    unit.close().await
}
