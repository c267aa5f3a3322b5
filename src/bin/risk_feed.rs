//! Demo feed driving the risk-event client.
//!
//! Connects to a monitoring server (run `test_server` in another terminal)
//! and walks through a short escalation sequence, then prints link stats.

use std::time::Duration;

use clap::Parser;
use log::info;
use tokio::time::sleep;

use risklink::{ClientConfig, RiskEventClient, RiskLevel};

#[derive(Parser)]
#[command(name = "risk_feed")]
#[command(version, about = "Sends a sample risk-event sequence to a monitoring server", long_about = None)]
struct Cli {
    /// Monitoring server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Monitoring server port
    #[arg(long, default_value_t = 5200)]
    port: u16,

    /// Seconds between reconnection attempts
    #[arg(long, default_value_t = 5)]
    reconnect_interval: u64,

    /// Seconds between heartbeats
    #[arg(long, default_value_t = 30)]
    heartbeat_interval: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = ClientConfig {
        host: cli.host,
        port: cli.port,
        reconnect_interval: Duration::from_secs(cli.reconnect_interval),
        heartbeat_interval: Duration::from_secs(cli.heartbeat_interval),
        ..Default::default()
    };
    let client = RiskEventClient::new(config)?;
    client.start().await;

    sleep(Duration::from_secs(2)).await;
    client
        .send_risk_event("BR_CHANGED", RiskLevel::Warning, 150.5, -22.0, 6.8, 148.0)
        .await;

    sleep(Duration::from_secs(2)).await;
    client
        .send_risk_event("BR_CHANGED", RiskLevel::Critical, 50.2, -35.0, 1.4, 193.0)
        .await;

    sleep(Duration::from_secs(2)).await;
    // All clear: flock receding, no closing trajectory.
    client
        .send_risk_event(
            "BR_CHANGED",
            RiskLevel::Normal,
            900.0,
            4.0,
            f64::INFINITY,
            0.0,
        )
        .await;

    let stats = client.stats();
    info!(
        "Link stats: phase={:?} sent={} failures={} reconnections={}",
        stats.phase, stats.messages_sent, stats.send_failures, stats.reconnection_count
    );

    sleep(Duration::from_secs(10)).await;
    client.stop().await;
    Ok(())
}
