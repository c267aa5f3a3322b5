//! Standalone test sink for risk-event traffic.
//!
//! Listens on the standard monitoring port, prints every message it can
//! parse, and keeps accepting clients until interrupted.

use clap::Parser;
use log::info;

use risklink::TestServer;

#[derive(Parser)]
#[command(name = "test_server")]
#[command(version, about = "Newline-delimited JSON sink for risk-event traffic", long_about = None)]
struct Cli {
    /// Host to bind
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 5200)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let server = TestServer::bind(&cli.host, cli.port).await?;

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }
    Ok(())
}
