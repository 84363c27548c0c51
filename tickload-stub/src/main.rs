use axum::http::StatusCode;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tickload_stub::config::{DEFAULT_DELAY, DEFAULT_STATUS};
use tickload_stub::{Server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tickload-stub", about = "Local stand-in for the ticket endpoint")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,

    /// HTTP status returned for every ticket.
    #[arg(long, default_value_t = DEFAULT_STATUS.as_u16())]
    status: u16,

    /// Delay before each response (milliseconds).
    #[arg(long, default_value_t = DEFAULT_DELAY.as_millis() as u64)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = ServerConfig {
        address: args.listen,
        status: StatusCode::from_u16(args.status)?,
        delay: Duration::from_millis(args.delay_ms),
    };

    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

    // Print "Listening on <addr>" once the server signals it is bound.
    tokio::spawn(async move {
        if let Ok(addr) = ready_rx.await {
            println!("Listening on {}", addr);
        }
    });

    Server::new(config).run(ready_tx).await?;
    Ok(())
}
