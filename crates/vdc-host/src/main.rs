//! vDC host server binary.
//!
//! # Usage
//!
//! ```bash
//! vdc-host \
//!     --dsuid 198C6F8CE1D511E78D1C7C669D5A4F48B0 \
//!     --vdc-dsuid 198C6F8CE1D511E78D1C7C669D5A4F48B1 \
//!     --port 8444
//! ```

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use vdc_host::{DEFAULT_PORT, HostConfig, VdcHost};
use vdc_proto::Dsuid;

/// digitalSTROM vDC host server
#[derive(Parser, Debug)]
#[command(name = "vdc-host")]
#[command(about = "digitalSTROM vDC host server")]
#[command(version)]
struct Args {
    /// dSUID of the vDC host (34 hex characters)
    #[arg(long)]
    dsuid: Dsuid,

    /// dSUID of the vDC (34 hex characters)
    #[arg(long)]
    vdc_dsuid: Dsuid,

    /// TCP port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = HostConfig::new(args.dsuid, args.vdc_dsuid).with_port(args.port);
    let host = VdcHost::bind(config).await?;

    tracing::info!("vDC host listening on {}", host.local_addr()?);

    host.run().await?;

    Ok(())
}
