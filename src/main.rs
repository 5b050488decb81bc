use std::path::PathBuf;

use clap::Parser;

use netsentry::config::{Config, Thresholds};

/// Attribute network traffic to processes and flag CPU/RAM threshold breaches.
#[derive(Parser, Debug)]
#[command(name = "netsentry", version, about)]
struct Cli {
    /// CPU utilization threshold in percent (per logical core)
    #[arg(long, value_name = "PERCENT")]
    cpu_threshold: f64,

    /// RAM usage threshold in megabytes
    #[arg(long, value_name = "MB")]
    ram_threshold: f64,

    /// Network interface to capture on (default: first up non-loopback)
    #[arg(short, long, value_name = "NAME")]
    interface: Option<String>,

    /// Path of the append-only threshold log
    #[arg(long, value_name = "FILE", default_value = "log.txt")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // clap rejects non-numeric thresholds here, before any loop starts.
    let cli = Cli::parse();

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC in netsentry: {info}");
        default_hook(info);
    }));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netsentry=info".into()),
        )
        .init();

    let config = Config {
        thresholds: Thresholds {
            cpu_percent: cli.cpu_threshold,
            ram_mb: cli.ram_threshold,
        },
        interface: cli.interface,
        log_file: cli.log_file,
    };

    netsentry::run(config).await
}
