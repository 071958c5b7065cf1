use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pulsewatch::config::CoreConfig;
use pulsewatch::data::duration::parse_duration;
use pulsewatch::data::{export, FilterSpec};
use pulsewatch::gateway::TcpGateway;
use pulsewatch::session::ProbeSession;
use pulsewatch::SessionEvent;

#[derive(Parser, Debug)]
#[command(name = "pulsewatch")]
#[command(about = "Monitor a heart-rate/SpO2 probe through a realtime data store")]
struct Args {
    /// Store bridge endpoint (host:port)
    #[arg(short, long)]
    connect: String,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Heartbeat liveness window override (e.g. "6s")
    #[arg(long)]
    liveness_window: Option<String>,

    /// Connectivity recheck period override (e.g. "10s")
    #[arg(long)]
    recheck: Option<String>,

    /// Request a measurement once the probe is ready
    #[arg(long)]
    start: bool,

    /// Export filtered history as CSV into this directory and exit
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// History filter: today, yesterday, week, all
    #[arg(long, default_value = "all")]
    filter: String,

    /// Custom filter range start (epoch milliseconds, overrides --filter)
    #[arg(long, requires = "to_millis")]
    from_millis: Option<i64>,

    /// Custom filter range end, inclusive (epoch milliseconds)
    #[arg(long, requires = "from_millis")]
    to_millis: Option<i64>,
}

fn parse_filter(args: &Args) -> Result<FilterSpec> {
    if let (Some(start), Some(end)) = (args.from_millis, args.to_millis) {
        return Ok(FilterSpec::Custom {
            start_millis: start,
            end_millis: end,
        });
    }
    match args.filter.as_str() {
        "today" => Ok(FilterSpec::Today),
        "yesterday" => Ok(FilterSpec::Yesterday),
        "week" => Ok(FilterSpec::Last7Days),
        "all" => Ok(FilterSpec::All),
        other => Err(anyhow!("unknown filter: {}", other)),
    }
}

fn load_config(args: &Args) -> Result<CoreConfig> {
    let mut config = match &args.config {
        Some(path) => CoreConfig::from_file(path)?,
        None => CoreConfig::default(),
    };
    if let Some(ref s) = args.liveness_window {
        config.timing.liveness_window = parse_duration(s).context("--liveness-window")?;
    }
    if let Some(ref s) = args.recheck {
        config.timing.recheck_period = parse_duration(s).context("--recheck")?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let filter = parse_filter(&args)?;
    let config = load_config(&args)?;

    let gateway = Arc::new(TcpGateway::connect(args.connect.as_str()).await?);
    let session = ProbeSession::start(gateway, config).await?;

    if let Some(dir) = args.export {
        return export_history(&session, &filter, &dir).await;
    }

    if args.start {
        let mut connectivity = session.connectivity();
        info!("waiting for the probe to come online");
        connectivity
            .wait_for(|s| s.all_connected())
            .await
            .map_err(|_| anyhow!("session ended before the probe came online"))?;
        session.request_start().await?;
    }

    let mut events = session.events();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(e) => {
                    error!("event stream ended: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    session.shutdown();
    Ok(())
}

async fn export_history(
    session: &ProbeSession,
    filter: &FilterSpec,
    dir: &std::path::Path,
) -> Result<()> {
    let readings = session.filtered_history(filter).await?;
    let path = export::export_to_dir(&readings, dir)?;
    info!("exported {} readings to {}", readings.len(), path.display());
    Ok(())
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::ConnectivityChanged {
            store,
            sensor,
            device,
        } => {
            println!("connectivity: store={} sensor={} device={}", store, sensor, device);
        }
        SessionEvent::MeasurementStarted => println!("measurement started"),
        SessionEvent::MeasurementProgress {
            percent,
            seconds_remaining,
        } => {
            println!(
                "progress: {}% ({}s remaining)",
                percent,
                (*seconds_remaining).max(0)
            );
        }
        SessionEvent::MeasurementCompleted { heart_rate, spo2 } => {
            println!("completed: HR={} bpm, SpO2={}%", heart_rate, spo2);
        }
        SessionEvent::MeasurementStopped => println!("measurement stopped"),
        SessionEvent::MeasurementError { reason } => {
            println!("measurement failed: {}", reason.message());
        }
        SessionEvent::HistoryUpdated(readings) => {
            println!("history: {} readings", readings.len());
        }
        SessionEvent::LatestReading(reading) => {
            let band = reading.health_status();
            println!(
                "latest: HR={} bpm, SpO2={}% [{}]",
                reading.heart_rate,
                reading.spo2,
                band.symbol()
            );
        }
    }
}
