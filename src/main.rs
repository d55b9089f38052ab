use aq_feed::app::ports::UpstreamPort;
use aq_feed::config::Config;
use aq_feed::constants::STREAM_BUFFER;
use aq_feed::infra::OpenAqHttp;
use aq_feed::server::{start_server, AppState, LocationParams};
use aq_feed::stream::StreamDeliveryLoop;
use aq_feed::{logging, metrics};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "aq_feed")]
#[command(about = "Air-quality feature feed backed by OpenAQ")]
#[command(version)]
struct Cli {
    /// TOML config file; environment variables still override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service (snapshot, stream, health, metrics)
    Serve {
        /// Port to listen on (defaults to AQ_FEED_PORT or 3000)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Fetch one snapshot and print it as JSON
    Fetch {
        #[command(flatten)]
        location: LocationArgs,
        /// Skip the sensor location lookup
        #[arg(long)]
        no_sensors: bool,
    },
    /// Print stream events to stdout until Ctrl-C
    Stream {
        #[command(flatten)]
        location: LocationArgs,
        /// Poll interval in milliseconds (defaults to POLL_INTERVAL or 300000)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        poll_interval_ms: Option<u64>,
    },
}

#[derive(Args)]
struct LocationArgs {
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    country: Option<String>,
}

impl From<LocationArgs> for LocationParams {
    fn from(args: LocationArgs) -> Self {
        LocationParams {
            lat: args.lat.map(|v| v.to_string()),
            lon: args.lon.map(|v| v.to_string()),
            city: args.city,
            country: args.country,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = logging::init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_file(path)?,
        None => Config::from_env()?,
    };
    if config.api_key.is_none() {
        info!("OPENAQ_API_KEY is not set; requests will be sent without a key");
    }

    let upstream: Arc<dyn UpstreamPort> = Arc::new(OpenAqHttp::from_config(&config)?);

    match cli.command {
        Commands::Serve { port } => {
            metrics::init_metrics();
            let port = port.unwrap_or(config.port);
            start_server(AppState::new(config, upstream), port).await?;
        }
        Commands::Fetch { location, no_sensors } => {
            let state = AppState::new(config, upstream);
            let mut pipeline = state.pipeline_for(&location.into())?;
            let body = if no_sensors {
                serde_json::to_string_pretty(&pipeline.fetch_snapshot().await?)?
            } else {
                serde_json::to_string_pretty(&pipeline.fetch_snapshot_with_sensors().await?)?
            };
            println!("{}", body);
        }
        Commands::Stream {
            location,
            poll_interval_ms,
        } => {
            let poll_interval = poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.poll_interval());
            let state = AppState::new(config, upstream);
            let pipeline = state.pipeline_for(&location.into())?;

            let delivery = StreamDeliveryLoop::new(pipeline, poll_interval)?;
            let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);
            let handle = delivery.spawn(tx);

            let mut stdout = std::io::stdout();
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Interrupted, closing stream");
                        break;
                    }
                    event = rx.recv() => match event {
                        Some(event) => {
                            if let Err(e) = stdout.write_all(event.to_sse_frame().as_bytes()).and_then(|_| stdout.flush()) {
                                error!("Failed to write event: {}", e);
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            handle.close();
            drop(rx);
            handle.join().await;
        }
    }

    Ok(())
}
