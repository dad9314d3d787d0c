//! SpotAlert CLI
//!
//! Checks the EC2 spot price of one resource and alerts above a threshold.

use anyhow::Context;
use clap::Parser;
use rust_decimal::Decimal;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use spotalert::app;
use spotalert::config::{Channel, LoggingConfig};
use spotalert::monitor::PollLoop;
use spotalert::Config;

/// Exit status when startup settings or credentials are unusable
const EXIT_CONFIGURATION: u8 = 2;

/// Exit status for any other startup failure
const EXIT_FAILURE: u8 = 1;

/// SpotAlert - EC2 spot price alerts
#[derive(Parser)]
#[command(name = "spotalert")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (toml, yaml or json)
    #[arg(short, long, env = "SPOTALERT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Send an alert when the price exceeds the threshold
    #[arg(short = 'a', long = "alert", visible_alias = "sms", short_alias = 's', env = "SPOTALERT_ALERT")]
    alert: bool,

    /// Alert threshold price (default $2.80)
    #[arg(short, long, env = "SPOTALERT_THRESHOLD")]
    threshold: Option<Decimal>,

    /// Keep polling until interrupted
    #[arg(short = 'l', long = "loop", env = "SPOTALERT_LOOP")]
    looping: bool,

    /// Seconds between polls (default 300, minimum 60)
    #[arg(short = 'd', long = "delay", visible_alias = "poll-interval", env = "SPOTALERT_POLL_INTERVAL")]
    delay: Option<f64>,

    /// EC2 instance type
    #[arg(long)]
    instance_type: Option<String>,

    /// Availability zone
    #[arg(long)]
    availability_zone: Option<String>,

    /// Product description (e.g. "Linux/UNIX", "Windows")
    #[arg(long)]
    product_description: Option<String>,

    /// EC2 region (derived from the availability zone when omitted)
    #[arg(long)]
    region: Option<String>,

    /// Shared credentials profile
    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// Notification channel
    #[arg(long, value_enum)]
    channel: Option<ChannelArg>,

    /// Webhook URL for the webhook channel
    #[arg(long)]
    webhook_url: Option<String>,

    /// Twilio credentials file
    #[arg(long)]
    twilio_config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ChannelArg {
    Sms,
    Webhook,
}

impl From<ChannelArg> for Channel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Sms => Channel::Sms,
            ChannelArg::Webhook => Channel::Webhook,
        }
    }
}

impl Cli {
    /// Flags win over file and environment settings
    fn apply(self, config: &mut Config) {
        if self.alert {
            config.monitor.alert_enabled = true;
        }
        if self.looping {
            config.monitor.loop_enabled = true;
        }
        if let Some(threshold) = self.threshold {
            config.monitor.threshold = threshold;
        }
        if let Some(delay) = self.delay {
            config.monitor.poll_interval_secs = delay;
        }
        if let Some(instance_type) = self.instance_type {
            config.resource.instance_type = instance_type;
        }
        if let Some(zone) = self.availability_zone {
            config.resource.availability_zone = zone;
        }
        if let Some(product) = self.product_description {
            config.resource.product_description = product;
        }
        if self.region.is_some() {
            config.resource.region = self.region;
        }
        if self.profile.is_some() {
            config.resource.profile = self.profile;
        }
        if let Some(channel) = self.channel {
            config.notify.channel = channel.into();
        }
        if self.webhook_url.is_some() {
            config.notify.webhook_url = self.webhook_url;
        }
        if self.twilio_config.is_some() {
            config.notify.twilio_config = self.twilio_config;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();
    let verbose = cli.verbose;

    // Load configuration
    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::from(EXIT_CONFIGURATION);
        }
    };
    cli.apply(&mut config);

    init_logging(&config.logging, verbose);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "SpotAlert failed to start");
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Map a startup failure to the process exit status
fn exit_status(err: &anyhow::Error) -> u8 {
    let is_configuration = err
        .downcast_ref::<spotalert::Error>()
        .is_some_and(spotalert::Error::is_configuration);
    if is_configuration {
        EXIT_CONFIGURATION
    } else {
        EXIT_FAILURE
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let settings = config.poll_settings().context("invalid monitor settings")?;
    let sink = app::build_alert_sink(&config).context("notification channel unusable")?;
    let source = app::build_price_source(&config).context("price source unusable")?;

    for line in app::startup_banner(&settings, sink.as_deref()) {
        println!("{line}");
    }

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let mut poll_loop = PollLoop::new(settings, source, sink)?;
    poll_loop.run(&shutdown).await;

    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Interrupt received, shutting down");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                if terminate.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM, falling back to Ctrl+C only");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = signalled(tokio::signal::ctrl_c()) => {}
        () = terminate => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    signalled(tokio::signal::ctrl_c()).await;
}

/// Resolve when the signal arrives; never resolve if the handler could not be installed
async fn signalled(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        warn!(error = %e, "Cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
