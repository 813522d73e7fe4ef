use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use tvskip::logging::{init_logging, LoggingMode, LOG_MODE_ENV};
use tvskip::{ApiConfig, ConnectionStatus, Coordinator, RegistryChange, StatsSink, TvSkipConfig};

pub mod output;

use output::{describe_device, device_table, ChannelStats, EventFormatter, WatchEvent, WatchStats};

/// tvskip
///
/// Finds cast receivers on the local network, pairs with a TV using the code
/// it shows under "Link with TV code", and skips sponsor segments in
/// whatever it plays.
#[derive(Parser, Debug)]
#[command(name = "tvskip")]
#[command(about = "Discover, pair with and watch cast receivers, skipping sponsor segments")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: CommandKind,

    /// Discovery window in seconds
    #[arg(short = 'w', long, default_value = "8", global = true)]
    pub window: u64,

    /// Skip the cloud pairing chain and use an offline session
    #[arg(long, global = true)]
    pub offline: bool,

    /// Fail instead of falling back to an offline session when pairing is unavailable
    #[arg(long, global = true)]
    pub no_fallback: bool,

    /// Poll receivers every second instead of every few seconds
    #[arg(long, global = true)]
    pub fast: bool,

    /// Base URL of the pairing and session-binding service
    #[arg(long, global = true)]
    pub cloud_url: Option<String>,

    /// Base URL of the skip-segment service
    #[arg(long, global = true)]
    pub segments_url: Option<String>,

    /// Comma-separated segment categories to skip
    #[arg(long, value_delimiter = ',', global = true)]
    pub categories: Vec<String>,

    /// Log mode (silent, development, debug)
    #[arg(long, default_value = "development", global = true)]
    pub log_mode: String,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_colors: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// Scan the local network and list receivers
    Discover {
        /// Print the device list as JSON
        #[arg(long)]
        json: bool,
    },
    /// Pair with a TV code and report the paired device
    Connect {
        /// Code shown on the TV, spaces and dashes allowed
        code: String,
    },
    /// Pair with a TV code and stream playback and skips until Ctrl+C
    Watch {
        /// Code shown on the TV, spaces and dashes allowed
        code: String,
    },
}

/// Configuration derived from command line arguments and environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub command: CommandKind,
    pub window: Duration,
    pub offline: bool,
    pub offline_fallback: bool,
    pub fast_polling: bool,
    pub cloud_url: Option<String>,
    pub segments_url: Option<String>,
    pub categories: Vec<String>,
    pub log_mode: LoggingMode,
    pub use_colors: bool,
}

impl TryFrom<Args> for Config {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self> {
        if args.window == 0 {
            return Err(anyhow::anyhow!("Discovery window must be positive"));
        }
        if args.offline && args.no_fallback {
            return Err(anyhow::anyhow!(
                "--offline and --no-fallback together leave no way to connect"
            ));
        }
        let log_mode = LoggingMode::from_name(&args.log_mode).ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid log mode '{}'. Valid modes: silent, development, debug",
                args.log_mode
            )
        })?;

        Ok(Self {
            command: args.command,
            window: Duration::from_secs(args.window),
            offline: args.offline,
            offline_fallback: !args.no_fallback,
            fast_polling: args.fast,
            cloud_url: args.cloud_url,
            segments_url: args.segments_url,
            categories: args.categories,
            log_mode,
            use_colors: !args.no_colors,
        })
    }
}

impl Config {
    /// Create configuration from command line arguments and environment variables
    pub fn from_env() -> Result<Self> {
        let mut args = Args::parse();

        if let Ok(url) = std::env::var("TVSKIP_CLOUD_URL") {
            args.cloud_url = Some(url);
        }

        if let Ok(url) = std::env::var("TVSKIP_SEGMENTS_URL") {
            args.segments_url = Some(url);
        }

        if let Ok(window) = std::env::var("TVSKIP_DISCOVERY_WINDOW") {
            args.window = window
                .parse()
                .context("Invalid TVSKIP_DISCOVERY_WINDOW environment variable")?;
        }

        if let Ok(mode) = std::env::var(LOG_MODE_ENV) {
            args.log_mode = mode;
        }

        if std::env::var("TVSKIP_NO_COLORS").is_ok() {
            args.no_colors = true;
        }

        Config::try_from(args)
    }

    /// Build the library configuration this run asks for
    pub fn tvskip_config(&self) -> Result<TvSkipConfig> {
        let base = if self.offline {
            TvSkipConfig::offline()
        } else if self.fast_polling {
            TvSkipConfig::fast_polling()
        } else {
            TvSkipConfig::default()
        };

        let mut api = ApiConfig::default();
        if let Some(url) = &self.cloud_url {
            api = api.with_cloud_base_url(url.clone());
        }
        if let Some(url) = &self.segments_url {
            api = api.with_segments_base_url(url.clone());
        }
        if !self.categories.is_empty() {
            api = api.with_segment_categories(self.categories.iter().map(|c| c.trim().to_string()));
        }

        let mut config = base
            .with_api(api)
            .with_discovery_window(self.window)
            .with_offline_fallback(self.offline_fallback);
        if self.offline && self.fast_polling {
            config = config.with_monitor(TvSkipConfig::fast_polling().monitor);
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    pub fn print_summary(&self) {
        info!("Configuration:");
        info!("  Command: {:?}", self.command);
        info!("  Discovery window: {}s", self.window.as_secs());
        info!("  Offline: {}", self.offline);
        info!("  Offline fallback: {}", self.offline_fallback);
        info!("  Fast polling: {}", self.fast_polling);
        if let Some(url) = &self.cloud_url {
            info!("  Cloud URL: {}", url);
        }
        if let Some(url) = &self.segments_url {
            info!("  Segments URL: {}", url);
        }
    }
}

/// A line typed while watching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Skip,
    Mute,
    Unmute,
    Play,
    Pause,
    Quit,
}

impl FromStr for Control {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "skip" => Ok(Control::Skip),
            "m" | "mute" => Ok(Control::Mute),
            "u" | "unmute" => Ok(Control::Unmute),
            "p" | "play" => Ok(Control::Play),
            "pause" => Ok(Control::Pause),
            "q" | "quit" | "exit" => Ok(Control::Quit),
            other => Err(anyhow::anyhow!("Unknown command '{}'", other)),
        }
    }
}

async fn run_discover(coordinator: &Coordinator, json: bool) -> Result<()> {
    let mut status = coordinator.subscribe_status();
    let mut changes = coordinator.registry().subscribe();

    coordinator.start_discovery().context("Failed to start discovery")?;
    info!(
        "Scanning for receivers for up to {}s...",
        coordinator.config().discovery.window.as_secs()
    );

    loop {
        tokio::select! {
            ended = status.wait_for(|s| *s != ConnectionStatus::Scanning) => {
                ended.context("Status channel closed")?;
                break;
            }
            change = changes.recv() => match change {
                Ok(RegistryChange::Upserted(device)) => info!("Found {}", describe_device(&device)),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                coordinator.stop_discovery();
                break;
            }
        }
    }

    let devices = coordinator.registry().list();
    if json {
        println!("{}", serde_json::to_string_pretty(&devices).context("Failed to encode devices")?);
    } else {
        println!("\n{}", device_table(&devices));
    }
    Ok(())
}

async fn run_connect(coordinator: &Coordinator, code: &str) -> Result<()> {
    let device = coordinator.connect(code).await.context("Pairing failed")?;

    println!("Connected to {}", describe_device(&device));
    println!("Status: {}", coordinator.status());
    coordinator.shutdown();
    Ok(())
}

async fn run_watch(config: TvSkipConfig, code: &str, formatter: EventFormatter) -> Result<()> {
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let stats_sink = Arc::new(ChannelStats::new(events_tx));
    let coordinator = Coordinator::builder()
        .config(config)
        .stats_sink(stats_sink.clone() as Arc<dyn StatsSink>)
        .build()
        .context("Failed to build coordinator")?;

    let mut status = coordinator.subscribe_status();
    let mut playback = coordinator.subscribe_playback();
    let mut changes = coordinator.registry().subscribe();
    let mut stats = WatchStats::default();

    let device = coordinator.connect(code).await.context("Pairing failed")?;
    println!("Connected to {}", describe_device(&device));
    println!("Commands: skip, mute, unmute, play, pause, quit (Ctrl+C also quits)");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        let event = tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                WatchEvent::Status(status.borrow_and_update().clone())
            }
            changed = playback.changed() => {
                if changed.is_err() {
                    break;
                }
                WatchEvent::Playback(playback.borrow_and_update().clone())
            }
            change = changes.recv() => match change {
                Ok(change) => WatchEvent::Registry(change),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Missed {} registry change(s)", missed);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(event) = events.recv() => event,
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match line.parse::<Control>() {
                        Ok(Control::Quit) => break,
                        Ok(control) => apply_control(&coordinator, control).await,
                        Err(e) => println!("{}", e),
                    },
                    Ok(None) | Err(_) => stdin_open = false,
                }
                continue;
            }
            _ = tokio::signal::ctrl_c() => break,
        };

        stats.update(&event);
        println!("{}", formatter.format_event(&event));
    }

    info!("Stopping...");
    coordinator.shutdown();
    stats_sink.close();
    while let Ok(event) = events.try_recv() {
        stats.update(&event);
        println!("{}", formatter.format_event(&event));
    }

    println!("\n=== Session Summary ===");
    println!("{}", stats.summary());
    Ok(())
}

async fn apply_control(coordinator: &Coordinator, control: Control) {
    let sent = match control {
        Control::Skip => {
            match coordinator.skip().await {
                Ok(Some(segment)) => println!("Skipped {} to {:.0}s", segment.category, segment.end),
                Ok(None) => println!("Nothing to skip"),
                Err(e) => println!("Skip failed: {}", e),
            }
            return;
        }
        Control::Mute => coordinator.mute(),
        Control::Unmute => coordinator.unmute(),
        Control::Play => coordinator.play(),
        Control::Pause => coordinator.pause(),
        Control::Quit => return,
    };
    println!("{:?} sent to {} device(s)", control, sent);
}

async fn run(config: Config) -> Result<()> {
    let tvskip_config = config.tvskip_config()?;
    let formatter = EventFormatter::new(config.use_colors);

    match &config.command {
        CommandKind::Discover { json } => {
            let coordinator = Coordinator::new(tvskip_config).context("Failed to build coordinator")?;
            run_discover(&coordinator, *json).await
        }
        CommandKind::Connect { code } => {
            let coordinator = Coordinator::new(tvskip_config).context("Failed to build coordinator")?;
            run_connect(&coordinator, code).await
        }
        CommandKind::Watch { code } => run_watch(tvskip_config, code, formatter).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to parse configuration")?;

    init_logging(config.log_mode).context("Failed to initialize logging")?;
    config.print_summary();

    if let Err(e) = run(config).await {
        error!("tvskip failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
