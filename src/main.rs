//! # Wavecast: staged outbound messaging campaigns
//!
//! Usage:
//!   wavecast                            # One run with the configured gates
//!   wavecast --hot-send --hot-update    # Deliver and record progression
//!   wavecast preview --canary +49151…   # Render without sending or recording
//!   wavecast config                     # Print the effective config (secrets masked)

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use wavecast_campaign::{CampaignEngine, ComposerSettings, ContentComposer, EngineSettings, RunReport};
use wavecast_channels::Dispatcher;
use wavecast_core::WavecastConfig;
use wavecast_core::traits::Provider;
use wavecast_sheets::SheetStore;

#[derive(Parser)]
#[command(name = "wavecast", version, about = "🌊 Wavecast — staged SMS/Signal campaign runner")]
struct Cli {
    /// Config file (default: ~/.wavecast/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the campaign passes (default)
    Run,
    /// Select and render only; nothing is sent or recorded
    Preview,
    /// Print the effective configuration
    Config,
}

/// Flags that win over file and environment settings.
#[derive(Args)]
struct Overrides {
    /// Deliver messages
    #[arg(long, global = true)]
    hot_send: bool,

    /// Record progression and append the dispatch log
    #[arg(long, global = true)]
    hot_update: bool,

    /// Number of passes
    #[arg(long, global = true)]
    loops: Option<u32>,

    /// Seconds between passes
    #[arg(long, global = true)]
    wait_secs: Option<u64>,

    /// Recipients processed concurrently
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Only this recipient number
    #[arg(long, global = true)]
    canary: Option<String>,

    /// Cap on recipients per pass
    #[arg(long, global = true)]
    max_recipients: Option<usize>,

    /// Ignore catalog entries beyond this wave
    #[arg(long, global = true)]
    max_wave: Option<u32>,
}

impl Overrides {
    fn apply(&self, config: &mut WavecastConfig) {
        let c = &mut config.campaign;
        c.hot_send |= self.hot_send;
        c.hot_update |= self.hot_update;
        if let Some(loops) = self.loops {
            c.loops = loops;
        }
        if let Some(wait) = self.wait_secs {
            c.wait_secs = wait;
        }
        if let Some(n) = self.concurrency {
            c.concurrency = n;
        }
        if let Some(canary) = &self.canary {
            c.canary = Some(canary.clone());
        }
        if let Some(cap) = self.max_recipients {
            c.max_recipients = Some(cap);
        }
        if let Some(wave) = self.max_wave {
            c.max_wave = Some(wave);
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose {
        "wavecast=debug,wavecast_campaign=debug,wavecast_channels=debug,wavecast_sheets=debug,wavecast_providers=debug"
    } else {
        "wavecast=info,wavecast_campaign=info,wavecast_channels=info,wavecast_sheets=info,wavecast_providers=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }
}

/// File (or defaults) → environment → command line.
fn load_config(cli: &Cli) -> Result<WavecastConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = WavecastConfig::expand_path(path);
            WavecastConfig::load_from(&path).with_context(|| format!("loading {}", path.display()))?
        }
        None => WavecastConfig::load()
            .with_context(|| format!("loading {}", WavecastConfig::default_path().display()))?,
    };
    config.apply_env_overrides();
    cli.overrides.apply(&mut config);
    Ok(config)
}

async fn run_campaign(config: &WavecastConfig) -> Result<RunReport> {
    let store = Arc::new(SheetStore::new(config.store.clone(), config.languages.clone())?);
    let provider: Arc<dyn Provider> = Arc::from(wavecast_providers::create_provider(&config.llm)?);
    tracing::info!("🧠 Provider: {} (model={})", provider.name(), config.llm.model);

    // Transports are only built when they may be used.
    let dispatcher = if config.campaign.hot_send {
        Dispatcher::from_config(&config.channel)?
    } else {
        Dispatcher::new()
    };

    let composer = ContentComposer::new(provider, ComposerSettings::from_config(config));
    let engine = CampaignEngine::new(store, composer, dispatcher, EngineSettings::from_config(config));

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Ctrl-C: finishing in-flight recipients, starting no new ones");
            let _ = stop_tx.send(true);
        }
    });

    let report = engine.run(stop_rx).await.context("campaign run aborted")?;
    Ok(report)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let mut config = load_config(&cli)?;

    match cli.command.as_ref().unwrap_or(&Command::Run) {
        Command::Config => {
            println!("{}", toml::to_string_pretty(&config.redacted())?);
            println!("# providers: {}", wavecast_providers::available_providers().join(", "));
        }
        Command::Preview => {
            config.campaign.hot_send = false;
            config.campaign.hot_update = false;
            config.validate()?;

            let report = run_campaign(&config).await?;
            for preview in report.previews() {
                println!("── row {} {} [{}]", preview.row, preview.number, preview.handle);
                println!("{}\n", preview.content);
            }
            print!("{report}");
        }
        Command::Run => {
            config.validate()?;
            if !config.campaign.hot_send {
                tracing::warn!("🧪 hot_send is off: messages are rendered but not delivered");
            }

            let report = run_campaign(&config).await?;
            print!("{report}");
            let failures = report.failures().count();
            if failures > 0 {
                tracing::warn!("⚠️ {failures} recipient(s) failed; they stay eligible for the next run");
            }
        }
    }

    Ok(())
}
