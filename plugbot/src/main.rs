//! Plugbot - chat commands backed by plain executables
//!
//! This is the main entry point for the Plugbot CLI.

use clap::{Parser, Subcommand};
use plugbot_bot::{Bot, ConsoleTransport, DispatchConfig, Dispatcher, Handled, InboundMessage, MessageHandler, PingHandler};
use plugbot_core::config::{BotConfig, ConfigLoader};
use plugbot_plugin::{Invoker, Registry, metrics};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(target_os = "linux")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Plugbot - runs the executables in a plugin directory as chat commands
#[derive(Parser)]
#[command(name = "plugbot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default is $HOME/.plugbot.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Directory to load available commands from
    #[arg(long, global = true)]
    plugin_dir: Option<PathBuf>,

    /// Prefix that addresses the bot
    #[arg(long, global = true)]
    prefix: Option<String>,

    /// Per-command deadline in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen on stdin for messages and answer on stdout
    Run,

    /// Handle a single message and print the reply
    Exec {
        /// Message text, e.g. `bot uptime`
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },

    /// List the commands found in the plugin directory
    List,

    /// Validate the configuration
    Validate,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = load_config(&cli);
    let level = match &loaded {
        _ if cli.debug => "debug".to_string(),
        Ok(config) => config.logging.level.clone(),
        Err(_) => "info".to_string(),
    };
    init_tracing(&level);

    if cli.debug {
        tracing::debug!("Debug logging enabled");
    }

    match cli.command {
        Commands::Version => {
            println!("Plugbot v{}", plugbot_core::VERSION);
        }

        Commands::Validate => match loaded.and_then(|config| validate(&config)) {
            Ok(count) => println!("✅ Configuration is valid ({} command(s) available)", count),
            Err(e) => {
                eprintln!("❌ Configuration Error: {}", e);
                std::process::exit(1);
            }
        },

        Commands::List => {
            let config = loaded?;
            let registry = load_registry(&config)?;
            for (name, path) in registry.list() {
                println!("{}\t{}", name, path.display());
            }
        }

        Commands::Exec { text } => {
            let config = loaded?;
            let dispatcher = build_dispatcher(&config)?;
            let transport = ConsoleTransport::stdout(&config.console.upload_dir);
            let message = InboundMessage::new(plugbot_bot::CONSOLE_CHANNEL, text.join(" "));

            if dispatcher.handle(&message, &transport).await? == Handled::Ignored {
                println!("message is not addressed to `{}`", config.prefix);
            }
        }

        Commands::Run => {
            let config = loaded?;
            run_bot(config).await?;
        }
    }

    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // stdout carries bot replies; logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Defaults, then config file and environment, then command-line flags
fn load_config(cli: &Cli) -> plugbot_core::Result<BotConfig> {
    let mut config = ConfigLoader::discover(cli.config.as_deref())?;
    if let Some(dir) = &cli.plugin_dir {
        config.plugin_dir = Some(dir.clone());
    }
    if let Some(prefix) = &cli.prefix {
        config.prefix = prefix.clone();
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.invoker.timeout_ms = timeout_ms;
    }
    config.validate()?;
    Ok(config)
}

fn validate(config: &BotConfig) -> plugbot_core::Result<usize> {
    match &config.plugin_dir {
        Some(dir) => Ok(Registry::new(dir)?.len()),
        None => {
            tracing::warn!("⚠️ No plugin directory configured");
            Ok(0)
        }
    }
}

fn load_registry(config: &BotConfig) -> plugbot_core::Result<Arc<Registry>> {
    let dir = config.require_plugin_dir()?;
    tracing::info!("📁 Loading plugins from {}", dir.display());

    let registry = Registry::new(dir)?;
    for (name, path) in registry.list() {
        tracing::info!(command = name, path = %path.display(), "loaded command");
    }
    if registry.is_empty() {
        tracing::warn!("⚠️ No plugins found in {}", registry.dir().display());
    }
    Ok(Arc::new(registry))
}

fn build_dispatcher(config: &BotConfig) -> plugbot_core::Result<Dispatcher> {
    let registry = load_registry(config)?;
    Ok(Dispatcher::new(
        registry,
        Invoker::new(&config.invoker),
        DispatchConfig::from_config(config),
    ))
}

async fn run_bot(config: BotConfig) -> anyhow::Result<()> {
    tracing::info!("🚀 Starting Plugbot v{}", plugbot_core::VERSION);
    metrics::init();

    let dispatcher = build_dispatcher(&config)?;
    tracing::info!(
        "🔧 prefix `{}`, timeout {:?}, inline limit {} chars, {:?} dispatch",
        config.prefix,
        config.invoker.timeout(),
        config.delivery.inline_limit,
        config.dispatch
    );

    let transport = Arc::new(ConsoleTransport::stdout(&config.console.upload_dir));
    tracing::info!("📎 Large outputs are stored in {}", transport.upload_dir().display());
    let mut bot = Bot::new(transport, config.dispatch);
    if !config.ping_prefix.is_empty() {
        bot.handler(Arc::new(PingHandler::new(&config.ping_prefix)));
    }
    let commands: Arc<dyn MessageHandler> = Arc::new(dispatcher);
    bot.handler(commands);

    let (tx, rx) = tokio::sync::mpsc::channel(64);
    let reader = tokio::spawn(async move {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        if let Err(e) = plugbot_bot::read_events(stdin, tx).await {
            tracing::error!("❌ Failed to read stdin: {}", e);
        }
    });

    println!("🚀 Plugbot running...");
    let outcome = bot.run(rx).await;
    if outcome.is_err() {
        reader.abort();
    } else if let Err(e) = reader.await {
        tracing::error!("stdin reader task failed: {}", e);
    }

    tracing::debug!("metrics at shutdown:\n{}", metrics::gather());
    tracing::info!("👋 Plugbot stopped");
    outcome?;
    Ok(())
}
