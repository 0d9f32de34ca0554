use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use log::{LevelFilter, info};
use tokio::net::TcpListener;

use tandem::api::{AppState, create_router};
use tandem::chat::{ChatService, MessageRepository};
use tandem::completion::MessagesApiClient;
use tandem::db::Database;
use tandem::notify::{MessageFeed, PollFeed, PushFeed, RoomHub};
use tandem::room::{RoomRepository, RoomService};
use tandem::settings::{self, NotifyMode, Settings};

const APP_NAME: &str = "tandem";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.common);

    match cli.command {
        Command::Serve(cmd) => {
            let settings = settings::load(cli.common.config.as_deref())?;
            async_serve(settings, cmd)
        }
        Command::Config { command } => handle_config(&cli.common, command),
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), APP_NAME, &mut io::stdout());
            Ok(())
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Tandem - two-party AI-mediated chat session server.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -v)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve(ServeCommand),
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
struct ServeCommand {
    /// Override the bind address
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default config file path
    Path,
}

fn init_logging(common: &CommonOpts) {
    let level = if common.trace {
        LevelFilter::Trace
    } else if common.debug {
        LevelFilter::Debug
    } else if common.quiet {
        LevelFilter::Error
    } else {
        match common.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .init();
}

fn handle_config(common: &CommonOpts, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let settings = settings::load(common.config.as_deref())?;
            let rendered =
                toml::to_string_pretty(&settings).context("rendering configuration")?;
            print!("{rendered}");
            Ok(())
        }
        ConfigCommand::Path => {
            match settings::default_config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("(no config directory on this platform)"),
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn async_serve(settings: Settings, cmd: ServeCommand) -> Result<()> {
    // The HTTP layer emits tracing events; everything else logs via `log`.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let db_path = settings.database.resolved_path();
    let db = Database::open(&db_path).await?;
    info!("database at {}", db_path.display());

    let room_repo = RoomRepository::new(db.pool().clone());
    let message_repo = MessageRepository::new(db.pool().clone());
    let hub = Arc::new(RoomHub::new());

    let completion = Arc::new(MessagesApiClient::new(settings.completion.to_config())?);
    if settings.completion.api_key.is_none() {
        log::warn!("no completion API key configured; turns will fall back");
    }

    let rooms = Arc::new(RoomService::new(
        room_repo.clone(),
        message_repo.clone(),
        settings.room_service_config(),
    ));
    let chat = Arc::new(ChatService::new(
        message_repo.clone(),
        room_repo,
        completion,
        hub.clone(),
    ));

    let feed: Arc<dyn MessageFeed> = match settings.notify.mode {
        NotifyMode::Push => Arc::new(PushFeed::new(hub)),
        NotifyMode::Poll => Arc::new(PollFeed::new(message_repo, settings.notify.poll_interval())),
    };

    let _sweeper = rooms.spawn_sweeper();

    let router = create_router(AppState::new(rooms, chat, feed));
    let bind = cmd.bind.unwrap_or(settings.server.bind);
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding to {}", bind))?;
    info!("listening on http://{}", bind);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
