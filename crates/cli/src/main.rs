mod config;
mod refresh_cmd;
mod show_cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "tablesync",
    version,
    about = "Keep structured tables in sync with LLM chat output"
)]
struct Cli {
    /// Config file (default: ~/.config/tablesync/tablesync.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chat store directory (default: ~/.config/tablesync/chats)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the provider for table edits against the recent conversation
    Refresh {
        /// Chat id
        chat: String,
        /// Apply without asking
        #[arg(long, short)]
        yes: bool,
    },

    /// Summarize assistant turns not yet folded into the tables
    TwoStep {
        /// Chat id
        chat: String,
        /// Trigger turn index (default: newest assistant turn)
        #[arg(long)]
        trigger: Option<usize>,
    },

    /// Print the window a two-step summary would consume, without running it
    Window {
        /// Chat id
        chat: String,
        /// Trigger turn index (default: newest assistant turn)
        #[arg(long)]
        trigger: Option<usize>,
    },

    /// Apply an action list from a file, no provider involved
    Apply {
        /// Chat id
        chat: String,
        /// File holding the action list (raw completion text is fine)
        #[arg(long)]
        actions: PathBuf,
        /// Apply without asking
        #[arg(long, short)]
        yes: bool,
    },

    /// Print the latest tables of a chat
    Show {
        /// Chat id
        chat: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration, or write the default one
    Config {
        /// Write a default config file
        #[arg(long)]
        init: bool,
    },
}

fn store_dir(cli_store: Option<&Path>) -> Result<PathBuf> {
    match cli_store {
        Some(dir) => Ok(dir.to_path_buf()),
        None => config::default_store_dir(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config { init } => {
            if init {
                let path = config::init_config(config_path)?;
                println!("Wrote default config to {}", path.display());
                Ok(())
            } else {
                config::show_config(config_path)
            }
        }
        Commands::Show { chat, json } => {
            show_cmd::run_show(&store_dir(cli.store.as_deref())?, &chat, json)
        }
        Commands::Refresh { chat, yes } => {
            let cfg = config::load_config(config_path)?;
            let dir = store_dir(cli.store.as_deref())?;
            refresh_cmd::run_refresh(&cfg, &dir, &chat, yes).await
        }
        Commands::TwoStep { chat, trigger } => {
            let cfg = config::load_config(config_path)?;
            let dir = store_dir(cli.store.as_deref())?;
            refresh_cmd::run_two_step(&cfg, &dir, &chat, trigger).await
        }
        Commands::Window { chat, trigger } => {
            let cfg = config::load_config(config_path)?;
            let dir = store_dir(cli.store.as_deref())?;
            refresh_cmd::run_window(&cfg, &dir, &chat, trigger)
        }
        Commands::Apply {
            chat,
            actions,
            yes,
        } => {
            let cfg = config::load_config(config_path)?;
            let dir = store_dir(cli.store.as_deref())?;
            refresh_cmd::run_apply(&cfg, &dir, &chat, &actions, yes)
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
