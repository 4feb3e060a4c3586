use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod core;
mod daemon;
mod providers;
mod server;
mod ui;

use crate::core::settings::{Secrets, Settings};

#[derive(Parser)]
#[command(name = "homepage-widgets")]
#[command(author, version, about = "Backend and poller for personal homepage widgets")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the now-playing and contributions endpoints
    Serve {
        /// Address to bind, overriding the config file
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show what is playing on Spotify
    NowPlaying {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the GitHub contribution calendar
    Contributions {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Output the calendar as SVG
        #[arg(long, conflicts_with = "json")]
        svg: bool,

        /// Use the light palette for SVG output
        #[arg(long, requires = "svg")]
        light: bool,
    },

    /// Poll a running server and render the widgets in the terminal
    Watch {
        /// Skip the now-playing card
        #[arg(long)]
        no_now_playing: bool,

        /// Skip the contribution calendar
        #[arg(long)]
        no_calendar: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    init_logging(cli.log_json);
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => server::serve(&settings, &Secrets::from_env(), bind).await,
        Commands::NowPlaying { json } => {
            cli::now_playing::run(&settings, &Secrets::from_env(), json).await
        }
        Commands::Contributions { json, svg, light } => {
            let options = cli::contributions::Options { json, svg, light };
            cli::contributions::run(&settings, &Secrets::from_env(), options).await
        }
        Commands::Watch {
            no_now_playing,
            no_calendar,
        } => daemon::run(&settings, !no_now_playing, !no_calendar).await,
        Commands::Completions { .. } => Ok(()),
    }
}
