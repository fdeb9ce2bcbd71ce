//! algochat - chat and Algorand explorer proxy backend
//!
//! Answers chat queries from a predefined table or an LLM provider, and
//! relays read-only queries to an Algorand block explorer.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use algochat::config::Config;
use algochat::proxy::{bootstrap, run_server};

#[derive(Parser)]
#[command(name = "algochat")]
#[command(about = "Chat and Algorand explorer proxy backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration, API key and answers file without serving
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("algochat={},tower_http=info", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            let mut cfg = Config::from_file(&config)?;
            init_tracing(&cfg.logging.level);
            tracing::info!(config = %config, "Loaded configuration");

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                cfg.server.listen = addr;
            }

            let (state, _) = bootstrap(cfg)?;
            run_server(state).await
        }

        Commands::Check { config } => {
            let cfg = Config::from_file(&config)?;
            init_tracing(&cfg.logging.level);

            let (state, key_source) = bootstrap(cfg)?;
            tracing::info!(
                config = %config,
                backend = %state.chat.name(),
                key_source = %key_source,
                answers = state.answers.len(),
                explorer = %state.config.explorer.url,
                listen = %state.config.server.listen,
                "Configuration OK"
            );
            Ok(())
        }
    }
}
