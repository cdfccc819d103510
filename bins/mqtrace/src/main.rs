mod config;
mod error;

use clap::Parser;
use config::{Cli, Commands};

mod cmd;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = cli.data_root();
    let result = match cli.command {
        Commands::Trace(args) => cmd::trace::run(root, args).await,
        Commands::Relay(args) => cmd::relay::run(root, args).await,
        Commands::Publish(args) => cmd::publish::run(root, args).await,
        Commands::History(args) => cmd::history::run(root, args),
        Commands::Traces(args) => cmd::traces::run(root, args),
        Commands::Profiles => cmd::profiles::run(root),
    };
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
