//! Parley binary entry point.

use clap::Parser;
use parley::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("parley=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&cli).await,
        Commands::Models => {
            list_models();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn serve(cli: &Cli) -> parley::error::Result<()> {
    let config = cli.load_config()?;
    tracing::debug!(?config, "effective configuration");
    parley::server::serve(&config).await
}

fn list_models() {
    for model in parley::models::catalog() {
        let capabilities: Vec<String> = model.capabilities.iter().map(|c| c.to_string()).collect();
        println!("{:<32} {:<36} {}", model.name, model.value, capabilities.join(", "));
    }
}
