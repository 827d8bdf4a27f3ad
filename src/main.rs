use anyhow::Result;
use clap::Parser;

use storycache::{
    app::load_config,
    cli::{handle_command, handle_init, Cli, Commands},
    utils::init_logger,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_logger(cli.verbose);

    // `init` must work before any config file exists
    if let Commands::Init = cli.command {
        return handle_init(cli.config.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;
    handle_command(&cli.command, &config).await
}
