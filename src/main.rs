use clap::Parser;
use colored::Colorize;

use viewpulse::cli::{Cli, Commands};
use viewpulse::config::{get_config, init_config_from};
use viewpulse::interfaces::cli::run_cli_command;
use viewpulse::runtime::modes::run_server;
use viewpulse::system::{RunMode, init_logging, install_panic_hook};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_config_from(&cli.config);
    let config = get_config();

    match cli.command {
        None | Some(Commands::Serve) => {
            install_panic_hook(RunMode::Server);
            let _guard = init_logging(&config.logging)?;
            run_server().await
        }
        Some(cmd) => {
            install_panic_hook(RunMode::Cli);
            let guard = init_logging(&config.logging)?;
            let result = run_cli_command(cmd).await;
            drop(guard);

            if let Err(e) = result {
                eprintln!("{}", e.format_colored());
                eprintln!("{}", "Run with --help for usage".dimmed());
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
