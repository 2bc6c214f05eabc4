mod auth;
mod cli;
mod client;
mod commands;
mod config;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands, ConfigCommands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing(&cli.log_level);
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::Register(args) => {
            let cfg = config::resolve(cli.config.as_deref(), cli.url.as_deref())?;
            commands::register::register(&cfg, &args.to_options(), args.dry_run, format).await?;
        }
        Commands::Plan(args) => {
            let cfg = config::resolve(cli.config.as_deref(), cli.url.as_deref())?;
            commands::register::register(&cfg, &args.to_options(), true, format).await?;
        }
        Commands::Inspect(args) => {
            commands::inspect::inspect(&args.assembly, format)?;
        }
        Commands::Config(args) => match &args.command {
            ConfigCommands::Show => {
                let cfg = config::load_config(cli.config.as_deref())?
                    .with_url_override(cli.url.as_deref())
                    .masked();
                match format {
                    cli::OutputFormat::Json => output::print_json(&cfg)?,
                    cli::OutputFormat::Text => print!("{}", toml::to_string_pretty(&cfg)?),
                }
                if let Err(problem) = cfg.validate() {
                    println!("{}: {}", "Invalid".yellow(), problem);
                }
            }
            ConfigCommands::Path => {
                let path = match &cli.config {
                    Some(path) => path.clone(),
                    None => config::default_config_path()?,
                };
                println!("{}", path.display());
            }
        },
    }

    Ok(())
}
