use clap::Parser;
use form_autofill::cli::commands::{
    cmd_autofill, cmd_bridge, cmd_fill, cmd_map, cmd_scan, cmd_serve,
};
use form_autofill::cli::config::{Cli, Commands, apply_cli_overrides, load_config, try_load_config};
use form_autofill::telemetry::logging::init_logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // An explicit --config must exist and parse; the default path is optional.
    let config = match cli.config.as_deref() {
        Some(path) => try_load_config(path)?,
        None => load_config(None),
    };
    let config = apply_cli_overrides(config, &cli);

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Warning: could not install logger: {}", e);
    }

    match cli.command {
        Commands::Scan { page, output } => {
            cmd_scan(&page, output.as_deref())?;
        }
        Commands::Map {
            page,
            student,
            mapper,
        } => {
            cmd_map(&page, &student, &mapper, &config).await?;
        }
        Commands::Fill {
            page,
            mapping,
            output,
        } => {
            cmd_fill(&page, &mapping, output.as_deref())?;
        }
        Commands::Autofill {
            page,
            student,
            mapper,
            dry_run,
            output,
        } => {
            cmd_autofill(&page, &student, &mapper, dry_run, output.as_deref(), &config).await?;
        }
        Commands::Serve { bind } => {
            cmd_serve(bind.as_deref(), &config).await?;
        }
        Commands::Bridge { page, output } => {
            cmd_bridge(&page, output.as_deref()).await?;
        }
    }

    Ok(())
}
