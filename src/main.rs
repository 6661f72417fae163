// Offer cache simulator
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use offercache::{
    cli::{Cli, Commands, ConfigAction},
    config::manager::ConfigManager,
    logging::LoggingManager,
    simulation::Simulation,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let manager = ConfigManager::new(cli.global.config.clone());

    match &cli.command {
        Commands::Config(ConfigAction::Init { force }) => {
            if manager.config_path().exists() && !force {
                return Err(format!(
                    "{} already exists, pass --force to overwrite",
                    manager.config_path().display()
                ).into());
            }
            manager.save().await?;
            println!("Wrote default configuration to {}", manager.config_path().display());
        }
        Commands::Config(ConfigAction::Show) => {
            manager.load().await?;
            let mut config = manager.get_config().await;
            cli.global.apply(&mut config);
            print!("{}", serde_yaml::to_string(&config)?);
        }
        Commands::Run(args) => {
            manager.load().await?;
            let mut config = manager.get_config().await;
            cli.global.apply(&mut config);
            args.apply(&mut config);

            LoggingManager::new(config.logging.clone()).initialize()?;
            info!("Using configuration from {:?}", manager.config_path());

            let simulation = Simulation::new(&config)?;

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                match signal::ctrl_c().await {
                    Ok(()) => {
                        warn!("🛑 Ctrl-C received");
                        let _ = shutdown_tx.send(true);
                    }
                    Err(e) => {
                        warn!("Unable to listen for Ctrl-C: {}", e);
                        // Dropping the sender would read as a shutdown request
                        std::future::pending::<()>().await;
                    }
                }
            });

            let report = simulation.run(shutdown_rx).await?;
            info!("✅ Simulation finished: {} offers delivered", report.delivered);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
