use std::env;
use std::path::Path;
use std::sync::Arc;

use log::{error, info};

use apiwatch::configuration::config::SessionConfig;
use apiwatch::controller::controller_handler::Controller;
use apiwatch::spec_engine::InMemorySpecEngine;

/// Configuration file consulted when no flags are given.
const DEFAULT_CONFIG_FILE: &str = "apiwatch.toml";

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    println!(
        "
 █████╗ ██████╗ ██╗██╗    ██╗ █████╗ ████████╗ ██████╗██╗  ██╗
██╔══██╗██╔══██╗██║██║    ██║██╔══██╗╚══██╔══╝██╔════╝██║  ██║
███████║██████╔╝██║██║ █╗ ██║███████║   ██║   ██║     ███████║
██╔══██║██╔═══╝ ██║██║███╗██║██╔══██║   ██║   ██║     ██╔══██║
██║  ██║██║     ██║╚███╔███╔╝██║  ██║   ██║   ╚██████╗██║  ██║
╚═╝  ╚═╝╚═╝     ╚═╝ ╚══╝╚══╝ ╚═╝  ╚═╝   ╚═╝    ╚═════╝╚═╝  ╚═╝
==============================================================
        Observe live API traffic, diff it against spec
==============================================================
"
    );

    info!("Importing configuration");

    // Flags on the command line win; otherwise fall back to the config file.
    let config = if env::args().len() > 1 {
        SessionConfig::from_args()
    } else {
        SessionConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))
    };

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration imported successfully");

    let controller = Controller::new(config, Arc::new(InMemorySpecEngine::new()));

    match controller.run().await {
        Ok(outcome) => {
            println!("{}", outcome.summary());
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
