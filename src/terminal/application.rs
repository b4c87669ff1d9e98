use futures::StreamExt;
use log::{error, info, warn};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};

use crate::config::io::ConfigIO;
use crate::config::types::Config;
use crate::device::connection::ConnectionManager;
use crate::device::endpoint::Endpoint;
use crate::device::transport::WebSocketConnector;
use crate::error::AppRunError;
use crate::proximity::NearDebouncer;
use crate::terminal::args::Args;
use crate::terminal::display::{format_edge, format_snapshot};

async fn load_config(config_io: &ConfigIO) -> Config {
    match config_io.read().await {
        Ok(config) => config,
        Err(err) => {
            if err.is_file_not_found_error() {
                // this is probably the first start of the app
                info!("Config file not found, using defaults");
            } else {
                error!("Failed to load config, using defaults: {}", &err);
            }
            Config::default()
        },
    }
}

// returns true if the config was saved
async fn save_config(config_io: &ConfigIO, config: &Config) -> bool {
    match config_io.save(config).await {
        Ok(_) => true,
        Err(err) => {
            error!("Failed to save config: {}", &err);
            false
        },
    }
}

fn apply_args(config: &mut Config, args: &Args) -> Result<(), AppRunError> {
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = Endpoint::parse(endpoint)?;
    }

    if let Some(threshold) = args.threshold {
        config.proximity_threshold = threshold;
    }

    Ok(())
}

async fn edit_endpoint(line: &str, manager: &ConnectionManager, config: &mut Config, config_io: &ConfigIO) {
    let text = line.trim();
    if text.is_empty() {
        return;
    }

    match Endpoint::parse(text) {
        Ok(endpoint) => {
            manager.set_endpoint(endpoint.clone());
            config.endpoint = endpoint;

            if save_config(config_io, config).await {
                println!("URL saved successfully!");
            }
        },
        Err(err) => {
            println!("Please enter a valid WebSocket URL (ws:// or wss://): {}", err);
        },
    }
}

pub async fn run_application(args: Args) -> Result<(), AppRunError> {
    let config_io = ConfigIO::open(args.config.clone())?;
    let mut locker = config_io.locker()?;
    let _lock = locker.lock()?;

    let mut config = load_config(&config_io).await;
    apply_args(&mut config, &args)?;
    if args.save {
        config_io.save(&config).await?;
        info!("Saved config to {}", config_io.path().to_string_lossy());
    }

    println!("Current connection: {}", config.endpoint);
    println!("Proximity threshold: {}cm", config.proximity_threshold);

    let manager = ConnectionManager::new(config.clone(), WebSocketConnector);
    let mut snapshots = manager.subscribe();
    let mut debouncer = NearDebouncer::default();
    let mut lines = BufReader::new(stdin()).lines();
    let mut stdin_open = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    manager.start();

    'mainloop: loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(err) = result {
                    error!("Failed to listen for ctrl-c: {}", err);
                }
                break 'mainloop;
            },
            Some(snapshot) = snapshots.next() => {
                println!("{}", format_snapshot(&snapshot));

                if let Some(edge) = debouncer.observe(&snapshot.proximity) {
                    println!("{}", format_edge(edge));
                }
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => edit_endpoint(&line, &manager, &mut config, &config_io).await,
                Ok(None) => {
                    info!("stdin closed, endpoint can no longer be changed");
                    stdin_open = false;
                },
                Err(err) => {
                    warn!("Failed to read from stdin: {}", err);
                    stdin_open = false;
                },
            },
        }
    }

    info!("Shutting down");
    drop(snapshots);
    manager.stop();
    manager.shutdown().await;
    Ok(())
}
