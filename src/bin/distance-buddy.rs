use clap::Parser;
use log::{error, info};
use distance_buddy::{init_logging, run};
use distance_buddy::error::{AppRunError, ConfigError};
use distance_buddy::terminal::args::Args;

fn main() -> Result<(), AppRunError> {
    let args = Args::parse();
    init_logging(args.log_level())?;
    info!(concat!("Distance Buddy ", env!("CARGO_PKG_VERSION")));

    match run(args) {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            error!("Distance Buddy has already been started with this config file");
            Ok(())
        },
        Err(err) => {
            error!("Unexpected error: {}", err);
            Err(err)
        },
        Ok(_) => Ok(()),
    }
}
