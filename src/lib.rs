use std::env;
use std::time::Duration;
use log::LevelFilter;
use crate::error::AppRunError;
use crate::terminal::application::run_application;
use crate::terminal::args::Args;

pub mod config;
pub mod device;
pub mod error;
pub mod proximity;
pub mod terminal;

pub fn init_logging(level: LevelFilter) -> Result<(), AppRunError> {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        let file = fern::log_file(log_file).map_err(|source| AppRunError::LogFile { source })?;
        dispatch = dispatch.chain(file);
    }

    dispatch.apply()?;
    Ok(())
}

pub fn run(args: Args) -> Result<(), AppRunError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(run_application(args));

    // a blocking read of stdin may still be pending, don't wait for it
    runtime.shutdown_timeout(Duration::from_millis(500));
    result
}
