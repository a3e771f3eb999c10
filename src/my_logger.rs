use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Result};
use time::macros::format_description;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{self, prelude::*};

#[allow(unused)]
pub mod prelude {

    // the order of log level: TRACE < DEBUG < INFO < WARN < ERROR < OFF
    pub use tracing::{debug, error, info, trace, warn};
}

pub fn init(filepath_to_log_file: &Path) -> Result<()> {
    let timer = tracing_subscriber::fmt::time::LocalTime::new(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"));

    let filter_for_stdout = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(); // you can change log level by the environment variable `RUST_LOG`
    let stdout_logger = tracing_subscriber::fmt::layer()
        .without_time()
        .with_ansi(false)
        .with_file(false)
        .with_level(true)
        .with_line_number(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .compact()
        .with_filter(filter_for_stdout);

    // per-message detail (every DNS probe) only goes to the file
    let filter_for_logfile = LevelFilter::TRACE;
    let logfile_logger = (|| -> std::io::Result<_> {
        let file = File::options().append(true).create(true).open(filepath_to_log_file)?;
        let logger = tracing_subscriber::fmt::layer()
            .with_timer(timer) // with local timestamp
            .with_ansi(false)
            .with_file(false)
            .with_level(true)
            .with_line_number(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(false)
            .with_writer(file)
            .compact()
            .with_filter(filter_for_logfile);
        Ok(logger)
    })().ok();
    let has_logfile = logfile_logger.is_some();

    let subscriber = tracing_subscriber::Registry::default()
        .with(stdout_logger)
        .with(logfile_logger);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("can not install the logger: {}", e))?;
    if !has_logfile {
        tracing::warn!("can not open log file: {}", filepath_to_log_file.display());
    }
    Ok(())
}
