use chrono::Local;
use log::LevelFilter;
use simplelog::{CombinedLogger, ConfigBuilder, WriteLogger};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

// HTTP stack internals that drown out connector messages at debug level
const NOISY_TARGETS: [&str; 4] = ["hyper", "reqwest", "mio", "want"];

/// Install a file logger for the connector.
///
/// When `log_file` is `None` an hourly file `gsgmail_connector_<YYYYmmdd_HH>.log`
/// is used in the working directory. Missing parent directories are created.
/// Returns the path actually written to.
pub fn setup_logging(log_level: LevelFilter, log_file: Option<&str>) -> io::Result<String> {
    let log_path = match log_file {
        Some(path) => path.to_string(),
        None => format!(
            "gsgmail_connector_{}.log",
            Local::now().format("%Y%m%d_%H")
        ),
    };

    if let Some(parent) = Path::new(&log_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    writeln!(
        file,
        "====== GSGMAIL CONNECTOR LOG - Started at {} ======",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )?;

    let mut config = ConfigBuilder::new();
    config.set_time_format_rfc3339();
    for target in NOISY_TARGETS {
        config.add_filter_ignore_str(target);
    }

    CombinedLogger::init(vec![WriteLogger::new(log_level, config.build(), file)])
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    log::info!("Logging initialized to file: {}", log_path);

    Ok(log_path)
}
