use chrono::Local;
use csv::Writer;
use log::info;
use nalgebra::{DMatrix, DVector};
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// `debug | info | warn | error | off` (`none` is accepted for `off`)
pub fn parse_loglevel(level: &str) -> Option<LevelFilter> {
    match level.trim().to_lowercase().as_str() {
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        "off" | "none" => Some(LevelFilter::Off),
        _ => None,
    }
}

/// log file name stamped with the current date and time
pub fn timestamped_log_name() -> PathBuf {
    let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
    PathBuf::from(format!("log_{}.txt", date_and_time))
}

/// Terminal logger plus an optional file logger. A logger installed earlier in the process
/// stays in place, the second `init` is ignored.
pub fn init_logger(level: LevelFilter, log_file: Option<&Path>) -> io::Result<()> {
    if level == LevelFilter::Off {
        return Ok(());
    }
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        loggers.push(WriteLogger::new(level, Config::default(), File::create(path)?));
    }
    if CombinedLogger::init(loggers).is_ok() {
        info!("Program started with loglevel: {}", level);
    }
    Ok(())
}

/// Writes the trajectory as CSV with the header `arg, headers...`, one row per time point.
pub fn save_trajectory_to_csv(
    t: &DVector<f64>,
    y: &DMatrix<f64>,
    headers: &[String],
    arg: &str,
    path: &Path,
) -> Result<(), csv::Error> {
    let mut writer = Writer::from_path(path)?;

    let mut headers_with_t = Vec::with_capacity(headers.len() + 1);
    headers_with_t.push(arg.to_string());
    headers_with_t.extend(headers.iter().cloned());
    writer.write_record(&headers_with_t)?;

    for (i, row) in y.row_iter().enumerate() {
        let mut row_data = Vec::with_capacity(row.len() + 1);
        row_data.push(t[i].to_string());
        row_data.extend(row.iter().map(|&val| val.to_string()));
        writer.write_record(&row_data)?;
    }

    writer.flush()?;
    info!("trajectory saved to {}", path.display());
    Ok(())
}
