use std::path::Path;

use anyhow::Result;
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    {ContentLimit, FileRotate},
};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, TermLogger, TerminalMode, WriteLogger,
};

pub const LOG_FILE_NAME: &str = "main.log";

/// Logs to a rolling file in `log_dir` (3 files, 1000 lines each) and echoes
/// warnings and errors to stderr.
pub fn init(log_dir: &str, level: LevelFilter) -> Result<()> {
    let path = Path::new(log_dir).join(LOG_FILE_NAME);
    let log = FileRotate::new(
        path,
        AppendTimestamp::default(FileLimit::MaxFiles(3)),
        ContentLimit::Lines(1000),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();

    CombinedLogger::init(vec![
        WriteLogger::new(level, config.clone(), log),
        TermLogger::new(
            LevelFilter::Warn,
            config,
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
    ])?;
    info!("[logs] logging to {}", log_dir);
    Ok(())
}
