use chrono::Utc;
use log::{LevelFilter, Metadata, Record, SetLoggerError};
use sentry_log::SentryLogger;


pub struct Logger {
    level: LevelFilter,
}

impl Logger {
    pub fn new(level: LevelFilter) -> Self {
        Logger { level }
    }

    fn format(record: &Record) -> String {
        format!("{} [{}] {} - {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            record.target(),
            record.level(),
            record.args())
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("{}", Logger::format(record));
        }
    }

    fn flush(&self) {}
}


/// Stdout logging; warnings and errors also reach Sentry once it is initialised.
pub fn init_logger(level: LevelFilter) -> Result<(), SetLoggerError> {
    let logger = SentryLogger::with_dest(Logger::new(level));

    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level);
    Ok(())
}
