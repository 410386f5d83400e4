//! Logging setup with indicatif integration

use indicatif::MultiProgress;

/// Padded label for a log level, with ANSI color when `color` is set.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// Default filter directive for the given verbosity flags.
fn default_filter(quiet: bool, debug: bool) -> &'static str {
    if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

/// Logger that prints above the file progress bar instead of through it.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.inner.enabled(record.metadata()) {
            return;
        }
        let (pre, label, post) = level_style(record.level(), true);
        let line = format!("[{pre}{label}{post}] {}", record.args());
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Initialize process logging.
///
/// With `multi` set (TTY), log lines are printed through the progress bars.
/// Without it, plain `[LEVEL] message` lines go to stderr. `RUST_LOG`
/// overrides the default level in both modes.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    use std::io::Write;

    let env = env_logger::Env::default().default_filter_or(default_filter(quiet, debug));

    match multi {
        Some(multi) => {
            let logger = env_logger::Builder::from_env(env)
                .format_timestamp_millis()
                .build();
            let max_level = logger.filter();
            if log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone()))).is_ok()
            {
                log::set_max_level(max_level);
            }
        }
        None => {
            let _ = env_logger::Builder::from_env(env)
                .format(|buf, record| {
                    let (_, label, _) = level_style(record.level(), false);
                    writeln!(buf, "[{label}] {}", record.args())
                })
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_precedence() {
        assert_eq!(default_filter(false, false), "info");
        assert_eq!(default_filter(true, false), "warn");
        // --debug wins over quiet
        assert_eq!(default_filter(true, true), "debug");
    }

    #[test]
    fn plain_labels_have_no_ansi() {
        let (pre, label, post) = level_style(log::Level::Warn, false);
        assert_eq!(pre, "");
        assert_eq!(label, "WARN ");
        assert_eq!(post, "");
    }

    #[test]
    fn colored_labels_reset() {
        let (pre, label, post) = level_style(log::Level::Error, true);
        assert_eq!(pre, "\x1b[31m");
        assert_eq!(label, "ERROR");
        assert_eq!(post, "\x1b[0m");
    }
}
