//! Logging setup shared by every command.
//!
//! Records go to stderr so that transactions, PSBTs and descriptors printed on stdout can be
//! piped into other tools.

use std::env;

use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable holding an operator-chosen label, e.g. the name of the node being
/// recovered. It is appended to the invocation label of every run.
pub const SVC_LABEL_ENVVAR: &str = "LNRESCUE_SVC_LABEL";

/// Set to `1` to print the source file of each record.
pub const LOG_FILE_ENVVAR: &str = "LOG_FILE";

/// Set to `1` to print the source line of each record.
pub const LOG_LINE_NUM_ENVVAR: &str = "LOG_LINE_NUM";

/// How the logger is set up for one invocation.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Identifies the invocation in logs.
    whoami: String,

    /// Applies when `RUST_LOG` is unset.
    default_level: LevelFilter,

    ansi: bool,
}

impl LoggerConfig {
    /// Creates a config with an explicit label.
    pub const fn new(whoami: String) -> Self {
        Self {
            whoami,
            default_level: LevelFilter::INFO,
            ansi: true,
        }
    }

    /// Labels the run with `command`, plus the operator label from [`SVC_LABEL_ENVVAR`] if set.
    pub fn for_command(command: &str) -> Self {
        Self::new(invocation_label(command, env::var(SVC_LABEL_ENVVAR).ok().as_deref()))
    }

    /// Raises the default level to `DEBUG`.
    pub const fn verbose(mut self, verbose: bool) -> Self {
        if verbose {
            self.default_level = LevelFilter::DEBUG;
        }
        self
    }

    /// Turns off colors.
    pub const fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    /// The invocation label.
    pub fn whoami(&self) -> &str {
        &self.whoami
    }

    /// The level used when `RUST_LOG` is unset.
    pub const fn default_level(&self) -> LevelFilter {
        self.default_level
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self::for_command("lnrescue")
    }
}

fn invocation_label(command: &str, operator_label: Option<&str>) -> String {
    match operator_label {
        Some(label) if !label.is_empty() => format!("{command}%{label}"),
        _ => command.to_owned(),
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name).is_ok_and(|v| v == "1")
}

/// Installs the global subscriber. Must be called once, before any record is emitted.
pub fn init(config: LoggerConfig) {
    let filter = EnvFilter::builder()
        .with_default_directive(config.default_level.into())
        .from_env_lossy();

    let stderr_layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi)
        .event_format(
            fmt::format()
                .with_file(env_flag(LOG_FILE_ENVVAR))
                .with_line_number(env_flag(LOG_LINE_NUM_ENVVAR)),
        )
        .with_filter(filter);

    tracing_subscriber::registry().with(stderr_layer).init();

    info!(whoami = %config.whoami, "logging started");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_label() {
        assert_eq!(invocation_label("sweep-time-lock", None), "sweep-time-lock");
        assert_eq!(invocation_label("zombie", Some("")), "zombie");
        assert_eq!(invocation_label("zombie", Some("node-a")), "zombie%node-a");
    }

    #[test]
    fn test_verbose_raises_default_level() {
        let config = LoggerConfig::new("force-close".to_string());
        assert_eq!(config.default_level(), LevelFilter::INFO);

        let config = config.verbose(false);
        assert_eq!(config.default_level(), LevelFilter::INFO);

        let config = config.verbose(true).without_ansi();
        assert_eq!(config.default_level(), LevelFilter::DEBUG);
        assert_eq!(config.whoami(), "force-close");
        assert!(!config.ansi);
    }
}
