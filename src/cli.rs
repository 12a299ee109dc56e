// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `probebench`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "probebench",
    version,
    about = "Run parameterised benchmark commands while sampling background telemetry.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Probebench.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Probebench.toml")]
    pub config: String,

    /// Run only this experiment. Repeat to run several, in the given order.
    ///
    /// If omitted, every experiment in the config runs.
    #[arg(long = "experiment", short = 'e', value_name = "NAME")]
    pub experiments: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROBEBENCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Override `[config].output_dir`.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Parse + validate, print experiments and rendered commands, but don't
    /// execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = CliArgs::try_parse_from(["probebench"]).unwrap();
        assert_eq!(args.config, "Probebench.toml");
        assert!(args.experiments.is_empty());
        assert!(!args.dry_run);
        assert!(args.output_dir.is_none());
    }

    #[test]
    fn repeated_experiments_keep_order() {
        let args = CliArgs::try_parse_from([
            "probebench",
            "--config",
            "bench.toml",
            "-e",
            "write",
            "--experiment",
            "read",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.config, "bench.toml");
        assert_eq!(args.experiments, vec!["write", "read"]);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }
}
