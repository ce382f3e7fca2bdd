//! Command-line interface handling for the region server.
//!
//! Arguments are parsed with the `clap` builder API and override the matching
//! configuration file settings.

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the fleet report interval, in seconds
    pub report_interval: Option<u64>,
}

impl CliArgs {
    /// Parses the process arguments.
    ///
    /// Exits the process with a usage message when the arguments are invalid.
    pub fn parse() -> Self {
        Self::from_matches(&Self::command().get_matches())
    }

    fn command() -> Command {
        Command::new("Region Orchestration Server")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Routes players to region instances and manages instance lifetimes")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("config.toml"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("report-interval")
                    .short('r')
                    .long("report-interval")
                    .value_name("SECONDS")
                    .help("Seconds between two fleet reports")
                    .value_parser(value_parser!(u64)),
            )
    }

    fn from_matches(matches: &clap::ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            report_interval: matches.get_one::<u64>("report-interval").copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_from(args: &[&str]) -> CliArgs {
        CliArgs::from_matches(&CliArgs::command().get_matches_from(args))
    }

    #[test]
    fn test_defaults() {
        let args = parse_from(&["region_server"]);
        assert_eq!(args.config_path, PathBuf::from("config.toml"));
        assert_eq!(args.log_level, None);
        assert!(!args.json_logs);
        assert_eq!(args.report_interval, None);
    }

    #[test]
    fn test_overrides() {
        let args = parse_from(&[
            "region_server",
            "--config",
            "prod.toml",
            "-l",
            "debug",
            "--json-logs",
            "--report-interval",
            "15",
        ]);

        assert_eq!(args.config_path, PathBuf::from("prod.toml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.report_interval, Some(15));
    }

    #[test]
    fn test_rejects_non_numeric_interval() {
        let result = CliArgs::command().try_get_matches_from(["region_server", "--report-interval", "soon"]);
        assert!(result.is_err());
    }
}
