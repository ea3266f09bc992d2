use clap::{Arg, ArgAction, ArgMatches, Command, builder::ValueParser};
use std::{fmt, str::FromStr};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_FORMAT: &str = "log-format";

/// Level names accepted by `CUSTODIAN_LOG_LEVEL`, indexed by verbosity count.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Output encoding of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}', expected pretty or json")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

/// Logging options resolved from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    /// `None` keeps the service quiet: errors only.
    pub level: Option<Level>,
    pub format: LogFormat,
}

impl LogSettings {
    #[must_use]
    pub fn from_matches(matches: &ArgMatches) -> Self {
        let count = matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0);
        let format = matches
            .get_one::<LogFormat>(ARG_LOG_FORMAT)
            .copied()
            .unwrap_or_default();
        Self {
            level: level_for(count),
            format,
        }
    }
}

/// Map a verbosity count to the level applied to custodian's own targets.
#[must_use]
pub const fn level_for(count: u8) -> Option<Level> {
    match count {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

fn parse_verbosity(value: &str) -> Result<u8, String> {
    if let Ok(count) = value.parse::<u8>()
        && count <= 5
    {
        return Ok(count);
    }

    let lowered = value.to_ascii_lowercase();
    LEVEL_NAMES
        .iter()
        .position(|name| *name == lowered)
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level '{value}'"))
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(parse_verbosity)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("CUSTODIAN_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new(ARG_LOG_FORMAT)
                .long("log-format")
                .help("Log output format: pretty or json")
                .env("CUSTODIAN_LOG_FORMAT")
                .global(true)
                .default_value("pretty")
                .value_parser(ValueParser::from(|value: &str| value.parse::<LogFormat>())),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_accepts_counts_and_names() {
        assert_eq!(parse_verbosity("0"), Ok(0));
        assert_eq!(parse_verbosity("5"), Ok(5));
        assert_eq!(parse_verbosity("INFO"), Ok(2));
        assert_eq!(parse_verbosity("trace"), Ok(4));
        assert!(parse_verbosity("6").is_err());
        assert!(parse_verbosity("loud").is_err());
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_for(0), None);
        assert_eq!(level_for(1), Some(Level::WARN));
        assert_eq!(level_for(2), Some(Level::INFO));
        assert_eq!(level_for(3), Some(Level::DEBUG));
        assert_eq!(level_for(4), Some(Level::TRACE));
        assert_eq!(level_for(9), Some(Level::TRACE));
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("Pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }

    #[test]
    fn settings_from_arguments() {
        temp_env::with_vars(
            [
                ("CUSTODIAN_LOG_LEVEL", None::<&str>),
                ("CUSTODIAN_LOG_FORMAT", None::<&str>),
            ],
            || {
                let command = with_args(Command::new("custodian"));
                let matches = command.get_matches_from(["custodian", "-vv", "--log-format", "json"]);
                assert_eq!(
                    LogSettings::from_matches(&matches),
                    LogSettings {
                        level: Some(Level::INFO),
                        format: LogFormat::Json,
                    }
                );

                let command = with_args(Command::new("custodian"));
                let matches = command.get_matches_from(["custodian"]);
                assert_eq!(
                    LogSettings::from_matches(&matches),
                    LogSettings {
                        level: None,
                        format: LogFormat::Pretty,
                    }
                );
            },
        );
    }
}
