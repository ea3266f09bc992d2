use crate::cli::{
    actions::Action,
    commands::{self, logging::LogSettings},
    dispatch, telemetry,
};
use anyhow::Result;

/// Main entry point for the CLI - builds and returns the Action
///
/// # Errors
///
/// Returns an error if telemetry initialization or action dispatch fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(LogSettings::from_matches(&matches))?;

    dispatch::handler(&matches)
}
