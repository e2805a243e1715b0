//! Command execution functions coordinating all release operations.
//!
//! Every command failure is reported with its recovery suggestions and
//! mapped to exit code 1.

mod helpers;
mod stage;
mod status;

use crate::cli::{Args, Command, RuntimeConfig};
use crate::error::{ReleaseError, Result};

use stage::execute_stage;
use status::execute_status;

/// Execute the main command based on parsed arguments
pub async fn execute_command(args: Args) -> Result<i32> {
    // Validate arguments
    if let Err(validation_error) = args.validate() {
        // Create output for validation errors (never quiet)
        let output = super::OutputManager::new(false, false);
        output.error(&format!("Invalid arguments: {}", validation_error));
        return Ok(1);
    }

    let config = RuntimeConfig::from(&args);

    let result = match &args.command {
        Command::Status { json } => execute_status(*json, &config).await.map(|()| 0),
        command => match command.release_args() {
            Some(release) => execute_stage(command, release, &config).await,
            None => Ok(0),
        },
    };

    match result {
        Ok(exit_code) => {
            if exit_code == 0 && !matches!(args.command, Command::Status { .. }) {
                config.success_println(&format!(
                    "Command '{}' completed successfully",
                    args.command.name()
                ));
            }
            Ok(exit_code)
        }
        Err(e) => {
            report_failure(&config, args.command.name(), &e);
            Ok(1)
        }
    }
}

fn report_failure(config: &RuntimeConfig, command: &str, error: &ReleaseError) {
    config.error_println(&format!("Command '{}' failed: {}", command, error));

    let suggestions = error.recovery_suggestions();
    if !suggestions.is_empty() {
        // stderr, shown even with --quiet
        eprintln!("\n💡 Recovery suggestions:");
        for suggestion in suggestions {
            eprintln!("  • {}", suggestion);
        }
    }
}
