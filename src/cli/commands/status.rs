//! Status command implementation.
//!
//! Displays the persisted context of the current release.

use super::helpers::context_store;
use crate::cli::RuntimeConfig;
use crate::error::{ReleaseError, Result};
use crate::stages::StageId;

/// Execute status command
pub(super) async fn execute_status(json: bool, config: &RuntimeConfig) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let store = context_store(config, &cwd);
    config.verbose_println(&format!("Reading {}", store.path().display()));

    if !store.exists() {
        if json {
            println!("{{\"status\": \"no_active_release\"}}");
        } else {
            config.println("No active release found");
        }
        return Ok(());
    }

    let context = store.load()?;

    if json {
        let json_output = serde_json::to_string_pretty(&context).map_err(ReleaseError::Json)?;
        println!("{}", json_output);
        return Ok(());
    }

    let output = config.output();
    output.section(&format!("Release {}", context.request.label()));
    config.println(&format!("Started: {}", context.started_at));
    config.println(&format!("Updated: {}", context.updated_at));
    if context.request.dry_run {
        config.println("Mode: dry run");
    }

    config.println("\nStages:");
    for stage in StageId::ALL {
        match context.result(stage) {
            Some(result) => {
                let mode = if result.dry_run { " (dry run)" } else { "" };
                config.indent(&format!("{:<14} {}{}", stage.name(), result.status, mode));
                if let Some(error) = &result.error {
                    config.indent(&format!("  {}", error));
                }
            }
            None => config.indent(&format!("{:<14} {}", stage.name(), context.status(stage))),
        }
    }

    if !context.outputs.is_empty() {
        config.println("\nOutputs:");
        for (key, value) in &context.outputs {
            config.indent(&format!("{} = {}", key, value));
        }
    }

    Ok(())
}
