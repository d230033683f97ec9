use anyhow::{Result, anyhow};

use super::RunArgs;
use crate::config::AppConfig;
use crate::core::mission::MissionRunner;
use crate::core::terminal::{print_info, print_success};
use crate::logging;

/// Run one mission and print its `RunResult` as JSON on stdout.
pub async fn run_mission_command(args: RunArgs) -> Result<()> {
    let config = AppConfig::load(args.config.as_deref())?;
    logging::init(config.log_level(), false);

    let store = args
        .store
        .or_else(|| config.store.endpoint.clone())
        .ok_or_else(|| anyhow!("No record store given. Pass --store or set [store].endpoint."))?;

    let runner = MissionRunner::from_config(&config)?;
    print_info(&format!("Running mission {} from {}", args.mission, store));

    let result = runner
        .run_mission(args.mission.trim(), &store)
        .await
        .map_err(|e| anyhow!("{} ({})", e, e.status_class().as_str()))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    print_success(&format!(
        "Mission {} finished in {:.2}s",
        args.mission, result.execution_time
    ));
    Ok(())
}
