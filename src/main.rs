use ci_slack_notify::error::Result;
use ci_slack_notify::logging::setup_logging;
use ci_slack_notify::{EnvironmentMap, Notifier, NotifyConfig, RunOutcome, SlackApiDispatcher};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

async fn run(env: &EnvironmentMap, config: &NotifyConfig) -> Result<RunOutcome> {
    let dispatcher = SlackApiDispatcher::new(config.api_url.clone(), config.access_token()?);
    info!("Posting to {}", dispatcher.api_url());
    Notifier::new(Arc::new(dispatcher)).run(config, env).await
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    // Snapshot once; everything below reads this map, not the process environment.
    let env: EnvironmentMap = std::env::vars().collect();

    let config = match NotifyConfig::from_env(&env) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match setup_logging(&config.logging()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&env, &config).await {
        Ok(RunOutcome::Skipped(reason)) => {
            info!(?reason, "No notification sent");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Delivered(deliveries)) => {
            info!(deliveries = deliveries.len(), "Done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
