use anyhow::Result;
use std::sync::Arc;

use super::ServeArgs;
use crate::config::AppConfig;
use crate::core::mission::MissionRunner;
use crate::core::terminal;
use crate::interfaces::web::{self, AppState};
use crate::logging;

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let log_tx = logging::init(config.log_level(), false);
    terminal::print_banner();

    let runner = MissionRunner::from_config(&config)?;
    terminal::print_status("Model", &format!("{} via {}", config.llm.model, config.llm.provider_id));
    terminal::print_status(
        "Record store",
        config.store.endpoint.as_deref().unwrap_or("per request (apiEndpoint)"),
    );
    terminal::print_status("Images", &runner.image_store().dir().display().to_string());
    terminal::print_link(
        "Mission API",
        &format!("http://{}:{}", config.server.host, config.server.port),
    );

    let state = AppState {
        runner: Arc::new(runner),
        default_store: config.store.endpoint.clone(),
        allowed_origins: config.server.allowed_origins.clone(),
        log_tx,
    };
    web::serve(state, &config.server.host, config.server.port).await
}
