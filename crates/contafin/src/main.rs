use std::sync::Arc;

use anyhow::Context;
use contafin::{
    assistant::Assistant,
    config, scheduler,
    server::{self, ServerState},
    state::AppContext,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_tracing();
    let config = config::AppConfig::load().context("loading configuration")?;
    let assistant = Assistant::from_app_config(&config).context("building inference client")?;
    info!(
        provider = assistant.identity().provider,
        model = ?assistant.identity().model,
        "assistant ready"
    );
    let ctx = AppContext::new(config, Arc::new(assistant));

    let (scheduler_handle, scheduler_task) =
        scheduler::spawn(ctx.clone()).context("starting report scheduler")?;

    let server_state = ServerState::new(ctx.clone(), scheduler_handle);
    let server_task = tokio::spawn(async move {
        if let Err(err) = server::serve(server_state).await {
            error!(error = ?err, "server error");
        }
    });

    tokio::signal::ctrl_c().await?;
    ctx.request_shutdown();

    let _ = server_task.await;

    if let Err(err) = scheduler_task.await {
        error!(error = ?err, "scheduler task join error");
    }

    Ok(())
}
