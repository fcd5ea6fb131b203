use std::{sync::Arc, time::Duration};

use anyhow::Result;
use contafin::{
    assistant::Assistant,
    config::AppConfig,
    scheduler,
    server::{self, ServerState},
    state::AppContext,
};
use reqwest::Client;
use tokio::{net::TcpListener, task::JoinHandle, time::sleep};

pub struct TestApp {
    pub ctx: AppContext,
    pub base_url: String,
    pub client: Client,
    server: JoinHandle<anyhow::Result<()>>,
    scheduler: JoinHandle<()>,
}

impl TestApp {
    /// Boots the full service on an ephemeral port and waits for `/health`.
    pub async fn spawn(config: AppConfig) -> Result<Self> {
        let assistant = Assistant::from_app_config(&config)?;
        let ctx = AppContext::new(config, Arc::new(assistant));
        let (handle, scheduler) = scheduler::spawn(ctx.clone())?;
        let state = ServerState::new(ctx.clone(), handle);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(server::serve_with_listener(listener, state));

        let app = Self {
            ctx,
            base_url: format!("http://{addr}"),
            client: Client::new(),
            server,
            scheduler,
        };

        let mut attempts = 0;
        loop {
            match app.client.get(app.url("/health")).send().await {
                Ok(response) if response.status().is_success() => break,
                _ if attempts > 20 => anyhow::bail!("server did not become ready in time"),
                _ => {
                    attempts += 1;
                    sleep(Duration::from_millis(50)).await;
                }
            }
        }

        Ok(app)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn shutdown(self) -> Result<()> {
        self.ctx.request_shutdown();
        let _ = self.scheduler.await;
        self.server.await??;
        Ok(())
    }
}
