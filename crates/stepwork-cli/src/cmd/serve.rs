use anyhow::Context;
use std::path::Path;
use stepwork_core::config::WarnLevel;
use stepwork_server::AppState;

pub fn run(root: &Path, port: Option<u16>) -> anyhow::Result<()> {
    let state =
        AppState::load(root.to_path_buf()).context("failed to load config or question script")?;

    for w in state.config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
            WarnLevel::Error => anyhow::bail!("invalid config: {}", w.message),
        }
    }

    let port = port.unwrap_or(state.config.server.port);
    tracing::info!(
        questions = state.script.len(),
        root = %root.display(),
        "loaded question script"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        tokio::select! {
            res = stepwork_server::serve(state, port) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    })
}
