use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use ticker_common::observability::{init_logging, LogConfig};
use ticker_config::{TargetSpec, TickerConfig, TickerConfigLoader};
use ticker_publish::{PublishTarget, RemoteApiTarget, RepositoryPatchTarget, RepositorySettings};
use ticker_server::webhook::{build_router, AppState};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    // 1) Load config (env wins)
    let config_path = std::env::var("TICKER_CONFIG").unwrap_or_else(|_| "ticker.yaml".into());
    let cfg: TickerConfig = TickerConfigLoader::new().with_file(&config_path).load()?;

    init_logging(LogConfig::default())?;

    let target = build_target(&cfg.target)?;
    let state = Arc::new(AppState { target });

    let addr: SocketAddr = cfg
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen_addr: {}", cfg.listen_addr))?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "webhook server listening");

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

fn build_target(spec: &TargetSpec) -> Result<Arc<dyn PublishTarget>> {
    let target: Arc<dyn PublishTarget> = match spec {
        TargetSpec::Remote { config } => {
            tracing::info!(endpoint = %config.endpoint, "using remote API target");
            Arc::new(
                RemoteApiTarget::new(&config.endpoint, config.secret.clone())
                    .map_err(|e| anyhow::anyhow!("remote target init failed: {e}"))?,
            )
        }
        TargetSpec::Repository { config } => {
            tracing::info!(
                owner = %config.owner,
                repo = %config.repo,
                path = %config.path,
                branch = %config.branch,
                "using repository patch target"
            );
            Arc::new(
                RepositoryPatchTarget::new(RepositorySettings {
                    token: config.token.clone(),
                    owner: config.owner.clone(),
                    repo: config.repo.clone(),
                    path: config.path.clone(),
                    branch: config.branch.clone(),
                    commit_message: config.commit_message.clone(),
                    api_base: config.api_base.clone(),
                })
                .map_err(|e| anyhow::anyhow!("repository target init failed: {e}"))?,
            )
        }
    };
    Ok(target)
}
