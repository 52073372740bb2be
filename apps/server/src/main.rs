use mandi_server::{api::app_router, build_state, config::Config, init_tracing, scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();
    let state = build_state(&config).await?;

    if let Some(every) = config.sync_interval {
        scheduler::start_sync_scheduler(state.clone(), every);
    }

    if config.cache_preload {
        let cache = state.cache.clone();
        tokio::spawn(async move {
            let outcome = cache.initialize().await;
            tracing::info!("Cache preload finished: {:?}", outcome);
        });
    }

    let router = app_router(state, &config);
    tracing::info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
