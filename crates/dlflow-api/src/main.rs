use dlflow_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, router) = dlflow_api::setup::initialize_app(config.clone()).await?;

    dlflow_api::setup::server::start_server(&config, router).await?;

    state.ingest.queue.shutdown();
    Ok(())
}
