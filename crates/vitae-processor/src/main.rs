mod setup;
mod telemetry;

use vitae_core::Config;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let processor = setup::initialize_processor(config).await?;

    setup::shutdown_signal().await;
    processor.shutdown().await;

    Ok(())
}
