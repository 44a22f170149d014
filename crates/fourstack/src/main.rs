use fourstack::{ServerBuilder, ServerConfig};
use fourstack_stats::{MemoryStatsStore, PgStatsStore, StatsStore};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = ServerConfig::from_env();
    let addr = config.bind_addr();

    match config.database_url.clone() {
        Some(url) => {
            let stats = PgStatsStore::connect(&url).await?;
            serve(addr, config, stats).await
        }
        None => {
            warn!("DATABASE_URL not set; player stats will not survive restarts");
            serve(addr, config, MemoryStatsStore::new()).await
        }
    }
}

async fn serve<S: StatsStore>(
    addr: String,
    config: ServerConfig,
    stats: S,
) -> anyhow::Result<()> {
    let server = ServerBuilder::new()
        .bind(&addr)
        .config(config)
        .build(stats)
        .await?;
    info!(%addr, "listening");
    server.run().await?;
    Ok(())
}
