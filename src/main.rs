use anyhow::Context;
use tracing_subscriber::EnvFilter;

use parley::app::App;
use parley::providers::PollinationsClient;
use parley::services::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let db = Database::new().context("Failed to open database")?;
    tracing::info!("Database ready");

    App::new(db, PollinationsClient::new()).run().await
}
