use std::sync::Arc;

use towfleets::api::{AccountAPI, DynAPI};
use towfleets::config::Config;
use towfleets::db::PgPool;
use towfleets::engine::Engine;
use towfleets::error::Error;
use towfleets::memory::MemoryEngine;
use towfleets::server::serve;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let settings = config.settings();

    let api: DynAPI = match &config.database_url {
        Some(url) => {
            let PgPool(pool) = PgPool::new(url, config.database_max_connections).await?;

            Arc::new(Engine::new(pool, settings).await?)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");

            Arc::new(MemoryEngine::new(settings)?)
        }
    };

    if let Some(admin) = &config.admin {
        let member = api.ensure_admin(&admin.email, &admin.password).await?;
        tracing::info!(id = %member.id, "admin account ready");
    }

    serve(api, config.listen_addr).await
}
