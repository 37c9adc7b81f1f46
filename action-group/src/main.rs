use std::sync::Arc;

use action_group::api::{self, ActionState};
use action_group::config::{self, Config};
use action_group::store::{InMemoryTableStore, SqliteTableStore, TableStore};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config::default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn TableStore> = match &config.database_url {
        Some(url) => {
            tracing::info!(database_url = %url, "Connecting table store");
            Arc::new(SqliteTableStore::connect(url).await?)
        }
        None => {
            tracing::warn!("ACTION_GROUP_DATABASE_URL not set; serving an empty in-memory store");
            Arc::new(InMemoryTableStore::new())
        }
    };

    let app = api::router()
        .with_state(ActionState {
            store,
            table: config.table.clone(),
        })
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, table = %config.table, "Action endpoint listening");

    axum::serve(listener, app).await?;
    Ok(())
}
