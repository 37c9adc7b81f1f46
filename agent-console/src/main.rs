use std::sync::Arc;

use agent_console::api::{self, ApiState};
use agent_console::app_state::{AppState, UiConfig};
use agent_console::config::{self, AgentBackend, Config};
use agent_console::trace::TraceLayout;
use axum::http::{header, Method};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env may carry LOG_LEVEL, so it is read before the subscriber exists
    // and its outcome logged after
    let env_file = config::load_env_file();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config::default_log_filter("agent_console").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    env_file.log();

    let config = Config::from_env()?;
    match &config.backend {
        AgentBackend::Fixture(path) => {
            tracing::info!(path = %path.display(), "Replaying recorded completions")
        }
        AgentBackend::Gateway(url) => tracing::info!(
            gateway = %url,
            region = %config.region,
            agent_alias_id = %config.agent_alias_id,
            "Invoking agent through gateway"
        ),
    }
    if config.agent_id.is_none() {
        tracing::warn!("BEDROCK_AGENT_ID is not set; gateway invocations will fail");
    }

    let app_state = Arc::new(AppState::new(
        config.build_invoker(),
        config.target(),
        TraceLayout::default(),
        UiConfig {
            title: config.ui_title.clone(),
            icon: config.ui_icon.clone(),
        },
    ));

    let api_state = ApiState {
        app_state: app_state.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let app = api::router()
        .with_state(api_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Agent console listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    app_state.shutdown().await;
    Ok(())
}
