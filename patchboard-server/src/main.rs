use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use serde_json::json;

use patchboard::api::{create_ui_router, AppState};
use patchboard::external::HttpApiExecutor;
use patchboard::runtime::{shared, Runtime};
use patchboard::{PatchOp, SchemaPatch};

/// Initial patch series for the default instance: a home page with one
/// welcome block, materialized through the same engine path as
/// agent-created instances.
fn bootstrap_patches() -> Vec<SchemaPatch> {
    vec![
        SchemaPatch::set("page_key", json!("home")),
        SchemaPatch::new(
            PatchOp::Add,
            "blocks",
            json!({
                "id": "welcome",
                "title": "Welcome",
                "props": {"fields": [{
                    "type": "html",
                    "key": "welcome_message",
                    "label": "",
                    "value": "<p>No UI yet. Point an agent at the patch tools to build one.</p>",
                    "editable": false
                }]}
            }),
        ),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("patchboard=info,patchboard_server=info,tower_http=info")
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let default_instance =
        std::env::var("DEFAULT_INSTANCE_ID").unwrap_or_else(|_| "default".to_string());

    let mut runtime = Runtime::new(default_instance.clone());
    let applied = runtime
        .store
        .create(&default_instance, &bootstrap_patches())?;
    info!(instance = %default_instance, applied, "bootstrapped default instance");

    let state = AppState::new(shared(runtime), Arc::new(HttpApiExecutor::new()));

    let app = create_ui_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = format!("0.0.0.0:{port}");
    info!(%addr, "starting UI runtime server");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!("port {port} is already in use (set SERVER_PORT to change it)");
        }
        Err(e) => return Err(e.into()),
    };
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_materializes_the_welcome_block() {
        let mut rt = Runtime::new("default");
        let applied = rt.store.create("default", &bootstrap_patches()).unwrap();
        assert_eq!(applied, 2);

        let schema = rt.store.get("default").unwrap();
        assert_eq!(schema.page_key, "home");
        assert_eq!(schema.blocks[0].id, "welcome");
        assert_eq!(schema.state.params["welcome_message"], json!(""));
    }
}
