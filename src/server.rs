use crate::config::{Config, Source};
use crate::endpoints::handlers::{
    AppState, activate_base, clear_overlays, get_state, list_layers, toggle_overlay,
    viewer_handler,
};
use crate::engine::raster::ActivationOutcome;
use crate::engine::session::Session;
use crate::engine::status::StatusBoard;
use crate::reader::catalog::Catalog;
use crate::reader::dataset::GdalSourceFactory;
use crate::viewport::MapViewport;
use anyhow::Context;
use axum::{
    Router,
    routing::{delete, get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::{info, warn};

pub struct ViewerServer {
    config: Config,
    state: AppState,
}

impl ViewerServer {
    /// Must be called from inside the tokio runtime.
    pub fn new(config: Config, catalog: Catalog) -> anyhow::Result<Self> {
        let viewport = Arc::new(MapViewport::new(
            config.viewport_size,
            config.initial_center,
            config.initial_zoom,
        ));
        let status = Arc::new(StatusBoard::default());
        let session = Session::new(
            catalog,
            config.source.clone(),
            viewport.clone(),
            status.clone(),
            config.source.probe()?,
            Arc::new(GdalSourceFactory::new()?),
            config.poll_interval,
        );

        Ok(Self {
            config,
            state: AppState {
                session,
                viewport,
                status,
            },
        })
    }

    pub async fn start(self) -> anyhow::Result<()> {
        // A failed first layer is reported, the server still comes up.
        if let Some(initial) = &self.config.initial_layer {
            match self.state.session.activate_base(initial).await {
                ActivationOutcome::Activated { .. } => {
                    info!(layer = %initial, "initial layer ready")
                }
                other => warn!(layer = %initial, ?other, "initial layer unavailable"),
            }
        }

        let state = Arc::new(self.state);
        let mut app = Router::new()
            .route("/", get(viewer_handler))
            .route("/layers", get(list_layers))
            .route("/state", get(get_state))
            .route("/base/{key}", post(activate_base))
            .route("/overlays/{key}", post(toggle_overlay))
            .route("/overlays", delete(clear_overlays))
            .with_state(state.clone());
        if let Source::Local(root) = &self.config.source {
            app = app.nest_service("/data", ServeDir::new(root));
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        println!(
            r#"
    🚀 basemapper serving on {}

    🌍 Viewer
       → http://{}/

    📚 Layers (JSON)
       → http://{}/layers

    🔎 Viewport and status
       → http://{}/state
            "#,
            addr, addr, addr, addr
        );

        axum::serve(listener, app).await?;
        Ok(())
    }
}
