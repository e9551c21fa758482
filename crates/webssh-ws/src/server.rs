//! HTTP/WebSocket server
//!
//! Builds the axum router and serves it.

use axum::{
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use webssh_core::{ConfigStore, HostKeyPolicy, JsonConfigStore, RusshConnector, Settings, SshConnector};

use crate::handler::websocket_handler;
use crate::pages::{index, save_config, show_config};
use crate::session::BridgeOptions;
use crate::Result;

/// Shared server state
#[derive(Clone)]
pub struct WsState {
    /// Source of the connection config, read per connection
    pub config_store: Arc<dyn ConfigStore>,
    /// SSH adapter used by every bridge session
    pub connector: Arc<dyn SshConnector>,
    /// Bridge settings
    pub options: BridgeOptions,
}

/// Build the router: terminal page, config form, WebSocket endpoint
pub fn router(state: Arc<WsState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/config", get(show_config).post(save_config))
        .route("/ws", get(websocket_handler))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builder for the server
pub struct WsServerBuilder {
    addr: SocketAddr,
    options: BridgeOptions,
    config_store: Arc<dyn ConfigStore>,
    connector: Arc<dyn SshConnector>,
}

impl WsServerBuilder {
    /// Builder wired with the file config store and the `russh` connector
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            addr: settings.socket_addr()?,
            options: BridgeOptions::from(settings),
            config_store: Arc::new(JsonConfigStore::new(&settings.ssh.config_file)),
            connector: Arc::new(RusshConnector::from_settings(&settings.ssh)),
        })
    }

    /// Shared state for the router
    pub fn state(&self) -> Arc<WsState> {
        Arc::new(WsState {
            config_store: self.config_store.clone(),
            connector: self.connector.clone(),
            options: self.options.clone(),
        })
    }

    /// Bind and serve until the task is aborted
    pub async fn start(self) -> Result<()> {
        if self.options.host_key_policy == HostKeyPolicy::AcceptAny {
            warn!("Unknown SSH host keys will be accepted without verification");
        } else {
            info!("Host key policy: {}", self.options.host_key_policy.describe());
        }

        let app = router(self.state());

        info!("webssh listening on http://{}", self.addr);
        info!("Terminal: http://{}/  Config: http://{}/config", self.addr, self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Start the server from settings
pub async fn start_server(settings: &Settings) -> Result<()> {
    WsServerBuilder::from_settings(settings)?.start().await
}
