//! HTTP server setup and upgrade dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router with the upgrade handler on every path
//! - Wire up middleware (request ID, tracing)
//! - Resolve the target path through the upgrade factory
//! - Negotiate extensions, call the creator, hand off to the session pump
//! - Apply reloaded configurations through a stop/start cycle
//!
//! # Status codes
//! - 404: no mapping matches the path
//! - 503: the live session cap is reached
//! - creator's status: the creator rejected the upgrade
//! - axum's rejection: the request is not a valid upgrade

use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::RouterConfig;
use crate::extensions::ExtensionConfig;
use crate::factory::UpgradeFactory;
use crate::http::request::{request_id, upgrade_request};
use crate::http::sessions::SessionTracker;
use crate::http::websocket::run_session;
use crate::lifecycle::shutdown::{wait_for, Shutdown};
use crate::lifecycle::startup::{reconfigure, start_factory, StartupError};
use crate::mapping::{SessionInfo, UpgradeResponse};
use crate::observability::metrics::{self, outcome};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("factory failed to start: {0}")]
    Startup(#[from] StartupError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub factory: Arc<UpgradeFactory>,
    pub sessions: Arc<SessionTracker>,
    pub shutdown: Arc<Shutdown>,
}

/// HTTP server accepting WebSocket upgrades.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: RouterConfig,
}

impl HttpServer {
    /// Start a fresh factory from `config` and build the server around it.
    pub fn new(config: RouterConfig) -> Result<Self, ServerError> {
        let factory = Arc::new(UpgradeFactory::new());
        start_factory(&factory, &config)?;
        Ok(Self::with_factory(factory, config))
    }

    /// Serve an already configured factory.
    pub fn with_factory(factory: Arc<UpgradeFactory>, config: RouterConfig) -> Self {
        let state = AppState {
            factory,
            sessions: SessionTracker::new(config.listener.max_sessions),
            shutdown: Arc::new(Shutdown::new()),
        };
        let router = Self::build_router(state.clone());
        Self {
            router,
            state,
            config,
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(upgrade_handler))
            .route("/{*path}", any(upgrade_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    pub fn factory(&self) -> Arc<UpgradeFactory> {
        self.state.factory.clone()
    }

    pub fn sessions(&self) -> Arc<SessionTracker> {
        self.state.sessions.clone()
    }

    /// Handle that stops the server and every live session when triggered.
    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        self.state.shutdown.clone()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configurations received on `config_updates` replace the running
    /// one. Returns once the shutdown handle fires.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<RouterConfig>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(reload_loop(
            self.state.clone(),
            self.config.clone(),
            config_updates,
        ));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait_for(self.state.shutdown.subscribe()))
            .await?;

        if let Err(e) = self.state.factory.stop() {
            tracing::warn!(error = %e, "Factory was not running at shutdown");
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn reload_loop(
    state: AppState,
    mut current: RouterConfig,
    mut updates: mpsc::UnboundedReceiver<RouterConfig>,
) {
    let mut shutdown = state.shutdown.subscribe();
    loop {
        let next = tokio::select! {
            next = updates.recv() => match next {
                Some(next) => next,
                None => return,
            },
            _ = shutdown.recv() => return,
        };

        match reconfigure(&state.factory, &current, &next) {
            Ok(()) => {
                state.sessions.set_max_sessions(next.listener.max_sessions);
                tracing::info!(mappings = next.mappings.len(), "Configuration reloaded");
                current = next;
            }
            Err(e) => {
                tracing::error!(error = %e, "Configuration reload failed");
            }
        }
    }
}

/// Upgrade handler for every path.
async fn upgrade_handler(
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request_id = request_id(&headers).to_string();
    let path = uri.path();

    let Some(matched) = state.factory.get_match_detail(path) else {
        tracing::warn!(request_id = %request_id, path = %path, "No mapping matched");
        metrics::record_upgrade(outcome::NO_MATCH);
        return (StatusCode::NOT_FOUND, "No matching mapping").into_response();
    };
    tracing::trace!(request_id = %request_id, path = %path, spec = %matched.spec(), "Mapping matched");

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::debug!(request_id = %request_id, error = %rejection, "Not an upgrade request");
            metrics::record_upgrade(outcome::NOT_UPGRADE);
            return rejection.into_response();
        }
    };

    let Some(guard) = state.sessions.try_open(path) else {
        tracing::warn!(request_id = %request_id, active = state.sessions.active(), "Session cap reached");
        metrics::record_upgrade(outcome::OVER_CAPACITY);
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many sessions").into_response();
    };

    let mut request = upgrade_request(&uri, &headers);
    request.path_params = matched.path_params.clone();

    let negotiated = state.factory.negotiate(&request.requested_extensions);
    let mut response = UpgradeResponse {
        accepted_subprotocol: None,
        extensions: negotiated.iter().map(|unit| unit.negotiated()).collect(),
    };

    let endpoint = match matched.creator().create(&request, &mut response) {
        Ok(endpoint) => endpoint,
        Err(rejection) => {
            tracing::warn!(
                request_id = %request_id,
                path = %path,
                status = %rejection.status,
                reason = %rejection.reason,
                "Upgrade rejected"
            );
            metrics::record_upgrade(outcome::REJECTED);
            return (rejection.status, rejection.reason).into_response();
        }
    };

    let subprotocol = response
        .accepted_subprotocol
        .take()
        .filter(|protocol| {
            let offered = request.offers_subprotocol(protocol);
            if !offered {
                tracing::warn!(request_id = %request_id, protocol = %protocol, "Creator chose a subprotocol the client did not offer");
            }
            offered
        });

    let policy = state.factory.session_config();
    let mut ws = ws
        .max_message_size(policy.max_message_size())
        .max_frame_size(policy.max_frame_size)
        .read_buffer_size(policy.input_buffer_size)
        .write_buffer_size(policy.output_buffer_size);
    if let Some(protocol) = &subprotocol {
        ws = ws.protocols([protocol.clone()]);
    }

    let info = SessionInfo {
        id: guard.id(),
        path: path.to_string(),
        path_params: request.path_params,
        subprotocol,
        extensions: response.extensions,
    };
    let extension_header = render_extensions(&info.extensions);
    tracing::info!(
        request_id = %request_id,
        session_id = %info.id,
        path = %info.path,
        spec = %matched.spec(),
        subprotocol = ?info.subprotocol,
        "Upgrade accepted"
    );

    let shutdown = state.shutdown.subscribe();
    let mut http_response = ws.on_upgrade(move |socket| {
        run_session(socket, endpoint, info, policy, guard, shutdown)
    });
    if let Some(value) = extension_header {
        http_response
            .headers_mut()
            .insert(header::SEC_WEBSOCKET_EXTENSIONS, value);
    }
    metrics::record_upgrade(outcome::ACCEPTED);
    http_response
}

fn render_extensions(chain: &[ExtensionConfig]) -> Option<HeaderValue> {
    if chain.is_empty() {
        return None;
    }
    HeaderValue::from_str(&ExtensionConfig::render_header(chain)).ok()
}
