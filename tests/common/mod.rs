//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use upgrade_router::http::SessionTracker;
use upgrade_router::mapping::{creator_fn, Creator, Rejection, UpgradeRequest, UpgradeResponse};
use upgrade_router::{HttpServer, RouterConfig, Shutdown, UpgradeFactory};

/// A running server on an ephemeral port. Shuts down on drop.
pub struct TestServer {
    pub addr: SocketAddr,
    pub factory: Arc<UpgradeFactory>,
    pub sessions: Arc<SessionTracker>,
    pub updates: mpsc::UnboundedSender<RouterConfig>,
    shutdown: Arc<Shutdown>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_server(config: RouterConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let (updates, config_updates) = mpsc::unbounded_channel();

    let test_server = TestServer {
        addr,
        factory: server.factory(),
        sessions: server.sessions(),
        updates,
        shutdown: server.shutdown_handle(),
    };
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates).await;
    });
    test_server
}

/// A creator whose identity is the status it rejects with.
pub fn tagged(status: u16) -> Arc<dyn Creator> {
    let status = StatusCode::from_u16(status).unwrap();
    creator_fn(move |_, _| Err(Rejection::new(status, "tagged")))
}

/// The tag of a creator built by `tagged`.
pub fn tag_of(creator: &Arc<dyn Creator>) -> u16 {
    match creator.create(&UpgradeRequest::new("/"), &mut UpgradeResponse::default()) {
        Err(rejection) => rejection.status.as_u16(),
        Ok(_) => panic!("not a tagged creator"),
    }
}
