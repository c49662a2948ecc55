//! HTTP listener and routing

use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::context::CaCertServerContext;
use crate::CaCertServerError;

const CACERT_CONTENT_TYPE: &str = "application/x-x509-ca-cert";
const TEXT_CONTENT_TYPE: &str = "text/plain";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// CA trust server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaCertServerConfig {
    /// Address to bind the listener
    pub bind_addr: SocketAddr,
}

impl CaCertServerConfig {
    /// Listen on every interface on `port`
    pub fn on_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        }
    }
}

/// Serves the CA certificate and its install script over plain HTTP
pub struct CaCertServer {
    config: CaCertServerConfig,
    context: Arc<CaCertServerContext>,
}

impl CaCertServer {
    pub fn new(config: CaCertServerConfig, context: CaCertServerContext) -> Self {
        Self {
            config,
            context: Arc::new(context),
        }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        router(self.context.clone())
    }

    /// Bind the listener and serve in a background task
    ///
    /// Bind failures are returned here; once this returns the server accepts
    /// requests until [`CaCertServerHandle::shutdown`] is called or the
    /// handle is dropped.
    pub async fn start(self) -> Result<CaCertServerHandle, CaCertServerError> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|source| CaCertServerError::Bind {
                addr: self.config.bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr()?;
        let router = self.build_router();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!("CA certificate server listening on http://{}", local_addr);
        info!("  - certificate: http://{}/", local_addr);
        info!("  - install script: http://{}/install", local_addr);

        Ok(CaCertServerHandle {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// Running server; dropping it also stops the server
pub struct CaCertServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl CaCertServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Close the listener and wait for the accept loop to finish
    pub async fn shutdown(mut self) -> Result<(), CaCertServerError> {
        info!("Stopping CA certificate server");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await {
            Ok(Ok(result)) => result.map_err(CaCertServerError::from),
            Ok(Err(e)) => Err(CaCertServerError::Task(e.to_string())),
            Err(_) => {
                warn!(
                    "CA certificate server did not stop within {:?}, aborting",
                    SHUTDOWN_TIMEOUT
                );
                task.abort();
                Ok(())
            }
        }
    }
}

impl Drop for CaCertServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Routes: `/` serves the certificate, `/install` the install script
pub fn router(context: Arc<CaCertServerContext>) -> Router {
    let cacert = get(serve_cacert).fallback(method_not_implemented);
    let install = get(serve_install).fallback(method_not_implemented);

    Router::new()
        .route("/", cacert)
        .route("/install", install.clone())
        .route("/install/", install)
        .fallback(not_found)
        .layer(middleware::from_fn(reject_head))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn serve_cacert(State(context): State<Arc<CaCertServerContext>>) -> Response {
    match context.cacert_bytes().await {
        Ok(body) => respond(StatusCode::OK, CACERT_CONTENT_TYPE, body),
        Err(e) => {
            error!("Cannot serve CA certificate: {}", e);
            text(
                StatusCode::INTERNAL_SERVER_ERROR,
                "CA certificate unavailable",
            )
        }
    }
}

async fn serve_install(State(context): State<Arc<CaCertServerContext>>) -> Response {
    match context.install_bytes().await {
        Ok(body) => respond(StatusCode::OK, TEXT_CONTENT_TYPE, body),
        Err(e) => {
            error!("Cannot serve install script: {}", e);
            text(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Install script unavailable",
            )
        }
    }
}

async fn not_found() -> Response {
    text(StatusCode::NOT_FOUND, "Resource not found; please load /.")
}

async fn method_not_implemented() -> Response {
    text(
        StatusCode::NOT_IMPLEMENTED,
        "Unsupported method; use GET method",
    )
}

async fn reject_head(request: Request, next: Next) -> Response {
    if request.method() == Method::HEAD {
        return text(
            StatusCode::INTERNAL_SERVER_ERROR,
            "HEAD method not supported; use GET method",
        );
    }
    next.run(request).await
}

fn text(status: StatusCode, message: &'static str) -> Response {
    respond(status, TEXT_CONTENT_TYPE, message)
}

fn respond(status: StatusCode, content_type: &'static str, body: impl IntoResponse) -> Response {
    let headers = [(header::CONTENT_TYPE, content_type)];
    (status, headers, body).into_response()
}
