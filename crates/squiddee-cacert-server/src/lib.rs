//! CA certificate distribution over HTTP
//!
//! Lets client machines fetch the proxy's CA certificate (`GET /`) or a shell
//! script that installs it into their trust store (`GET /install`). The
//! server runs as a background task independent of the proxy bootstrap.

pub mod context;
pub mod server;

pub use context::{CaCertServerContext, CertificateSource, ContentError, FileCertificateSource};
pub use server::{router, CaCertServer, CaCertServerConfig, CaCertServerHandle};

use std::net::SocketAddr;
use thiserror::Error;

/// Server lifecycle errors
#[derive(Debug, Error)]
pub enum CaCertServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server task failed: {0}")]
    Task(String),
}

/// Start a server for the certificate at `cacert_path` on every interface
pub async fn run_cacert_server(
    cacert_path: impl Into<std::path::PathBuf>,
    port: u16,
) -> Result<CaCertServerHandle, CaCertServerError> {
    let server = CaCertServer::new(
        CaCertServerConfig::on_port(port),
        CaCertServerContext::from_path(cacert_path),
    );
    server.start().await
}
