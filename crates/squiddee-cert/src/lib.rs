//! CA certificate provisioning
//!
//! Makes sure a CA certificate and private key exist for the proxy to sign
//! intercepted sites with. Generation is delegated to `openssl`; a certificate
//! supplied by the operator is used as-is.

pub mod material;
pub mod openssl;

pub use material::{CertificateMaterial, CertificateOrigin};
pub use openssl::{CertificateProvisioner, CertificateRequest};

use squiddee_process::ProcessError;
use std::path::PathBuf;
use thiserror::Error;

/// Subject used when the operator does not provide one
pub const DEFAULT_SUBJECT: &str =
    "/C=FR/ST=France/L=Lyon/O=squiddee/OU=squiddee/CN=squiddee.example.org";

/// RSA modulus size of generated keys
pub const KEY_BITS: u32 = 2048;

/// Validity of generated certificates
pub const VALIDITY_DAYS: u32 = 3650;

/// Certificate errors
#[derive(Debug, Error)]
pub enum CertError {
    #[error("Certificate generation failed: {0}")]
    Generation(#[from] ProcessError),

    #[error("Certificate file not found: {}", .0.display())]
    MissingCertificate(PathBuf),
}

impl CertError {
    /// Exit status of the generation command, if it ran and failed
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CertError::Generation(e) => e.exit_code(),
            CertError::MissingCertificate(_) => None,
        }
    }
}
