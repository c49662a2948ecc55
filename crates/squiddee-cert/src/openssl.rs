//! Self-signed CA generation through `openssl req`

use squiddee_process::{CommandLine, OutputMode, ProcessRunner};
use std::path::PathBuf;
use tracing::info;

use crate::{CertError, DEFAULT_SUBJECT, KEY_BITS, VALIDITY_DAYS};

/// Paths and subject for a certificate to generate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Distinguished name in `openssl -subj` form; `None` uses [`DEFAULT_SUBJECT`]
    pub subject: Option<String>,
}

impl CertificateRequest {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            subject: None,
        }
    }

    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject;
        self
    }

    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or(DEFAULT_SUBJECT)
    }
}

/// Generates CA certificates by running `openssl`
pub struct CertificateProvisioner<'a> {
    runner: &'a dyn ProcessRunner,
    openssl: String,
}

impl<'a> CertificateProvisioner<'a> {
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        Self {
            runner,
            openssl: "openssl".to_string(),
        }
    }

    /// Use a different `openssl` executable
    pub fn with_openssl(mut self, program: impl Into<String>) -> Self {
        self.openssl = program.into();
        self
    }

    /// Command line that creates the key pair and self-signed certificate
    pub fn command(&self, request: &CertificateRequest) -> CommandLine {
        CommandLine::new(&self.openssl)
            .args(["req", "-newkey"])
            .arg(format!("rsa:{}", KEY_BITS))
            .args(["-new", "-nodes", "-x509", "-days"])
            .arg(VALIDITY_DAYS.to_string())
            .arg("-subj")
            .arg(request.subject())
            .arg("-out")
            .arg(request.cert_path.to_string_lossy())
            .arg("-keyout")
            .arg(request.key_path.to_string_lossy())
    }

    /// Generate a new CA key pair, overwriting whatever is at the target paths
    ///
    /// A non-zero exit from `openssl` is returned as [`CertError::Generation`]
    /// carrying the command and its status. Nothing is retried.
    pub fn generate(&self, request: &CertificateRequest) -> Result<(), CertError> {
        let command = self.command(request);
        info!(
            "Generating CA certificate {} ({})",
            request.cert_path.display(),
            request.subject()
        );

        self.runner.run_checked(&command, OutputMode::Captured)?;

        info!("CA certificate written to {}", request.cert_path.display());
        Ok(())
    }
}
