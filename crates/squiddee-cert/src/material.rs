//! Certificate/key path pairs

use std::path::{Path, PathBuf};

use crate::CertError;

/// Where a certificate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateOrigin {
    /// Provided by the operator; never generated or modified by squiddee
    Supplied,
    /// Found in the working directory from an earlier run
    Existing,
    /// Generated during this run
    Generated,
}

/// A CA certificate and its private key on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateMaterial {
    pub cert_path: PathBuf,
    /// Same as `cert_path` when the key is bundled in the certificate file
    pub key_path: PathBuf,
    pub origin: CertificateOrigin,
}

impl CertificateMaterial {
    /// Wrap an operator-supplied PEM bundle (certificate and key in one file)
    ///
    /// Only the file's existence is checked; its contents are not inspected.
    pub fn supplied(path: impl Into<PathBuf>) -> Result<Self, CertError> {
        let path = path.into();
        if !path.is_file() {
            return Err(CertError::MissingCertificate(path));
        }

        Ok(Self {
            key_path: path.clone(),
            cert_path: path,
            origin: CertificateOrigin::Supplied,
        })
    }

    pub fn new(
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
        origin: CertificateOrigin,
    ) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            origin,
        }
    }

    /// Both files are present on disk
    pub fn is_present(cert_path: &Path, key_path: &Path) -> bool {
        cert_path.is_file() && key_path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_supplied_certificate_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.pem");

        let err = CertificateMaterial::supplied(&missing).unwrap_err();
        match err {
            CertError::MissingCertificate(path) => assert_eq!(path, missing),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_supplied_certificate_bundles_key() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ca.pem");
        std::fs::write(&path, "not even a certificate").unwrap();

        let material = CertificateMaterial::supplied(&path).unwrap();

        assert_eq!(material.cert_path, path);
        assert_eq!(material.key_path, path);
        assert_eq!(material.origin, CertificateOrigin::Supplied);
    }

    #[test]
    fn test_is_present_requires_both_files() {
        let temp = TempDir::new().unwrap();
        let cert = temp.path().join("ca.pem");
        let key = temp.path().join("ca.key");

        assert!(!CertificateMaterial::is_present(&cert, &key));
        std::fs::write(&cert, "cert").unwrap();
        assert!(!CertificateMaterial::is_present(&cert, &key));
        std::fs::write(&key, "key").unwrap();
        assert!(CertificateMaterial::is_present(&cert, &key));
    }
}
