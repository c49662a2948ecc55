//! Working directory layout and idempotence checkpoints

use squiddee_cert::CertificateMaterial;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Subdirectories created under the working root
pub const SUBDIRECTORIES: [&str; 4] = ["cache", "logs", "run", "certs"];

const CONFIG_FILE: &str = "squid.conf";
const CACHE_SENTINEL: &str = "swap.state";
const SSL_DB_DIR: &str = "ssl_db";
const CERT_FILE: &str = "squiddee.pem";
const KEY_FILE: &str = "squiddee.key";

/// Filesystem root owned by one proxy instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDirectory {
    root: PathBuf,
}

impl WorkingDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn run_dir(&self) -> PathBuf {
        self.root.join("run")
    }

    pub fn certs_dir(&self) -> PathBuf {
        self.root.join("certs")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Written by the proxy once its cache store is initialized
    pub fn cache_sentinel(&self) -> PathBuf {
        self.cache_dir().join(CACHE_SENTINEL)
    }

    pub fn ssl_db_path(&self) -> PathBuf {
        self.root.join(SSL_DB_DIR)
    }

    /// Canonical location of a generated CA certificate
    pub fn cert_path(&self) -> PathBuf {
        self.certs_dir().join(CERT_FILE)
    }

    /// Canonical location of a generated CA private key
    pub fn key_path(&self) -> PathBuf {
        self.certs_dir().join(KEY_FILE)
    }

    /// Create the root and its subdirectories, leaving existing ones alone
    ///
    /// Returns the directories that had to be created.
    pub fn ensure(&self) -> io::Result<Vec<PathBuf>> {
        let mut created = Vec::new();

        if !self.root.is_dir() {
            fs::create_dir_all(&self.root)?;
            created.push(self.root.clone());
        }

        for name in SUBDIRECTORIES {
            let path = self.root.join(name);
            if !path.is_dir() {
                fs::create_dir_all(&path)?;
                created.push(path);
            }
        }

        Ok(created)
    }

    pub fn directories_exist(&self) -> bool {
        self.root.is_dir() && SUBDIRECTORIES.iter().all(|d| self.root.join(d).is_dir())
    }

    /// A certificate and key were generated by an earlier run
    pub fn has_generated_certificate(&self) -> bool {
        CertificateMaterial::is_present(&self.cert_path(), &self.key_path())
    }

    pub fn is_cache_store_initialized(&self) -> bool {
        self.cache_sentinel().exists()
    }

    pub fn is_ssl_database_initialized(&self) -> bool {
        self.ssl_db_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout() {
        let workdir = WorkingDirectory::new("/srv/data");
        assert_eq!(workdir.config_path(), PathBuf::from("/srv/data/squid.conf"));
        assert_eq!(
            workdir.cache_sentinel(),
            PathBuf::from("/srv/data/cache/swap.state")
        );
        assert_eq!(workdir.ssl_db_path(), PathBuf::from("/srv/data/ssl_db"));
        assert_eq!(
            workdir.cert_path(),
            PathBuf::from("/srv/data/certs/squiddee.pem")
        );
        assert_eq!(
            workdir.key_path(),
            PathBuf::from("/srv/data/certs/squiddee.key")
        );
    }

    #[test]
    fn test_ensure_creates_missing_directories_once() {
        let temp = TempDir::new().unwrap();
        let workdir = WorkingDirectory::new(temp.path().join("nested").join("data"));

        let created = workdir.ensure().unwrap();
        assert_eq!(created.len(), 5);
        assert!(workdir.directories_exist());

        let created = workdir.ensure().unwrap();
        assert!(created.is_empty());
    }

    #[test]
    fn test_ensure_leaves_existing_content() {
        let temp = TempDir::new().unwrap();
        let workdir = WorkingDirectory::new(temp.path());
        fs::create_dir_all(workdir.logs_dir()).unwrap();
        fs::write(workdir.logs_dir().join("cache.log"), "keep me").unwrap();

        let created = workdir.ensure().unwrap();

        assert_eq!(created.len(), 3);
        assert!(!created.contains(&workdir.logs_dir()));
        assert_eq!(
            fs::read_to_string(workdir.logs_dir().join("cache.log")).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn test_cache_store_predicate() {
        let temp = TempDir::new().unwrap();
        let workdir = WorkingDirectory::new(temp.path());
        workdir.ensure().unwrap();

        assert!(!workdir.is_cache_store_initialized());
        fs::write(workdir.cache_sentinel(), b"").unwrap();
        assert!(workdir.is_cache_store_initialized());
    }

    #[test]
    fn test_ssl_database_predicate() {
        let temp = TempDir::new().unwrap();
        let workdir = WorkingDirectory::new(temp.path());

        assert!(!workdir.is_ssl_database_initialized());
        fs::create_dir(workdir.ssl_db_path()).unwrap();
        assert!(workdir.is_ssl_database_initialized());
    }

    #[test]
    fn test_generated_certificate_predicate() {
        let temp = TempDir::new().unwrap();
        let workdir = WorkingDirectory::new(temp.path());
        workdir.ensure().unwrap();

        assert!(!workdir.has_generated_certificate());
        fs::write(workdir.cert_path(), "cert").unwrap();
        assert!(!workdir.has_generated_certificate());
        fs::write(workdir.key_path(), "key").unwrap();
        assert!(workdir.has_generated_certificate());
    }
}
