//! `squid.conf` rendering

use squiddee_template::{TemplateRenderer, TemplateVars, SQUID_CONF};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::size::{parse_size, CacheDirDirective};
use crate::{ConfigError, FALLBACK_CACHE_SIZE};

/// Inputs to the proxy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfigOptions {
    /// Working directory root
    pub directory: PathBuf,
    /// Proxy listen port
    pub port: u16,
    /// Cache budget, e.g. `"5000 MB"`; `None` falls back to [`FALLBACK_CACHE_SIZE`]
    pub cache_size: Option<String>,
    /// Passed through to `minimum_object_size` unparsed
    pub minimum_object_size: String,
    /// Passed through to `maximum_object_size` unparsed
    pub maximum_object_size: String,
    pub cacert_path: PathBuf,
    pub cakey_path: PathBuf,
    /// TLS certificate generation helper (`security_file_certgen` / `ssl_crtd`)
    pub ssl_helper_path: PathBuf,
}

impl Default for ProxyConfigOptions {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./squid_data"),
            port: 3128,
            cache_size: Some("5000 MB".to_string()),
            minimum_object_size: "0".to_string(),
            maximum_object_size: "350 MB".to_string(),
            cacert_path: PathBuf::new(),
            cakey_path: PathBuf::new(),
            ssl_helper_path: PathBuf::new(),
        }
    }
}

impl ProxyConfigOptions {
    /// The `cache_dir` sizing fields for the configured cache budget
    pub fn cache_dir_directive(&self) -> Result<CacheDirDirective, ConfigError> {
        let cache_size = self.cache_size.as_deref().unwrap_or(FALLBACK_CACHE_SIZE);
        Ok(CacheDirDirective::from_bytes(parse_size(cache_size)?))
    }

    fn template_vars(&self) -> Result<TemplateVars, ConfigError> {
        Ok(TemplateVars::new()
            .with("here", self.directory.display())
            .with("port", self.port)
            .with("cache_dir_cfg", self.cache_dir_directive()?)
            .with("minimum_object_size", &self.minimum_object_size)
            .with("maximum_object_size", &self.maximum_object_size)
            .with("cacert", self.cacert_path.display())
            .with("cakey", self.cakey_path.display())
            .with("ssl_crtd", self.ssl_helper_path.display()))
    }
}

/// Render the configuration text without touching the filesystem
pub fn render_configuration(
    options: &ProxyConfigOptions,
    renderer: &dyn TemplateRenderer,
) -> Result<String, ConfigError> {
    let vars = options.template_vars()?;
    Ok(renderer.render(SQUID_CONF, &vars)?)
}

/// Render the configuration and write it to `path`, replacing any previous content
///
/// Size parsing and rendering happen before the file is opened, so an invalid
/// option leaves an existing configuration untouched.
pub fn write_configuration(
    path: &Path,
    options: &ProxyConfigOptions,
    renderer: &dyn TemplateRenderer,
) -> Result<(), ConfigError> {
    let conf = render_configuration(options, renderer)?;
    debug!("Rendered {} bytes of proxy configuration", conf.len());

    fs::write(path, conf).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Proxy configuration written to {}", path.display());
    Ok(())
}
