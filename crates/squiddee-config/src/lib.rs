//! Proxy configuration generation
//!
//! Turns the operator-facing sizing options into `squid.conf` directives and
//! renders the configuration file from the built-in template.

pub mod generator;
pub mod size;

pub use generator::{render_configuration, write_configuration, ProxyConfigOptions};
pub use size::{parse_size, CacheDirDirective};

use squiddee_template::TemplateError;
use std::path::PathBuf;
use thiserror::Error;

/// Cache size used when none is configured at all
pub const FALLBACK_CACHE_SIZE: &str = "5 GB";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid size {input:?}: {reason}")]
    InvalidSize { input: String, reason: String },

    #[error("Failed to render configuration: {0}")]
    Render(#[from] TemplateError),

    #[error("Failed to write configuration file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
