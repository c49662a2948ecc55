//! Locating the TLS certificate generation helper

use std::path::PathBuf;
use tracing::{debug, warn};

/// Well-known helper locations, most preferred first
///
/// The last entry doubles as the fallback when none of them exist.
pub const DEFAULT_HELPER_CANDIDATES: [&str; 4] = [
    "/usr/lib64/squid/security_file_certgen",
    "/usr/lib/squid/security_file_certgen",
    "/usr/lib/squid/ssl_crtd",
    "/usr/lib64/squid/ssl_crtd",
];

pub fn default_helper_candidates() -> Vec<PathBuf> {
    DEFAULT_HELPER_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .collect()
}

/// Return the first candidate that exists
///
/// When none exists the last candidate is returned anyway; the proxy reports
/// the missing helper when it starts.
pub fn resolve_helper_path(candidates: &[PathBuf]) -> PathBuf {
    if let Some(found) = candidates.iter().find(|p| p.exists()) {
        debug!("Using TLS helper {}", found.display());
        return found.clone();
    }

    let fallback = candidates
        .last()
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_HELPER_CANDIDATES[3]));
    warn!(
        "No TLS certificate helper found, configuring {}",
        fallback.display()
    );
    fallback
}
