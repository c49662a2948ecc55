//! Squiddee - run a TLS-intercepting squid cache from a single directory
//!
//! Prepares the working directory, certificate authority and configuration,
//! then runs squid in the foreground. Optionally serves the CA certificate to
//! clients over HTTP while the proxy runs.

use anyhow::{Context, Result};
use clap::Parser;
use squiddee_bootstrap::{Bootstrap, BootstrapError, BootstrapOptions, Programs};
use squiddee_cacert_server::run_cacert_server;
use squiddee_process::SystemProcessRunner;
use squiddee_template::TemplateEngine;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Squiddee - a caching, TLS-intercepting squid in one command
#[derive(Parser, Debug)]
#[command(name = "squiddee")]
#[command(about = "Provision and run a TLS-intercepting squid caching proxy")]
#[command(version)]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
#[command(long_about = r#"
Provision and run a TLS-intercepting squid caching proxy.

The data directory holds everything squid needs: cache/, logs/, run/,
certs/, ssl_db/ and the generated squid.conf. Steps that were completed
by an earlier run (certificate, cache store, certificate database) are
skipped; squid.conf is regenerated every time.

EXAMPLES:
  # Run with defaults (./squid_data, port 3128, 5000 MB cache)
  squiddee

  # Bigger cache and a corporate CA bundle (certificate + key, PEM)
  squiddee -d /srv/squid -s "50 GB" --cacert /etc/ssl/corp-proxy.pem

  # Let clients fetch the CA with: curl -s http://proxy:8081/install | sudo sh
  squiddee --cacert-port 8081
"#)]
struct Cli {
    /// Data root directory (cache, logs, conf, ...)
    #[arg(
        short,
        long,
        env = "SQUIDDEE_DIRECTORY",
        default_value = "./squid_data"
    )]
    directory: PathBuf,

    /// Proxy listen port
    #[arg(short, long, env = "SQUIDDEE_PORT", default_value = "3128")]
    port: u16,

    /// Use a custom certificate (PEM, key included); a new one is generated otherwise.
    /// With --cacert-port this file is served as-is, so keep the key in it only
    /// when the HTTP port is not reachable by untrusted clients
    #[arg(long, env = "SQUIDDEE_CACERT")]
    cacert: Option<PathBuf>,

    /// Alternate subject for certificate generation
    #[arg(long, env = "SQUIDDEE_CACERT_SUBJECT")]
    cacert_subject: Option<String>,

    /// Maximum cache size
    #[arg(
        short = 's',
        long,
        env = "SQUIDDEE_CACHE_SIZE",
        default_value = "5000 MB"
    )]
    cache_size: String,

    /// Minimum object size
    #[arg(long, env = "SQUIDDEE_MINIMUM_OBJECT_SIZE", default_value = "0")]
    minimum_object_size: String,

    /// Maximum object size
    #[arg(
        short = 'm',
        long,
        env = "SQUIDDEE_MAXIMUM_OBJECT_SIZE",
        default_value = "350 MB"
    )]
    maximum_object_size: String,

    /// Serve the CA certificate over HTTP on this port while the proxy runs
    #[arg(long, env = "SQUIDDEE_CACERT_PORT")]
    cacert_port: Option<u16>,

    /// squid executable
    #[arg(long, env = "SQUIDDEE_SQUID_BIN", default_value = "squid")]
    squid_bin: String,

    /// openssl executable
    #[arg(long, env = "SQUIDDEE_OPENSSL_BIN", default_value = "openssl")]
    openssl_bin: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn bootstrap_options(&self) -> Result<BootstrapOptions> {
        let directory = if self.directory.is_absolute() {
            self.directory.clone()
        } else {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(&self.directory)
        };

        Ok(BootstrapOptions {
            directory,
            port: self.port,
            cacert: self.cacert.clone(),
            cacert_subject: self.cacert_subject.clone(),
            cache_size: Some(self.cache_size.clone()),
            minimum_object_size: self.minimum_object_size.clone(),
            maximum_object_size: self.maximum_object_size.clone(),
            programs: Programs {
                squid: self.squid_bin.clone(),
                openssl: self.openssl_bin.clone(),
            },
            ..Default::default()
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        "debug"
    } else {
        cli.log_level.as_str()
    };
    if let Err(e) = init_logging(log_level) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let options = cli.bootstrap_options()?;

    let server = match cli.cacert_port {
        Some(port) => {
            let server = run_cacert_server(options.certificate_path(), port)
                .await
                .context("Failed to start CA certificate server")?;
            Some(server)
        }
        None => None,
    };

    info!("Using data directory {}", options.directory.display());

    // The bootstrap blocks on external commands for as long as squid runs
    let result = tokio::task::spawn_blocking(move || {
        let runner = SystemProcessRunner::new();
        let engine = TemplateEngine::new();
        Bootstrap::new(options, &runner, &engine).run()
    })
    .await
    .context("Bootstrap task panicked")?;

    if let Some(server) = server {
        if let Err(e) = server.shutdown().await {
            warn!("Error stopping CA certificate server: {}", e);
        }
    }

    let report = result?;
    info!("Squid exited after {} steps", report.steps.len());
    Ok(())
}

/// Mirror the failing command's exit status when there is one
fn exit_status(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<BootstrapError>()
        .and_then(BootstrapError::exit_code)
        .map(|code| (code & 0xff) as u8)
        .filter(|code| *code != 0)
        .unwrap_or(1)
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .context("Failed to initialize logging filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    Ok(())
}
