//! The bootstrap sequence

use squiddee_cert::{
    CertificateMaterial, CertificateOrigin, CertificateProvisioner, CertificateRequest,
};
use squiddee_config::{write_configuration, ProxyConfigOptions};
use squiddee_process::{CommandLine, OutputMode, ProcessRunner};
use squiddee_template::TemplateRenderer;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::helper::{default_helper_candidates, resolve_helper_path};
use crate::workdir::WorkingDirectory;
use crate::BootstrapError;

/// Steps of the bootstrap sequence, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    EnsureDirectories,
    EnsureCertificate,
    ResolveHelperToolPath,
    RenderConfiguration,
    InitializeCacheStore,
    InitializeSslDatabase,
    LaunchProxy,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::EnsureDirectories => "ensure directories",
            Stage::EnsureCertificate => "ensure certificate",
            Stage::ResolveHelperToolPath => "resolve TLS helper",
            Stage::RenderConfiguration => "render configuration",
            Stage::InitializeCacheStore => "initialize cache store",
            Stage::InitializeSslDatabase => "initialize SSL database",
            Stage::LaunchProxy => "launch proxy",
        };
        write!(f, "{}", name)
    }
}

/// Whether a step did work or found it already done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Performed,
    Skipped,
}

/// Steps completed by a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub steps: Vec<(Stage, StepOutcome)>,
}

impl BootstrapReport {
    pub fn outcome(&self, stage: Stage) -> Option<StepOutcome> {
        self.steps
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, outcome)| *outcome)
    }

    fn record(&mut self, stage: Stage, outcome: StepOutcome) {
        self.steps.push((stage, outcome));
    }
}

/// External executables used by the sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Programs {
    pub squid: String,
    pub openssl: String,
}

impl Default for Programs {
    fn default() -> Self {
        Self {
            squid: "squid".to_string(),
            openssl: "openssl".to_string(),
        }
    }
}

/// Options for one bootstrap run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOptions {
    /// Working root; created if absent
    pub directory: PathBuf,
    pub port: u16,
    /// Operator-supplied certificate (key bundled in the same file)
    pub cacert: Option<PathBuf>,
    /// Subject for a generated certificate; `None` uses the default subject
    pub cacert_subject: Option<String>,
    pub cache_size: Option<String>,
    pub minimum_object_size: String,
    pub maximum_object_size: String,
    /// Where to look for the TLS certificate helper, most preferred first
    pub helper_candidates: Vec<PathBuf>,
    pub programs: Programs,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./squid_data"),
            port: 3128,
            cacert: None,
            cacert_subject: None,
            cache_size: Some("5000 MB".to_string()),
            minimum_object_size: "0".to_string(),
            maximum_object_size: "350 MB".to_string(),
            helper_candidates: default_helper_candidates(),
            programs: Programs::default(),
        }
    }
}

impl BootstrapOptions {
    /// Certificate file the proxy (and the CA trust server) will use
    pub fn certificate_path(&self) -> PathBuf {
        match &self.cacert {
            Some(path) => path.clone(),
            None => WorkingDirectory::new(&self.directory).cert_path(),
        }
    }
}

/// Drives the bootstrap sequence
///
/// Steps run strictly in [`Stage`] order. The first failure aborts the run;
/// nothing created before it is removed.
pub struct Bootstrap<'a> {
    options: BootstrapOptions,
    workdir: WorkingDirectory,
    runner: &'a dyn ProcessRunner,
    renderer: &'a dyn TemplateRenderer,
}

impl<'a> Bootstrap<'a> {
    pub fn new(
        options: BootstrapOptions,
        runner: &'a dyn ProcessRunner,
        renderer: &'a dyn TemplateRenderer,
    ) -> Self {
        let workdir = WorkingDirectory::new(&options.directory);
        Self {
            options,
            workdir,
            runner,
            renderer,
        }
    }

    pub fn workdir(&self) -> &WorkingDirectory {
        &self.workdir
    }

    pub fn options(&self) -> &BootstrapOptions {
        &self.options
    }

    /// Run every step, ending with the proxy itself
    ///
    /// Returns once the proxy has exited successfully.
    pub fn run(&self) -> Result<BootstrapReport, BootstrapError> {
        let mut report = BootstrapReport::default();

        report.record(Stage::EnsureDirectories, self.ensure_directories()?);

        let (certificate, outcome) = self.ensure_certificate()?;
        report.record(Stage::EnsureCertificate, outcome);

        let helper = self.resolve_helper_path();
        report.record(Stage::ResolveHelperToolPath, StepOutcome::Performed);

        self.render_configuration(&certificate, &helper)?;
        report.record(Stage::RenderConfiguration, StepOutcome::Performed);

        report.record(Stage::InitializeCacheStore, self.initialize_cache_store()?);
        report.record(
            Stage::InitializeSslDatabase,
            self.initialize_ssl_database(&helper)?,
        );

        self.launch_proxy()?;
        report.record(Stage::LaunchProxy, StepOutcome::Performed);

        Ok(report)
    }

    pub fn ensure_directories(&self) -> Result<StepOutcome, BootstrapError> {
        let created = self
            .workdir
            .ensure()
            .map_err(|source| BootstrapError::Filesystem {
                path: self.workdir.root().to_path_buf(),
                source,
            })?;

        if created.is_empty() {
            info!("Working directory {} ready", self.workdir.root().display());
            return Ok(StepOutcome::Skipped);
        }

        for dir in &created {
            info!("Created {}", dir.display());
        }
        Ok(StepOutcome::Performed)
    }

    /// Use the supplied certificate, reuse a generated one, or generate it
    pub fn ensure_certificate(&self) -> Result<(CertificateMaterial, StepOutcome), BootstrapError> {
        if let Some(path) = &self.options.cacert {
            info!("Using supplied CA certificate {}", path.display());
            let material = CertificateMaterial::supplied(path)?;
            return Ok((material, StepOutcome::Skipped));
        }

        let cert_path = self.workdir.cert_path();
        let key_path = self.workdir.key_path();

        if self.workdir.has_generated_certificate() {
            info!("Reusing CA certificate {}", cert_path.display());
            let origin = CertificateOrigin::Existing;
            let material = CertificateMaterial::new(cert_path, key_path, origin);
            return Ok((material, StepOutcome::Skipped));
        }

        let request = CertificateRequest::new(&cert_path, &key_path)
            .with_subject(self.options.cacert_subject.clone());
        CertificateProvisioner::new(self.runner)
            .with_openssl(&self.options.programs.openssl)
            .generate(&request)?;

        let origin = CertificateOrigin::Generated;
        let material = CertificateMaterial::new(cert_path, key_path, origin);
        Ok((material, StepOutcome::Performed))
    }

    pub fn resolve_helper_path(&self) -> PathBuf {
        resolve_helper_path(&self.options.helper_candidates)
    }

    /// Regenerate `squid.conf`; never skipped
    pub fn render_configuration(
        &self,
        certificate: &CertificateMaterial,
        helper: &Path,
    ) -> Result<(), BootstrapError> {
        let options = ProxyConfigOptions {
            directory: self.workdir.root().to_path_buf(),
            port: self.options.port,
            cache_size: self.options.cache_size.clone(),
            minimum_object_size: self.options.minimum_object_size.clone(),
            maximum_object_size: self.options.maximum_object_size.clone(),
            cacert_path: certificate.cert_path.clone(),
            cakey_path: certificate.key_path.clone(),
            ssl_helper_path: helper.to_path_buf(),
        };

        write_configuration(&self.workdir.config_path(), &options, self.renderer)?;
        Ok(())
    }

    pub fn initialize_cache_store(&self) -> Result<StepOutcome, BootstrapError> {
        if self.workdir.is_cache_store_initialized() {
            info!("Cache store already initialized, skipping");
            return Ok(StepOutcome::Skipped);
        }

        info!(
            "Initializing cache store in {}",
            self.workdir.cache_dir().display()
        );
        let command = self.squid_command().args(["-z", "-N"]);
        self.run_foreground(Stage::InitializeCacheStore, &command)?;
        Ok(StepOutcome::Performed)
    }

    pub fn initialize_ssl_database(&self, helper: &Path) -> Result<StepOutcome, BootstrapError> {
        let ssl_db = self.workdir.ssl_db_path();
        if self.workdir.is_ssl_database_initialized() {
            info!("SSL certificate database already initialized, skipping");
            return Ok(StepOutcome::Skipped);
        }

        info!(
            "Initializing SSL certificate database {}",
            ssl_db.display()
        );
        let command = CommandLine::new(helper.to_string_lossy())
            .args(["-c", "-s"])
            .arg(ssl_db.to_string_lossy());
        self.run_foreground(Stage::InitializeSslDatabase, &command)?;
        Ok(StepOutcome::Performed)
    }

    /// Run the proxy in the foreground until it exits
    pub fn launch_proxy(&self) -> Result<(), BootstrapError> {
        info!("Starting proxy on port {}", self.options.port);
        let command = self.squid_command().arg("-N");
        self.run_foreground(Stage::LaunchProxy, &command)?;
        info!("Proxy exited");
        Ok(())
    }

    fn squid_command(&self) -> CommandLine {
        CommandLine::new(&self.options.programs.squid)
            .arg("-f")
            .arg(self.workdir.config_path().to_string_lossy())
    }

    fn run_foreground(&self, stage: Stage, command: &CommandLine) -> Result<(), BootstrapError> {
        self.runner
            .run_checked(command, OutputMode::Foreground)
            .map_err(|source| BootstrapError::Process { stage, source })?;
        Ok(())
    }
}
