//! Per-host issuance: key, request configuration, CSR, signature, bundle.

use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::artifacts::{ensure_private_dir, exists, restrict_to_owner, CaArtifacts, HostArtifacts};
use crate::bundle::write_bundle;
use crate::ca::{bootstrap, CaBootstrap};
use crate::error::{PkiError, Result};
use crate::request_config::RequestConfig;
use crate::settings::{FailurePolicy, Mode, Settings};
use crate::tool::{DumpKind, PkiBackend};

/// Furthest point a host's pipeline reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Nothing usable produced yet
    Pending,
    KeyReady,
    CsrReady,
    /// CSR produced and, by request, not signed
    Stopped,
    Signed,
}

/// What happened to one host.
#[derive(Debug)]
pub struct HostReport {
    pub host: String,
    pub files: HostArtifacts,
    pub state: HostState,
    /// Per-host errors; with [`FailurePolicy::StopHost`] at most one
    pub errors: Vec<PkiError>,
    /// Combined PEM file, when one was written
    pub bundle: Option<PathBuf>,
    /// Text dumps of the CSR or certificate, in verbose mode
    pub dumps: Vec<String>,
}

impl HostReport {
    fn new(host: &str, files: HostArtifacts) -> Self {
        Self {
            host: host.to_string(),
            files,
            state: HostState::Pending,
            errors: Vec::new(),
            bundle: None,
            dumps: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    /// True if the host was passed over because there was no key to renew.
    pub fn skipped(&self) -> bool {
        matches!(self.errors.first(), Some(PkiError::MissingKey(_)))
    }
}

/// Result of a whole run.
#[derive(Debug)]
pub struct RunReport {
    /// CA used for signing, in CA mode
    pub ca: Option<CaBootstrap>,
    /// One report per host, in the order given
    pub hosts: Vec<HostReport>,
}

/// Drives the pipeline for individual hosts.
pub struct Issuer<'a> {
    settings: &'a Settings,
    backend: &'a dyn PkiBackend,
    ca: Option<&'a CaArtifacts>,
}

impl<'a> Issuer<'a> {
    /// `ca` must be present when `settings.mode` is [`Mode::Ca`]; without it
    /// every host fails with [`PkiError::NoCa`].
    pub const fn new(
        settings: &'a Settings,
        backend: &'a dyn PkiBackend,
        ca: Option<&'a CaArtifacts>,
    ) -> Self {
        Self {
            settings,
            backend,
            ca,
        }
    }

    /// Run the pipeline for `host`.
    ///
    /// Per-host problems end up in the report; only fatal errors (see
    /// [`PkiError::is_fatal`]) are returned as `Err`.
    pub async fn issue(&self, host: &str) -> Result<HostReport> {
        info!(host, "working on host");
        let files = HostArtifacts::new(&self.settings.out_dir, host);
        let mut report = HostReport::new(host, files.clone());

        match self.run(&files, &mut report).await {
            Ok(()) => Ok(report),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(host, error = %e, "giving up on host");
                report.errors.push(e);
                Ok(report)
            }
        }
    }

    async fn run(&self, files: &HostArtifacts, report: &mut HostReport) -> Result<()> {
        let settings = self.settings;
        if settings.mode.uses_ca() && self.ca.is_none() {
            return Err(PkiError::NoCa);
        }

        let key_ready = if settings.mode.generates_key() {
            ensure_private_dir(&files.dir).await?;
            let generated = self.backend.generate_key(&files.key, settings.bits, None).await;
            let generated = self.tolerate(generated, report)?;
            if exists(&files.key).await {
                restrict_to_owner(&files.key).await?;
            }
            generated
        } else if exists(&files.key).await {
            true
        } else {
            return Err(PkiError::MissingKey(files.key.clone()));
        };
        if key_ready {
            report.state = HostState::KeyReady;
        }

        RequestConfig::for_host(settings, &report.host)
            .write(&files.config)
            .await?;
        let csr = self
            .backend
            .create_csr(&files.config, &files.key, &files.csr)
            .await;
        let csr_ready = self.tolerate(csr, report)?;
        if csr_ready {
            report.state = HostState::CsrReady;
        }

        if !settings.mode.signs() {
            if csr_ready {
                self.dump(DumpKind::Request, &files.csr, report).await;
                report.state = HostState::Stopped;
            }
            return Ok(());
        }

        let signed = match (settings.mode, self.ca) {
            (Mode::Ca, Some(ca)) => {
                self.backend
                    .ca_sign(&files.csr, &files.config, ca, settings.days, &files.cert)
                    .await
            }
            (Mode::Ca, None) => return Err(PkiError::NoCa),
            (Mode::SelfSigned | Mode::Csr | Mode::Renew, _) => {
                self.backend
                    .self_sign(&files.csr, &files.config, &files.key, settings.days, &files.cert)
                    .await
            }
        };
        if !self.tolerate(signed, report)? {
            return Ok(());
        }
        report.state = HostState::Signed;
        self.dump(DumpKind::Certificate, &files.cert, report).await;

        if exists(&files.key).await {
            report.bundle = Some(write_bundle(&files.cert, &files.key).await?);
        }

        Ok(())
    }

    /// Verbose text dump of `path`; a failed dump is only a warning.
    async fn dump(&self, kind: DumpKind, path: &Path, report: &mut HostReport) {
        if !self.settings.verbose {
            return;
        }
        match self.backend.dump_text(kind, path).await {
            Ok(text) => report.dumps.push(text),
            Err(e) => warn!(host = %report.host, error = %e, "could not dump {}", path.display()),
        }
    }

    /// Whether a step succeeded. Under [`FailurePolicy::KeepGoing`] a tool
    /// failure is recorded and reported as `false`; any other error is
    /// passed through.
    fn tolerate(&self, result: Result<()>, report: &mut HostReport) -> Result<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(e)
                if e.is_tool_error()
                    && self.settings.failure_policy == FailurePolicy::KeepGoing =>
            {
                warn!(host = %report.host, error = %e, "continuing after failure");
                report.errors.push(e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Issue for every host, bootstrapping the CA first when the mode needs it.
///
/// Hosts run `settings.jobs` at a time; reports keep the order of `hosts`.
/// The CA bootstrap completes before any host starts.
pub async fn issue_all(
    settings: &Settings,
    backend: &dyn PkiBackend,
    hosts: &[String],
) -> Result<RunReport> {
    let ca = if settings.mode.uses_ca() {
        Some(bootstrap(settings, backend).await?)
    } else {
        None
    };

    let issuer = Issuer::new(settings, backend, ca.as_ref().map(|c| &c.artifacts));
    let reports = stream::iter(hosts)
        .map(|host| issuer.issue(host))
        .buffered(settings.jobs.max(1))
        .try_collect()
        .await?;

    Ok(RunReport { ca, hosts: reports })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBackend;

    fn settings_in(dir: &Path, mode: Mode) -> Settings {
        let mut settings = Settings::new(mode);
        settings.out_dir = dir.to_path_buf();
        settings.ca.dir = dir.join("CA");
        settings
    }

    #[tokio::test]
    async fn self_signed_host_gets_every_artifact() {
        let root = tempfile::tempdir().unwrap();
        let mut settings = settings_in(root.path(), Mode::SelfSigned);
        settings.alt_names.domains = vec!["example.com".into()];
        settings.alt_names.ip = vec!["10.0.0.1".parse().unwrap()];
        settings.subject.country = Some("US".into());
        let backend = RecordingBackend::default();

        let report = Issuer::new(&settings, &backend, None)
            .issue("api")
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.state, HostState::Signed);
        assert_eq!(
            backend.operations(),
            vec!["generate_key", "create_csr", "self_sign"]
        );

        let config = std::fs::read_to_string(root.path().join("api/api.config")).unwrap();
        let dns = config.find("DNS.0 = api.example.com\n").unwrap();
        let ip = config.find("IP.0 = 10.0.0.1\n").unwrap();
        assert!(dns < ip);
        assert!(config.contains("C  = US\n"));

        let bundle = report.bundle.unwrap();
        assert_eq!(bundle, root.path().join("api/api.pem"));
        let mut expected = std::fs::read(root.path().join("api/api.cert")).unwrap();
        expected.extend(std::fs::read(root.path().join("api/api.key")).unwrap());
        assert_eq!(std::fs::read(bundle).unwrap(), expected);
    }

    #[tokio::test]
    async fn csr_mode_stops_before_signing() {
        let root = tempfile::tempdir().unwrap();
        let mut settings = settings_in(root.path(), Mode::Csr);
        settings.verbose = true;
        let backend = RecordingBackend::default();

        let report = Issuer::new(&settings, &backend, None)
            .issue("mail")
            .await
            .unwrap();

        assert_eq!(report.state, HostState::Stopped);
        assert_eq!(
            backend.operations(),
            vec!["generate_key", "create_csr", "dump_text"]
        );
        assert_eq!(report.dumps.len(), 1);
        assert!(report.files.csr.exists());
        assert!(!report.files.cert.exists());
        assert!(report.bundle.is_none());
    }

    #[tokio::test]
    async fn renew_reuses_existing_key() {
        let root = tempfile::tempdir().unwrap();
        let settings = settings_in(root.path(), Mode::Renew);
        let files = HostArtifacts::new(root.path(), "www");
        std::fs::create_dir_all(&files.dir).unwrap();
        std::fs::write(&files.key, "existing key").unwrap();
        let backend = RecordingBackend::default();

        let report = Issuer::new(&settings, &backend, None)
            .issue("www")
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(backend.operations(), vec!["create_csr"]);
        assert_eq!(std::fs::read_to_string(&files.key).unwrap(), "existing key");
    }

    #[tokio::test]
    async fn renew_without_key_skips_only_that_host() {
        let root = tempfile::tempdir().unwrap();
        let settings = settings_in(root.path(), Mode::Renew);
        let present = HostArtifacts::new(root.path(), "present");
        std::fs::create_dir_all(&present.dir).unwrap();
        std::fs::write(&present.key, "key").unwrap();
        let backend = RecordingBackend::default();

        let hosts = vec!["absent".to_string(), "present".to_string()];
        let run = issue_all(&settings, &backend, &hosts).await.unwrap();

        assert!(run.ca.is_none());
        assert!(run.hosts[0].skipped());
        assert_eq!(run.hosts[0].state, HostState::Pending);
        assert!(!root.path().join("absent/absent.csr").exists());
        assert!(run.hosts[1].succeeded());
        assert!(present.csr.exists());
    }

    #[tokio::test]
    async fn failed_key_generation_stops_the_host() {
        let root = tempfile::tempdir().unwrap();
        let settings = settings_in(root.path(), Mode::SelfSigned);
        let backend = RecordingBackend::failing_on("generate_key");

        let hosts = vec!["one".to_string(), "two".to_string()];
        let run = issue_all(&settings, &backend, &hosts).await.unwrap();

        for report in &run.hosts {
            assert_eq!(report.state, HostState::Pending);
            assert_eq!(report.errors.len(), 1);
            assert!(!report.skipped());
        }
        assert_eq!(backend.operations(), vec!["generate_key", "generate_key"]);
    }

    #[tokio::test]
    async fn keep_going_attempts_remaining_steps() {
        let root = tempfile::tempdir().unwrap();
        let mut settings = settings_in(root.path(), Mode::SelfSigned);
        settings.failure_policy = FailurePolicy::KeepGoing;
        let backend = RecordingBackend::failing_on("generate_key");

        let report = Issuer::new(&settings, &backend, None)
            .issue("flaky")
            .await
            .unwrap();

        assert_eq!(
            backend.operations(),
            vec!["generate_key", "create_csr", "self_sign"]
        );
        assert_eq!(report.errors.len(), 1);
        assert!(!report.succeeded());
        // no key on disk, so nothing to bundle
        assert!(report.bundle.is_none());
    }

    #[tokio::test]
    async fn ca_mode_bootstraps_once_and_signs_every_host() {
        let root = tempfile::tempdir().unwrap();
        let settings = settings_in(root.path(), Mode::Ca);
        let backend = RecordingBackend::default();

        let hosts = vec!["a".to_string(), "b".to_string()];
        let run = issue_all(&settings, &backend, &hosts).await.unwrap();

        assert!(run.ca.as_ref().is_some_and(|ca| ca.created));
        assert_eq!(
            backend.operations(),
            vec![
                "random_passphrase",
                "generate_key",
                "self_sign_ca",
                "generate_key",
                "create_csr",
                "ca_sign",
                "generate_key",
                "create_csr",
                "ca_sign",
            ]
        );
        assert!(run.hosts.iter().all(|r| r.bundle.is_some()));
    }

    #[tokio::test]
    async fn concurrent_jobs_keep_host_order() {
        let root = tempfile::tempdir().unwrap();
        let mut settings = settings_in(root.path(), Mode::Csr);
        settings.jobs = 4;
        let backend = RecordingBackend::default();

        let hosts: Vec<String> = (0..6).map(|i| format!("node{i}")).collect();
        let run = issue_all(&settings, &backend, &hosts).await.unwrap();

        let order: Vec<&str> = run.hosts.iter().map(|r| r.host.as_str()).collect();
        assert_eq!(order, vec!["node0", "node1", "node2", "node3", "node4", "node5"]);
        assert!(run.hosts.iter().all(HostReport::succeeded));
    }

    #[tokio::test]
    async fn ca_mode_without_ca_is_refused() {
        let root = tempfile::tempdir().unwrap();
        let settings = settings_in(root.path(), Mode::Ca);
        let backend = RecordingBackend::default();

        let err = Issuer::new(&settings, &backend, None)
            .issue("x")
            .await
            .unwrap_err();

        assert!(matches!(err, PkiError::NoCa));
        assert!(err.is_fatal());
        assert!(backend.operations().is_empty());
        assert!(!root.path().join("x").exists());
    }

    #[tokio::test]
    async fn failed_signing_under_keep_going_stays_at_csr() {
        let root = tempfile::tempdir().unwrap();
        let mut settings = settings_in(root.path(), Mode::SelfSigned);
        settings.failure_policy = FailurePolicy::KeepGoing;
        settings.verbose = true;
        let backend = RecordingBackend::failing_on("self_sign");

        let report = Issuer::new(&settings, &backend, None)
            .issue("y")
            .await
            .unwrap();

        assert_eq!(report.state, HostState::CsrReady);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.files.cert.exists());
        assert!(report.bundle.is_none());
        // no certificate to dump
        assert_eq!(
            backend.operations(),
            vec!["generate_key", "create_csr", "self_sign"]
        );
    }

    #[tokio::test]
    async fn stale_certificate_is_not_bundled_after_failed_signing() {
        let root = tempfile::tempdir().unwrap();
        let mut settings = settings_in(root.path(), Mode::SelfSigned);
        settings.failure_policy = FailurePolicy::KeepGoing;
        let files = HostArtifacts::new(root.path(), "old");
        std::fs::create_dir_all(&files.dir).unwrap();
        std::fs::write(&files.cert, "last year's cert").unwrap();
        let backend = RecordingBackend::failing_on("self_sign");

        let report = Issuer::new(&settings, &backend, None)
            .issue("old")
            .await
            .unwrap();

        assert_eq!(report.state, HostState::CsrReady);
        assert!(report.bundle.is_none());
        assert!(!root.path().join("old/old.pem").exists());
    }

    #[tokio::test]
    async fn failed_dump_does_not_cost_the_bundle() {
        let root = tempfile::tempdir().unwrap();
        let mut settings = settings_in(root.path(), Mode::SelfSigned);
        settings.verbose = true;
        let backend = RecordingBackend::failing_on("dump_text");

        let report = Issuer::new(&settings, &backend, None)
            .issue("z")
            .await
            .unwrap();

        assert!(report.succeeded());
        assert_eq!(report.state, HostState::Signed);
        assert!(report.dumps.is_empty());
        assert_eq!(report.bundle, Some(root.path().join("z/z.pem")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn host_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let settings = settings_in(root.path(), Mode::Csr);
        let report = Issuer::new(&settings, &RecordingBackend::default(), None)
            .issue("secure")
            .await
            .unwrap();

        let mode = std::fs::metadata(&report.files.key)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
