use crate::codec::{CertificateCodec, CertificateInfo, Fingerprint, X509Codec};
use crate::errors::{CertificateError, InspectError};
use crate::is_supported_key_length;
use paths::{APP_ID, ConfigScope};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// What to generate and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateGenerationRequest {
    pub path: PathBuf,
    pub key_length: u32,
    pub scope: ConfigScope,
    /// TLS flag of the resolved configuration; generation is refused when off.
    pub tls_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCertificate {
    pub path: PathBuf,
    pub key_length: u32,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// A file already existed; nothing was touched.
    AlreadyPresent(PathBuf),
    Generated(GeneratedCertificate),
}

/// Observed state of the certificate file at a resolved path.
///
/// Recompute it whenever it is shown: the file can be replaced out of band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsCertificateDescriptor {
    pub path: PathBuf,
    /// `None` when the file is absent or unreadable.
    pub key_length: Option<u32>,
    pub exists: bool,
}

/// Cooperative cancellation for a running generation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), CertificateError> {
        if self.is_cancelled() {
            Err(CertificateError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Inspects, generates and provisions certificate files.
///
/// Generated certificates are issued for the common name [`APP_ID`].
///
/// Generated files hold the private key and the certificate and are written
/// to a temporary file in the target directory before being renamed into
/// place, so readers never observe a partial file.
#[derive(Debug)]
pub struct CertificateManager<C = X509Codec> {
    codec: C,
}

impl Default for CertificateManager<X509Codec> {
    fn default() -> Self {
        Self::new(X509Codec)
    }
}

impl<C: CertificateCodec> CertificateManager<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Key length embedded in the certificate at `path`.
    pub fn inspect(&self, path: &Path) -> Result<u32, InspectError> {
        self.read_info(path).map(|info| info.key_length)
    }

    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, InspectError> {
        self.read_info(path).map(|info| info.fingerprint)
    }

    pub fn describe(&self, path: &Path) -> TlsCertificateDescriptor {
        let (exists, key_length) = match self.inspect(path) {
            Ok(bits) => (true, Some(bits)),
            Err(InspectError::NotFound(_)) => (false, None),
            Err(err) => {
                warn!(error = %err, "certificate present but unreadable");
                (path.exists(), None)
            }
        };
        TlsCertificateDescriptor {
            path: path.to_path_buf(),
            key_length,
            exists,
        }
    }

    fn read_info(&self, path: &Path) -> Result<CertificateInfo, InspectError> {
        if !path.exists() {
            return Err(InspectError::NotFound(path.to_path_buf()));
        }
        // A file removed after the existence check lands here as well.
        let bytes = fs::read(path).map_err(|e| InspectError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.codec
            .inspect_pem(&bytes)
            .map_err(|reason| InspectError::Unreadable {
                path: path.to_path_buf(),
                reason,
            })
    }

    pub fn generate(
        &self,
        request: &CertificateGenerationRequest,
    ) -> Result<GeneratedCertificate, CertificateError> {
        self.generate_cancellable(request, &CancelToken::new())
    }

    /// Generate a new certificate at `request.path`, replacing any existing
    /// file.
    ///
    /// Every fingerprint peers cached for the previous certificate becomes
    /// invalid. Callers must tell the operator that all peers need to trust
    /// the new one.
    pub fn generate_cancellable(
        &self,
        request: &CertificateGenerationRequest,
        cancel: &CancelToken,
    ) -> Result<GeneratedCertificate, CertificateError> {
        if !request.tls_enabled {
            error!("unable to generate tls certificate, tls is not enabled");
            return Err(CertificateError::TlsNotEnabled);
        }
        if !is_supported_key_length(request.key_length) {
            return Err(CertificateError::UnsupportedKeyLength(request.key_length));
        }
        let Some(file_name) = request.path.file_name() else {
            return Err(CertificateError::InvalidPath(request.path.clone()));
        };

        warn!(
            path = %request.path.display(),
            scope = %request.scope,
            key_length = request.key_length,
            "generating tls certificate, all clients must trust the new fingerprint"
        );

        cancel.check()?;
        let pem = self.codec.generate_pem(request.key_length, APP_ID)?;
        cancel.check()?;
        let info = self
            .codec
            .inspect_pem(pem.as_bytes())
            .map_err(CertificateError::Crypto)?;

        let dir = parent_dir(&request.path);
        fs::create_dir_all(dir).map_err(CertificateError::io(dir))?;

        let mut tmp_name = std::ffi::OsString::from(".");
        tmp_name.push(file_name);
        tmp_name.push(format!(".{}.tmp", std::process::id()));
        let tmp = dir.join(tmp_name);

        let written = write_then_rename(&tmp, &request.path, pem.as_bytes(), cancel);
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written?;

        info!(
            path = %request.path.display(),
            fingerprint = %info.fingerprint,
            "tls certificate generated"
        );
        Ok(GeneratedCertificate {
            path: request.path.clone(),
            key_length: info.key_length,
            fingerprint: info.fingerprint,
        })
    }

    /// Generate only when nothing exists at `request.path`.
    pub fn persist_if_absent(
        &self,
        request: &CertificateGenerationRequest,
    ) -> Result<ProvisionOutcome, CertificateError> {
        if request.path.exists() {
            debug!(path = %request.path.display(), "tls certificate already present");
            return Ok(ProvisionOutcome::AlreadyPresent(request.path.clone()));
        }
        self.generate(request).map(ProvisionOutcome::Generated)
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

fn write_then_rename(
    tmp: &Path,
    target: &Path,
    contents: &[u8],
    cancel: &CancelToken,
) -> Result<(), CertificateError> {
    // A stale temp file would keep its old permissions.
    let _ = fs::remove_file(tmp);

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(tmp).map_err(CertificateError::io(tmp))?;
    file.write_all(contents).map_err(CertificateError::io(tmp))?;
    file.sync_all().map_err(CertificateError::io(tmp))?;
    drop(file);

    cancel.check()?;
    fs::rename(tmp, target).map_err(CertificateError::io(target))?;

    #[cfg(unix)]
    {
        let dir = parent_dir(target);
        File::open(dir)
            .and_then(|d| d.sync_all())
            .map_err(CertificateError::io(dir))?;
    }
    Ok(())
}
