use std::path::PathBuf;

/// Why a certificate file could not be inspected.
///
/// Both variants are recoverable: callers fall back to the stored key length.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("no certificate at {0}")]
    NotFound(PathBuf),
    /// Exists but is not a certificate we understand, or vanished while
    /// being read.
    #[error("certificate at {path} is unreadable: {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

impl InspectError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, InspectError::NotFound(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("TLS is not enabled, refusing to generate a certificate")]
    TlsNotEnabled,
    #[error("unsupported key length {0} (supported: 2048, 3072, 4096)")]
    UnsupportedKeyLength(u32),
    #[error("invalid certificate path {0:?}")]
    InvalidPath(PathBuf),
    #[error("certificate generation was cancelled")]
    Cancelled,
    #[error("certificate generation failed: {0}")]
    Crypto(String),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CertificateError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| CertificateError::Io { path, source }
    }
}
