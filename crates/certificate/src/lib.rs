//! TLS certificate provisioning: inspect, generate, persist-if-absent.
//!
//! [`CertificateManager`] decides *when* and *where* certificate files are
//! written. The cryptography sits behind [`CertificateCodec`].

pub mod codec;
pub mod errors;
pub mod manager;
pub mod stub;

pub use codec::{CertificateCodec, CertificateInfo, Fingerprint, X509Codec};
pub use errors::{CertificateError, InspectError};
pub use manager::{
    CancelToken, CertificateGenerationRequest, CertificateManager, GeneratedCertificate,
    ProvisionOutcome, TlsCertificateDescriptor,
};
pub use stub::StubCodec;

/// Key length used when nothing else is configured.
pub const DEFAULT_KEY_LENGTH: u32 = 2048;

/// RSA modulus sizes the generator accepts.
pub const SUPPORTED_KEY_LENGTHS: [u32; 3] = [2048, 3072, 4096];

pub fn is_supported_key_length(bits: u32) -> bool {
    SUPPORTED_KEY_LENGTHS.contains(&bits)
}
