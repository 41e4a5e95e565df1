//! Codec stand-in that produces tiny, parseable fake certificates.

use crate::codec::{CertificateCodec, CertificateInfo, Fingerprint};
use crate::errors::CertificateError;
use std::sync::atomic::{AtomicUsize, Ordering};

const BEGIN: &str = "-----BEGIN TETHER STUB CERTIFICATE-----";
const END: &str = "-----END TETHER STUB CERTIFICATE-----";

/// Writes `key-length: <bits>` between stub PEM markers and reads it back.
///
/// Counts generations so callers can assert that provisioning was skipped.
#[derive(Debug, Default)]
pub struct StubCodec {
    generated: AtomicUsize,
}

impl StubCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generated_count(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }

    /// File content a [`StubCodec`] would produce for `key_length`.
    pub fn pem_for(key_length: u32, common_name: &str) -> String {
        format!("{BEGIN}\ncn: {common_name}\nkey-length: {key_length}\n{END}\n")
    }
}

impl CertificateCodec for StubCodec {
    fn generate_pem(
        &self,
        key_length: u32,
        common_name: &str,
    ) -> Result<String, CertificateError> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(Self::pem_for(key_length, common_name))
    }

    fn inspect_pem(&self, pem: &[u8]) -> Result<CertificateInfo, String> {
        let text = std::str::from_utf8(pem).map_err(|_| "not utf-8".to_string())?;
        let body = text
            .split_once(BEGIN)
            .and_then(|(_, rest)| rest.split_once(END))
            .map(|(body, _)| body)
            .ok_or_else(|| "no stub certificate block".to_string())?;

        let key_length = body
            .lines()
            .find_map(|line| line.trim().strip_prefix("key-length:"))
            .ok_or_else(|| "missing key-length".to_string())?
            .trim()
            .parse::<u32>()
            .map_err(|e| format!("bad key-length: {e}"))?;

        Ok(CertificateInfo {
            key_length,
            fingerprint: Fingerprint::sha256(body.as_bytes()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_pem_inspects_back() {
        let codec = StubCodec::new();
        let pem = codec.generate_pem(3072, "tether").expect("generate");
        let info = codec.inspect_pem(pem.as_bytes()).expect("inspect");
        assert_eq!(info.key_length, 3072);
        assert_eq!(codec.generated_count(), 1);
    }

    #[test]
    fn garbage_is_rejected() {
        let codec = StubCodec::new();
        assert!(codec.inspect_pem(b"garbage").is_err());
        assert!(codec.inspect_pem(&[0xff, 0xfe]).is_err());
        let no_len = format!("{BEGIN}\ncn: x\n{END}\n");
        assert!(codec.inspect_pem(no_len.as_bytes()).is_err());
    }
}
