use crate::errors::CertificateError;
use rcgen::{CertificateParams, DnType, KeyPair, PKCS_RSA_SHA256};
use ring::digest::{SHA256, digest};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use std::fmt;
use time::{Duration, OffsetDateTime};
use x509_parser::public_key::PublicKey;

/// Validity of freshly generated certificates.
const VALIDITY_DAYS: i64 = 365;

/// Cryptographic backend used by the certificate manager.
pub trait CertificateCodec: Send + Sync {
    /// A fresh private key followed by a self-signed certificate, PEM encoded.
    fn generate_pem(&self, key_length: u32, common_name: &str)
    -> Result<String, CertificateError>;

    /// Key size and fingerprint of the first certificate found in `pem`.
    ///
    /// The error is a human readable reason; the manager attaches the path.
    fn inspect_pem(&self, pem: &[u8]) -> Result<CertificateInfo, String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    pub key_length: u32,
    pub fingerprint: Fingerprint,
}

/// SHA-256 over the certificate DER, rendered as colon separated hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn sha256(bytes: &[u8]) -> Self {
        let hash = digest(&SHA256, bytes);
        let hex: Vec<String> = hash
            .as_ref()
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect();
        Self(hex.join(":"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// RSA keys from `rsa`, self-signed certificates from `rcgen`, parsing via
/// `x509-parser`.
#[derive(Debug, Clone, Copy, Default)]
pub struct X509Codec;

impl CertificateCodec for X509Codec {
    fn generate_pem(
        &self,
        key_length: u32,
        common_name: &str,
    ) -> Result<String, CertificateError> {
        let bits = usize::try_from(key_length)
            .map_err(|_| CertificateError::UnsupportedKeyLength(key_length))?;

        // Schritt 1: RSA-Schlüssel mit gewünschter Länge erzeugen
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CertificateError::Crypto(format!("rsa key generation: {e}")))?;
        let key_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CertificateError::Crypto(format!("pkcs8 encoding: {e}")))?;
        let key_pair = KeyPair::from_pkcs8_pem_and_sign_algo(key_pem.as_str(), &PKCS_RSA_SHA256)
            .map_err(|e| CertificateError::Crypto(format!("signing key: {e}")))?;

        // Schritt 2: Params definieren
        let mut params = CertificateParams::new(vec![common_name.to_string()])
            .map_err(|e| CertificateError::Crypto(format!("certificate params: {e}")))?;
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        let now = OffsetDateTime::now_utc();
        params.not_before = now - Duration::minutes(5);
        params.not_after = now + Duration::days(VALIDITY_DAYS);

        // Schritt 3: Zertifikat selbst signieren
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| CertificateError::Crypto(format!("self-signing: {e}")))?;

        let mut out = String::with_capacity(key_pem.len() + 2048);
        out.push_str(key_pem.as_str());
        out.push_str(&cert.pem());
        Ok(out)
    }

    fn inspect_pem(&self, pem: &[u8]) -> Result<CertificateInfo, String> {
        let der = first_certificate_der(pem)?;
        let (_, cert) = x509_parser::parse_x509_certificate(&der)
            .map_err(|e| format!("invalid certificate: {e}"))?;
        let key = cert
            .public_key()
            .parsed()
            .map_err(|e| format!("unsupported public key: {e}"))?;

        let key_length = match key {
            PublicKey::RSA(rsa) => significant_bits(rsa.modulus),
            PublicKey::EC(point) => ec_curve_bits(point.data())
                .ok_or_else(|| "unrecognised EC point encoding".to_string())?,
            _ => return Err("unsupported public key algorithm".to_string()),
        };
        if key_length == 0 {
            return Err("certificate carries an empty public key".to_string());
        }

        Ok(CertificateInfo {
            key_length,
            fingerprint: Fingerprint::sha256(&der),
        })
    }
}

/// DER of the first `CERTIFICATE` block, skipping keys and other blocks.
fn first_certificate_der(pem: &[u8]) -> Result<Vec<u8>, String> {
    let mut remaining = pem;
    loop {
        remaining = remaining.trim_ascii_start();
        if remaining.is_empty() {
            return Err("no CERTIFICATE block found".to_string());
        }
        let (next, block) = x509_parser::pem::parse_x509_pem(remaining)
            .map_err(|e| format!("invalid PEM: {e}"))?;
        if block.label == "CERTIFICATE" {
            return Ok(block.contents);
        }
        if next.len() >= remaining.len() {
            return Err("no CERTIFICATE block found".to_string());
        }
        remaining = next;
    }
}

/// Bit length of a big-endian unsigned integer (leading zero bytes ignored).
fn significant_bits(be: &[u8]) -> u32 {
    let start = be.iter().position(|b| *b != 0).unwrap_or(be.len());
    let digits = &be[start..];
    match digits.first() {
        Some(first) => (digits.len() as u32 - 1) * 8 + (8 - first.leading_zeros()),
        None => 0,
    }
}

/// Curve size from an SEC1 point: `04 || X || Y` or `02|03 || X`.
fn ec_curve_bits(point: &[u8]) -> Option<u32> {
    let coordinate_len = match point.first()? {
        0x04 => (point.len() - 1) / 2,
        0x02 | 0x03 => point.len() - 1,
        _ => return None,
    };
    match coordinate_len {
        32 => Some(256),
        48 => Some(384),
        66 => Some(521),
        n => Some(n as u32 * 8),
    }
}
