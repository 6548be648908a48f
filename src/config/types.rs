use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::certificate::Certificate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum TlsVersion {
    #[serde(rename = "1.0", alias = "tls1.0")]
    Tls1_0,
    #[serde(rename = "1.1", alias = "tls1.1")]
    Tls1_1,
    #[serde(rename = "1.2", alias = "tls1.2")]
    Tls1_2,
    #[serde(rename = "1.3", alias = "tls1.3")]
    Tls1_3,
}

impl TlsVersion {
    pub const ALL: &'static [TlsVersion] = &[
        TlsVersion::Tls1_0,
        TlsVersion::Tls1_1,
        TlsVersion::Tls1_2,
        TlsVersion::Tls1_3,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TlsVersion::Tls1_0 => "TLSv1.0",
            TlsVersion::Tls1_1 => "TLSv1.1",
            TlsVersion::Tls1_2 => "TLSv1.2",
            TlsVersion::Tls1_3 => "TLSv1.3",
        }
    }

    /// The engine's protocol version, if the engine implements this version.
    pub(crate) fn to_rustls(self) -> Option<&'static rustls::SupportedProtocolVersion> {
        match self {
            TlsVersion::Tls1_0 | TlsVersion::Tls1_1 => None,
            TlsVersion::Tls1_2 => Some(&rustls::version::TLS12),
            TlsVersion::Tls1_3 => Some(&rustls::version::TLS13),
        }
    }

    pub(crate) fn from_rustls(version: rustls::ProtocolVersion) -> Option<Self> {
        match version {
            rustls::ProtocolVersion::TLSv1_0 => Some(TlsVersion::Tls1_0),
            rustls::ProtocolVersion::TLSv1_1 => Some(TlsVersion::Tls1_1),
            rustls::ProtocolVersion::TLSv1_2 => Some(TlsVersion::Tls1_2),
            rustls::ProtocolVersion::TLSv1_3 => Some(TlsVersion::Tls1_3),
            _ => None,
        }
    }
}

/// Cipher suites the engine can negotiate, named by their IANA names.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherSuite {
    TLS13_AES_128_GCM_SHA256,
    TLS13_AES_256_GCM_SHA384,
    TLS13_CHACHA20_POLY1305_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
    TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
    TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
}

impl CipherSuite {
    pub const ALL: &'static [CipherSuite] = &[
        CipherSuite::TLS13_AES_128_GCM_SHA256,
        CipherSuite::TLS13_AES_256_GCM_SHA384,
        CipherSuite::TLS13_CHACHA20_POLY1305_SHA256,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
        CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
        CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CipherSuite::TLS13_AES_128_GCM_SHA256 => "TLS_AES_128_GCM_SHA256",
            CipherSuite::TLS13_AES_256_GCM_SHA384 => "TLS_AES_256_GCM_SHA384",
            CipherSuite::TLS13_CHACHA20_POLY1305_SHA256 => "TLS_CHACHA20_POLY1305_SHA256",
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 => {
                "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256"
            }
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 => {
                "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384"
            }
            CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256 => {
                "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256"
            }
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 => {
                "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256"
            }
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 => {
                "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384"
            }
            CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256 => {
                "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256"
            }
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        CipherSuite::ALL
            .iter()
            .copied()
            .find(|suite| suite.name().eq_ignore_ascii_case(name))
    }

    pub(crate) fn to_rustls(self) -> rustls::CipherSuite {
        match self {
            CipherSuite::TLS13_AES_128_GCM_SHA256 => rustls::CipherSuite::TLS13_AES_128_GCM_SHA256,
            CipherSuite::TLS13_AES_256_GCM_SHA384 => rustls::CipherSuite::TLS13_AES_256_GCM_SHA384,
            CipherSuite::TLS13_CHACHA20_POLY1305_SHA256 => {
                rustls::CipherSuite::TLS13_CHACHA20_POLY1305_SHA256
            }
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 => {
                rustls::CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
            }
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384 => {
                rustls::CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
            }
            CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256 => {
                rustls::CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256
            }
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256 => {
                rustls::CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
            }
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384 => {
                rustls::CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
            }
            CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256 => {
                rustls::CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256
            }
        }
    }

    pub(crate) fn from_rustls(suite: rustls::CipherSuite) -> Option<Self> {
        CipherSuite::ALL
            .iter()
            .copied()
            .find(|candidate| candidate.to_rustls() == suite)
    }
}

impl Serialize for CipherSuite {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for CipherSuite {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        let name = String::deserialize(deserializer)?;
        CipherSuite::from_name(&name).ok_or_else(|| {
            let valid_names: Vec<&str> = CipherSuite::ALL.iter().map(|cs| cs.name()).collect();
            D::Error::custom(format!(
                "invalid cipher suite '{}', valid values are: {}",
                name,
                valid_names.join(", ")
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateVerification {
    /// Accept any peer certificate.
    None,
    /// Validate the chain against the trust roots but not the hostname.
    #[serde(alias = "no_hostname")]
    NoHostnameVerification,
    /// Validate the chain and check it was issued for the SNI hostname.
    #[serde(alias = "full")]
    FullVerification,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrustRoots {
    /// The bundled webpki root set.
    Default,
    /// A PEM bundle on disk, read when the context is built.
    File(PathBuf),
    Certificates(Vec<Certificate>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenegotiationSupport {
    None,
    Once,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureAlgorithm {
    RsaPkcs1Sha256,
    RsaPkcs1Sha384,
    RsaPkcs1Sha512,
    EcdsaSecp256r1Sha256,
    EcdsaSecp384r1Sha384,
    EcdsaSecp521r1Sha512,
    RsaPssSha256,
    RsaPssSha384,
    RsaPssSha512,
    Ed25519,
}

impl SignatureAlgorithm {
    pub(crate) fn to_rustls(self) -> rustls::SignatureScheme {
        match self {
            SignatureAlgorithm::RsaPkcs1Sha256 => rustls::SignatureScheme::RSA_PKCS1_SHA256,
            SignatureAlgorithm::RsaPkcs1Sha384 => rustls::SignatureScheme::RSA_PKCS1_SHA384,
            SignatureAlgorithm::RsaPkcs1Sha512 => rustls::SignatureScheme::RSA_PKCS1_SHA512,
            SignatureAlgorithm::EcdsaSecp256r1Sha256 => {
                rustls::SignatureScheme::ECDSA_NISTP256_SHA256
            }
            SignatureAlgorithm::EcdsaSecp384r1Sha384 => {
                rustls::SignatureScheme::ECDSA_NISTP384_SHA384
            }
            SignatureAlgorithm::EcdsaSecp521r1Sha512 => {
                rustls::SignatureScheme::ECDSA_NISTP521_SHA512
            }
            SignatureAlgorithm::RsaPssSha256 => rustls::SignatureScheme::RSA_PSS_SHA256,
            SignatureAlgorithm::RsaPssSha384 => rustls::SignatureScheme::RSA_PSS_SHA384,
            SignatureAlgorithm::RsaPssSha512 => rustls::SignatureScheme::RSA_PSS_SHA512,
            SignatureAlgorithm::Ed25519 => rustls::SignatureScheme::ED25519,
        }
    }
}

/// Identity and key a PSK client presents for a given server hint.
#[derive(Clone, PartialEq, Eq)]
pub struct PskIdentity {
    pub identity: Vec<u8>,
    pub key: Vec<u8>,
}

impl std::fmt::Debug for PskIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PskIdentity")
            .field("identity", &String::from_utf8_lossy(&self.identity))
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Called with the server's identity hint, if any.
pub type PskClientCallback = Arc<dyn Fn(Option<&str>) -> Option<PskIdentity> + Send + Sync>;

/// Called with the identity the client presented; returns the matching key.
pub type PskServerCallback = Arc<dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync>;
