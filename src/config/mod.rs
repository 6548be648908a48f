//! TLS configuration model.
//!
//! This module provides:
//! - [`TlsConfiguration`]: the policy record a [`crate::TlsContext`] is built from
//! - [`alpn`]: the ALPN protocol list wire codec
//! - [`TlsConfigurationFile`]: the YAML form of the data-only fields
//!
//! A configuration starts from one of the presets and may then be mutated
//! field by field. Once a context has been built from it, later changes have
//! no effect on that context.

pub mod alpn;
mod file;
mod types;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

pub use file::TlsConfigurationFile;
pub use types::*;

use crate::certificate::{Certificate, PrivateKey};
use crate::error::ConfigError;

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct TlsConfiguration {
    pub minimum_tls_version: TlsVersion,
    /// No upper bound when unset.
    pub maximum_tls_version: Option<TlsVersion>,
    pub certificate_verification: CertificateVerification,
    pub trust_roots: TrustRoots,
    /// Unioned with `trust_roots`.
    pub additional_trust_roots: Vec<TrustRoots>,
    pub certificate_chain: Vec<Certificate>,
    pub private_key: Option<PrivateKey>,
    pub psk_client_callback: Option<PskClientCallback>,
    pub psk_server_callback: Option<PskServerCallback>,
    pub psk_hint: Option<String>,
    /// Grace period the caller should allow a shutdown exchange before
    /// closing the transport uncleanly. The driver itself never waits.
    pub shutdown_timeout: Duration,
    pub key_log: Option<Arc<dyn rustls::KeyLog>>,
    pub renegotiation_support: RenegotiationSupport,
    pub verify_signature_algorithms: Option<Vec<SignatureAlgorithm>>,
    pub signing_signature_algorithms: Option<Vec<SignatureAlgorithm>>,
    pub send_ca_name_list: bool,

    // Empty means the engine's default suites.
    cipher_suites: Vec<CipherSuite>,

    // Kept in lockstep: every write goes through set_application_protocols.
    application_protocols: Vec<String>,
    encoded_application_protocols: Vec<u8>,
}

impl TlsConfiguration {
    fn base() -> Self {
        Self {
            minimum_tls_version: TlsVersion::Tls1_0,
            maximum_tls_version: None,
            certificate_verification: CertificateVerification::FullVerification,
            trust_roots: TrustRoots::Default,
            additional_trust_roots: vec![],
            certificate_chain: vec![],
            private_key: None,
            psk_client_callback: None,
            psk_server_callback: None,
            psk_hint: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            key_log: None,
            renegotiation_support: RenegotiationSupport::None,
            verify_signature_algorithms: None,
            signing_signature_algorithms: None,
            send_ca_name_list: true,
            cipher_suites: vec![],
            application_protocols: vec![],
            encoded_application_protocols: vec![],
        }
    }

    /// Client configuration with full certificate and hostname verification
    /// against the default trust roots.
    pub fn client_default() -> Self {
        Self::base()
    }

    /// Server configuration presenting the given identity. Client
    /// certificates are not requested.
    pub fn server(certificate_chain: Vec<Certificate>, private_key: PrivateKey) -> Self {
        Self {
            certificate_verification: CertificateVerification::None,
            certificate_chain,
            private_key: Some(private_key),
            ..Self::base()
        }
    }

    /// Configuration for pre-shared-key sessions, capped at TLS 1.2.
    pub fn pre_shared_key_default() -> Self {
        Self {
            maximum_tls_version: Some(TlsVersion::Tls1_2),
            certificate_verification: CertificateVerification::None,
            ..Self::base()
        }
    }

    pub fn application_protocols(&self) -> &[String] {
        &self.application_protocols
    }

    /// ALPN protocol list in wire form.
    pub fn encoded_application_protocols(&self) -> &[u8] {
        &self.encoded_application_protocols
    }

    /// Replace the ALPN protocol list. On error the previous list is kept.
    pub fn set_application_protocols<S: Into<String>>(
        &mut self,
        protocols: impl IntoIterator<Item = S>,
    ) -> Result<(), ConfigError> {
        let protocols: Vec<String> = protocols.into_iter().map(Into::into).collect();
        let encoded = alpn::encode(&protocols)?;
        self.application_protocols = protocols;
        self.encoded_application_protocols = encoded;
        Ok(())
    }

    /// Replace the ALPN protocol list from its wire form. On error the
    /// previous list is kept.
    pub fn set_encoded_application_protocols(&mut self, encoded: &[u8]) -> Result<(), ConfigError> {
        let protocols = alpn::decode(encoded)?;
        self.application_protocols = protocols;
        self.encoded_application_protocols = encoded.to_vec();
        Ok(())
    }

    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    pub fn set_cipher_suites(&mut self, cipher_suites: Vec<CipherSuite>) {
        self.cipher_suites = cipher_suites;
    }

    /// Colon-separated cipher suite names. Empty when the engine defaults
    /// are in use.
    pub fn cipher_suite_string(&self) -> String {
        self.cipher_suites
            .iter()
            .map(CipherSuite::name)
            .collect::<Vec<_>>()
            .join(":")
    }

    pub fn set_cipher_suite_string(&mut self, names: &str) -> Result<(), ConfigError> {
        let cipher_suites = names
            .split(':')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                CipherSuite::from_name(name)
                    .ok_or_else(|| ConfigError::UnknownCipherSuite(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.cipher_suites = cipher_suites;
        Ok(())
    }

    pub fn uses_pre_shared_keys(&self) -> bool {
        self.psk_client_callback.is_some()
            || self.psk_server_callback.is_some()
            || self.psk_hint.is_some()
    }
}

impl Default for TlsConfiguration {
    fn default() -> Self {
        Self::client_default()
    }
}

fn arc_eq<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
        _ => false,
    }
}

fn arc_address<T: ?Sized>(a: &Option<Arc<T>>) -> Option<usize> {
    a.as_ref().map(|a| Arc::as_ptr(a) as *const () as usize)
}

// Callbacks compare by address: two configurations holding different but
// behaviourally identical callbacks are unequal.
impl PartialEq for TlsConfiguration {
    fn eq(&self, other: &Self) -> bool {
        self.minimum_tls_version == other.minimum_tls_version
            && self.maximum_tls_version == other.maximum_tls_version
            && self.certificate_verification == other.certificate_verification
            && self.trust_roots == other.trust_roots
            && self.additional_trust_roots == other.additional_trust_roots
            && self.certificate_chain == other.certificate_chain
            && self.private_key == other.private_key
            && arc_eq(&self.psk_client_callback, &other.psk_client_callback)
            && arc_eq(&self.psk_server_callback, &other.psk_server_callback)
            && self.psk_hint == other.psk_hint
            && self.shutdown_timeout == other.shutdown_timeout
            && arc_eq(&self.key_log, &other.key_log)
            && self.renegotiation_support == other.renegotiation_support
            && self.verify_signature_algorithms == other.verify_signature_algorithms
            && self.signing_signature_algorithms == other.signing_signature_algorithms
            && self.send_ca_name_list == other.send_ca_name_list
            && self.cipher_suites == other.cipher_suites
            && self.encoded_application_protocols == other.encoded_application_protocols
    }
}

impl Eq for TlsConfiguration {}

impl Hash for TlsConfiguration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.minimum_tls_version.hash(state);
        self.maximum_tls_version.hash(state);
        self.certificate_verification.hash(state);
        self.trust_roots.hash(state);
        self.additional_trust_roots.hash(state);
        self.certificate_chain.hash(state);
        self.private_key.hash(state);
        arc_address(&self.psk_client_callback).hash(state);
        arc_address(&self.psk_server_callback).hash(state);
        self.psk_hint.hash(state);
        self.shutdown_timeout.hash(state);
        arc_address(&self.key_log).hash(state);
        self.renegotiation_support.hash(state);
        self.verify_signature_algorithms.hash(state);
        self.signing_signature_algorithms.hash(state);
        self.send_ca_name_list.hash(state);
        self.cipher_suites.hash(state);
        self.encoded_application_protocols.hash(state);
    }
}

impl fmt::Debug for TlsConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfiguration")
            .field("minimum_tls_version", &self.minimum_tls_version)
            .field("maximum_tls_version", &self.maximum_tls_version)
            .field("cipher_suites", &self.cipher_suite_string())
            .field("certificate_verification", &self.certificate_verification)
            .field("trust_roots", &self.trust_roots)
            .field("additional_trust_roots", &self.additional_trust_roots)
            .field("certificate_chain_len", &self.certificate_chain.len())
            .field("private_key", &self.private_key.is_some())
            .field("psk_client_callback", &arc_address(&self.psk_client_callback))
            .field("psk_server_callback", &arc_address(&self.psk_server_callback))
            .field("psk_hint", &self.psk_hint)
            .field("application_protocols", &self.application_protocols)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("key_log", &arc_address(&self.key_log))
            .field("renegotiation_support", &self.renegotiation_support)
            .field("verify_signature_algorithms", &self.verify_signature_algorithms)
            .field("signing_signature_algorithms", &self.signing_signature_algorithms)
            .field("send_ca_name_list", &self.send_ca_name_list)
            .finish()
    }
}
