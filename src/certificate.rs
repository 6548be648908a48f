//! Owned certificate and private key values.

use std::hash::{Hash, Hasher};
use std::path::Path;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::ConfigError;

/// An X.509 certificate in DER form.
#[derive(Debug, Clone)]
pub struct Certificate(CertificateDer<'static>);

impl Certificate {
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Certificate(CertificateDer::from(der.into()))
    }

    /// Parse the first certificate in a PEM buffer.
    pub fn from_pem(pem: &[u8]) -> Result<Self, ConfigError> {
        let der = CertificateDer::from_pem_slice(pem)
            .map_err(|e| ConfigError::Pem(format!("could not parse certificate: {e:?}")))?;
        Ok(Certificate(der.into_owned()))
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let pem = std::fs::read(path.as_ref())?;
        Self::from_pem(&pem)
    }

    /// Parse every certificate in a PEM buffer, leaf first.
    pub fn chain_from_pem(pem: &[u8]) -> Result<Vec<Self>, ConfigError> {
        let chain = CertificateDer::pem_slice_iter(pem)
            .map(|der| der.map(|der| Certificate(der.into_owned())))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::Pem(format!("could not parse certificate chain: {e:?}")))?;
        if chain.is_empty() {
            return Err(ConfigError::Pem("no certificates found".to_string()));
        }
        Ok(chain)
    }

    pub fn chain_from_pem_file(path: impl AsRef<Path>) -> Result<Vec<Self>, ConfigError> {
        let pem = std::fs::read(path.as_ref())?;
        Self::chain_from_pem(&pem)
    }

    pub fn der(&self) -> &[u8] {
        self.0.as_ref()
    }

    pub(crate) fn to_rustls(&self) -> CertificateDer<'static> {
        self.0.clone()
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der() == other.der()
    }
}

impl Eq for Certificate {}

impl Hash for Certificate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.der().hash(state);
    }
}

/// A PKCS#1, PKCS#8 or SEC1 private key in DER form.
pub struct PrivateKey(PrivateKeyDer<'static>);

impl PrivateKey {
    pub fn from_pem(pem: &[u8]) -> Result<Self, ConfigError> {
        let der = PrivateKeyDer::from_pem_slice(pem)
            .map_err(|e| ConfigError::Pem(format!("could not parse private key: {e:?}")))?;
        Ok(PrivateKey(der))
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let pem = std::fs::read(path.as_ref())?;
        Self::from_pem(&pem)
    }

    pub(crate) fn to_rustls(&self) -> PrivateKeyDer<'static> {
        self.0.clone_key()
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        PrivateKey(self.0.clone_key())
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.secret_der() == other.0.secret_der()
    }
}

impl Eq for PrivateKey {}

impl Hash for PrivateKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.secret_der().hash(state);
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::TestPki;

    #[test]
    fn test_chain_from_pem_keeps_order() {
        let pki = TestPki::generate();
        let bundle = format!("{}{}", pki.leaf_cert_pem, pki.ca_cert_pem);
        let chain = Certificate::chain_from_pem(bundle.as_bytes()).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0], Certificate::from_pem(pki.leaf_cert_pem.as_bytes()).unwrap());
        assert_eq!(chain[1], Certificate::from_pem(pki.ca_cert_pem.as_bytes()).unwrap());
    }

    #[test]
    fn test_garbage_pem_rejected() {
        assert!(matches!(
            Certificate::chain_from_pem(b"not a pem file"),
            Err(ConfigError::Pem(_))
        ));
        assert!(matches!(
            PrivateKey::from_pem(b"-----BEGIN NOTHING-----\n"),
            Err(ConfigError::Pem(_))
        ));
    }

    #[test]
    fn test_private_key_clone_is_equal() {
        let pki = TestPki::generate();
        let key = PrivateKey::from_pem(pki.leaf_key_pem.as_bytes()).unwrap();
        assert_eq!(key.clone(), key);
        assert_eq!(format!("{key:?}"), "PrivateKey(<redacted>)");
    }
}
