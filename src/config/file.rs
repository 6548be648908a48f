//! YAML form of a [`TlsConfiguration`].
//!
//! Covers the data-only fields. Callbacks (key log, PSK hooks) can only be
//! set programmatically on the resulting configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    CertificateVerification, CipherSuite, RenegotiationSupport, TlsConfiguration, TlsVersion,
    TrustRoots,
};
use crate::certificate::{Certificate, PrivateKey};
use crate::error::ConfigError;
use crate::option_util::NoneOrSome;

const DEFAULT_TRUST_ROOTS: &str = "default";

fn is_default_trust_roots(value: &str) -> bool {
    value.eq_ignore_ascii_case(DEFAULT_TRUST_ROOTS)
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfigurationFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<TlsVersion>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<TlsVersion>,

    /// Engine defaults when empty.
    #[serde(alias = "cipher_suite", default)]
    pub cipher_suites: NoneOrSome<CipherSuite>,

    /// Defaults to `full` for clients and `none` for servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<CertificateVerification>,

    /// `default` for the bundled root set, otherwise a PEM bundle path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_roots: Option<String>,

    #[serde(default)]
    pub additional_trust_roots: NoneOrSome<PathBuf>,

    /// Setting both this and `private_key` makes this a server configuration.
    #[serde(alias = "cert", default, skip_serializing_if = "Option::is_none")]
    pub certificate_chain: Option<PathBuf>,

    #[serde(alias = "key", default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PathBuf>,

    #[serde(alias = "alpn_protocol", default)]
    pub alpn_protocols: NoneOrSome<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renegotiation: Option<RenegotiationSupport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_ca_name_list: Option<bool>,
}

impl TlsConfigurationFile {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        log::debug!("Loaded TLS configuration from {}", path.display());
        Self::from_yaml_str(&yaml)
    }

    /// Read the referenced PEM files and build the configuration.
    pub fn into_configuration(self) -> Result<TlsConfiguration, ConfigError> {
        let mut config = match (self.certificate_chain, self.private_key) {
            (Some(chain_path), Some(key_path)) => {
                let chain = Certificate::chain_from_pem_file(&chain_path)?;
                let key = PrivateKey::from_pem_file(&key_path)?;
                TlsConfiguration::server(chain, key)
            }
            (None, None) => TlsConfiguration::client_default(),
            _ => return Err(ConfigError::IncompleteIdentity),
        };

        if let Some(version) = self.min_version {
            config.minimum_tls_version = version;
        }
        if self.max_version.is_some() {
            config.maximum_tls_version = self.max_version;
        }
        if !self.cipher_suites.is_unspecified() {
            config.set_cipher_suites(self.cipher_suites.into_vec());
        }
        if let Some(verification) = self.verification {
            config.certificate_verification = verification;
        }
        if let Some(trust_roots) = self.trust_roots {
            config.trust_roots = if is_default_trust_roots(&trust_roots) {
                TrustRoots::Default
            } else {
                TrustRoots::File(PathBuf::from(trust_roots))
            };
        }
        config.additional_trust_roots = self
            .additional_trust_roots
            .into_vec()
            .into_iter()
            .map(TrustRoots::File)
            .collect();
        config.set_application_protocols(self.alpn_protocols.into_vec())?;
        if let Some(secs) = self.shutdown_timeout_secs {
            config.shutdown_timeout = Duration::from_secs(secs);
        }
        if let Some(renegotiation) = self.renegotiation {
            config.renegotiation_support = renegotiation;
        }
        if let Some(send_ca_name_list) = self.send_ca_name_list {
            config.send_ca_name_list = send_ca_name_list;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::TestPki;

    #[test]
    fn test_client_file() {
        let file = TlsConfigurationFile::from_yaml_str(
            r#"
min_version: "1.2"
cipher_suites:
  - TLS_AES_128_GCM_SHA256
  - TLS_CHACHA20_POLY1305_SHA256
verification: no_hostname
alpn_protocols: [h2, http/1.1]
shutdown_timeout_secs: 2
renegotiation: once
"#,
        )
        .unwrap();
        let config = file.into_configuration().unwrap();

        assert_eq!(config.minimum_tls_version, TlsVersion::Tls1_2);
        assert_eq!(config.maximum_tls_version, None);
        assert_eq!(
            config.cipher_suites(),
            [
                CipherSuite::TLS13_AES_128_GCM_SHA256,
                CipherSuite::TLS13_CHACHA20_POLY1305_SHA256
            ]
        );
        assert_eq!(
            config.certificate_verification,
            CertificateVerification::NoHostnameVerification
        );
        assert_eq!(config.encoded_application_protocols(), b"\x02h2\x08http/1.1");
        assert_eq!(config.shutdown_timeout, Duration::from_secs(2));
        assert_eq!(config.renegotiation_support, RenegotiationSupport::Once);
        assert_eq!(config.trust_roots, TrustRoots::Default);
    }

    #[test]
    fn test_single_values() {
        let file = TlsConfigurationFile::from_yaml_str(
            "cipher_suite: TLS_AES_256_GCM_SHA384\nalpn_protocol: h2\ntrust_roots: /etc/roots.pem\n",
        )
        .unwrap();
        let config = file.into_configuration().unwrap();
        assert_eq!(config.cipher_suites(), [CipherSuite::TLS13_AES_256_GCM_SHA384]);
        assert_eq!(config.application_protocols(), ["h2".to_string()]);
        assert_eq!(
            config.trust_roots,
            TrustRoots::File(PathBuf::from("/etc/roots.pem"))
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = TlsConfigurationFile::from_yaml_str("verification: full\nciphers: foo\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_server_file() {
        let pki = TestPki::generate();
        let dir = std::env::temp_dir().join(format!("tls-driver-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let cert_path = dir.join("server.crt");
        let key_path = dir.join("server.key");
        std::fs::write(&cert_path, &pki.leaf_cert_pem).unwrap();
        std::fs::write(&key_path, &pki.leaf_key_pem).unwrap();

        let yaml = format!(
            "cert: {}\nkey: {}\nsend_ca_name_list: false\n",
            cert_path.display(),
            key_path.display()
        );
        let config = TlsConfigurationFile::from_yaml_str(&yaml)
            .unwrap()
            .into_configuration()
            .unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(config.certificate_chain.len(), 1);
        assert!(config.private_key.is_some());
        assert_eq!(config.certificate_verification, CertificateVerification::None);
        assert!(!config.send_ca_name_list);
    }

    #[test]
    fn test_key_without_chain_rejected() {
        let file = TlsConfigurationFile::from_yaml_str("private_key: /tmp/key.pem\n").unwrap();
        assert!(matches!(
            file.into_configuration(),
            Err(ConfigError::IncompleteIdentity)
        ));
    }
}
