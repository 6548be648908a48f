//! Shared engine context built once from a [`TlsConfiguration`].

use std::sync::Arc;

use crate::certificate::Certificate;
use crate::config::{
    CertificateVerification, RenegotiationSupport, SignatureAlgorithm, TlsConfiguration,
    TlsVersion, TrustRoots,
};
use crate::engine::crypto_provider;
use crate::error::ConfigError;
use crate::rustls_util::{
    DisabledVerifier, FixedIdentity, PolicyServerVerifier, RestrictedSigningKey, SignaturePolicy,
};

/// Engine configuration shared read-only by every connection created from it.
#[derive(Debug)]
pub struct TlsContext {
    configuration: TlsConfiguration,
    client_config: Arc<rustls::ClientConfig>,
    // Used by clients that never set an SNI name: no SNI extension and no
    // hostname check.
    anonymous_client_config: Arc<rustls::ClientConfig>,
    server_config: Option<Arc<rustls::ServerConfig>>,
    // Same as `server_config` but with no ALPN list, for client hellos that
    // offer none of our protocols.
    server_config_without_alpn: Option<Arc<rustls::ServerConfig>>,
}

impl TlsContext {
    pub fn new(configuration: TlsConfiguration) -> Result<Self, ConfigError> {
        if configuration.uses_pre_shared_keys() {
            return Err(ConfigError::Unsupported("pre-shared key cipher suites"));
        }
        if configuration.renegotiation_support != RenegotiationSupport::None {
            log::warn!(
                "renegotiation support {:?} requested, peers' renegotiation requests will be refused",
                configuration.renegotiation_support
            );
        }

        let provider = Arc::new(filtered_provider(&configuration)?);
        let versions = protocol_versions(&configuration)?;
        let roots = Arc::new(load_trust_roots(&configuration)?);
        let identity = load_identity(&configuration, &provider)?;

        let client_config = build_client_config(
            &configuration,
            &provider,
            &versions,
            &roots,
            identity.clone(),
            configuration.certificate_verification,
        )?;
        let anonymous_verification = match configuration.certificate_verification {
            CertificateVerification::FullVerification => {
                CertificateVerification::NoHostnameVerification
            }
            other => other,
        };
        let mut anonymous_client_config = build_client_config(
            &configuration,
            &provider,
            &versions,
            &roots,
            identity.clone(),
            anonymous_verification,
        )?;
        anonymous_client_config.enable_sni = false;

        let (server_config, server_config_without_alpn) = match identity {
            Some(identity) => {
                let config =
                    build_server_config(&configuration, &provider, &versions, roots, identity)?;
                let mut without_alpn = config.clone();
                without_alpn.alpn_protocols.clear();
                (Some(Arc::new(config)), Some(Arc::new(without_alpn)))
            }
            None => (None, None),
        };

        log::debug!(
            "Built TLS context: versions {:?}..{:?}, verification {:?}, server identity {}",
            configuration.minimum_tls_version,
            configuration.maximum_tls_version,
            configuration.certificate_verification,
            server_config.is_some()
        );

        Ok(Self {
            configuration,
            client_config: Arc::new(client_config),
            anonymous_client_config: Arc::new(anonymous_client_config),
            server_config,
            server_config_without_alpn,
        })
    }

    pub fn configuration(&self) -> &TlsConfiguration {
        &self.configuration
    }

    pub(crate) fn client_config(&self) -> Arc<rustls::ClientConfig> {
        self.client_config.clone()
    }

    pub(crate) fn anonymous_client_config(&self) -> Arc<rustls::ClientConfig> {
        self.anonymous_client_config.clone()
    }

    /// `None` when the configuration carries no identity.
    pub(crate) fn server_config(&self) -> Option<Arc<rustls::ServerConfig>> {
        self.server_config.clone()
    }

    pub(crate) fn server_config_without_alpn(&self) -> Option<Arc<rustls::ServerConfig>> {
        self.server_config_without_alpn.clone()
    }
}

fn filtered_provider(
    configuration: &TlsConfiguration,
) -> Result<rustls::crypto::CryptoProvider, ConfigError> {
    let mut provider = crypto_provider().as_ref().clone();
    let wanted = configuration.cipher_suites();
    if wanted.is_empty() {
        return Ok(provider);
    }

    let mut cipher_suites = vec![];
    for suite in wanted {
        let rustls_suite = suite.to_rustls();
        match provider
            .cipher_suites
            .iter()
            .find(|supported| supported.suite() == rustls_suite)
        {
            Some(supported) => cipher_suites.push(*supported),
            None => log::warn!("cipher suite {} is not supported, skipping", suite.name()),
        }
    }
    if cipher_suites.is_empty() {
        return Err(ConfigError::NoCipherSuites);
    }
    provider.cipher_suites = cipher_suites;
    Ok(provider)
}

fn protocol_versions(
    configuration: &TlsConfiguration,
) -> Result<Vec<&'static rustls::SupportedProtocolVersion>, ConfigError> {
    let min = configuration.minimum_tls_version;
    let max = configuration.maximum_tls_version.unwrap_or(TlsVersion::Tls1_3);
    let versions: Vec<_> = TlsVersion::ALL
        .iter()
        .filter(|version| **version >= min && **version <= max)
        .filter_map(|version| version.to_rustls())
        .collect();
    if versions.is_empty() {
        return Err(ConfigError::NoProtocolVersions);
    }
    Ok(versions)
}

fn add_trust_roots(
    store: &mut rustls::RootCertStore,
    roots: &TrustRoots,
) -> Result<(), ConfigError> {
    let certificates = match roots {
        TrustRoots::Default => {
            store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            return Ok(());
        }
        TrustRoots::File(path) => Certificate::chain_from_pem_file(path)?,
        TrustRoots::Certificates(certificates) => certificates.clone(),
    };
    let (added, ignored) =
        store.add_parsable_certificates(certificates.iter().map(Certificate::to_rustls));
    if ignored > 0 {
        log::warn!("ignored {ignored} unparsable trust root certificates");
    }
    log::trace!("added {added} trust root certificates");
    Ok(())
}

fn load_trust_roots(configuration: &TlsConfiguration) -> Result<rustls::RootCertStore, ConfigError> {
    let mut store = rustls::RootCertStore::empty();
    if configuration.certificate_verification == CertificateVerification::None {
        return Ok(store);
    }
    add_trust_roots(&mut store, &configuration.trust_roots)?;
    for roots in configuration.additional_trust_roots.iter() {
        add_trust_roots(&mut store, roots)?;
    }
    Ok(store)
}

fn allowed_schemes(algorithms: &Option<Vec<SignatureAlgorithm>>) -> Option<Vec<rustls::SignatureScheme>> {
    algorithms
        .as_ref()
        .map(|algorithms| algorithms.iter().map(|a| a.to_rustls()).collect())
}

fn load_identity(
    configuration: &TlsConfiguration,
    provider: &rustls::crypto::CryptoProvider,
) -> Result<Option<Arc<FixedIdentity>>, ConfigError> {
    let key = match (&configuration.certificate_chain[..], &configuration.private_key) {
        ([], None) => return Ok(None),
        ([], Some(_)) | (_, None) => return Err(ConfigError::IncompleteIdentity),
        (_, Some(key)) => key,
    };

    let mut signing_key = provider.key_provider.load_private_key(key.to_rustls())?;
    if let Some(schemes) = allowed_schemes(&configuration.signing_signature_algorithms) {
        signing_key = Arc::new(RestrictedSigningKey::new(signing_key, schemes));
    }
    let chain = configuration
        .certificate_chain
        .iter()
        .map(Certificate::to_rustls)
        .collect();
    let certified_key = rustls::sign::CertifiedKey::new(chain, signing_key);
    Ok(Some(Arc::new(FixedIdentity::new(certified_key))))
}

fn build_client_config(
    configuration: &TlsConfiguration,
    provider: &Arc<rustls::crypto::CryptoProvider>,
    versions: &[&'static rustls::SupportedProtocolVersion],
    roots: &Arc<rustls::RootCertStore>,
    identity: Option<Arc<FixedIdentity>>,
    verification: CertificateVerification,
) -> Result<rustls::ClientConfig, ConfigError> {
    let policy = SignaturePolicy::new(
        provider.signature_verification_algorithms,
        allowed_schemes(&configuration.verify_signature_algorithms),
    );
    let verifier: Arc<dyn rustls::client::danger::ServerCertVerifier> = match verification {
        CertificateVerification::None => Arc::new(DisabledVerifier::new(policy)),
        CertificateVerification::NoHostnameVerification => {
            Arc::new(PolicyServerVerifier::new(roots.clone(), policy, false))
        }
        CertificateVerification::FullVerification => {
            Arc::new(PolicyServerVerifier::new(roots.clone(), policy, true))
        }
    };

    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(versions)?
        .dangerous()
        .with_custom_certificate_verifier(verifier);

    let mut config = match identity {
        Some(identity) => builder.with_client_cert_resolver(identity),
        None => builder.with_no_client_auth(),
    };

    config.alpn_protocols = configuration
        .application_protocols()
        .iter()
        .map(|s| s.as_bytes().to_vec())
        .collect();
    if let Some(ref key_log) = configuration.key_log {
        config.key_log = key_log.clone();
    }

    Ok(config)
}

fn build_server_config(
    configuration: &TlsConfiguration,
    provider: &Arc<rustls::crypto::CryptoProvider>,
    versions: &[&'static rustls::SupportedProtocolVersion],
    roots: Arc<rustls::RootCertStore>,
    identity: Arc<FixedIdentity>,
) -> Result<rustls::ServerConfig, ConfigError> {
    let builder = rustls::ServerConfig::builder_with_provider(provider.clone())
        .with_protocol_versions(versions)?;

    let builder = if configuration.certificate_verification == CertificateVerification::None {
        builder.with_no_client_auth()
    } else {
        let mut verifier_builder =
            rustls::server::WebPkiClientVerifier::builder_with_provider(roots, provider.clone());
        if !configuration.send_ca_name_list {
            verifier_builder = verifier_builder.clear_root_hint_subjects();
        }
        let verifier = verifier_builder
            .build()
            .map_err(|e| ConfigError::Verifier(e.to_string()))?;
        builder.with_client_cert_verifier(verifier)
    };

    let mut config = builder.with_cert_resolver(identity);

    config.alpn_protocols = configuration
        .application_protocols()
        .iter()
        .map(|s| s.as_bytes().to_vec())
        .collect();
    if let Some(ref key_log) = configuration.key_log {
        config.key_log = key_log.clone();
    }

    Ok(config)
}
