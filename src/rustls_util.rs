//! rustls trait implementations that carry a [`crate::TlsConfiguration`]'s
//! verification and signing policy into the engine.

use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SignaturePolicy {
    supported_algs: rustls::crypto::WebPkiSupportedAlgorithms,
    allowed_schemes: Option<Vec<rustls::SignatureScheme>>,
}

impl SignaturePolicy {
    pub fn new(
        supported_algs: rustls::crypto::WebPkiSupportedAlgorithms,
        allowed_schemes: Option<Vec<rustls::SignatureScheme>>,
    ) -> Self {
        Self {
            supported_algs,
            allowed_schemes,
        }
    }

    fn check_scheme(&self, scheme: rustls::SignatureScheme) -> Result<(), rustls::Error> {
        match self.allowed_schemes {
            Some(ref allowed) if !allowed.contains(&scheme) => Err(rustls::Error::General(
                format!("peer signed with disallowed signature scheme {scheme:?}"),
            )),
            _ => Ok(()),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        self.check_scheme(dss.scheme)?;
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.supported_algs)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        self.check_scheme(dss.scheme)?;
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.supported_algs)
    }

    fn supported_schemes(&self) -> Vec<rustls::SignatureScheme> {
        let schemes = self.supported_algs.supported_schemes();
        match self.allowed_schemes {
            Some(ref allowed) => schemes
                .into_iter()
                .filter(|scheme| allowed.contains(scheme))
                .collect(),
            None => schemes,
        }
    }
}

/// Validates the server chain against a root store, and optionally checks
/// that the leaf was issued for the server name.
#[derive(Debug)]
pub struct PolicyServerVerifier {
    roots: Arc<rustls::RootCertStore>,
    policy: SignaturePolicy,
    check_hostname: bool,
}

impl PolicyServerVerifier {
    pub fn new(
        roots: Arc<rustls::RootCertStore>,
        policy: SignaturePolicy,
        check_hostname: bool,
    ) -> Self {
        Self {
            roots,
            policy,
            check_hostname,
        }
    }
}

impl rustls::client::danger::ServerCertVerifier for PolicyServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &rustls::pki_types::CertificateDer<'_>,
        intermediates: &[rustls::pki_types::CertificateDer<'_>],
        server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        let cert = rustls::server::ParsedCertificate::try_from(end_entity)?;
        rustls::client::verify_server_cert_signed_by_trust_anchor(
            &cert,
            &self.roots,
            intermediates,
            now,
            self.policy.supported_algs.all,
        )?;
        if self.check_hostname {
            rustls::client::verify_server_name(&cert, server_name)?;
        }
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        self.policy.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        self.policy.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.policy.supported_schemes()
    }
}

/// Accepts any server certificate. Handshake signatures are still checked.
#[derive(Debug)]
pub struct DisabledVerifier {
    policy: SignaturePolicy,
}

impl DisabledVerifier {
    pub fn new(policy: SignaturePolicy) -> Self {
        Self { policy }
    }
}

impl rustls::client::danger::ServerCertVerifier for DisabledVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        self.policy.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        self.policy.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.policy.supported_schemes()
    }
}

/// Presents the same certified key for every handshake, as server or client.
#[derive(Debug)]
pub struct FixedIdentity {
    key: Arc<rustls::sign::CertifiedKey>,
}

impl FixedIdentity {
    pub fn new(key: rustls::sign::CertifiedKey) -> Self {
        Self { key: Arc::new(key) }
    }
}

impl rustls::server::ResolvesServerCert for FixedIdentity {
    fn resolve(
        &self,
        _client_hello: rustls::server::ClientHello<'_>,
    ) -> Option<Arc<rustls::sign::CertifiedKey>> {
        Some(self.key.clone())
    }
}

impl rustls::client::ResolvesClientCert for FixedIdentity {
    fn resolve(
        &self,
        _root_hint_subjects: &[&[u8]],
        _sigschemes: &[rustls::SignatureScheme],
    ) -> Option<Arc<rustls::sign::CertifiedKey>> {
        Some(self.key.clone())
    }

    fn has_certs(&self) -> bool {
        true
    }
}

/// Wraps a signing key so it only ever signs with the allowed schemes.
#[derive(Debug)]
pub struct RestrictedSigningKey {
    inner: Arc<dyn rustls::sign::SigningKey>,
    allowed_schemes: Vec<rustls::SignatureScheme>,
}

impl RestrictedSigningKey {
    pub fn new(
        inner: Arc<dyn rustls::sign::SigningKey>,
        allowed_schemes: Vec<rustls::SignatureScheme>,
    ) -> Self {
        Self {
            inner,
            allowed_schemes,
        }
    }
}

impl rustls::sign::SigningKey for RestrictedSigningKey {
    fn choose_scheme(
        &self,
        offered: &[rustls::SignatureScheme],
    ) -> Option<Box<dyn rustls::sign::Signer>> {
        let offered: Vec<rustls::SignatureScheme> = offered
            .iter()
            .copied()
            .filter(|scheme| self.allowed_schemes.contains(scheme))
            .collect();
        self.inner.choose_scheme(&offered)
    }

    fn algorithm(&self) -> rustls::SignatureAlgorithm {
        self.inner.algorithm()
    }
}
