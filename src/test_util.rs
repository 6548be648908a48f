//! Fixtures shared by the unit tests: a throwaway PKI and helpers that drive
//! two connections against each other through their bridges.

use std::sync::{Arc, OnceLock};

use crate::certificate::{Certificate, PrivateKey};
use crate::config::{TlsConfiguration, TrustRoots};
use crate::connection::Connection;
use crate::context::TlsContext;
use crate::error::TlsError;
use crate::operation_result::OperationResult;

/// Upper bound on round trips before a back-to-back exchange is declared stuck.
pub const MAX_ROUND_TRIPS: usize = 16;

pub fn init_logging() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// A CA and one leaf certificate for `localhost` signed by it.
pub struct TestPki {
    pub ca_cert_pem: String,
    pub leaf_cert_pem: String,
    pub leaf_key_pem: String,
}

impl TestPki {
    pub fn generate() -> Self {
        let ca_key = rcgen::KeyPair::generate().unwrap();
        let mut ca_params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "tls-driver test CA");
        ca_params.key_usages = vec![
            rcgen::KeyUsagePurpose::KeyCertSign,
            rcgen::KeyUsagePurpose::CrlSign,
            rcgen::KeyUsagePurpose::DigitalSignature,
        ];
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = rcgen::KeyPair::generate().unwrap();
        let mut leaf_params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        leaf_params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "localhost");
        leaf_params.extended_key_usages = vec![
            rcgen::ExtendedKeyUsagePurpose::ServerAuth,
            rcgen::ExtendedKeyUsagePurpose::ClientAuth,
        ];
        let leaf_cert = leaf_params
            .signed_by(&leaf_key, &ca_cert, &ca_key)
            .unwrap();

        Self {
            ca_cert_pem: ca_cert.pem(),
            leaf_cert_pem: leaf_cert.pem(),
            leaf_key_pem: leaf_key.serialize_pem(),
        }
    }

    pub fn ca_certificate(&self) -> Certificate {
        Certificate::from_pem(self.ca_cert_pem.as_bytes()).unwrap()
    }

    pub fn leaf_certificate(&self) -> Certificate {
        Certificate::from_pem(self.leaf_cert_pem.as_bytes()).unwrap()
    }

    pub fn leaf_private_key(&self) -> PrivateKey {
        PrivateKey::from_pem(self.leaf_key_pem.as_bytes()).unwrap()
    }

    pub fn server_configuration(&self) -> TlsConfiguration {
        TlsConfiguration::server(vec![self.leaf_certificate()], self.leaf_private_key())
    }

    /// Full verification against this PKI's CA only.
    pub fn client_configuration(&self) -> TlsConfiguration {
        let mut config = TlsConfiguration::client_default();
        config.trust_roots = TrustRoots::Certificates(vec![self.ca_certificate()]);
        config
    }
}

pub fn server_connection(config: TlsConfiguration) -> Connection {
    let context = Arc::new(TlsContext::new(config).unwrap());
    let mut conn = Connection::new(context);
    conn.install_bridge();
    conn.set_accept_state();
    conn
}

pub fn client_connection(config: TlsConfiguration, hostname: Option<&str>) -> Connection {
    let context = Arc::new(TlsContext::new(config).unwrap());
    let mut conn = Connection::new(context);
    conn.install_bridge();
    conn.set_connect_state();
    if let Some(hostname) = hostname {
        conn.set_server_hostname(hostname).unwrap();
    }
    conn
}

/// Move all pending ciphertext between the two connections, both ways.
pub fn exchange(a: &mut Connection, b: &mut Connection) {
    if let Some(bytes) = a.drain_outbound() {
        b.supply_inbound(&bytes);
    }
    if let Some(bytes) = b.drain_outbound() {
        a.supply_inbound(&bytes);
    }
}

/// Step both handshakes until each completes. Returns the first failure.
pub fn handshake_pair(client: &mut Connection, server: &mut Connection) -> Result<(), TlsError> {
    let mut client_done = false;
    let mut server_done = false;

    for round in 0..MAX_ROUND_TRIPS {
        if !client_done {
            match client.handshake() {
                OperationResult::Complete(()) => client_done = true,
                OperationResult::Incomplete => {}
                OperationResult::Failed(e) => return Err(e),
            }
        }
        exchange(client, server);

        if !server_done {
            match server.handshake() {
                OperationResult::Complete(()) => server_done = true,
                OperationResult::Incomplete => {}
                OperationResult::Failed(e) => return Err(e),
            }
        }
        exchange(client, server);

        if client_done && server_done {
            log::debug!("handshake converged after {} round trips", round + 1);
            return Ok(());
        }
    }
    panic!("handshake did not converge within {MAX_ROUND_TRIPS} round trips");
}
