//! Per-session connection driver.
//!
//! A [`Connection`] owns one engine session and one [`MemoryBridge`]. The
//! caller owns the socket: it feeds received ciphertext in with
//! [`Connection::supply_inbound`], calls an operation, then sends whatever
//! [`Connection::drain_outbound`] returns. Each operation returns an
//! [`OperationResult`]; `Incomplete` means "do more I/O and call again".
//!
//! ```ignore
//! let mut conn = Connection::new(context);
//! conn.install_bridge();
//! conn.set_connect_state();
//! conn.set_server_hostname("example.com")?;
//! loop {
//!     let result = conn.handshake();
//!     if let Some(bytes) = conn.drain_outbound() {
//!         socket.write_all(&bytes)?;
//!     }
//!     match result {
//!         OperationResult::Complete(()) => break,
//!         OperationResult::Incomplete => conn.supply_inbound(&read_some(&mut socket)?),
//!         OperationResult::Failed(e) => return Err(e.into()),
//!     }
//! }
//! ```

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};

use crate::certificate::Certificate;
use crate::config::{CertificateVerification, CipherSuite, TlsVersion};
use crate::context::TlsContext;
use crate::engine::{HandshakeRole, RustlsEngine, ShutdownProgress, TlsEngine};
use crate::error::TlsError;
use crate::memory_bridge::MemoryBridge;
use crate::operation_result::{classify, OperationResult};

pub struct Connection<E: TlsEngine = RustlsEngine> {
    engine: E,
    bridge: Option<MemoryBridge>,
    role: Option<HandshakeRole>,
    validate_hostname: bool,
}

impl Connection<RustlsEngine> {
    pub fn new(context: Arc<TlsContext>) -> Self {
        let validate_hostname = context.configuration().certificate_verification
            == CertificateVerification::FullVerification;
        Self::with_engine(RustlsEngine::new(context), validate_hostname)
    }
}

impl<E: TlsEngine> Connection<E> {
    pub fn with_engine(engine: E, validate_hostname: bool) -> Self {
        Self {
            engine,
            bridge: None,
            role: None,
            validate_hostname,
        }
    }

    /// Create the memory bridge. Must happen exactly once, before any I/O.
    pub fn install_bridge(&mut self) {
        assert!(
            self.bridge.is_none(),
            "memory bridge installed twice on the same connection"
        );
        self.bridge = Some(MemoryBridge::new());
    }

    pub fn set_accept_state(&mut self) {
        self.assign_role(HandshakeRole::Server);
        self.engine.set_accept_state();
    }

    pub fn set_connect_state(&mut self) {
        self.assign_role(HandshakeRole::Client);
        self.engine.set_connect_state();
    }

    fn assign_role(&mut self, role: HandshakeRole) {
        if let Some(existing) = self.role {
            panic!("handshake role already set to {existing:?}, cannot change to {role:?}");
        }
        log::debug!("connection role set to {role:?}");
        self.role = Some(role);
    }

    pub fn role(&self) -> Option<HandshakeRole> {
        self.role
    }

    /// Set the SNI hostname. Client only, and never an IP address literal.
    /// Only takes effect before the first handshake step.
    pub fn set_server_hostname(&mut self, hostname: &str) -> Result<(), TlsError> {
        assert_ne!(
            self.role,
            Some(HandshakeRole::Server),
            "SNI hostname set on a server connection"
        );
        self.engine.set_server_name(hostname)
    }

    pub fn supply_inbound(&mut self, bytes: &[u8]) {
        bridge_mut(&mut self.bridge).supply_inbound(bytes);
    }

    pub fn drain_outbound(&mut self) -> Option<Bytes> {
        bridge_mut(&mut self.bridge).drain_outbound()
    }

    /// Tell the engine the transport will deliver no more bytes.
    pub fn signal_end_of_input(&mut self) {
        bridge_mut(&mut self.bridge).signal_end_of_input();
    }

    /// Advance the handshake. Always drain outbound bytes afterwards,
    /// whatever the result.
    pub fn handshake(&mut self) -> OperationResult<()> {
        let bridge = bridge_mut(&mut self.bridge);
        classify(&mut self.engine, |engine| engine.do_handshake(bridge))
    }

    /// Advance the close_notify exchange. `Complete` once both sides have
    /// sent close_notify. The caller bounds the number of attempts with the
    /// configured shutdown timeout.
    pub fn shutdown(&mut self) -> OperationResult<()> {
        let bridge = bridge_mut(&mut self.bridge);
        match classify(&mut self.engine, |engine| engine.shutdown(bridge)) {
            OperationResult::Complete(ShutdownProgress::Closed) => OperationResult::Complete(()),
            OperationResult::Complete(ShutdownProgress::Sent) => OperationResult::Incomplete,
            OperationResult::Incomplete => OperationResult::Incomplete,
            OperationResult::Failed(e) => OperationResult::Failed(e),
        }
    }

    /// Decrypt into `buf`, returning the number of cleartext bytes written.
    pub fn read_cleartext(&mut self, buf: &mut [u8]) -> OperationResult<usize> {
        let bridge = bridge_mut(&mut self.bridge);
        if buf.is_empty() {
            return OperationResult::Complete(0);
        }
        classify(&mut self.engine, |engine| engine.read(bridge, buf))
    }

    /// Encrypt all of `buf` and advance it past the consumed bytes.
    ///
    /// # Panics
    ///
    /// Panics if the engine consumes only part of `buf`. The bridge accepts
    /// every write in full, so a short write means the engine and bridge
    /// disagree.
    pub fn write_cleartext(&mut self, buf: &mut BytesMut) -> OperationResult<usize> {
        if buf.is_empty() {
            return OperationResult::Complete(0);
        }
        let bridge = bridge_mut(&mut self.bridge);
        let result = classify(&mut self.engine, |engine| engine.write(bridge, &buf[..]));
        if let OperationResult::Complete(written) = result {
            assert_eq!(
                written,
                buf.len(),
                "engine consumed {} of {} cleartext bytes",
                written,
                buf.len()
            );
            buf.advance(written);
        }
        result
    }

    /// Negotiated ALPN protocol, once the handshake has completed.
    pub fn negotiated_protocol(&self) -> Option<String> {
        self.engine
            .alpn_protocol()
            .filter(|protocol| !protocol.is_empty())
            .map(|protocol| String::from_utf8_lossy(protocol).into_owned())
    }

    /// The peer's leaf certificate, if it presented one.
    pub fn peer_certificate(&self) -> Option<Certificate> {
        self.engine.peer_certificate().map(Certificate::from_der)
    }

    pub fn negotiated_protocol_version(&self) -> Option<TlsVersion> {
        self.engine.negotiated_protocol_version()
    }

    pub fn negotiated_cipher_suite(&self) -> Option<CipherSuite> {
        self.engine.negotiated_cipher_suite()
    }

    /// Whether the configuration asks for hostname verification. This is
    /// the configured policy, fixed at construction: a client that never
    /// sets an SNI hostname still reports `true` but skips the check.
    pub fn validate_hostname(&self) -> bool {
        self.validate_hostname
    }
}

fn bridge_mut(bridge: &mut Option<MemoryBridge>) -> &mut MemoryBridge {
    match bridge {
        Some(bridge) => bridge,
        None => panic!("connection used before its memory bridge was installed"),
    }
}
