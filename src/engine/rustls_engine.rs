use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use rustls::pki_types::ServerName;

use super::{EngineReturn, ErrorQueue, HandshakeRole, ShutdownProgress, TlsEngine};
use crate::config::{CipherSuite, TlsVersion};
use crate::context::TlsContext;
use crate::error::{ErrorCode, ErrorReason, TlsError};
use crate::memory_bridge::MemoryBridge;

struct Failure {
    code: ErrorCode,
    reason: Option<String>,
}

impl Failure {
    fn want_read() -> Self {
        Self {
            code: ErrorCode::WantRead,
            reason: None,
        }
    }

    fn want_write() -> Self {
        Self {
            code: ErrorCode::WantWrite,
            reason: None,
        }
    }

    fn zero_return() -> Self {
        Self {
            code: ErrorCode::ZeroReturn,
            reason: None,
        }
    }

    fn syscall(reason: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Syscall,
            reason: Some(reason.into()),
        }
    }

    fn ssl(reason: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Ssl,
            reason: Some(reason.into()),
        }
    }
}

/// One live rustls session plus the transport facts rustls does not track
/// for us.
struct Session {
    conn: rustls::Connection,
    close_notify_sent: bool,
    peer_closed: bool,
    eof: bool,
}

impl Session {
    fn new(conn: rustls::Connection) -> Self {
        Self {
            conn,
            close_notify_sent: false,
            peer_closed: false,
            eof: false,
        }
    }

    /// Feed queued inbound ciphertext to rustls and process it. Stops when
    /// the bridge is empty or rustls wants no more input.
    fn receive(&mut self, bridge: &mut MemoryBridge) -> Result<(), Failure> {
        while !self.eof && self.conn.wants_read() {
            match self.conn.read_tls(bridge) {
                Ok(0) => {
                    log::trace!("transport reached end of input");
                    self.eof = true;
                }
                Ok(n) => {
                    log::trace!("fed {n} bytes of ciphertext");
                    self.process(bridge)?;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(Failure::syscall(format!("transport read failed: {e}"))),
            }
        }
        Ok(())
    }

    fn process(&mut self, bridge: &mut MemoryBridge) -> Result<(), Failure> {
        match self.conn.process_new_packets() {
            Ok(state) => {
                if state.peer_has_closed() && !self.peer_closed {
                    log::debug!("peer sent close_notify");
                    self.peer_closed = true;
                }
                Ok(())
            }
            Err(e) => {
                // Last gasp write so the peer sees our alert.
                let _ = self.flush(bridge);
                Err(Failure::ssl(e.to_string()))
            }
        }
    }

    fn flush(&mut self, bridge: &mut MemoryBridge) -> Result<(), Failure> {
        while self.conn.wants_write() {
            match self.conn.write_tls(bridge) {
                Ok(0) => break,
                Ok(n) => log::trace!("wrote {n} bytes of ciphertext"),
                Err(e) => return Err(Failure::syscall(format!("transport write failed: {e}"))),
            }
        }
        Ok(())
    }

    fn handshake(&mut self, bridge: &mut MemoryBridge) -> Result<(), Failure> {
        self.flush(bridge)?;
        self.receive(bridge)?;
        self.flush(bridge)?;

        match (self.eof, self.conn.is_handshaking()) {
            (_, false) => Ok(()),
            (true, true) => Err(Failure::syscall("end of input during handshake")),
            (false, true) => Err(Failure::want_read()),
        }
    }

    fn read(&mut self, bridge: &mut MemoryBridge, buf: &mut [u8]) -> Result<usize, Failure> {
        self.receive(bridge)?;
        self.flush(bridge)?;

        match self.conn.reader().read(buf) {
            Ok(0) if !buf.is_empty() => Err(Failure::zero_return()),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(Failure::want_read()),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(Failure::syscall("end of input without close_notify"))
            }
            Err(e) => Err(Failure::ssl(e.to_string())),
        }
    }

    fn write(&mut self, bridge: &mut MemoryBridge, buf: &[u8]) -> Result<usize, Failure> {
        if self.close_notify_sent {
            return Err(Failure::ssl("write after shutdown"));
        }

        self.receive(bridge)?;
        if self.conn.is_handshaking() {
            self.flush(bridge)?;
            if self.eof {
                return Err(Failure::syscall("end of input during handshake"));
            }
            return Err(Failure::want_read());
        }

        let n = self
            .conn
            .writer()
            .write(buf)
            .map_err(|e| Failure::ssl(e.to_string()))?;
        self.flush(bridge)?;
        if n == 0 {
            return Err(Failure::want_write());
        }
        Ok(n)
    }

    fn shutdown(&mut self, bridge: &mut MemoryBridge) -> Result<ShutdownProgress, Failure> {
        if self.conn.is_handshaking() {
            return Err(Failure::ssl("shutdown while in handshake"));
        }

        let first_call = !self.close_notify_sent;
        if first_call {
            log::debug!("sending close_notify");
            self.conn.send_close_notify();
            self.close_notify_sent = true;
        }
        self.flush(bridge)?;

        loop {
            self.receive(bridge)?;
            if self.discard_plaintext() == 0 {
                break;
            }
        }
        self.flush(bridge)?;

        if self.peer_closed {
            log::debug!("TLS shutdown complete");
            return Ok(ShutdownProgress::Closed);
        }
        if first_call {
            return Ok(ShutdownProgress::Sent);
        }
        if self.eof {
            return Err(Failure::syscall("end of input before peer close_notify"));
        }
        Err(Failure::want_read())
    }

    fn discard_plaintext(&mut self) -> usize {
        let mut discarded = 0;
        let mut buf = [0u8; 4096];
        while let Ok(n) = self.conn.reader().read(&mut buf) {
            if n == 0 {
                break;
            }
            discarded += n;
        }
        if discarded > 0 {
            log::trace!("discarded {discarded} bytes of plaintext received during shutdown");
        }
        discarded
    }
}

/// [`TlsEngine`] backed by a rustls session.
///
/// The session is created on the first advancing call, from the role and
/// SNI name recorded before it.
pub struct RustlsEngine {
    context: Arc<TlsContext>,
    role: Option<HandshakeRole>,
    server_name: Option<ServerName<'static>>,
    // Server side only, until the client hello is complete.
    acceptor: Option<rustls::server::Acceptor>,
    session: Option<Session>,
    errors: ErrorQueue,
    code: ErrorCode,
}

impl RustlsEngine {
    pub fn new(context: Arc<TlsContext>) -> Self {
        Self {
            context,
            role: None,
            server_name: None,
            acceptor: None,
            session: None,
            errors: ErrorQueue::default(),
            code: ErrorCode::None,
        }
    }

    fn create_session(&mut self, bridge: &mut MemoryBridge) -> Result<Session, Failure> {
        let conn: rustls::Connection = match self.role {
            None => return Err(Failure::ssl("handshake role was never set")),
            Some(HandshakeRole::Server) => self.accept(bridge)?.into(),
            Some(HandshakeRole::Client) => {
                let (config, server_name) = match self.server_name {
                    Some(ref name) => (self.context.client_config(), name.clone()),
                    None => (
                        self.context.anonymous_client_config(),
                        ServerName::from(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
                    ),
                };
                let mut conn = rustls::ClientConnection::new(config, server_name)
                    .map_err(|e| Failure::ssl(e.to_string()))?;
                conn.set_buffer_limit(None);
                conn.into()
            }
        };
        log::debug!("created {:?} TLS session", self.role);
        Ok(Session::new(conn))
    }

    /// Buffer the client hello, then pick the server config for it. A hello
    /// whose ALPN offer shares nothing with ours gets the config without an
    /// ALPN list, so the handshake completes with no protocol acknowledged.
    fn accept(&mut self, bridge: &mut MemoryBridge) -> Result<rustls::ServerConnection, Failure> {
        if self.context.server_config().is_none() {
            return Err(Failure::ssl("no certificate chain and private key configured"));
        }

        let mut acceptor = self.acceptor.take().unwrap_or_default();
        let accepted = loop {
            match acceptor.accept() {
                Ok(Some(accepted)) => break accepted,
                Ok(None) => {}
                Err((e, mut alert)) => {
                    let _ = alert.write_all(bridge);
                    self.acceptor = Some(acceptor);
                    return Err(Failure::ssl(e.to_string()));
                }
            }
            match acceptor.read_tls(bridge) {
                Ok(0) => return Err(Failure::syscall("end of input during handshake")),
                Ok(n) => log::trace!("fed {n} bytes of client hello"),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.acceptor = Some(acceptor);
                    return Err(Failure::want_read());
                }
                Err(e) => return Err(Failure::syscall(format!("transport read failed: {e}"))),
            }
        };

        let ours = self.context.configuration().application_protocols();
        let disjoint = match accepted.client_hello().alpn() {
            Some(mut offered) => {
                !ours.is_empty()
                    && !offered.any(|protocol| ours.iter().any(|o| o.as_bytes() == protocol))
            }
            None => false,
        };
        let config = if disjoint {
            log::debug!("client offered none of our ALPN protocols, continuing without ALPN");
            self.context.server_config_without_alpn()
        } else {
            self.context.server_config()
        }
        .ok_or_else(|| Failure::ssl("no certificate chain and private key configured"))?;

        let mut conn = accepted.into_connection(config).map_err(|(e, mut alert)| {
            let _ = alert.write_all(bridge);
            Failure::ssl(e.to_string())
        })?;
        conn.set_buffer_limit(None);
        Ok(conn)
    }

    fn record<T>(&mut self, failure: Failure) -> EngineReturn<T> {
        if let Some(reason) = failure.reason {
            log::trace!("engine error ({}): {}", failure.code, reason);
            self.errors.push(reason);
        }
        self.code = failure.code;
        EngineReturn::NoProgress
    }

    fn with_session<T>(
        &mut self,
        bridge: &mut MemoryBridge,
        step: impl FnOnce(&mut Session, &mut MemoryBridge) -> Result<T, Failure>,
    ) -> EngineReturn<T> {
        let mut session = match self.session.take() {
            Some(session) => session,
            None => match self.create_session(bridge) {
                Ok(session) => session,
                Err(failure) => return self.record(failure),
            },
        };
        let result = step(&mut session, bridge);
        self.session = Some(session);
        match result {
            Ok(value) => EngineReturn::Done(value),
            Err(failure) => self.record(failure),
        }
    }

    fn common_state(&self) -> Option<&rustls::CommonState> {
        self.session.as_ref().map(|session| &*session.conn)
    }
}

impl TlsEngine for RustlsEngine {
    fn set_accept_state(&mut self) {
        if let Some(ref name) = self.server_name {
            log::warn!("server name {name:?} is ignored in the server role");
        }
        self.role = Some(HandshakeRole::Server);
    }

    fn set_connect_state(&mut self) {
        self.role = Some(HandshakeRole::Client);
    }

    fn set_server_name(&mut self, hostname: &str) -> Result<(), TlsError> {
        let name = ServerName::try_from(hostname)
            .map_err(|_| TlsError::InvalidSniName(hostname.to_string()))?;
        if self.session.is_some() || self.acceptor.is_some() {
            log::warn!("server name {hostname} set after the handshake started, ignoring it");
            return Ok(());
        }
        self.server_name = Some(name.to_owned());
        Ok(())
    }

    fn clear_errors(&mut self) {
        self.errors.clear();
        self.code = ErrorCode::None;
    }

    fn take_errors(&mut self) -> Vec<ErrorReason> {
        self.errors.take()
    }

    fn error_code(&self) -> ErrorCode {
        self.code
    }

    fn do_handshake(&mut self, bridge: &mut MemoryBridge) -> EngineReturn<()> {
        let result = self.with_session(bridge, Session::handshake);
        if let EngineReturn::Done(()) = result {
            log::debug!(
                "TLS handshake complete: version {:?}, ALPN {:?}",
                self.negotiated_protocol_version(),
                self.alpn_protocol().map(String::from_utf8_lossy)
            );
        }
        result
    }

    fn shutdown(&mut self, bridge: &mut MemoryBridge) -> EngineReturn<ShutdownProgress> {
        if self.session.is_none() {
            return self.record(Failure::ssl("shutdown while in handshake"));
        }
        self.with_session(bridge, Session::shutdown)
    }

    fn read(&mut self, bridge: &mut MemoryBridge, buf: &mut [u8]) -> EngineReturn<usize> {
        self.with_session(bridge, |session, bridge| session.read(bridge, buf))
    }

    fn write(&mut self, bridge: &mut MemoryBridge, buf: &[u8]) -> EngineReturn<usize> {
        self.with_session(bridge, |session, bridge| session.write(bridge, buf))
    }

    fn alpn_protocol(&self) -> Option<&[u8]> {
        self.common_state()?.alpn_protocol()
    }

    fn peer_certificate(&self) -> Option<&[u8]> {
        self.common_state()?
            .peer_certificates()?
            .first()
            .map(|cert| cert.as_ref())
    }

    fn negotiated_protocol_version(&self) -> Option<TlsVersion> {
        TlsVersion::from_rustls(self.common_state()?.protocol_version()?)
    }

    fn negotiated_cipher_suite(&self) -> Option<CipherSuite> {
        CipherSuite::from_rustls(self.common_state()?.negotiated_cipher_suite()?.suite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsConfiguration;
    use crate::test_util::TestPki;

    fn client_engine() -> RustlsEngine {
        let context = Arc::new(TlsContext::new(TlsConfiguration::client_default()).unwrap());
        RustlsEngine::new(context)
    }

    #[test]
    fn test_missing_role_fails() {
        let mut engine = client_engine();
        let mut bridge = MemoryBridge::new();
        assert_eq!(engine.do_handshake(&mut bridge), EngineReturn::NoProgress);
        assert_eq!(engine.error_code(), ErrorCode::Ssl);
        assert_eq!(engine.take_errors().len(), 1);
    }

    #[test]
    fn test_server_without_identity_fails() {
        let mut engine = client_engine();
        engine.set_accept_state();
        let mut bridge = MemoryBridge::new();
        assert_eq!(engine.do_handshake(&mut bridge), EngineReturn::NoProgress);
        assert_eq!(engine.error_code(), ErrorCode::Ssl);
    }

    #[test]
    fn test_client_hello_written_on_first_step() {
        let mut engine = client_engine();
        engine.set_connect_state();
        engine.set_server_name("example.com").unwrap();
        let mut bridge = MemoryBridge::new();

        assert_eq!(engine.do_handshake(&mut bridge), EngineReturn::NoProgress);
        assert_eq!(engine.error_code(), ErrorCode::WantRead);
        let hello = bridge.drain_outbound().unwrap();
        // Handshake record.
        assert_eq!(hello[0], 0x16);
    }

    #[test]
    fn test_end_of_input_during_handshake() {
        let mut engine = client_engine();
        engine.set_connect_state();
        let mut bridge = MemoryBridge::new();
        bridge.signal_end_of_input();

        assert_eq!(engine.do_handshake(&mut bridge), EngineReturn::NoProgress);
        assert_eq!(engine.error_code(), ErrorCode::Syscall);
    }

    #[test]
    fn test_shutdown_before_session() {
        let mut engine = client_engine();
        engine.set_connect_state();
        let mut bridge = MemoryBridge::new();
        assert_eq!(engine.shutdown(&mut bridge), EngineReturn::NoProgress);
        assert_eq!(engine.error_code(), ErrorCode::Ssl);
        assert!(bridge.drain_outbound().is_none());
    }

    #[test]
    fn test_server_name_fixed_once_session_exists() {
        let mut engine = client_engine();
        engine.set_connect_state();
        engine.set_server_name("example.com").unwrap();
        let mut bridge = MemoryBridge::new();
        assert_eq!(engine.do_handshake(&mut bridge), EngineReturn::NoProgress);

        engine.set_server_name("other.example").unwrap();
        assert_eq!(
            engine.server_name,
            Some(ServerName::try_from("example.com").unwrap())
        );
    }

    #[test]
    fn test_server_waits_for_whole_client_hello() {
        let pki = TestPki::generate();
        let context = Arc::new(TlsContext::new(pki.server_configuration()).unwrap());
        let mut engine = RustlsEngine::new(context);
        engine.set_server_name("localhost").unwrap();
        engine.set_accept_state();
        let mut bridge = MemoryBridge::new();

        assert_eq!(engine.do_handshake(&mut bridge), EngineReturn::NoProgress);
        assert_eq!(engine.error_code(), ErrorCode::WantRead);
        assert!(engine.session.is_none());
        assert!(engine.acceptor.is_some());
        assert!(engine.take_errors().is_empty());
    }

    #[test]
    fn test_invalid_server_name() {
        let mut engine = client_engine();
        assert_eq!(
            engine.set_server_name(""),
            Err(TlsError::InvalidSniName(String::new()))
        );
        assert_eq!(
            engine.set_server_name("not a hostname!"),
            Err(TlsError::InvalidSniName("not a hostname!".to_string()))
        );
    }
}
