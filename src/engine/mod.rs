//! The TLS engine seam.
//!
//! The driver treats the engine as an opaque state machine with an
//! OpenSSL-shaped surface: each advancing call either makes progress or
//! reports "no progress", and the reason is then read from the engine's
//! error state. Transport I/O goes through the [`MemoryBridge`] passed into
//! every advancing call.

mod rustls_engine;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::OnceLock;

pub use rustls_engine::RustlsEngine;

use crate::config::{CipherSuite, TlsVersion};
use crate::error::{ErrorCode, ErrorReason, TlsError, MAX_QUEUED_REASONS};
use crate::memory_bridge::MemoryBridge;

/// Outcome of one advancing engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineReturn<T> {
    Done(T),
    /// The call made no progress. The reason is in [`TlsEngine::error_code`].
    NoProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeRole {
    Server,
    Client,
}

/// Progress of a shutdown step that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownProgress {
    /// Our close_notify is queued, the peer's has not arrived yet.
    Sent,
    /// Both close_notify alerts have been exchanged.
    Closed,
}

pub trait TlsEngine {
    fn set_accept_state(&mut self);
    fn set_connect_state(&mut self);

    /// Record the SNI hostname. Must be called before the first handshake step.
    fn set_server_name(&mut self, hostname: &str) -> Result<(), TlsError>;

    /// Empty the error queue and reset the reason code.
    fn clear_errors(&mut self);

    /// Drain the error queue, oldest entry first.
    fn take_errors(&mut self) -> Vec<ErrorReason>;

    /// Reason for the most recent [`EngineReturn::NoProgress`].
    fn error_code(&self) -> ErrorCode;

    fn do_handshake(&mut self, bridge: &mut MemoryBridge) -> EngineReturn<()>;
    fn shutdown(&mut self, bridge: &mut MemoryBridge) -> EngineReturn<ShutdownProgress>;
    fn read(&mut self, bridge: &mut MemoryBridge, buf: &mut [u8]) -> EngineReturn<usize>;
    fn write(&mut self, bridge: &mut MemoryBridge, buf: &[u8]) -> EngineReturn<usize>;

    fn alpn_protocol(&self) -> Option<&[u8]>;
    fn peer_certificate(&self) -> Option<&[u8]>;
    fn negotiated_protocol_version(&self) -> Option<TlsVersion>;
    fn negotiated_cipher_suite(&self) -> Option<CipherSuite>;
}

/// Bounded FIFO of engine error reasons. Pushing past the bound drops the
/// oldest entry.
#[derive(Debug, Default)]
pub(crate) struct ErrorQueue {
    reasons: VecDeque<ErrorReason>,
}

impl ErrorQueue {
    pub fn push(&mut self, reason: impl Into<ErrorReason>) {
        if self.reasons.len() == MAX_QUEUED_REASONS {
            self.reasons.pop_front();
        }
        self.reasons.push_back(reason.into());
    }

    pub fn clear(&mut self) {
        self.reasons.clear();
    }

    pub fn take(&mut self) -> Vec<ErrorReason> {
        self.reasons.drain(..).collect()
    }
}

/// Process-wide crypto provider. Initialised on first use, shared afterwards.
pub fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    static INSTANCE: OnceLock<Arc<rustls::crypto::CryptoProvider>> = OnceLock::new();
    INSTANCE
        .get_or_init(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
        .clone()
}
