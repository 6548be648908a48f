//! tls-driver - A non-blocking TLS connection driver over an in-memory transport.
//!
//! The caller owns the socket and the event loop. A [`Connection`] never
//! touches the network: received ciphertext is pushed into its
//! [`MemoryBridge`], an operation is stepped, and the ciphertext it produced
//! is drained back out for the caller to send.
//!
//! # Features
//!
//! - **Sans-I/O**: handshake, read, write and shutdown are synchronous steps
//!   that report [`OperationResult::Incomplete`] instead of blocking
//! - **rustls engine**: TLS 1.2 and 1.3 via rustls with the aws-lc-rs provider
//! - **Configuration model**: presets, ALPN wire encoding, YAML loading
//!
//! # Usage
//!
//! ```ignore
//! let context = Arc::new(TlsContext::new(TlsConfiguration::client_default())?);
//! let mut conn = Connection::new(context);
//! conn.install_bridge();
//! conn.set_connect_state();
//! conn.set_server_hostname("example.com")?;
//! ```

mod certificate;
pub mod config;
mod connection;
mod context;
pub mod engine;
mod error;
mod memory_bridge;
mod operation_result;
mod option_util;
mod rustls_util;

#[cfg(test)]
mod test_util;

pub use certificate::{Certificate, PrivateKey};
pub use config::{TlsConfiguration, TlsConfigurationFile};
pub use connection::Connection;
pub use context::TlsContext;
pub use error::{ConfigError, ErrorCode, ErrorDetail, ErrorReason, TlsError, MAX_QUEUED_REASONS};
pub use memory_bridge::MemoryBridge;
pub use operation_result::OperationResult;
pub use option_util::NoneOrSome;
