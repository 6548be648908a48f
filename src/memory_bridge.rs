//! In-memory transport the TLS engine reads from and writes to.
//!
//! The caller owns the real socket. It pushes received ciphertext in with
//! [`MemoryBridge::supply_inbound`] and takes ciphertext to send with
//! [`MemoryBridge::drain_outbound`]. The engine sees the bridge through its
//! `std::io::Read` / `std::io::Write` implementations, the same way rustls
//! `read_tls()` / `write_tls()` see a socket.

use std::io::{self, Read, Write};

use bytes::{Buf, Bytes, BytesMut};

/// Two independent FIFO byte queues standing in for a socket.
///
/// Reads against an empty inbound queue report `WouldBlock`, never EOF,
/// unless [`MemoryBridge::signal_end_of_input`] was called. Writes always
/// succeed in full, so the engine never sees backpressure.
#[derive(Debug, Default)]
pub struct MemoryBridge {
    inbound: BytesMut,
    outbound: BytesMut,
    end_of_input: bool,
}

impl MemoryBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append ciphertext received from the peer.
    pub fn supply_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend_from_slice(bytes);
    }

    /// Remove and return everything the engine has written, or `None` if
    /// nothing is queued.
    pub fn drain_outbound(&mut self) -> Option<Bytes> {
        if self.outbound.is_empty() {
            return None;
        }
        Some(self.outbound.split().freeze())
    }

    /// Mark the inbound direction as finished. Once the queued bytes are
    /// consumed, engine reads report EOF instead of `WouldBlock`.
    pub fn signal_end_of_input(&mut self) {
        self.end_of_input = true;
    }

    pub fn is_end_of_input(&self) -> bool {
        self.end_of_input
    }

    /// Bytes supplied but not yet consumed by the engine.
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    /// Bytes written by the engine but not yet drained.
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }
}

impl Read for MemoryBridge {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.inbound.is_empty() {
            if self.end_of_input {
                return Ok(0);
            }
            return Err(io::ErrorKind::WouldBlock.into());
        }

        let n = buf.len().min(self.inbound.len());
        buf[..n].copy_from_slice(&self.inbound[..n]);
        self.inbound.advance(n);
        Ok(n)
    }
}

impl Write for MemoryBridge {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
