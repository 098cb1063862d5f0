//! Byte-stream-backed store.
//!
//! Hosts a pool on the far side of any `Read + Write` channel: a
//! serial link to a PC, a TCP socket, a pipe to another process. The
//! wire protocol is deliberately tiny so the peer is easy to write in
//! any language.
//!
//! Every command starts with a `0xFF` frame byte followed by the
//! command byte; integer arguments are little-endian `u32`s:
//!
//! | command    | code | arguments        | response          |
//! |------------|------|------------------|-------------------|
//! | `Init`     | 0    | none             | `0xFF 0x00` ack   |
//! | `InitPool` | 1    | size             | none              |
//! | `Read`     | 2    | offset, len      | `len` raw bytes   |
//! | `Write`    | 3    | offset, len      | none (len bytes follow) |

use std::io::{Read, Write};

use farmem_core::{Store, StoreError};

/// Frame byte opening every command.
pub const FRAME: u8 = 0xFF;

/// Wire command codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Cmd {
    /// Handshake; the host acks with a frame byte and this code.
    Init = 0,
    /// Announce the pool size; the host allocates and zeroes it.
    InitPool = 1,
    /// Request a byte range from the pool.
    Read = 2,
    /// Push a byte range into the pool.
    Write = 3,
}

/// A pool hosted by a remote peer over a byte stream.
///
/// The channel only needs blocking `Read` and `Write`; framing,
/// ordering and retries are the transport's problem. Each store call
/// completes one full command round trip, so a lost byte stalls the
/// allocator rather than corrupting the pool.
pub struct StreamStore<C: Read + Write> {
    channel: C,
}

impl<C: Read + Write> StreamStore<C> {
    /// Wrap a channel. No bytes are exchanged until
    /// [`start`](Store::start).
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Give the channel back.
    pub fn into_inner(self) -> C {
        self.channel
    }

    fn send_cmd(&mut self, cmd: Cmd) -> Result<(), StoreError> {
        self.channel
            .write_all(&[FRAME, cmd as u8])
            .map_err(|e| StoreError::io("write", e))
    }

    fn send_u32(&mut self, v: u32) -> Result<(), StoreError> {
        self.channel
            .write_all(&v.to_le_bytes())
            .map_err(|e| StoreError::io("write", e))
    }
}

impl<C: Read + Write> Store for StreamStore<C> {
    fn start(&mut self) -> Result<(), StoreError> {
        self.send_cmd(Cmd::Init)?;
        self.channel.flush().map_err(|e| StoreError::io("flush", e))?;
        let mut ack = [0u8; 2];
        self.channel
            .read_exact(&mut ack)
            .map_err(|e| StoreError::io("read", e))?;
        if ack != [FRAME, Cmd::Init as u8] {
            return Err(StoreError::Protocol {
                reason: format!("bad handshake ack: {:02x} {:02x}", ack[0], ack[1]),
            });
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StoreError> {
        self.channel.flush().map_err(|e| StoreError::io("flush", e))
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), StoreError> {
        self.send_cmd(Cmd::Read)?;
        self.send_u32(offset)?;
        self.send_u32(buf.len() as u32)?;
        self.channel.flush().map_err(|e| StoreError::io("flush", e))?;
        self.channel
            .read_exact(buf)
            .map_err(|e| StoreError::io("read", e))
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StoreError> {
        self.send_cmd(Cmd::Write)?;
        self.send_u32(offset)?;
        self.send_u32(data.len() as u32)?;
        self.channel
            .write_all(data)
            .map_err(|e| StoreError::io("write", e))
    }

    /// One `InitPool` command instead of streaming zeros over the wire.
    fn zero(&mut self, len: u32) -> Result<(), StoreError> {
        self.send_cmd(Cmd::InitPool)?;
        self.send_u32(len)?;
        self.channel.flush().map_err(|e| StoreError::io("flush", e))
    }
}
