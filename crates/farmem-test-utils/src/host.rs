//! In-process peer for the stream store protocol.

use std::io::{Read, Write};

use farmem_store::{Cmd, FRAME};

/// A pool host speaking the [`StreamStore`](farmem_store::StreamStore)
/// wire protocol over an in-process channel.
///
/// Commands written into it execute immediately against a `Vec` pool;
/// responses queue up for the next read. Reading with nothing queued
/// reports end-of-file, which surfaces as a store error rather than a
/// hang.
pub struct MockHost {
    pool: Vec<u8>,
    pending: Vec<u8>,
    outbox: Vec<u8>,
    /// Commands executed, by wire code.
    pub commands: Vec<u8>,
}

impl MockHost {
    /// A host with no pool yet; `InitPool` sizes it.
    pub fn new() -> Self {
        Self {
            pool: Vec::new(),
            pending: Vec::new(),
            outbox: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Direct view of the hosted pool.
    pub fn pool(&self) -> &[u8] {
        &self.pool
    }

    fn arg(&self, i: usize) -> u32 {
        u32::from_le_bytes([
            self.pending[i],
            self.pending[i + 1],
            self.pending[i + 2],
            self.pending[i + 3],
        ])
    }

    fn step(&mut self) -> bool {
        if self.pending.len() < 2 {
            return false;
        }
        assert_eq!(self.pending[0], FRAME, "command does not start with a frame byte");
        let code = self.pending[1];
        match code {
            c if c == Cmd::Init as u8 => {
                self.outbox.extend_from_slice(&[FRAME, Cmd::Init as u8]);
                self.pending.drain(..2);
            }
            c if c == Cmd::InitPool as u8 => {
                if self.pending.len() < 6 {
                    return false;
                }
                let size = self.arg(2) as usize;
                self.pool = vec![0; size];
                self.pending.drain(..6);
            }
            c if c == Cmd::Read as u8 => {
                if self.pending.len() < 10 {
                    return false;
                }
                let off = self.arg(2) as usize;
                let len = self.arg(6) as usize;
                self.outbox.extend_from_slice(&self.pool[off..off + len]);
                self.pending.drain(..10);
            }
            c if c == Cmd::Write as u8 => {
                if self.pending.len() < 10 {
                    return false;
                }
                let off = self.arg(2) as usize;
                let len = self.arg(6) as usize;
                if self.pending.len() < 10 + len {
                    return false;
                }
                self.pool[off..off + len].copy_from_slice(&self.pending[10..10 + len]);
                self.pending.drain(..10 + len);
            }
            c => panic!("unknown wire command {c}"),
        }
        self.commands.push(code);
        true
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for MockHost {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if !buf.is_empty() && self.outbox.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "mock host has nothing queued",
            ));
        }
        let n = buf.len().min(self.outbox.len());
        buf[..n].copy_from_slice(&self.outbox[..n]);
        self.outbox.drain(..n);
        Ok(n)
    }
}

impl Write for MockHost {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while self.step() {}
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
