//! Byte-stream abstraction the handshake and frame reader/writer run over.
//!
//! A thin trait boundary in front of a raw stream, narrowed to the two
//! operations this crate needs so tests can swap in `MockChannel` (via
//! `mockall`) instead of a live `TcpStream` pair.

use std::io;
use std::net::TcpStream;

#[cfg_attr(test, mockall::automock)]
pub trait Channel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
}

impl Channel for TcpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(self, buf)
    }
}

/// Read exactly `len` bytes, translating a clean EOF into `UnexpectedEof`.
pub fn read_exact(channel: &mut dyn Channel, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = channel.read(&mut buf[filled..])?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
        }
        filled += n;
    }
    Ok(buf)
}
