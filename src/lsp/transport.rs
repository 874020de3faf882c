//! Byte-stream transports for the server: stdio, or a single accepted TCP
//! connection.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, TcpListener};

use tracing::{info, trace};

/// A bidirectional byte stream. The reader half is owned by the reader loop;
/// the writer half moves into the context behind its output mutex.
pub struct Connection {
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
}

impl Connection {
    pub fn new(reader: Box<dyn Read + Send>, writer: Box<dyn Write + Send>) -> Self {
        Self { reader, writer }
    }

    /// Standard input/output. The caller must have silenced every other
    /// stdout sink first; anything else on the stream corrupts framing.
    pub fn stdio() -> Self {
        Self::new(Box::new(std::io::stdin()), Box::new(std::io::stdout()))
    }

    /// Bind `0.0.0.0:<port>`, accept exactly one peer, close the listener,
    /// and use the accepted socket in both directions.
    pub fn tcp(port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))?;
        info!("Waiting for a TCP connection on 0.0.0.0:{port}");

        let (stream, peer) = listener.accept()?;
        info!("Accepted connection from {peer}");

        // Dropping the listener here closes the listening socket; the
        // accepted stream stays open.
        drop(listener);
        trace!("Listening socket closed");

        let reader = stream.try_clone()?;
        Ok(Self::new(Box::new(reader), Box::new(stream)))
    }
}
