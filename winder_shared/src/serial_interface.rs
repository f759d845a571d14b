use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to open '{port}': {source}")]
    Open {
        port: String,
        #[source]
        source: io::Error,
    },
    #[error("Serial read error: {0}")]
    Read(#[source] io::Error),
    #[error("Serial write error: {0}")]
    Write(#[source] io::Error),
    #[error("Serial write timed out after {0:?}")]
    WriteTimeout(Duration),
    #[error("Serial connection closed by remote")]
    Closed,
}

/// An open byte link to the controller.
#[async_trait]
pub trait SerialTransport: Send + Sync {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize>;
    async fn write_all(&self, buf: &[u8]) -> io::Result<()>;
}

/// Something that can open a [`SerialTransport`], e.g. a named serial port.
#[async_trait]
pub trait SerialInterface: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn SerialTransport>, TransportError>;
    fn describe(&self) -> String;
}

struct Inbound {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    pending: Vec<u8>,
}

/// In-memory transport backed by a pair of unbounded channels.
///
/// The host side implements [`SerialTransport`]; the other end is a
/// [`ChannelPeer`] that plays the controller.
pub struct ChannelTransport {
    inbound: Mutex<Inbound>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

/// Controller end of a [`ChannelTransport`].
#[derive(Debug)]
pub struct ChannelPeer {
    to_host: mpsc::UnboundedSender<Vec<u8>>,
    from_host: mpsc::UnboundedReceiver<Vec<u8>>,
    buffer: Vec<u8>,
}

pub fn channel_transport() -> (ChannelTransport, ChannelPeer) {
    let (to_host, host_rx) = mpsc::unbounded_channel();
    let (host_tx, from_host) = mpsc::unbounded_channel();
    let transport = ChannelTransport {
        inbound: Mutex::new(Inbound { rx: host_rx, pending: Vec::new() }),
        outbound: host_tx,
    };
    let peer = ChannelPeer { to_host, from_host, buffer: Vec::new() };
    (transport, peer)
}

#[async_trait]
impl SerialTransport for ChannelTransport {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inbound = self.inbound.lock().await;
        while inbound.pending.is_empty() {
            match inbound.rx.recv().await {
                Some(chunk) => inbound.pending = chunk,
                None => return Ok(0),
            }
        }
        let n = buf.len().min(inbound.pending.len());
        buf[..n].copy_from_slice(&inbound.pending[..n]);
        inbound.pending.drain(..n);
        Ok(n)
    }

    async fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        self.outbound
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel peer dropped"))
    }
}

impl ChannelPeer {
    /// Sends one line (terminator appended) to the host. Returns `false` once
    /// the host side is gone.
    pub fn send_line(&self, line: &str) -> bool {
        self.to_host.send(format!("{}\n", line).into_bytes()).is_ok()
    }

    /// Next complete line written by the host, or `None` once it hung up.
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.take_buffered_line() {
                return Some(line);
            }
            let chunk = self.from_host.recv().await?;
            self.buffer.extend(chunk);
        }
    }

    /// Like [`next_line`](Self::next_line) but never waits.
    pub fn try_next_line(&mut self) -> Option<String> {
        loop {
            if let Some(line) = self.take_buffered_line() {
                return Some(line);
            }
            let chunk = self.from_host.try_recv().ok()?;
            self.buffer.extend(chunk);
        }
    }

    fn take_buffered_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.buffer.drain(..=end).collect();
        Some(String::from_utf8_lossy(&raw).trim_end().to_string())
    }
}

/// Hands out the same in-memory transport on every `open`.
#[derive(Clone)]
pub struct ChannelInterface {
    transport: Arc<ChannelTransport>,
}

impl ChannelInterface {
    pub fn new(transport: ChannelTransport) -> Self {
        Self { transport: Arc::new(transport) }
    }

    /// Interface plus the controller end of its link.
    pub fn pair() -> (Self, ChannelPeer) {
        let (transport, peer) = channel_transport();
        (Self::new(transport), peer)
    }
}

#[async_trait]
impl SerialInterface for ChannelInterface {
    async fn open(&self) -> Result<Arc<dyn SerialTransport>, TransportError> {
        let transport: Arc<dyn SerialTransport> = self.transport.clone();
        Ok(transport)
    }

    fn describe(&self) -> String {
        "in-memory channel".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_host_writes_arrive_as_lines() {
        let (transport, mut peer) = channel_transport();
        transport.write_all(b"G0 X1\nG0").await.unwrap();
        transport.write_all(b" X2\n").await.unwrap();
        assert_eq!(peer.next_line().await.as_deref(), Some("G0 X1"));
        assert_eq!(peer.next_line().await.as_deref(), Some("G0 X2"));
        assert_eq!(peer.try_next_line(), None);
    }

    #[tokio::test]
    async fn test_reads_split_across_small_buffers() {
        let (transport, peer) = channel_transport();
        assert!(peer.send_line("ok"));
        let mut buf = [0u8; 2];
        assert_eq!(transport.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf, b"ok");
        assert_eq!(transport.read(&mut buf).await.unwrap(), 1);
        assert_eq!(buf[0], b'\n');
    }

    #[tokio::test]
    async fn test_dropped_peer_reads_eof_and_fails_writes() {
        let (transport, peer) = channel_transport();
        drop(peer);
        let mut buf = [0u8; 8];
        assert_eq!(transport.read(&mut buf).await.unwrap(), 0);
        assert!(transport.write_all(b"G0 X1\n").await.is_err());
    }
}
