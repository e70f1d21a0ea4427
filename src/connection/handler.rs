//! Per-Connection Session
//!
//! One session per accepted connection, running the
//! read -> decode -> dispatch -> encode -> write loop until the client
//! disconnects or an error closes it.
//!
//! ## Frame reassembly
//!
//! TCP gives no framing, so incoming bytes accumulate in a `BytesMut`
//! buffer and the decoder is retried whenever more data arrives. One read
//! may complete zero, one, or several frames; each completed frame is
//! dispatched and answered before the next is decoded, so replies stay in
//! request order.
//!
//! ## Error behavior
//!
//! Protocol-level errors (wrong arity, unknown command) become error
//! replies and the session continues. A malformed frame is different: the
//! byte stream itself is broken, so the session sends one final error
//! reply and then closes deterministically. I/O errors and EOF close
//! without a reply.

use crate::commands::CommandDispatcher;
use crate::protocol::{FrameDecoder, FrameError, Reply};
use bytes::{Buf, Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Maximum bytes buffered for a single connection (64 KB).
///
/// A frame that cannot complete within this bound closes the session.
const MAX_BUFFER_SIZE: usize = 64 * 1024;

/// Initial read buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Counters shared across all sessions.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands dispatched
    pub commands_dispatched: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_dispatched(&self) {
        self.commands_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that close a session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request frame; an error reply was sent before closing
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Client disconnected cleanly
    #[error("client disconnected")]
    ClientDisconnected,

    /// Stream ended with a partial frame still buffered
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// A single frame exceeded the buffer bound
    #[error("buffer size limit exceeded")]
    BufferFull,
}

/// The state machine for one client connection.
pub struct Session {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Accumulation buffer for incoming bytes
    buffer: BytesMut,

    /// Dispatcher handle over the shared store and snapshot manager
    dispatcher: CommandDispatcher,

    /// Request frame decoder
    decoder: FrameDecoder,

    /// Shared connection statistics
    stats: Arc<ConnectionStats>,
}

impl Session {
    /// Creates a session for an accepted connection.
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        dispatcher: CommandDispatcher,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            dispatcher,
            decoder: FrameDecoder::new(),
            stats,
        }
    }

    /// Runs the session to completion.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::Io(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Session closed with error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The read -> decode -> dispatch -> write loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(tokens) = self.try_decode_frame().await? {
                let reply = self.dispatcher.execute(&tokens);
                self.stats.command_dispatched();

                self.send_reply(&reply).await?;

                // Runs on command boundaries only; an idle connection
                // never triggers a backup.
                self.dispatcher.check_auto_backup();
            }

            self.read_more_data().await?;
        }
    }

    /// Attempts to decode one complete frame from the buffer.
    ///
    /// A malformed frame gets an error reply before the session closes,
    /// instead of silently vanishing.
    async fn try_decode_frame(&mut self) -> Result<Option<Vec<Bytes>>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.decoder.decode(&self.buffer) {
            Ok(Some((tokens, consumed))) => {
                self.buffer.advance(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Decoded frame"
                );
                Ok(Some(tokens))
            }
            Ok(None) => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete frame, need more data"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Malformed frame, closing");
                let reply = Reply::error(format!("ERR protocol error: {}", e));
                self.send_reply(&reply).await?;
                Err(ConnectionError::Frame(e))
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            warn!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            // EOF; a non-empty buffer means the client hung up mid-frame.
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Writes one encoded reply in full.
    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let bytes = reply.encode();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(client = %self.addr, bytes = bytes.len(), "Sent reply");
        Ok(())
    }
}

/// Runs a session for an accepted connection, swallowing expected
/// disconnect errors.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    dispatcher: CommandDispatcher,
    stats: Arc<ConnectionStats>,
) {
    let session = Session::new(stream, addr, dispatcher, stats);
    if let Err(e) = session.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::Io(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Session ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotManager;
    use crate::storage::Store;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn create_test_server() -> (SocketAddr, Arc<Store>, Arc<ConnectionStats>, TempDir) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(Store::new());
        let stats = Arc::new(ConnectionStats::new());
        let snapshot_dir = TempDir::new().unwrap();
        let snapshots = Arc::new(SnapshotManager::with_default_interval(snapshot_dir.path()));

        let store_clone = Arc::clone(&store);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let dispatcher =
                    CommandDispatcher::new(Arc::clone(&store_clone), Arc::clone(&snapshots));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, dispatcher, stats));
            }
        });

        (addr, store, stats, snapshot_dir)
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (addr, _, _, _dir) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (addr, _, _, _dir) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nx\r\n$2\r\nhi\r\n")
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"+OK\r\n");

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nx\r\n")
            .await
            .unwrap();

        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"$2\r\nhi\r\n");
    }

    #[tokio::test]
    async fn test_get_missing_key_is_null() {
        let (addr, _, _, _dir) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nz\r\n")
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"$-1\r\n");
    }

    #[tokio::test]
    async fn test_split_frame_is_reassembled() {
        let (addr, _, _, _dir) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();

        // One SET frame split at an arbitrary byte boundary.
        client.write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk").await.unwrap();
        client.flush().await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        client.write_all(b"\r\n$2\r\nvv\r\n").await.unwrap();

        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"+OK\r\n");
    }

    #[tokio::test]
    async fn test_pipelined_frames() {
        let (addr, _, _, _dir) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$2\r\nk1\r\n$2\r\nv1\r\n*2\r\n$3\r\nGET\r\n$2\r\nk1\r\n")
            .await
            .unwrap();

        let mut collected = Vec::new();
        let mut buf = [0u8; 64];
        while collected.len() < b"+OK\r\n$2\r\nv1\r\n".len() {
            let n = client.read(&mut buf).await.unwrap();
            assert!(n > 0, "server closed early");
            collected.extend_from_slice(&buf[..n]);
        }
        assert_eq!(collected, b"+OK\r\n$2\r\nv1\r\n");
    }

    #[tokio::test]
    async fn test_arity_error_keeps_session_alive() {
        let (addr, store, _, _dir) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"*2\r\n$3\r\nSET\r\n$1\r\nk\r\n")
            .await
            .unwrap();

        let mut buf = [0u8; 128];
        let n = client.read(&mut buf).await.unwrap();
        assert!(buf[..n].starts_with(b"-ERR wrong number of arguments"));
        assert_eq!(store.len(), 0);

        // Session survives a recoverable error.
        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_reply_then_close() {
        let (addr, _, _, _dir) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        // Bulk string where the array marker should be.
        client.write_all(b"$4\r\nPING\r\n").await.unwrap();

        let mut collected = Vec::new();
        let mut buf = [0u8; 128];
        loop {
            let n = client.read(&mut buf).await.unwrap();
            if n == 0 {
                break; // server closed the connection
            }
            collected.extend_from_slice(&buf[..n]);
        }

        assert!(collected.starts_with(b"-ERR protocol error"));
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats, _dir) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        let mut buf = [0u8; 64];
        let _ = client.read(&mut buf).await.unwrap();

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert!(stats.commands_dispatched.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        drop(client);
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
