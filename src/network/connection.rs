//! Connection handling for bridgewire
//!
//! Manages one byte stream to the peer runtime, including:
//! - Message encoding/decoding through the shared codec
//! - Independent send and receive halves
//! - Connection state and statistics

use bytes::BytesMut;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;

use crate::protocol::{Codec, Decoded, Message, WireError};

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] WireError),

    #[error("Connection closed")]
    Closed,

    #[error("Stream desynchronized by an earlier protocol error")]
    Desynchronized,

    #[error("Connection timeout")]
    Timeout,
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// State of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Ready for communication
    Open,
    /// A protocol error left the receive side unusable
    Desynchronized,
    /// Connection has been closed
    Closed,
}

/// Connection statistics
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Messages sent
    pub messages_sent: u64,
    /// Messages received
    pub messages_received: u64,
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
}

/// Receiving direction of a connection
pub struct RecvHalf<R> {
    inner: R,
    codec: Codec,
    read_buf: BytesMut,
    /// Buffered length required before decoding is worth retrying
    needed: usize,
    decode_attempts: u64,
    desynchronized: bool,
    messages_received: u64,
    bytes_received: u64,
    last_activity: Instant,
}

impl<R: AsyncRead + Unpin> RecvHalf<R> {
    pub fn new(inner: R, codec: Codec) -> Self {
        Self {
            inner,
            codec,
            read_buf: BytesMut::with_capacity(4096),
            needed: 0,
            decode_attempts: 0,
            desynchronized: false,
            messages_received: 0,
            bytes_received: 0,
            last_activity: Instant::now(),
        }
    }

    /// Receive a message (returns None if the peer closed between messages)
    pub async fn recv(&mut self) -> ConnectionResult<Option<Message>> {
        if self.desynchronized {
            return Err(ConnectionError::Desynchronized);
        }

        loop {
            // Decode only once the buffer can hold the missing bytes
            if !self.read_buf.is_empty() && self.read_buf.len() >= self.needed {
                self.decode_attempts += 1;
                match self.codec.decode_buffered(&mut self.read_buf) {
                    Ok(Decoded::Message(message)) => {
                        self.needed = 0;
                        self.messages_received += 1;
                        self.last_activity = Instant::now();
                        tracing::trace!("Received {} message", message.type_name());
                        return Ok(Some(message));
                    }
                    Ok(Decoded::Incomplete { needed }) => {
                        self.needed = needed;
                    }
                    Err(e) => {
                        self.desynchronized = true;
                        tracing::warn!(error = %e, class = ?e.class(), "Discarding receive stream");
                        return Err(e.into());
                    }
                }
            }

            // Read more data
            self.read_buf.reserve(4096);
            let n = self.inner.read_buf(&mut self.read_buf).await?;

            if n == 0 {
                if self.read_buf.is_empty() {
                    return Ok(None); // Clean close
                } else {
                    return Err(ConnectionError::Closed);
                }
            }

            self.bytes_received += n as u64;
        }
    }

    /// Try to receive a message with a timeout
    pub async fn recv_timeout(&mut self, timeout: Duration) -> ConnectionResult<Option<Message>> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    pub fn is_desynchronized(&self) -> bool {
        self.desynchronized
    }
}

/// Sending direction of a connection
pub struct SendHalf<W> {
    inner: W,
    codec: Codec,
    write_buf: BytesMut,
    messages_sent: u64,
    bytes_sent: u64,
    last_activity: Instant,
}

impl<W: AsyncWrite + Unpin> SendHalf<W> {
    pub fn new(inner: W, codec: Codec) -> Self {
        Self {
            inner,
            codec,
            write_buf: BytesMut::with_capacity(4096),
            messages_sent: 0,
            bytes_sent: 0,
            last_activity: Instant::now(),
        }
    }

    /// Send a message
    pub async fn send(&mut self, message: &Message) -> ConnectionResult<()> {
        self.write_buf.clear();
        self.codec.encode_into(message, &mut self.write_buf)?;

        self.inner.write_all(&self.write_buf).await?;
        self.inner.flush().await?;

        self.messages_sent += 1;
        self.bytes_sent += self.write_buf.len() as u64;
        self.last_activity = Instant::now();
        tracing::trace!("Sent {} message", message.type_name());

        Ok(())
    }

    pub async fn shutdown(&mut self) -> ConnectionResult<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// Represents a connection to the peer runtime
pub struct Connection<S = TcpStream> {
    recv: RecvHalf<ReadHalf<S>>,
    send: SendHalf<WriteHalf<S>>,
    state: ConnectionState,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Create a new connection from an established stream
    pub fn new(stream: S, codec: Codec) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            recv: RecvHalf::new(reader, codec.clone()),
            send: SendHalf::new(writer, codec),
            state: ConnectionState::Open,
        }
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get connection statistics
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            messages_sent: self.send.messages_sent,
            messages_received: self.recv.messages_received,
            bytes_sent: self.send.bytes_sent,
            bytes_received: self.recv.bytes_received,
        }
    }

    /// Send a message
    pub async fn send(&mut self, message: &Message) -> ConnectionResult<()> {
        if self.state == ConnectionState::Closed {
            return Err(ConnectionError::Closed);
        }
        self.send.send(message).await
    }

    /// Receive a message (returns None if the peer closed the connection)
    pub async fn recv(&mut self) -> ConnectionResult<Option<Message>> {
        if self.state == ConnectionState::Closed {
            return Err(ConnectionError::Closed);
        }
        let result = self.recv.recv().await;
        match &result {
            Ok(None) | Err(ConnectionError::Io(_)) | Err(ConnectionError::Closed) => {
                self.state = ConnectionState::Closed;
            }
            _ if self.recv.is_desynchronized() => {
                self.state = ConnectionState::Desynchronized;
            }
            _ => {}
        }
        result
    }

    /// Try to receive a message with a timeout
    pub async fn recv_timeout(&mut self, timeout: Duration) -> ConnectionResult<Option<Message>> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectionError::Timeout),
        }
    }

    /// Send a message and wait for the next incoming one
    pub async fn request(&mut self, message: &Message) -> ConnectionResult<Message> {
        self.send(message).await?;
        self.recv().await?.ok_or(ConnectionError::Closed)
    }

    /// Close the connection gracefully
    pub async fn close(&mut self) -> ConnectionResult<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        self.send.shutdown().await
    }

    /// Check if the connection is still usable in both directions
    pub fn is_active(&self) -> bool {
        matches!(self.state, ConnectionState::Open)
    }

    /// Get time since last activity in either direction
    pub fn idle_time(&self) -> Duration {
        self.recv
            .last_activity
            .max(self.send.last_activity)
            .elapsed()
    }

    /// Split into halves that can be driven by separate tasks
    pub fn into_split(self) -> (RecvHalf<ReadHalf<S>>, SendHalf<WriteHalf<S>>) {
        (self.recv, self.send)
    }
}
