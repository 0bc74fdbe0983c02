//! Bridgewire Client
//!
//! Connects to a peer runtime and performs request/response exchanges.

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpStream;

use super::connection::{Connection, ConnectionError, ConnectionStats};
use super::resolve_host;
use crate::config::NetworkConfig;
use crate::protocol::{Codec, ExceptionMessage, Message};

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Not connected")]
    NotConnected,

    #[error("Connection timeout")]
    Timeout,

    #[error("Remote exception: {0}")]
    Remote(#[from] ExceptionMessage),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Bridgewire Client
pub struct Client {
    /// Client configuration
    config: NetworkConfig,
    /// Codec for the connection
    codec: Codec,
    /// Active connection, if any
    connection: Option<Connection<TcpStream>>,
    /// Peer address of the active connection
    server_addr: Option<SocketAddr>,
}

impl Client {
    /// Create a new client
    pub fn new(config: NetworkConfig, codec: Codec) -> Self {
        Self {
            config,
            codec,
            connection: None,
            server_addr: None,
        }
    }

    /// Connect to a server by address
    pub async fn connect(&mut self, server_addr: SocketAddr) -> ClientResult<()> {
        if self.connection.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        tracing::info!("Connecting to {}", server_addr);

        let stream = tokio::time::timeout(
            self.config.connect_timeout(),
            TcpStream::connect(server_addr),
        )
        .await
        .map_err(|_| ClientError::Timeout)??;
        stream.set_nodelay(true)?;

        self.connection = Some(Connection::new(stream, self.codec.clone()));
        self.server_addr = Some(server_addr);

        tracing::info!("Connected to {}", server_addr);
        Ok(())
    }

    /// Resolve `host` and connect on the configured port
    pub async fn connect_host(&mut self, host: &str) -> ClientResult<()> {
        let addr = resolve_host(host, self.config.port).await?;
        self.connect(addr).await
    }

    /// Send a message and wait for the reply
    ///
    /// Any failure drops the connection: after a timeout or protocol error
    /// the stream can no longer be trusted to line up with message boundaries.
    pub async fn request(&mut self, message: &Message) -> ClientResult<Message> {
        let conn = self.connection.as_mut().ok_or(ClientError::NotConnected)?;

        let result = tokio::time::timeout(self.config.request_timeout(), conn.request(message))
            .await
            .map_err(|_| ClientError::Timeout)
            .and_then(|r| r.map_err(ClientError::from));

        if let Err(e) = &result {
            tracing::warn!("Request failed, dropping connection: {}", e);
            self.connection = None;
            self.server_addr = None;
        }
        result
    }

    /// Like [`Client::request`], but unwraps return values and turns remote
    /// exceptions into [`ClientError::Remote`]
    pub async fn call(&mut self, message: &Message) -> ClientResult<Message> {
        let reply = self.request(message).await?;
        Ok(reply.into_result()?)
    }

    /// Disconnect from the server
    pub async fn disconnect(&mut self) -> ClientResult<()> {
        let mut conn = self.connection.take().ok_or(ClientError::NotConnected)?;
        self.server_addr = None;
        conn.close().await?;
        tracing::info!("Disconnected");
        Ok(())
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server_addr
    }

    pub fn stats(&self) -> Option<ConnectionStats> {
        self.connection.as_ref().map(Connection::stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{EchoHandler, Server};
    use crate::protocol::ReturnMessage;

    fn local_config() -> NetworkConfig {
        NetworkConfig::new(0)
    }

    #[tokio::test]
    async fn test_request_requires_connection() {
        let mut client = Client::new(local_config(), Codec::new());
        assert!(matches!(
            client.request(&Message::null()).await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_echo_exchange() {
        let mut server = Server::new(local_config(), Codec::new(), EchoHandler);
        let addr = server.start().await.unwrap();

        let mut client = Client::new(local_config(), Codec::new());
        client.connect(addr).await.unwrap();
        assert_eq!(client.server_addr(), Some(addr));
        assert!(matches!(
            client.connect(addr).await,
            Err(ClientError::AlreadyConnected)
        ));

        let reply = client.request(&Message::from("ping")).await.unwrap();
        assert_eq!(reply, Message::from("ping"));

        let unwrapped = client
            .call(&ReturnMessage::new(3.5).into())
            .await
            .unwrap();
        assert_eq!(unwrapped, Message::from(3.5));

        let err = client
            .call(&ExceptionMessage::new("System.Exception", "echoed").into())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Remote(_)));
        assert!(client.is_connected());
        assert_eq!(client.stats().unwrap().messages_received, 3);

        client.disconnect().await.unwrap();
        assert!(!client.is_connected());
        assert_eq!(client.server_addr(), None);
    }

    #[tokio::test]
    async fn test_magic_mismatch_drops_connection() {
        let mut server = Server::new(local_config(), Codec::new(), EchoHandler);
        let addr = server.start().await.unwrap();

        let mut client = Client::new(local_config(), Codec::new().with_magic(0x0BAD));
        client.connect(addr).await.unwrap();

        assert!(client.request(&Message::null()).await.is_err());
        assert!(!client.is_connected());
        assert_eq!(client.server_addr(), None);
    }
}
