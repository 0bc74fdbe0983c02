//! Bridgewire Server
//!
//! The server accepts connections from the peer runtime and answers every
//! incoming message through a [`MessageHandler`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::connection::{Connection, ConnectionError};
use crate::config::NetworkConfig;
use crate::protocol::{Codec, Message};

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Server already running")]
    AlreadyRunning,

    #[error("Server not running")]
    NotRunning,

    #[error("Bind failed: {0}")]
    BindFailed(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Produces the reply to each message received from the peer
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one message; `None` sends nothing back
    async fn handle(&self, message: Message) -> Option<Message>;
}

/// Reflects every message back unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn handle(&self, message: Message) -> Option<Message> {
        Some(message)
    }
}

/// Events emitted by the server
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Server started
    Started { bind_addr: SocketAddr },
    /// A new peer has connected
    ClientConnected { id: Uuid, addr: SocketAddr },
    /// A peer has disconnected
    ClientDisconnected {
        id: Uuid,
        addr: SocketAddr,
        reason: String,
    },
    /// Received a message from a peer
    MessageReceived {
        id: Uuid,
        type_tag: u16,
        type_name: &'static str,
    },
    /// Server stopped
    Stopped,
}

/// Bridgewire Server
pub struct Server<H = EchoHandler> {
    /// Server configuration
    config: NetworkConfig,
    /// Codec shared by every connection
    codec: Codec,
    /// Reply producer
    handler: Arc<H>,
    /// Connected peers
    clients: Arc<RwLock<HashMap<Uuid, SocketAddr>>>,
    /// Event sender
    event_tx: mpsc::Sender<ServerEvent>,
    /// Event receiver (for consumers)
    event_rx: Option<mpsc::Receiver<ServerEvent>>,
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Whether the server is running
    running: Arc<RwLock<bool>>,
}

impl<H: MessageHandler> Server<H> {
    /// Create a new server
    pub fn new(config: NetworkConfig, codec: Codec, handler: H) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);

        Self {
            config,
            codec,
            handler: Arc::new(handler),
            clients: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            event_rx: Some(event_rx),
            shutdown_tx: None,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<ServerEvent>> {
        self.event_rx.take()
    }

    /// Start the server, returning the bound address
    pub async fn start(&mut self) -> ServerResult<SocketAddr> {
        {
            let running = self.running.read().await;
            if *running {
                return Err(ServerError::AlreadyRunning);
            }
        }

        let bind_addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            ServerError::BindFailed(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        let local_addr = listener.local_addr()?;
        tracing::info!("Server listening on {}", local_addr);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        {
            let mut running = self.running.write().await;
            *running = true;
        }

        let _ = self
            .event_tx
            .send(ServerEvent::Started {
                bind_addr: local_addr,
            })
            .await;

        let clients = self.clients.clone();
        let event_tx = self.event_tx.clone();
        let codec = self.codec.clone();
        let handler = self.handler.clone();
        let running = self.running.clone();

        // Spawn the accept loop
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, addr)) => {
                                let id = Uuid::new_v4();
                                tracing::info!(%id, "New connection from {}", addr);

                                let clients = clients.clone();
                                let event_tx = event_tx.clone();
                                let codec = codec.clone();
                                let handler = handler.clone();

                                tokio::spawn(async move {
                                    handle_client(stream, id, addr, clients, event_tx, codec, handler)
                                        .await;
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Server shutdown requested");
                        break;
                    }
                }
            }

            let mut running = running.write().await;
            *running = false;

            let _ = event_tx.send(ServerEvent::Stopped).await;
        });

        Ok(local_addr)
    }

    /// Stop accepting new connections
    pub async fn stop(&mut self) -> ServerResult<()> {
        {
            let running = self.running.read().await;
            if !*running {
                return Err(ServerError::NotRunning);
            }
        }

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        Ok(())
    }

    /// Get the connected peers
    pub async fn clients(&self) -> Vec<(Uuid, SocketAddr)> {
        let clients = self.clients.read().await;
        clients.iter().map(|(id, addr)| (*id, *addr)).collect()
    }

    /// Check if the server is running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}

/// Serve one peer until it disconnects or the stream fails
async fn handle_client<H: MessageHandler>(
    stream: TcpStream,
    id: Uuid,
    addr: SocketAddr,
    clients: Arc<RwLock<HashMap<Uuid, SocketAddr>>>,
    event_tx: mpsc::Sender<ServerEvent>,
    codec: Codec,
    handler: Arc<H>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(%id, "Failed to set TCP_NODELAY: {}", e);
    }
    let mut conn = Connection::new(stream, codec);

    clients.write().await.insert(id, addr);
    let _ = event_tx.send(ServerEvent::ClientConnected { id, addr }).await;

    // Main message loop
    let disconnect_reason = loop {
        match conn.recv().await {
            Ok(Some(message)) => {
                tracing::debug!(%id, "Message from {}: {:?}", addr, message);
                let _ = event_tx
                    .send(ServerEvent::MessageReceived {
                        id,
                        type_tag: message.type_tag(),
                        type_name: message.type_name(),
                    })
                    .await;

                if let Some(reply) = handler.handle(message).await {
                    if let Err(e) = conn.send(&reply).await {
                        break format!("Send error: {}", e);
                    }
                }
            }
            Ok(None) => {
                break "Connection closed".to_string();
            }
            Err(ConnectionError::Protocol(e)) => {
                tracing::warn!(%id, class = ?e.class(), "Protocol error from {}: {}", addr, e);
                break format!("Protocol error: {}", e);
            }
            Err(e) => {
                break format!("Error: {}", e);
            }
        }
    };

    clients.write().await.remove(&id);

    tracing::info!(%id, "Client {} disconnected: {}", addr, disconnect_reason);
    let _ = event_tx
        .send(ServerEvent::ClientDisconnected {
            id,
            addr,
            reason: disconnect_reason,
        })
        .await;

    let _ = conn.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CallMessage, ExceptionMessage};
    use tokio::io::AsyncWriteExt;

    fn local_config() -> NetworkConfig {
        NetworkConfig::new(0)
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = Server::new(local_config(), Codec::new(), EchoHandler);
        assert!(!server.is_running().await);
    }

    #[tokio::test]
    async fn test_echo_roundtrip() {
        let mut server = Server::new(local_config(), Codec::new(), EchoHandler);
        let addr = server.start().await.unwrap();
        assert!(server.is_running().await);

        let stream = TcpStream::connect(addr).await.unwrap();
        let conn_local_addr = stream.local_addr().unwrap();
        let mut conn = Connection::new(stream, Codec::new());
        for message in [Message::null(), Message::from(42), Message::null()] {
            let reply = conn.request(&message).await.unwrap();
            assert_eq!(reply, message);
        }

        let clients = server.clients().await;
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].1, conn_local_addr);

        server.stop().await.unwrap();
    }

    struct Failing;

    #[async_trait]
    impl MessageHandler for Failing {
        async fn handle(&self, message: Message) -> Option<Message> {
            match message {
                Message::Call(call) => Some(
                    ExceptionMessage::new("System.MissingMethodException", call.member).into(),
                ),
                _ => None,
            }
        }
    }

    #[tokio::test]
    async fn test_custom_handler_and_events() {
        let mut server = Server::new(local_config(), Codec::new(), Failing);
        let mut events = server.take_event_receiver().unwrap();
        let addr = server.start().await.unwrap();
        assert!(matches!(events.recv().await, Some(ServerEvent::Started { .. })));

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn = Connection::new(stream, Codec::new());
        let reply = conn
            .request(&CallMessage::method(1, "Frobnicate", vec![]).into())
            .await
            .unwrap();
        assert_eq!(
            reply.into_result().unwrap_err().message,
            "Frobnicate".to_string()
        );

        assert!(matches!(events.recv().await, Some(ServerEvent::ClientConnected { .. })));
        assert!(matches!(
            events.recv().await,
            Some(ServerEvent::MessageReceived { type_name: "call", .. })
        ));

        conn.close().await.unwrap();
        assert!(matches!(
            events.recv().await,
            Some(ServerEvent::ClientDisconnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_garbage_disconnects_client() {
        let mut server = Server::new(local_config(), Codec::new(), EchoHandler);
        let mut events = server.take_event_receiver().unwrap();
        let addr = server.start().await.unwrap();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&[0xFF, 0xFF, 0x00, 0x00]).await.unwrap();

        loop {
            match events.recv().await {
                Some(ServerEvent::ClientDisconnected { reason, .. }) => {
                    assert!(reason.starts_with("Protocol error"));
                    break;
                }
                Some(_) => continue,
                None => panic!("Event channel closed"),
            }
        }
    }
}
