//! TCP connections and connection pooling.

use crate::client::Client;
use crate::error::ClientError;
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;
use thriftmw_pool::{PoolConfig, ResourcePool};

/// A client over a TCP connection.
pub type TcpClient = Client<BufReader<TcpStream>, TcpStream>;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Socket read timeout (`None` blocks indefinitely).
    pub read_timeout: Option<Duration>,
    /// Socket write timeout (`None` blocks indefinitely).
    pub write_timeout: Option<Duration>,
    /// Largest string, binary or container accepted in a reply.
    pub max_message_size: usize,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Some(Duration::from_secs(30)),
            write_timeout: Some(Duration::from_secs(30)),
            max_message_size: thriftmw_protocol::MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

/// Dials a TCP connection and wraps it in a client.
pub fn connect(config: &ConnectionConfig) -> Result<TcpClient, ClientError> {
    let stream = TcpStream::connect_timeout(&config.addr, config.connect_timeout)?;
    stream.set_nodelay(true)?;
    stream.set_read_timeout(config.read_timeout)?;
    stream.set_write_timeout(config.write_timeout)?;
    let reader = stream.try_clone()?;
    tracing::debug!("Connected to {}", config.addr);

    let iprot = thriftmw_protocol::BinaryInputProtocol::new(BufReader::new(reader))
        .with_max_size(config.max_message_size);
    Ok(Client::from_protocols(
        iprot,
        thriftmw_protocol::BinaryOutputProtocol::new(stream),
    ))
}

impl TcpClient {
    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        self.writer().peer_addr()
    }

    /// Fails if the socket has a pending error or is no longer connected.
    pub fn check(&self) -> Result<(), ClientError> {
        if let Some(e) = self.writer().take_error()? {
            return Err(e.into());
        }
        self.peer_addr()?;
        Ok(())
    }

    pub fn shutdown(&self) -> Result<(), ClientError> {
        match self.writer().shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // already closed by the peer
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Builds a pool of TCP clients to `config.addr`.
///
/// Idle connections are checked with [`TcpClient::check`] before reuse and
/// shut down when evicted.
pub fn connection_pool(config: ConnectionConfig, pool: PoolConfig) -> ResourcePool<TcpClient> {
    ResourcePool::builder(
        move || connect(&config).map_err(Into::into),
        |client: TcpClient| client.shutdown().map_err(Into::into),
    )
    .config(pool)
    .health_check(|client: &TcpClient| client.check().map_err(Into::into))
    .build()
}
