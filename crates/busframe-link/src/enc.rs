use crate::{LinkError, NetLayer};
use busframe_core::{Message, Net};
use std::io::Write;
use std::net::{
    IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs,
};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Node name meaning "any local address".
pub const WILDCARD_NODE: &str = "*";

#[derive(Debug, Clone)]
pub struct EncConfig {
    pub connect_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub nodelay: bool,
}

impl Default for EncConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            write_timeout: None,
            nodelay: true,
        }
    }
}

impl EncConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

/// RTU frames, checksum included, carried over a TCP stream.
#[derive(Debug)]
pub struct EncLayer {
    node: String,
    service: String,
    addrs: Vec<SocketAddr>,
    config: EncConfig,
    stream: Option<TcpStream>,
    listener: Option<TcpListener>,
    transaction_id: u16,
}

impl EncLayer {
    /// Resolves `node` and `service` (a port number). Nothing is connected yet.
    pub fn new(node: &str, service: &str) -> Result<Self, LinkError> {
        Self::with_config(node, service, EncConfig::default())
    }

    pub fn with_config(node: &str, service: &str, config: EncConfig) -> Result<Self, LinkError> {
        let port: u16 = service
            .trim()
            .parse()
            .map_err(|_| LinkError::open(Net::Enc, node, service, "service is not a port number"))?;

        let addrs: Vec<SocketAddr> = if node == WILDCARD_NODE {
            vec![SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)]
        } else {
            (node, port)
                .to_socket_addrs()
                .map_err(|err| LinkError::open(Net::Enc, node, service, err))?
                .collect()
        };
        if addrs.is_empty() {
            return Err(LinkError::open(
                Net::Enc,
                node,
                service,
                "no address for node",
            ));
        }

        debug!(node, service, ?addrs, "enc layer ready");
        Ok(Self {
            node: node.to_owned(),
            service: service.to_owned(),
            addrs,
            config,
            stream: None,
            listener: None,
            transaction_id: 1,
        })
    }

    /// Wraps an established stream; the identity is the peer address.
    pub fn from_stream(stream: TcpStream) -> Result<Self, LinkError> {
        let peer = stream.peer_addr()?;
        let mut layer = Self {
            node: peer.ip().to_string(),
            service: peer.port().to_string(),
            addrs: vec![peer],
            config: EncConfig::default(),
            stream: None,
            listener: None,
            transaction_id: 1,
        };
        layer.attach(stream)?;
        Ok(layer)
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn is_wildcard(&self) -> bool {
        self.node == WILDCARD_NODE
    }

    /// Addresses resolved at construction. A wildcard node yields the
    /// unspecified address.
    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addrs
    }

    pub fn config(&self) -> &EncConfig {
        &self.config
    }

    /// Connects to the first reachable address. A wildcard node connects
    /// through loopback.
    pub fn connect(&mut self) -> Result<(), LinkError> {
        let targets: Vec<SocketAddr> = if self.is_wildcard() {
            self.addrs
                .iter()
                .map(|addr| SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port()))
                .collect()
        } else {
            self.addrs.clone()
        };

        let mut last_err = None;
        for addr in targets {
            let attempt = match self.config.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    debug!(%addr, "enc layer connected");
                    return self.attach(stream);
                }
                Err(err) => {
                    debug!(%addr, error = %err, "enc connect attempt failed");
                    last_err = Some(err);
                }
            }
        }
        Err(LinkError::Io(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no address to connect")
        })))
    }

    /// Binds the resolved addresses for an incoming peer.
    pub fn listen(&mut self) -> Result<SocketAddr, LinkError> {
        let listener = TcpListener::bind(&self.addrs[..])?;
        let local = listener.local_addr()?;
        debug!(%local, "enc layer listening");
        self.listener = Some(listener);
        Ok(local)
    }

    /// Blocks until a peer connects, listening first if needed.
    pub fn accept(&mut self) -> Result<SocketAddr, LinkError> {
        if self.listener.is_none() {
            self.listen()?;
        }
        let listener = self.listener.as_ref().ok_or(LinkError::NotConnected)?;
        let (stream, peer) = listener.accept()?;
        debug!(%peer, "enc peer accepted");
        self.attach(stream)?;
        Ok(peer)
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match (&self.stream, &self.listener) {
            (Some(stream), _) => stream.local_addr().ok(),
            (None, Some(listener)) => listener.local_addr().ok(),
            (None, None) => None,
        }
    }

    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.shutdown(Shutdown::Both) {
                warn!(error = %err, "enc stream shutdown failed");
            }
        }
        self.listener = None;
    }

    /// Transaction id the upper layer will use next.
    pub fn transaction_id(&self) -> u16 {
        self.transaction_id
    }

    /// Returns the current transaction id and advances the counter.
    pub fn next_transaction_id(&mut self) -> u16 {
        let id = self.transaction_id;
        self.transaction_id = self.transaction_id.wrapping_add(1);
        id
    }

    fn attach(&mut self, stream: TcpStream) -> Result<(), LinkError> {
        stream.set_nodelay(self.config.nodelay)?;
        stream.set_write_timeout(self.config.write_timeout)?;
        self.stream = Some(stream);
        Ok(())
    }
}

impl NetLayer for EncLayer {
    fn net(&self) -> Net {
        Net::Enc
    }

    fn connection(&self) -> &str {
        &self.node
    }

    fn settings(&self) -> &str {
        &self.service
    }

    /// One blocking write of the whole ADU.
    ///
    /// A peer that closed the connection yields an I/O error, never a
    /// signal: std sends with `MSG_NOSIGNAL` on Linux and Rust binaries
    /// ignore `SIGPIPE` elsewhere.
    fn send_raw_message(&mut self, msg: &Message) -> Result<usize, LinkError> {
        let stream = self.stream.as_mut().ok_or(LinkError::NotConnected)?;
        let written = stream.write(msg.adu())?;
        trace!(node = %self.node, written, "enc frame sent");
        Ok(written)
    }
}

impl Drop for EncLayer {
    fn drop(&mut self) {
        self.close();
    }
}
