//! Telnet client for DX cluster nodes.
//!
//! This module owns the connection lifecycle: dialing the node, running the
//! login dialogue, decoding spots and handing them to the dispatcher, and
//! optionally redialing after the connection drops.
//!
//! Each physical connection gets its own read task. Two fire-once signals
//! coordinate shutdown: the client-wide `closed` signal, which ends
//! everything for good, and a per-connection pair (`stop` requests the read
//! task to end, `done` reports that it has torn down).

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::dispatch::{Dispatcher, Observer};
use crate::login::{Credentials, Incoming, Login, LoginConfig};
use crate::parser::extract_spots;
use crate::reader::{ChunkReader, DEFAULT_QUIET_PERIOD, ReadError};
use crate::signal::Signal;

/// Default telnet port.
pub const DEFAULT_PORT: u16 = 23;

/// Default timeout for dialing a node.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default delay between reconnection attempts in persistent mode.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for the cluster client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Hostname or IP address of the cluster node.
    pub host: String,

    /// Port number; 0 selects [`DEFAULT_PORT`].
    pub port: u16,

    /// Login credentials.
    pub credentials: Credentials,

    /// Log all wire traffic at info level.
    pub trace: bool,

    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,

    /// Read-idle period after which received bytes are handled as one unit.
    pub quiet_period: Duration,

    /// Delay between reconnection attempts in persistent mode.
    pub retry_interval: Duration,

    /// Prompts and banners recognized during login.
    pub login: LoginConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            credentials: Credentials::default(),
            trace: false,
            connect_timeout: DEFAULT_TIMEOUT,
            quiet_period: DEFAULT_QUIET_PERIOD,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            login: LoginConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration for the given host on the default port.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Set the host and port.
    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Set the username and password.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Credentials::new(username, password);
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    /// The effective port, with the default applied.
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            DEFAULT_PORT
        } else {
            self.port
        }
    }

    /// The target address as `host:port` (`[host]:port` for IPv6 literals).
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.effective_port())
        } else {
            format!("{}:{}", self.host, self.effective_port())
        }
    }
}

/// Errors from establishing a connection.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot open TCP connection to {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out connecting to {addr}")]
    DialTimeout { addr: String },

    #[error("client is closed")]
    Closed,
}

/// One physical connection.
#[derive(Debug)]
struct Link {
    peer: String,
    stop: Signal,
    done: Signal,
    authenticated: AtomicBool,
}

impl Link {
    fn new(peer: String) -> Self {
        Self {
            peer,
            stop: Signal::new(),
            done: Signal::new(),
            authenticated: AtomicBool::new(false),
        }
    }

    fn is_active(&self) -> bool {
        !self.stop.is_fired() && !self.done.is_fired()
    }
}

#[derive(Debug)]
struct Shared {
    config: ClientConfig,
    login: Login,
    dispatcher: Dispatcher,
    closed: Signal,
    link: Mutex<Option<Arc<Link>>>,
}

impl Shared {
    fn trace_wire(&self, direction: &str, text: &str) {
        if self.config.trace {
            info!("{} {:?}", direction, text);
        } else {
            trace!("{} {:?}", direction, text);
        }
    }

    /// Handle one decoded unit: answer login prompts, then extract spots.
    async fn handle_incoming<W>(&self, link: &Link, writer: &mut W, raw: &str)
    where
        W: AsyncWrite + Unpin,
    {
        let authenticated = link.authenticated.load(Ordering::Acquire);
        let incoming = self.login.route(authenticated, raw);
        if incoming != Incoming::Empty {
            self.trace_wire(">", raw.trim());
        }

        match incoming {
            Incoming::Empty => {}
            Incoming::Login(step) => {
                if let Some(reply) = step.reply {
                    self.trace_wire("<", &reply);
                    if let Err(e) = writer.write_all(reply.as_bytes()).await {
                        warn!("Cannot write to {}: {}", link.peer, e);
                    }
                }
                if step.authenticated && !authenticated {
                    link.authenticated.store(true, Ordering::Release);
                    info!("Logged in to {}", link.peer);
                }
            }
            Incoming::Content(text) => match extract_spots(&text) {
                Ok(spots) => {
                    for spot in &spots {
                        self.dispatcher.notify_spot(spot);
                    }
                }
                Err(e) => error!("Cannot extract spots: {}", e),
            },
        }
    }
}

/// Read task for one physical connection.
async fn drive(shared: Arc<Shared>, stream: TcpStream, link: Arc<Link>) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = ChunkReader::new(reader, shared.config.quiet_period);

    loop {
        let chunk = tokio::select! {
            _ = link.stop.wait() => {
                debug!("Closing connection to {}", link.peer);
                break;
            }
            chunk = reader.read_chunk() => chunk,
        };

        match chunk {
            Ok(text) => shared.handle_incoming(&link, &mut writer, &text).await,
            Err(ReadError::EndOfStream) => {
                info!("Connection closed by {}", link.peer);
                break;
            }
            Err(e) => {
                warn!("Cannot read from {}: {}", link.peer, e);
                break;
            }
        }
    }

    drop(reader);
    drop(writer);
    link.stop.fire();
    info!("Disconnected from {}", link.peer);
    shared.dispatcher.notify_connection_state(false);
    link.done.fire();
}

/// Async DX cluster client.
///
/// Cloning yields another handle to the same client.
#[derive(Debug, Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Create a disconnected client.
    pub fn new(config: ClientConfig) -> Self {
        let login = Login::new(config.login.clone(), config.credentials.clone());
        Self {
            shared: Arc::new(Shared {
                config,
                login,
                dispatcher: Dispatcher::new(),
                closed: Signal::new(),
                link: Mutex::new(None),
            }),
        }
    }

    /// Create a client and connect it once.
    pub async fn open(config: ClientConfig) -> Result<Self, ClientError> {
        let client = Self::new(config);
        client.connect().await?;
        Ok(client)
    }

    /// Create a client that keeps itself connected until [`Client::disconnect`].
    ///
    /// Must be called from within a Tokio runtime. Failures are only visible
    /// through logging and observers.
    pub fn keep_open(config: ClientConfig) -> Self {
        let client = Self::new(config);
        client.keep_connected();
        client
    }

    /// Register an observer for connection state and decoded records.
    pub fn register(&self, observer: Arc<dyn Observer>) {
        self.shared.dispatcher.register(observer);
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    fn current_link(&self) -> Option<Arc<Link>> {
        self.shared
            .link
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn active_link(&self) -> Option<Arc<Link>> {
        self.current_link().filter(|link| link.is_active())
    }

    /// Whether a connection is currently established.
    pub fn connected(&self) -> bool {
        self.active_link().is_some()
    }

    /// Whether the current connection has completed login.
    pub fn authenticated(&self) -> bool {
        self.active_link()
            .is_some_and(|link| link.authenticated.load(Ordering::Acquire))
    }

    /// Whether the client has been permanently closed.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_fired()
    }

    /// Connect to the node. Does nothing if already connected.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.dial().await.map(|_| ())
    }

    async fn dial(&self) -> Result<Arc<Link>, ClientError> {
        if let Some(link) = self.active_link() {
            return Ok(link);
        }
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        let config = &self.shared.config;
        let addr = config.address();
        debug!("Dialing {}", addr);
        let stream = timeout(
            config.connect_timeout,
            TcpStream::connect((config.host.as_str(), config.effective_port())),
        )
        .await
        .map_err(|_| ClientError::DialTimeout { addr: addr.clone() })?
        .map_err(|source| ClientError::Dial {
            addr: addr.clone(),
            source,
        })?;

        let peer = stream
            .peer_addr()
            .map_or_else(|_| addr.clone(), |a| a.to_string());
        let link = Arc::new(Link::new(peer));
        {
            let mut current = self
                .shared
                .link
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.is_closed() {
                return Err(ClientError::Closed);
            }
            if let Some(existing) = current.as_ref().filter(|l| l.is_active()) {
                return Ok(existing.clone());
            }
            *current = Some(link.clone());
        }

        info!("Connected to {}", link.peer);
        self.shared.dispatcher.notify_connection_state(true);
        tokio::spawn(drive(self.shared.clone(), stream, link.clone()));

        Ok(link)
    }

    /// Close the client for good.
    ///
    /// Ends the current connection and stops persistent mode. Safe to call
    /// repeatedly and at any time.
    pub fn disconnect(&self) {
        if self.shared.closed.fire() {
            info!("Closing client for {}", self.shared.config.address());
        }
        if let Some(link) = self.current_link() {
            link.stop.fire();
        }
    }

    /// Run `f` once the current connection has ended.
    ///
    /// Runs `f` right away if no connection was ever made. Must be called from
    /// within a Tokio runtime.
    pub fn when_disconnected<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self.current_link() {
            None => f(),
            Some(link) => {
                tokio::spawn(async move {
                    link.done.wait().await;
                    f();
                });
            }
        }
    }

    /// Wait until the current connection has ended.
    pub async fn disconnected(&self) {
        if let Some(link) = self.current_link() {
            link.done.wait().await;
        }
    }

    /// Keep the client connected in the background, redialing after every
    /// disconnection or failed attempt until [`Client::disconnect`].
    pub fn keep_connected(&self) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move { client.run_redial_loop().await })
    }

    async fn run_redial_loop(&self) {
        let config = &self.shared.config;
        let closed = &self.shared.closed;
        let addr = config.address();
        info!("Connecting to {}...", addr);

        loop {
            match self.dial().await {
                Ok(link) => {
                    tokio::select! {
                        _ = link.done.wait() => {
                            info!("Connection lost to {}, waiting for retry", addr);
                        }
                        _ = closed.wait() => {
                            info!("Connection closed");
                            return;
                        }
                    }
                }
                Err(ClientError::Closed) => {
                    info!("Connection closed");
                    return;
                }
                Err(e) => warn!("Cannot connect to {}, waiting for retry: {}", addr, e),
            }

            tokio::select! {
                _ = tokio::time::sleep(config.retry_interval) => {
                    info!("Retrying connection to {}", addr);
                }
                _ = closed.wait() => {
                    info!("Connection closed");
                    return;
                }
            }
        }
    }
}
