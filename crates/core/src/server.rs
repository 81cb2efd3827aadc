use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::buffer::FrameBuffer;
use crate::error::{FramecastError, Result};
use crate::protocol::Framing;
use crate::session::{ClientInfo, SessionRegistry};
use crate::transport::tcp;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024;
pub const DEFAULT_FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Server-level configuration shared by every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// TCP listen address (`host:port`). Port 0 picks a free port;
    /// see [`Server::local_addr`].
    pub bind_addr: String,
    /// How responses are delimited on the wire.
    pub framing: Framing,
    /// Largest single request read. Extra bytes are read as further requests.
    pub max_request_bytes: usize,
    /// How long a request waits when no frame has been published yet.
    pub first_frame_timeout: Duration,
    /// Per-write timeout; a client that stops reading is dropped after this.
    /// Zero disables it.
    pub write_timeout: Duration,
    /// Close a session after this long without a request.
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            framing: Framing::Raw,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            first_frame_timeout: DEFAULT_FIRST_FRAME_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            idle_timeout: None,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: &str) -> Self {
        Self {
            bind_addr: bind_addr.to_string(),
            ..Self::default()
        }
    }
}

/// Latest-frame TCP server.
///
/// Owns the session registry and the accept thread. Each accepted client
/// runs on its own thread (see [`transport::tcp`](crate::transport::tcp))
/// and reads from the shared [`FrameBuffer`]; nothing the server does ever
/// writes to it.
pub struct Server {
    sessions: SessionRegistry,
    running: Arc<AtomicBool>,
    buffer: Arc<FrameBuffer>,
    config: Arc<ServerConfig>,
    local_addr: Option<SocketAddr>,
    accept_thread: Option<JoinHandle<()>>,
}

impl Server {
    pub fn new(bind_addr: &str, buffer: Arc<FrameBuffer>) -> Self {
        Self::with_config(ServerConfig::new(bind_addr), buffer)
    }

    /// Create a server with custom protocol configuration.
    pub fn with_config(config: ServerConfig, buffer: Arc<FrameBuffer>) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            running: Arc::new(AtomicBool::new(false)),
            buffer,
            config: Arc::new(config),
            local_addr: None,
            accept_thread: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(FramecastError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.config.bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        // Sessions from an earlier run keep the old flag, which stays false.
        self.running = Arc::new(AtomicBool::new(true));
        self.local_addr = Some(local_addr);

        let buffer = self.buffer.clone();
        let sessions = self.sessions.clone();
        let config = self.config.clone();
        let running = self.running.clone();

        tracing::info!(
            addr = %local_addr,
            framing = ?self.config.framing,
            "frame server listening"
        );

        let spawned = thread::Builder::new()
            .name("accept-loop".to_string())
            .spawn(move || tcp::accept_loop(listener, buffer, sessions, config, running));

        match spawned {
            Ok(handle) => {
                self.accept_thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e.into())
            }
        }
    }

    /// Stop accepting and wait for the accept thread to exit.
    ///
    /// Open sessions notice at their next poll and close once any response
    /// in flight has been written; this call does not wait for them. A later
    /// [`start`](Self::start) never revives them.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if self.sessions.is_empty() {
            tracing::info!("server stopping");
        } else {
            tracing::info!(
                open_sessions = self.sessions.len(),
                "server stopping, sessions close at their next poll"
            );
        }
        if let Some(handle) = self.accept_thread.take()
            && handle.join().is_err()
        {
            tracing::error!("accept thread panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The address actually bound, once started.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.local_addr.ok_or(FramecastError::NotStarted)
    }

    /// Number of currently open client sessions.
    pub fn active_connections(&self) -> usize {
        self.sessions.len()
    }

    pub fn clients(&self) -> Vec<ClientInfo> {
        self.sessions.clients()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}
