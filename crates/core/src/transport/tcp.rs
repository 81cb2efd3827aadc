use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::buffer::{EncodedPayload, FrameBuffer};
use crate::protocol::{FrameRequest, Framing, write_response};
use crate::server::ServerConfig;
use crate::session::{Session, SessionRegistry, SessionState};

/// How often blocked accepts and reads re-check the `running` flag.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Non-blocking TCP accept loop.
///
/// Checks the `running` flag between accepts with a 50ms poll interval
/// so that [`crate::server::Server::stop`] can terminate it promptly.
/// A failed accept is logged and the loop carries on.
pub fn accept_loop(
    listener: TcpListener,
    buffer: Arc<FrameBuffer>,
    sessions: SessionRegistry,
    config: Arc<ServerConfig>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer_addr)) => {
                if let Err(e) = stream.set_nonblocking(false) {
                    tracing::warn!(%peer_addr, error = %e, "failed to configure client socket");
                    continue;
                }
                let b = buffer.clone();
                let s = sessions.clone();
                let c = config.clone();
                let r = running.clone();
                let spawned = thread::Builder::new()
                    .name(format!("client-{peer_addr}"))
                    .spawn(move || Connection::handle(stream, peer_addr, b, s, c, r));
                if let Err(e) = spawned {
                    tracing::warn!(%peer_addr, error = %e, "failed to spawn session thread");
                }
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// One client connection running the request/response loop.
///
/// Owns its socket outright. The frame buffer is only ever read.
struct Connection {
    stream: TcpStream,
    session: Arc<Session>,
    buffer: Arc<FrameBuffer>,
    config: Arc<ServerConfig>,
    request_buf: Vec<u8>,
}

impl Connection {
    /// Entry point: set up a connection and run its request loop.
    fn handle(
        stream: TcpStream,
        peer_addr: SocketAddr,
        buffer: Arc<FrameBuffer>,
        sessions: SessionRegistry,
        config: Arc<ServerConfig>,
        running: Arc<AtomicBool>,
    ) {
        if let Err(e) = configure(&stream, &config) {
            tracing::warn!(%peer_addr, error = %e, "failed to configure client socket");
            return;
        }

        let session = sessions.open(peer_addr);
        tracing::info!(%peer_addr, session_id = session.id, "client connected");

        let mut conn = Connection {
            stream,
            session,
            request_buf: vec![0; config.max_request_bytes.max(1)],
            buffer,
            config,
        };

        let reason = conn.run(&running);
        let frames_sent = conn.session.frames_sent();
        sessions.close(conn.session.id);

        tracing::info!(%peer_addr, reason, frames_sent, "client disconnected");
    }

    /// Request/response loop. Returns the reason for exiting.
    fn run(&mut self, running: &AtomicBool) -> &'static str {
        let mut last_request = Instant::now();

        while running.load(Ordering::SeqCst) {
            self.session.set_state(SessionState::AwaitingRequest);

            let n = match self.stream.read(&mut self.request_buf) {
                Ok(0) => return "connection closed by client",
                Ok(n) => n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    if self
                        .config
                        .idle_timeout
                        .is_some_and(|idle| last_request.elapsed() >= idle)
                    {
                        return "idle timeout";
                    }
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => return "read error",
            };

            let Some(request) = FrameRequest::parse(&self.request_buf[..n]) else {
                return "blank request";
            };
            last_request = Instant::now();

            self.session.set_state(SessionState::SendingResponse);
            tracing::debug!(
                peer = %self.session.peer_addr,
                bytes = request.len,
                "frame request"
            );

            let payload = self.current_frame(running);
            if payload.is_none() {
                if !running.load(Ordering::SeqCst) {
                    return "server shutting down";
                }
                tracing::warn!(
                    peer = %self.session.peer_addr,
                    timeout_ms = self.config.first_frame_timeout.as_millis() as u64,
                    framing = ?self.config.framing,
                    "no frame available"
                );
                // An empty raw response is indistinguishable from silence.
                if self.config.framing == Framing::Raw {
                    return "no frame available";
                }
            }
            let data = payload.as_ref().map(|p| &p.data()[..]).unwrap_or(&[]);

            if write_response(&mut self.stream, self.config.framing, data).is_err() {
                return "write error";
            }

            let sent = self.session.record_frame_sent();
            tracing::debug!(
                peer = %self.session.peer_addr,
                seq = payload.as_ref().map(EncodedPayload::seq),
                bytes = data.len(),
                sent,
                "frame sent"
            );
        }

        "server shutting down"
    }

    /// Latest frame, waiting up to `first_frame_timeout` if none exists yet.
    ///
    /// The wait is sliced by [`POLL_INTERVAL`] so a server stop is noticed.
    /// `None` means nothing was published in time or the server is stopping.
    fn current_frame(&self, running: &AtomicBool) -> Option<EncodedPayload> {
        if let Some(payload) = self.buffer.fetch() {
            return Some(payload);
        }

        tracing::debug!(peer = %self.session.peer_addr, "no frame yet, waiting");
        let deadline = Instant::now() + self.config.first_frame_timeout;
        while running.load(Ordering::SeqCst) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if let Some(payload) = self.buffer.wait_for_frame(remaining.min(POLL_INTERVAL)) {
                return Some(payload);
            }
        }
        None
    }
}

fn configure(stream: &TcpStream, config: &ServerConfig) -> std::io::Result<()> {
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(POLL_INTERVAL))?;
    // A zero duration is rejected by the OS call; treat it as "no timeout".
    let write_timeout = (!config.write_timeout.is_zero()).then_some(config.write_timeout);
    stream.set_write_timeout(write_timeout)
}
