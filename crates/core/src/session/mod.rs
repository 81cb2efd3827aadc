//! Per-connection client sessions.
//!
//! A session exists for exactly as long as its TCP connection. It owns
//! nothing shared with other sessions; the only cross-session state is the
//! read-only view of the frame buffer and this registry, which the server
//! uses for connection counts and status reporting.
//!
//! ## Session lifecycle
//!
//! ```text
//! accept                      -> AwaitingRequest
//! request received            -> SendingResponse
//! response written            -> AwaitingRequest
//! EOF / blank / socket error  -> Closed (removed)
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Request/response state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Blocked reading the next request.
    AwaitingRequest,
    /// Fetching the current frame and writing it out.
    SendingResponse,
    /// Socket released. Terminal.
    Closed,
}

/// Live state of one connected client.
#[derive(Debug)]
pub struct Session {
    /// Process-unique, monotonically assigned.
    pub id: u64,
    pub peer_addr: SocketAddr,
    pub connected_at: Instant,
    state: RwLock<SessionState>,
    frames_sent: AtomicU64,
}

impl Session {
    pub fn new(peer_addr: SocketAddr) -> Self {
        Session {
            id: SESSION_COUNTER.fetch_add(1, Ordering::SeqCst),
            peer_addr,
            connected_at: Instant::now(),
            state: RwLock::new(SessionState::AwaitingRequest),
            frames_sent: AtomicU64::new(0),
        }
    }

    pub fn set_state(&self, state: SessionState) {
        let mut current = self.state.write();
        if *current != state {
            tracing::trace!(
                session_id = self.id,
                old_state = ?*current,
                new_state = ?state,
                "state transition"
            );
            *current = state;
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn record_frame_sent(&self) -> u64 {
        self.frames_sent.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }
}

/// Snapshot of a connected client, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub session_id: u64,
    pub peer_addr: SocketAddr,
    pub state: SessionState,
    pub frames_sent: u64,
    pub connected_for: Duration,
}

/// Thread-safe registry of open sessions.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<u64, Arc<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a session for a freshly accepted connection.
    pub fn open(&self, peer_addr: SocketAddr) -> Arc<Session> {
        let session = Arc::new(Session::new(peer_addr));
        let total = {
            let mut sessions = self.sessions.write();
            sessions.insert(session.id, session.clone());
            sessions.len()
        };
        tracing::debug!(
            session_id = session.id,
            %peer_addr,
            total_sessions = total,
            "session opened"
        );
        session
    }

    /// Mark a session closed and drop it from the registry.
    pub fn close(&self, id: u64) -> Option<Arc<Session>> {
        let (removed, remaining) = {
            let mut sessions = self.sessions.write();
            let removed = sessions.remove(&id);
            (removed, sessions.len())
        };
        if let Some(session) = &removed {
            session.set_state(SessionState::Closed);
            tracing::debug!(session_id = id, total_sessions = remaining, "session closed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// All open sessions, oldest first.
    pub fn clients(&self) -> Vec<ClientInfo> {
        let mut clients: Vec<ClientInfo> = self
            .sessions
            .read()
            .values()
            .map(|s| ClientInfo {
                session_id: s.id,
                peer_addr: s.peer_addr,
                state: s.state(),
                frames_sent: s.frames_sent(),
                connected_for: s.connected_at.elapsed(),
            })
            .collect();
        clients.sort_by_key(|c| c.session_id);
        clients
    }
}
