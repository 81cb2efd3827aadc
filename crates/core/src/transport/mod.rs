//! Network transport for frame requests and responses.
//!
//! A single TCP listener accepts clients on a dedicated thread; each
//! accepted connection gets its own thread running a
//! [`session`](crate::session) request loop ([`tcp`]).
//!
//! Blocking calls on those threads (accept, request reads) poll at
//! [`tcp::POLL_INTERVAL`] so a server stop is noticed without closing
//! sockets out from under them.

pub mod tcp;
