//! Frame request/response wire protocol.
//!
//! The protocol is strictly request-then-respond over one persistent TCP
//! connection:
//!
//! ```text
//! client                          server
//!   |  any non-blank bytes  ------>  |
//!   |  <------  [header] payload     |   (latest frame)
//!   |  any non-blank bytes  ------>  |
//!   |  <------  [header] payload     |
//!   |  close / blank        ------>  |   session ends
//! ```
//!
//! Request content is ignored; it only means "send me the current frame".
//! A request made entirely of whitespace is treated like a close.
//!
//! ## Framing
//!
//! | [`Framing`] | Header | Notes |
//! |-------------|--------|-------|
//! | `raw` | none | Default. Clients must find the end of each image themselves. |
//! | `header16` | 16 bytes, ASCII decimal length, space padded | |
//! | `u32be` | 4 bytes, big-endian length | |
//!
//! With `raw`, two back-to-back responses cannot be split by a generic
//! client. It is the default only because existing viewers expect it.

pub mod request;
pub mod response;

pub use request::FrameRequest;
pub use response::{Framing, write_response};
