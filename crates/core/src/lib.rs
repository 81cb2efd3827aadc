//! Latest-frame camera server.
//!
//! A single [`Producer`] thread captures frames from a [`FrameSource`],
//! encodes them with an [`Encoder`] and overwrites a shared
//! [`FrameBuffer`]. A [`Server`] accepts TCP clients; each client gets a
//! session thread that answers every request with whatever frame is in
//! the buffer at that moment.
//!
//! ```no_run
//! use std::sync::Arc;
//! use framecast::{FrameBuffer, JpegEncoder, ProducerLoop, Server, SyntheticSource};
//!
//! let buffer = Arc::new(FrameBuffer::new());
//! let _producer = ProducerLoop::new(
//!     SyntheticSource::new(640, 480, 30),
//!     JpegEncoder::default(),
//!     buffer.clone(),
//! )
//! .spawn()?;
//!
//! let mut server = Server::new("0.0.0.0:8080", buffer);
//! server.start()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod frame;
pub mod media;
pub mod producer;
pub mod protocol;
pub mod server;
pub mod session;
pub mod source;
pub mod transport;

pub use buffer::{EncodedPayload, FrameBuffer};
pub use config::AppConfig;
pub use error::{CaptureError, EncodeError, FramecastError, Result};
pub use frame::{PixelFormat, RawFrame, StreamKind};
pub use media::{Encoder, JpegEncoder};
pub use producer::{Producer, ProducerExit, ProducerLoop};
pub use protocol::Framing;
pub use server::{Server, ServerConfig};
pub use session::ClientInfo;
pub use source::{FrameSource, SyntheticSource};
