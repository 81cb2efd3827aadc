//! Startup configuration.
//!
//! Everything here is read once before the producer and server start.
//! Values come from an optional TOML file; every key has a default, so an
//! empty file (or no file) is a valid configuration.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//! framing = "raw"            # raw | header16 | u32be
//! first_frame_timeout_ms = 5000
//!
//! [capture]
//! width = 640
//! height = 480
//! fps = 30
//! stream = "depth"           # depth | color
//!
//! [encode]
//! quality = 80
//! depth_alpha = 0.05
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FramecastError, Result};
use crate::frame::StreamKind;
use crate::media::colormap::DEFAULT_DEPTH_ALPHA;
use crate::media::jpeg::DEFAULT_QUALITY;
use crate::protocol::Framing;
use crate::server::{
    DEFAULT_BIND_ADDR, DEFAULT_FIRST_FRAME_TIMEOUT, DEFAULT_MAX_REQUEST_BYTES,
    DEFAULT_WRITE_TIMEOUT, ServerConfig,
};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub capture: CaptureConfig,
    pub encode: EncodeConfig,
    pub logging: LoggingConfig,
}

/// `[server]` section. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSection {
    /// TCP listen address (`host:port`).
    pub bind: String,
    pub framing: Framing,
    /// Upper bound on a single request read.
    pub max_request_bytes: usize,
    /// How long a request waits for the very first frame.
    pub first_frame_timeout_ms: u64,
    /// Per-response write timeout. A client that stops reading is dropped after this.
    pub write_timeout_ms: u64,
    /// Close sessions that send no request for this long. Unset means never.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_ms: Option<u64>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND_ADDR.to_string(),
            framing: Framing::default(),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            first_frame_timeout_ms: DEFAULT_FIRST_FRAME_TIMEOUT.as_millis() as u64,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT.as_millis() as u64,
            idle_timeout_ms: None,
        }
    }
}

impl ServerSection {
    pub fn to_server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind.clone(),
            framing: self.framing,
            max_request_bytes: self.max_request_bytes,
            first_frame_timeout: Duration::from_millis(self.first_frame_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            idle_timeout: self.idle_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// `[capture]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Which half of the depth/color pair is served.
    pub stream: StreamKind,
    /// Report every n-th capture as not ready (synthetic source only). 0 disables.
    pub drop_every: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            stream: StreamKind::Depth,
            drop_every: 0,
        }
    }
}

/// `[encode]` section.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EncodeConfig {
    /// JPEG quality, 1..=100.
    pub quality: u8,
    /// Depth-to-8-bit scale factor applied before the colormap.
    pub depth_alpha: f32,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            depth_alpha: DEFAULT_DEPTH_ALPHA,
        }
    }
}

/// `[logging]` section. `RUST_LOG` takes precedence when set.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FramecastError::Config(msg));

        if self.server.bind.is_empty() {
            return invalid("server.bind must not be empty".into());
        }
        if self.server.max_request_bytes == 0 {
            return invalid("server.max_request_bytes must be at least 1".into());
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return invalid(format!(
                "capture resolution {}x{} is empty",
                self.capture.width, self.capture.height
            ));
        }
        if !(1..=100).contains(&self.encode.quality) {
            return invalid(format!(
                "encode.quality must be within 1..=100, got {}",
                self.encode.quality
            ));
        }
        if !self.encode.depth_alpha.is_finite() || self.encode.depth_alpha <= 0.0 {
            return invalid(format!(
                "encode.depth_alpha must be positive, got {}",
                self.encode.depth_alpha
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.server.framing, Framing::Raw);
        assert_eq!(config.capture.width, 640);
        assert_eq!(config.capture.stream, StreamKind::Depth);
        assert_eq!(config.encode.quality, 80);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
[server]
bind = "127.0.0.1:9000"
framing = "header16"
idle_timeout_ms = 30000

[capture]
stream = "color"
fps = 15

[encode]
quality = 60
"#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.server.framing, Framing::Header16);
        assert_eq!(config.server.max_request_bytes, 1024);
        assert_eq!(config.capture.stream, StreamKind::Color);
        assert_eq!(config.capture.fps, 15);
        assert_eq!(config.capture.height, 480);
        assert_eq!(config.encode.quality, 60);
        assert_eq!(config.logging.level, "info");

        let server = config.server.to_server_config();
        assert_eq!(server.idle_timeout, Some(Duration::from_secs(30)));
        assert_eq!(server.first_frame_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_out_of_range_quality() {
        let err = AppConfig::from_toml("[encode]\nquality = 0\n").unwrap_err();
        assert!(matches!(err, FramecastError::Config(_)));
    }

    #[test]
    fn rejects_zero_resolution() {
        let err = AppConfig::from_toml("[capture]\nwidth = 0\n").unwrap_err();
        assert!(matches!(err, FramecastError::Config(_)));
    }

    #[test]
    fn rejects_unknown_framing() {
        let err = AppConfig::from_toml("[server]\nframing = \"chunked\"\n").unwrap_err();
        assert!(matches!(err, FramecastError::Config(_)));
    }

    #[test]
    fn toml_roundtrip_has_all_sections() {
        let text = toml::to_string_pretty(&AppConfig::default()).unwrap();
        assert!(text.contains("[server]"));
        assert!(text.contains("[capture]"));
        assert!(text.contains("[encode]"));
        assert!(text.contains("[logging]"));
    }
}
