use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use framecast::{
    AppConfig, FrameBuffer, Framing, JpegEncoder, ProducerLoop, Server, StreamKind,
    SyntheticSource,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "framecast-server",
    about = "Serve the latest camera frame to TCP clients, one frame per request"
)]
struct Args {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Bind address (host:port)
    #[arg(long, short)]
    bind: Option<String>,

    /// Response framing: raw, header16 or u32be
    #[arg(long)]
    framing: Option<Framing>,

    /// JPEG quality (1-100)
    #[arg(long, short)]
    quality: Option<u8>,

    /// Stream to serve
    #[arg(long, value_parser = parse_stream)]
    stream: Option<StreamKind>,

    /// Capture width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Capture height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Capture frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Log filter when RUST_LOG is unset (e.g. info, debug, framecast=trace)
    #[arg(long)]
    log_level: Option<String>,
}

fn parse_stream(s: &str) -> Result<StreamKind, String> {
    match s {
        "depth" => Ok(StreamKind::Depth),
        "color" => Ok(StreamKind::Color),
        other => Err(format!("unknown stream '{other}' (expected depth or color)")),
    }
}

impl Args {
    /// File (or defaults) first, then any flags given on the command line.
    fn into_config(self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => AppConfig::default(),
        };

        if let Some(bind) = self.bind {
            config.server.bind = bind;
        }
        if let Some(framing) = self.framing {
            config.server.framing = framing;
        }
        if let Some(quality) = self.quality {
            config.encode.quality = quality;
        }
        if let Some(stream) = self.stream {
            config.capture.stream = stream;
        }
        if let Some(width) = self.width {
            config.capture.width = width;
        }
        if let Some(height) = self.height {
            config.capture.height = height;
        }
        if let Some(fps) = self.fps {
            config.capture.fps = fps;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let config = Args::parse().into_config()?;
    init_logging(&config.logging.level);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        tracing::info!("received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    let buffer = Arc::new(FrameBuffer::new());

    let mut server = Server::with_config(config.server.to_server_config(), buffer.clone());
    server
        .start()
        .with_context(|| format!("starting server on {}", config.server.bind))?;

    let producer = ProducerLoop::new(
        SyntheticSource::from_config(&config.capture),
        JpegEncoder::from_config(&config.encode),
        buffer,
    )
    .spawn()
    .context("spawning producer thread")?;

    tracing::info!(
        addr = %server.local_addr()?,
        width = config.capture.width,
        height = config.capture.height,
        fps = config.capture.fps,
        quality = config.encode.quality,
        "serving frames, press Ctrl-C to stop"
    );

    let mut producer_down = false;
    while running.load(Ordering::SeqCst) {
        if !producer_down && !producer.is_running() {
            producer_down = true;
            tracing::warn!(
                clients = server.active_connections(),
                "producer has stopped; clients will keep receiving the last frame"
            );
        }
        thread::sleep(Duration::from_millis(200));
    }

    server.stop();
    producer.stop();
    let stats = producer.stats();
    if let Some(exit) = producer.join() {
        tracing::info!(?exit, published = stats.published, "shutdown complete");
    }

    Ok(())
}
