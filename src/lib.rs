//! Quote card renderer
//!
//! Renders a social-media "quote card" (display name, handle, avatar and
//! message text on a styled canvas) into a PNG by laying out a generated HTML
//! document in a headless browser and capturing the viewport.
//!
//! # Pipeline
//!
//! - [`sanitize`]: validates image references and escapes untrusted text
//! - [`document`]: composes the self-contained card document
//! - [`engine`]: drives one isolated browser per render and always tears it down
//! - [`service`]: validates requests and runs the pipeline off the async runtime
//! - [`server`]: the HTTP surface
//!
//! # Example
//!
//! ```no_run
//! use quotecard::{RenderConfig, RenderRequest, RenderService};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = quotecard::new_engine(RenderConfig::default())?;
//! let service = RenderService::new(engine, RenderConfig::default().target);
//!
//! let image = service
//!     .handle(RenderRequest::new("Ada Lovelace", "ada", "Hello\nWorld"))
//!     .await?;
//! std::fs::write("card.png", image.as_bytes())?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result, ServiceError, ValidationError};

pub mod sanitize;
pub use sanitize::{CardFields, ImageRef};

pub mod document;
pub use document::CardDocument;

pub mod engine;
pub use engine::{BrowserLauncher, BrowserSession, RenderStage, Renderer};

// Chrome DevTools Protocol backend
#[cfg(feature = "cdp")]
pub mod cdp;

// Runs the blocking engine on a worker thread for async callers
pub mod async_api;

pub mod service;
pub use service::{RenderRequest, RenderService};

pub mod server;

/// Upper bound on the page-load wait.
pub const MAX_LOAD_TIMEOUT_MS: u64 = 30_000;

/// An opaque sRGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// The fixed canvas every card is laid out on and captured from.
///
/// The document builder sizes its layout from the same value the engine uses
/// for the viewport, so the two can never disagree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTarget {
    /// Logical width in CSS pixels
    pub width: u32,
    /// Logical height in CSS pixels
    pub height: u32,
    /// Device pixel ratio applied to the capture
    pub device_scale_factor: f64,
    /// Canvas color behind (or instead of) the background image
    pub background: Rgb,
}

impl RenderTarget {
    /// 1500x1500 at 2x, captured as a 3000x3000 PNG.
    pub const QUOTE_CARD: RenderTarget = RenderTarget {
        width: 1500,
        height: 1500,
        device_scale_factor: 2.0,
        background: Rgb::new(0x15, 0x20, 0x2B),
    };

    /// Width of the captured image in device pixels
    pub fn pixel_width(&self) -> u32 {
        (self.width as f64 * self.device_scale_factor).round() as u32
    }

    /// Height of the captured image in device pixels
    pub fn pixel_height(&self) -> u32 {
        (self.height as f64 * self.device_scale_factor).round() as u32
    }
}

impl Default for RenderTarget {
    fn default() -> Self {
        Self::QUOTE_CARD
    }
}

/// Configuration for the render engine
///
/// The defaults mirror a headless page load that waits for the network to
/// stay idle for half a second, bounded by a 30 second budget.
///
/// # Examples
///
/// ```
/// let cfg = quotecard::RenderConfig::default();
/// assert_eq!(cfg.load_timeout_ms, 30_000);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Canvas contract shared with the document builder
    pub target: RenderTarget,
    /// Budget for the page to reach network quiescence, in milliseconds
    pub load_timeout_ms: u64,
    /// How long the network must stay idle to count as quiescent
    pub network_idle_ms: u64,
    /// Fixed delay after quiescence for image decode and layout to settle
    pub settle_delay_ms: u64,
    /// How often the in-flight request count is sampled
    pub poll_interval_ms: u64,
    /// Whether Chrome keeps its own sandbox (containers often need it off)
    pub sandbox: bool,
    /// Browser binary to launch instead of the auto-detected one
    pub chrome_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target: RenderTarget::QUOTE_CARD,
            load_timeout_ms: MAX_LOAD_TIMEOUT_MS,
            network_idle_ms: 500,
            settle_delay_ms: 500,
            poll_interval_ms: 50,
            sandbox: true,
            chrome_path: None,
        }
    }
}

impl RenderConfig {
    /// Reject settings the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.load_timeout_ms == 0 || self.load_timeout_ms > MAX_LOAD_TIMEOUT_MS {
            return Err(Error::Config(format!(
                "load timeout must be between 1 and {}ms, got {}ms",
                MAX_LOAD_TIMEOUT_MS, self.load_timeout_ms
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll interval must be positive".into()));
        }
        if self.target.width == 0 || self.target.height == 0 {
            return Err(Error::Config("render target must have a non-zero size".into()));
        }
        if !(self.target.device_scale_factor.is_finite() && self.target.device_scale_factor > 0.0) {
            return Err(Error::Config("device scale factor must be positive".into()));
        }
        Ok(())
    }
}

const PNG_MAGIC: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// Raw PNG bytes of one captured card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    data: Vec<u8>,
}

impl RenderedImage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Width and height from the IHDR chunk, if the bytes look like a PNG.
    pub fn png_dimensions(&self) -> Option<(u32, u32)> {
        if self.data.len() < 24 || &self.data[..8] != PNG_MAGIC || &self.data[12..16] != b"IHDR" {
            return None;
        }
        let width = u32::from_be_bytes(self.data[16..20].try_into().ok()?);
        let height = u32::from_be_bytes(self.data[20..24].try_into().ok()?);
        Some((width, height))
    }
}

/// Turns a card document into pixels.
///
/// Implementations block the calling thread; async callers go through
/// [`async_api::AsyncRenderer`].
pub trait RenderEngine: Send + Sync + 'static {
    /// Render `document` on the `target` canvas and return the PNG.
    fn render(&self, document: &CardDocument, target: &RenderTarget) -> Result<RenderedImage>;
}

/// Create the default Chrome-backed engine
#[cfg(feature = "cdp")]
pub fn new_engine(config: RenderConfig) -> Result<Renderer<cdp::ChromeLauncher>> {
    config.validate()?;
    let launcher = cdp::ChromeLauncher::new(&config);
    Ok(Renderer::new(launcher, config))
}
