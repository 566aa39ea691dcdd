//! Backend-agnostic render pipeline.
//!
//! [`Renderer`] walks one browser instance through
//! `Idle → BrowserLaunching → PageLoaded → ContentStable → Captured → Closed`.
//! The session lives in a [`SessionGuard`], so every exit path (success,
//! timeout, error or panic) closes the browser exactly once before control
//! returns to the caller.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, warn};

use crate::{CardDocument, Error, RenderConfig, RenderEngine, RenderTarget, RenderedImage, Result};

/// Starts isolated browser instances.
pub trait BrowserLauncher: Send + Sync + 'static {
    type Session: BrowserSession;

    /// Start a fresh browser process that shares no state with any other.
    fn launch(&self) -> Result<Self::Session>;
}

/// One running browser instance with a single page.
pub trait BrowserSession {
    /// Create the page surface at the target size and density.
    fn open_page(&mut self, target: &RenderTarget) -> Result<()>;

    /// Replace the page's content with `html`.
    fn set_content(&mut self, html: &str) -> Result<()>;

    /// Number of network requests currently in flight.
    fn in_flight_requests(&self) -> Result<usize>;

    /// Capture exactly the viewport as an opaque PNG.
    fn capture_png(&mut self, target: &RenderTarget) -> Result<Vec<u8>>;

    /// Shut the browser down.
    fn close(self) -> Result<()>;
}

/// Where a render currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Idle,
    BrowserLaunching,
    PageLoaded,
    ContentStable,
    Captured,
    Closed,
    Failed,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RenderStage::Idle => "idle",
            RenderStage::BrowserLaunching => "browser-launching",
            RenderStage::PageLoaded => "page-loaded",
            RenderStage::ContentStable => "content-stable",
            RenderStage::Captured => "captured",
            RenderStage::Closed => "closed",
            RenderStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Owns a session and closes it when dropped.
///
/// Teardown errors are logged and swallowed; they never replace the result
/// of the render that owned the session.
pub struct SessionGuard<S: BrowserSession> {
    session: Option<S>,
}

impl<S: BrowserSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn session(&mut self) -> &mut S {
        // Only `Drop` takes the session out.
        self.session
            .as_mut()
            .unwrap_or_else(|| unreachable!("session already closed"))
    }
}

impl<S: BrowserSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            match session.close() {
                Ok(()) => debug!("render stage: {}", RenderStage::Closed),
                Err(e) => warn!("{}", Error::Teardown(e.to_string())),
            }
        }
    }
}

/// The render engine: one fresh browser per call, driven by `L`.
pub struct Renderer<L: BrowserLauncher> {
    launcher: L,
    config: RenderConfig,
}

impl<L: BrowserLauncher> Renderer<L> {
    pub fn new(launcher: L, config: RenderConfig) -> Self {
        Self { launcher, config }
    }

    fn run(
        &self,
        document: &CardDocument,
        target: &RenderTarget,
        stage: &mut RenderStage,
    ) -> Result<RenderedImage> {
        *stage = RenderStage::BrowserLaunching;
        debug!("render stage: {}", stage);
        let mut guard = SessionGuard::new(self.launcher.launch()?);

        let session = guard.session();
        session.open_page(target)?;
        session.set_content(document.as_str())?;
        *stage = RenderStage::PageLoaded;
        debug!("render stage: {}", stage);

        wait_for_network_idle(
            session,
            Duration::from_millis(self.config.load_timeout_ms),
            Duration::from_millis(self.config.network_idle_ms),
            Duration::from_millis(self.config.poll_interval_ms),
        )?;
        thread::sleep(Duration::from_millis(self.config.settle_delay_ms));
        *stage = RenderStage::ContentStable;
        debug!("render stage: {}", stage);

        let image = RenderedImage::new(session.capture_png(target)?);
        if image.is_empty() {
            return Err(Error::Capture("Browser returned an empty screenshot".into()));
        }
        *stage = RenderStage::Captured;
        debug!("render stage: {} ({} bytes)", stage, image.len());

        Ok(image)
        // guard drops here and closes the browser
    }
}

impl<L: BrowserLauncher> RenderEngine for Renderer<L> {
    fn render(&self, document: &CardDocument, target: &RenderTarget) -> Result<RenderedImage> {
        let mut stage = RenderStage::Idle;
        let result = self.run(document, target, &mut stage);
        if let Err(e) = &result {
            error!("render failed after stage {}: {}", stage, e);
            debug!("render stage: {}", RenderStage::Failed);
        }
        result
    }
}

/// Block until `session` has had no request in flight for `idle_window`.
///
/// Fails with [`Error::Timeout`] when `timeout` elapses first.
pub fn wait_for_network_idle<S: BrowserSession>(
    session: &S,
    timeout: Duration,
    idle_window: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let start = Instant::now();
    let deadline = start + timeout;
    let mut idle_since: Option<Instant> = None;

    loop {
        let now = Instant::now();
        if session.in_flight_requests()? == 0 {
            let since = *idle_since.get_or_insert(now);
            if now.duration_since(since) >= idle_window {
                debug!("network idle after {:?}", now.duration_since(start));
                return Ok(());
            }
        } else {
            idle_since = None;
        }

        if now >= deadline {
            return Err(Error::Timeout(timeout.as_millis() as u64));
        }
        thread::sleep(poll_interval.min(deadline - now));
    }
}
