//! Test doubles shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quotecard::{
    BrowserLauncher, BrowserSession, CardDocument, Error, RenderConfig, RenderEngine, RenderTarget,
    RenderedImage, Result,
};

/// A config with the timing knobs turned down so tests run quickly
pub fn fast_config() -> RenderConfig {
    RenderConfig {
        load_timeout_ms: 2000,
        network_idle_ms: 10,
        settle_delay_ms: 0,
        poll_interval_ms: 5,
        ..Default::default()
    }
}

/// An all-black 1-bit PNG of the given size
pub fn blank_png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Grayscale);
        encoder.set_depth(png::BitDepth::One);
        let mut writer = encoder.write_header().expect("png header");
        let row = ((width + 7) / 8) as usize;
        writer
            .write_image_data(&vec![0u8; row * height as usize])
            .expect("png data");
    }
    out
}

/// Decode the header of `bytes` and return its dimensions
pub fn png_size(bytes: &[u8]) -> (u32, u32) {
    let reader = png::Decoder::new(bytes).read_info().expect("valid png");
    let info = reader.info();
    (info.width, info.height)
}

/// Which step of the fake browser should misbehave
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    pub fail_launch: bool,
    pub fail_set_content: bool,
    pub never_idle: bool,
    pub fail_capture: bool,
    pub empty_capture: bool,
    pub fail_close: bool,
}

/// Counters observed across every session a [`FakeLauncher`] hands out
#[derive(Debug, Clone, Default)]
pub struct Probe {
    pub launches: Arc<AtomicUsize>,
    pub captures: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub contents: Arc<Mutex<Vec<String>>>,
}

impl Probe {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn contents(&self) -> Vec<String> {
        self.contents.lock().unwrap().clone()
    }
}

pub struct FakeLauncher {
    faults: Faults,
    probe: Probe,
}

impl FakeLauncher {
    pub fn new(faults: Faults) -> (Self, Probe) {
        let probe = Probe::default();
        (
            Self {
                faults,
                probe: probe.clone(),
            },
            probe,
        )
    }
}

impl BrowserLauncher for FakeLauncher {
    type Session = FakeSession;

    fn launch(&self) -> Result<FakeSession> {
        if self.faults.fail_launch {
            return Err(Error::BrowserLaunch("injected launch failure".into()));
        }
        self.probe.launches.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            faults: self.faults,
            probe: self.probe.clone(),
            target: None,
        })
    }
}

pub struct FakeSession {
    faults: Faults,
    probe: Probe,
    target: Option<RenderTarget>,
}

impl BrowserSession for FakeSession {
    fn open_page(&mut self, target: &RenderTarget) -> Result<()> {
        self.target = Some(*target);
        Ok(())
    }

    fn set_content(&mut self, html: &str) -> Result<()> {
        if self.faults.fail_set_content {
            return Err(Error::Load("injected load failure".into()));
        }
        self.probe.contents.lock().unwrap().push(html.to_string());
        Ok(())
    }

    fn in_flight_requests(&self) -> Result<usize> {
        Ok(if self.faults.never_idle { 1 } else { 0 })
    }

    fn capture_png(&mut self, target: &RenderTarget) -> Result<Vec<u8>> {
        self.probe.captures.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_capture {
            return Err(Error::Capture("injected capture failure".into()));
        }
        assert_eq!(self.target.as_ref(), Some(target), "capture before page setup");
        if self.faults.empty_capture {
            return Ok(Vec::new());
        }
        Ok(blank_png(target.pixel_width(), target.pixel_height()))
    }

    fn close(self) -> Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_close {
            Err(Error::Teardown("injected close failure".into()))
        } else {
            Ok(())
        }
    }
}

/// Marker that makes [`SpyEngine`] fail the render containing it
pub const FAIL_MARKER: &str = "please-fail-this-render";

/// An engine that records every call instead of launching a browser
#[derive(Clone, Default)]
pub struct SpyEngine {
    calls: Arc<AtomicUsize>,
    documents: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl SpyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn documents(&self) -> Vec<String> {
        self.documents.lock().unwrap().clone()
    }
}

impl RenderEngine for SpyEngine {
    fn render(&self, document: &CardDocument, target: &RenderTarget) -> Result<RenderedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents.lock().unwrap().push(document.as_str().to_string());
        std::thread::sleep(self.delay);

        if document.as_str().contains(FAIL_MARKER) {
            return Err(Error::Capture("injected capture failure".into()));
        }
        Ok(RenderedImage::new(blank_png(
            target.pixel_width(),
            target.pixel_height(),
        )))
    }
}
