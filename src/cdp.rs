//! Chrome DevTools Protocol backend (uses the `headless_chrome` crate)

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::{Emulation, Network, Page, DOM};
use headless_chrome::{Browser, LaunchOptions};
use log::debug;

use crate::engine::{BrowserLauncher, BrowserSession};
use crate::{Error, RenderConfig, RenderTarget, Result};

// Flags for running in memory-constrained containers without a GPU
const CHROME_ARGS: &[&str] = &[
    "--disable-dev-shm-usage",
    "--disable-accelerated-2d-canvas",
    "--disable-gpu",
    "--hide-scrollbars",
    "--mute-audio",
];

/// Launches one headless Chrome per render.
///
/// Each launch gets its own temporary profile directory from
/// `headless_chrome`, so nothing (cookies, cache, storage) is shared between
/// renders.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    sandbox: bool,
    chrome_path: Option<PathBuf>,
    window_size: (u32, u32),
    page_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            sandbox: config.sandbox,
            chrome_path: config.chrome_path.clone(),
            window_size: (config.target.width, config.target.height),
            page_timeout: Duration::from_millis(config.load_timeout_ms),
        }
    }
}

impl BrowserLauncher for ChromeLauncher {
    type Session = ChromeSession;

    fn launch(&self) -> Result<ChromeSession> {
        let args: Vec<&OsStr> = CHROME_ARGS.iter().map(OsStr::new).collect();

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.sandbox)
            .window_size(Some(self.window_size))
            .path(self.chrome_path.clone())
            // The transport must outlive the longest page load.
            .idle_browser_timeout(self.page_timeout + Duration::from_secs(30))
            .args(args)
            .build()
            .map_err(|e| Error::BrowserLaunch(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::BrowserLaunch(format!("Failed to launch browser: {}", e)))?;
        debug!("launched headless chrome (sandbox: {})", self.sandbox);

        Ok(ChromeSession {
            browser,
            tab: None,
            page_timeout: self.page_timeout,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        })
    }
}

/// A running Chrome with at most one page
pub struct ChromeSession {
    browser: Browser,
    tab: Option<Arc<Tab>>,
    page_timeout: Duration,
    // Request ids seen in `requestWillBeSent` and not yet finished or failed
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ChromeSession {
    fn tab(&self) -> Result<&Arc<Tab>> {
        self.tab
            .as_ref()
            .ok_or_else(|| Error::Load("No page has been opened".into()))
    }

    fn track_network(&self, tab: &Tab) -> Result<()> {
        tab.call_method(Network::Enable {
            max_total_buffer_size: None,
            max_resource_buffer_size: None,
            max_post_data_size: None,
            enable_durable_messages: None,
            report_direct_socket_traffic: None,
        })
        .map_err(|e| Error::Load(format!("Failed to enable network events: {}", e)))?;

        let in_flight = self.in_flight.clone();
        tab.add_event_listener(Arc::new(move |event: &Event| {
            let Ok(mut pending) = in_flight.lock() else {
                return;
            };
            match event {
                Event::NetworkRequestWillBeSent(e) => {
                    pending.insert(e.params.request_id.clone());
                }
                Event::NetworkLoadingFinished(e) => {
                    pending.remove(&e.params.request_id);
                }
                Event::NetworkLoadingFailed(e) => {
                    pending.remove(&e.params.request_id);
                }
                _ => {}
            }
        }))
        .map_err(|e| Error::Load(format!("Failed to register network listener: {}", e)))?;

        Ok(())
    }
}

impl BrowserSession for ChromeSession {
    fn open_page(&mut self, target: &RenderTarget) -> Result<()> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| Error::Load(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(self.page_timeout);

        // Size the page independently of the host display
        tab.call_method(Emulation::SetDeviceMetricsOverride {
            width: target.width,
            height: target.height,
            device_scale_factor: target.device_scale_factor,
            mobile: false,
            scale: None,
            screen_width: None,
            screen_height: None,
            position_x: None,
            position_y: None,
            dont_set_visible_size: None,
            screen_orientation: None,
            viewport: None,
            display_feature: None,
            device_posture: None,
        })
        .map_err(|e| Error::Load(format!("Failed to set device metrics: {}", e)))?;

        // Never let the capture fall through to a transparent pixel
        tab.call_method(Emulation::SetDefaultBackgroundColorOverride {
            color: Some(DOM::RGBA {
                r: target.background.r as u32,
                g: target.background.g as u32,
                b: target.background.b as u32,
                a: Some(1.0),
            }),
        })
        .map_err(|e| Error::Load(format!("Failed to set background color: {}", e)))?;

        tab.call_method(Emulation::SetScriptExecutionDisabled { value: true })
            .map_err(|e| Error::Load(format!("Failed to disable scripts: {}", e)))?;

        self.track_network(&tab)?;
        self.tab = Some(tab);
        Ok(())
    }

    fn set_content(&mut self, html: &str) -> Result<()> {
        let tab = self.tab()?;

        let tree = tab.call_method(Page::GetFrameTree(None))?;

        tab.call_method(Page::SetDocumentContent {
            frame_id: tree.frame_tree.frame.id,
            html: html.to_string(),
        })
        .map_err(|e| Error::Load(format!("Failed to set document content: {}", e)))?;

        Ok(())
    }

    fn in_flight_requests(&self) -> Result<usize> {
        self.in_flight
            .lock()
            .map(|pending| pending.len())
            .map_err(|_| Error::Load("Network tracker lock poisoned".into()))
    }

    fn capture_png(&mut self, target: &RenderTarget) -> Result<Vec<u8>> {
        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: target.width as f64,
            height: target.height as f64,
            scale: 1.0,
        };

        self.tab()?
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::Capture(format!("Screenshot failed: {}", e)))
    }

    fn close(self) -> Result<()> {
        let ChromeSession { browser, tab, .. } = self;

        let closed = match tab {
            Some(tab) => tab
                .close(false)
                .map(|_| ())
                .map_err(|e| Error::Teardown(format!("Failed to close tab: {}", e))),
            None => Ok(()),
        };

        // Dropping the browser kills the child process and removes its profile dir.
        drop(browser);
        closed
    }
}
