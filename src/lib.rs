//! Table export
//!
//! Turns a table into an HTML fragment, and rasterizes that HTML into an
//! image or PDF by screenshotting it in a headless browser and cropping the
//! screenshot to the table element.
//!
//! # Features
//!
//! - **CDP Backend** (`cdp`, default): drives Chrome through the DevTools Protocol
//! - **WebDriver Backend** (`webdriver`, default): drives Firefox, Safari and
//!   Edge through their W3C WebDriver servers
//! - **PDF Output** (`pdf`, default): wraps the cropped image in a one-page PDF
//!
//! # Example
//!
//! ```no_run
//! use tablesnap::table::{Column, Table};
//! use tablesnap::{SaveOptions, Viewport, WebDriver};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = Table::new(vec![Column::new("city"), Column::new("population")])
//!     .title("Largest cities")
//!     .row(["Tokyo", "37,400,068"])
//!     .row(["Delhi", "28,514,000"]);
//!
//! let options = SaveOptions {
//!     scale: 2.0,
//!     web_driver: WebDriver::Chrome,
//!     window_size: Viewport { width: 1200, height: 800 },
//!     ..Default::default()
//! };
//!
//! let written = tablesnap::save(&table, "cities", &options)?;
//! assert_eq!(written.extension().unwrap(), "png");
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod driver;
pub mod export;
pub mod table;

pub use driver::{BrowserSession, ElementRect, Launcher, WebDriver};
pub use export::{as_raw_html, save, CropRect, Exporter};
pub use table::{HtmlRender, RenderTable, Table};

/// Options for [`save`]
///
/// The defaults capture the first `<table>` element with headless Chrome in
/// a 6000x6000 window, at zoom 100% with a 5 pixel margin.
///
/// # Examples
///
/// ```
/// let opts = tablesnap::SaveOptions::default();
/// assert_eq!(opts.selector, "table");
/// assert_eq!(opts.window_size.width, 6000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    /// Tag name of the element to capture; the first match is used
    pub selector: String,
    /// Zoom factor; larger values give higher resolution output
    pub scale: f64,
    /// Margin around the element in CSS pixels
    pub expand: u32,
    /// Browser used for the screenshot
    pub web_driver: WebDriver,
    /// Browser window size. Not the output size: it only has to be large
    /// enough for the whole table to be visible.
    pub window_size: Viewport,
    /// Timeout for browser start-up and each browser operation
    pub timeout_ms: u64,
    /// Explicit Chrome/Chromium executable for the `chrome` driver
    pub chrome_path: Option<PathBuf>,
    /// Explicit WebDriver server executable (geckodriver, safaridriver, msedgedriver)
    pub driver_path: Option<PathBuf>,
    /// Use an already running WebDriver server instead of spawning one
    pub webdriver_url: Option<String>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            selector: "table".to_string(),
            scale: 1.0,
            expand: 5,
            web_driver: WebDriver::Chrome,
            window_size: Viewport {
                width: 6000,
                height: 6000,
            },
            timeout_ms: 30000,
            chrome_path: None,
            driver_path: None,
            webdriver_url: None,
        }
    }
}

impl SaveOptions {
    /// Reject values no browser could act on
    pub fn validate(&self) -> Result<()> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(Error::ConfigError(format!("scale must be positive, got {}", self.scale)));
        }
        if self.selector.trim().is_empty() {
            return Err(Error::ConfigError("selector must not be empty".into()));
        }
        if self.window_size.width == 0 || self.window_size.height == 0 {
            return Err(Error::ConfigError(format!(
                "window size must be non-zero, got {}x{}",
                self.window_size.width, self.window_size.height
            )));
        }
        Ok(())
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 6000,
            height: 6000,
        }
    }
}
