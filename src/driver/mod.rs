//! Browser drivers used to rasterize exported HTML.
//!
//! Each [`WebDriver`] variant maps to one [`DriverSpec`] entry in a static
//! registry that records which backend runs it, how its driver server is
//! started and which launch arguments it accepts. Sessions are reached through
//! the [`BrowserSession`] trait and created by a [`Launcher`], so the export
//! pipeline never depends on a concrete browser.

#[cfg(feature = "cdp")]
pub mod cdp;

#[cfg(feature = "webdriver")]
pub mod webdriver;

use crate::{Error, Result, SaveOptions, Viewport};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Browser used to take the screenshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebDriver {
    #[default]
    Chrome,
    Firefox,
    Safari,
    Edge,
}

impl WebDriver {
    pub const ALL: [WebDriver; 4] = [
        WebDriver::Chrome,
        WebDriver::Firefox,
        WebDriver::Safari,
        WebDriver::Edge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WebDriver::Chrome => "chrome",
            WebDriver::Firefox => "firefox",
            WebDriver::Safari => "safari",
            WebDriver::Edge => "edge",
        }
    }

    /// Registry entry for this driver
    pub fn spec(self) -> &'static DriverSpec {
        // REGISTRY is ordered like `ALL`
        &REGISTRY[self as usize]
    }
}

impl fmt::Display for WebDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WebDriver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        WebDriver::ALL
            .into_iter()
            .find(|d| d.name() == wanted)
            .ok_or_else(|| Error::UnsupportedDriver(s.to_string()))
    }
}

/// Mechanism used to drive a browser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Chrome DevTools Protocol through `headless_chrome`
    Cdp,
    /// W3C WebDriver over HTTP against a driver server
    WebDriver,
}

/// How a driver server binary takes its listening port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortFlag {
    /// `--port 4444`
    Separate,
    /// `--port=4444`
    Joined,
}

/// WebDriver server executable for a browser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverServer {
    pub binary: &'static str,
    pub port_flag: PortFlag,
}

impl DriverServer {
    pub fn port_args(&self, port: u16) -> Vec<String> {
        match self.port_flag {
            PortFlag::Separate => vec!["--port".to_string(), port.to_string()],
            PortFlag::Joined => vec![format!("--port={}", port)],
        }
    }
}

/// Registry entry describing how to launch one browser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSpec {
    pub driver: WebDriver,
    pub backend: Backend,
    /// `browserName` capability sent to WebDriver servers
    pub browser_name: &'static str,
    /// Vendor capability key carrying command-line args, if the browser has one
    pub options_key: Option<&'static str>,
    pub server: Option<DriverServer>,
    /// Whether `--headless` is passed. Firefox is launched without it.
    pub supports_headless: bool,
}

pub static REGISTRY: [DriverSpec; 4] = [
    DriverSpec {
        driver: WebDriver::Chrome,
        backend: Backend::Cdp,
        browser_name: "chrome",
        options_key: Some("goog:chromeOptions"),
        server: None,
        supports_headless: true,
    },
    DriverSpec {
        driver: WebDriver::Firefox,
        backend: Backend::WebDriver,
        browser_name: "firefox",
        options_key: Some("moz:firefoxOptions"),
        server: Some(DriverServer {
            binary: "geckodriver",
            port_flag: PortFlag::Separate,
        }),
        supports_headless: false,
    },
    DriverSpec {
        driver: WebDriver::Safari,
        backend: Backend::WebDriver,
        browser_name: "safari",
        options_key: None,
        server: Some(DriverServer {
            binary: "safaridriver",
            port_flag: PortFlag::Separate,
        }),
        supports_headless: true,
    },
    DriverSpec {
        driver: WebDriver::Edge,
        backend: Backend::WebDriver,
        browser_name: "MicrosoftEdge",
        options_key: Some("ms:edgeOptions"),
        server: Some(DriverServer {
            binary: "msedgedriver",
            port_flag: PortFlag::Joined,
        }),
        supports_headless: true,
    },
];

/// Position and size of an element in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Everything a launcher needs to start one browser session
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub driver: WebDriver,
    pub headless: bool,
    pub viewport: Viewport,
    pub timeout_ms: u64,
    pub chrome_path: Option<PathBuf>,
    pub driver_path: Option<PathBuf>,
    pub webdriver_url: Option<String>,
}

impl LaunchSpec {
    pub fn from_options(options: &SaveOptions) -> Self {
        Self {
            driver: options.web_driver,
            headless: options.web_driver.spec().supports_headless,
            viewport: options.window_size,
            timeout_ms: options.timeout_ms,
            chrome_path: options.chrome_path.clone(),
            driver_path: options.driver_path.clone(),
            webdriver_url: options.webdriver_url.clone(),
        }
    }

    pub fn spec(&self) -> &'static DriverSpec {
        self.driver.spec()
    }

    /// Browser command-line arguments: headless flag where supported, then
    /// the window width and height.
    pub fn browser_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(3);
        if self.headless {
            args.push("--headless".to_string());
        }
        args.push(format!("--width={}", self.viewport.width));
        args.push(format!("--height={}", self.viewport.height));
        args
    }
}

/// A live browser session. Implementations release the browser on drop, so
/// an unclosed session never outlives its owner.
pub trait BrowserSession {
    /// Navigate to `url` and wait for the load to finish
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Run `script` in the page and return its JSON result
    fn execute_script(&mut self, script: &str) -> Result<serde_json::Value>;

    /// Locate the first element with tag name `tag` and read its geometry
    fn find_element_rect(&mut self, tag: &str) -> Result<ElementRect>;

    /// Capture the visible page as PNG bytes
    fn screenshot_png(&mut self) -> Result<Vec<u8>>;

    /// Shut the session down. Calling it twice is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Starts browser sessions
pub trait Launcher {
    /// Verify the session can be started, before any resource is acquired
    fn check(&self, _spec: &LaunchSpec) -> Result<()> {
        Ok(())
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn BrowserSession>>;
}

/// Default launcher dispatching on the registry backend
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverLauncher;

impl Launcher for DriverLauncher {
    fn check(&self, spec: &LaunchSpec) -> Result<()> {
        match spec.spec().backend {
            Backend::Cdp => check_cdp(spec),
            Backend::WebDriver => check_webdriver(spec),
        }
    }

    fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn BrowserSession>> {
        debug!(
            "launching {} ({:?} backend, {}x{})",
            spec.driver,
            spec.spec().backend,
            spec.viewport.width,
            spec.viewport.height
        );
        match spec.spec().backend {
            Backend::Cdp => launch_cdp(spec),
            Backend::WebDriver => launch_webdriver(spec),
        }
    }
}

#[cfg(feature = "cdp")]
fn check_cdp(spec: &LaunchSpec) -> Result<()> {
    match &spec.chrome_path {
        Some(path) => require_file(path, "Chrome executable", "fix the configured chrome_path"),
        None => headless_chrome::browser::default_executable()
            .map(|_| ())
            .map_err(|e| {
                Error::missing(
                    "Chrome executable",
                    format!("install Google Chrome or Chromium, or set chrome_path ({})", e),
                )
            }),
    }
}

#[cfg(not(feature = "cdp"))]
fn check_cdp(spec: &LaunchSpec) -> Result<()> {
    Err(backend_missing(spec, "cdp"))
}

#[cfg(feature = "cdp")]
fn launch_cdp(spec: &LaunchSpec) -> Result<Box<dyn BrowserSession>> {
    Ok(Box::new(cdp::CdpSession::launch(spec)?))
}

#[cfg(not(feature = "cdp"))]
fn launch_cdp(spec: &LaunchSpec) -> Result<Box<dyn BrowserSession>> {
    Err(backend_missing(spec, "cdp"))
}

#[cfg(feature = "webdriver")]
fn check_webdriver(spec: &LaunchSpec) -> Result<()> {
    if spec.webdriver_url.is_some() {
        return Ok(());
    }
    let Some(server) = spec.spec().server else {
        return Err(Error::ConfigError(format!("{} has no driver server", spec.driver)));
    };
    match &spec.driver_path {
        Some(path) => require_file(path, server.binary, "fix the configured driver_path"),
        None => find_on_path(server.binary).map(|_| ()).ok_or_else(|| {
            Error::missing(
                server.binary,
                format!(
                    "install it and put it on PATH, set driver_path, or pick another web_driver than '{}'",
                    spec.driver
                ),
            )
        }),
    }
}

#[cfg(not(feature = "webdriver"))]
fn check_webdriver(spec: &LaunchSpec) -> Result<()> {
    Err(backend_missing(spec, "webdriver"))
}

#[cfg(feature = "webdriver")]
fn launch_webdriver(spec: &LaunchSpec) -> Result<Box<dyn BrowserSession>> {
    Ok(Box::new(webdriver::WebDriverSession::launch(spec)?))
}

#[cfg(not(feature = "webdriver"))]
fn launch_webdriver(spec: &LaunchSpec) -> Result<Box<dyn BrowserSession>> {
    Err(backend_missing(spec, "webdriver"))
}

#[cfg(not(all(feature = "cdp", feature = "webdriver")))]
fn backend_missing(spec: &LaunchSpec, feature: &str) -> Error {
    Error::missing(
        format!("The {} backend", spec.driver),
        format!("rebuild tablesnap with the `{}` feature enabled", feature),
    )
}

#[cfg(any(feature = "cdp", feature = "webdriver"))]
fn require_file(path: &Path, what: &str, remedy: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::missing(
            format!("{} at {}", what, path.display()),
            remedy.to_string(),
        ))
    }
}

/// Locate an executable by name in the directories listed in `PATH`.
pub fn find_on_path(binary: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(binary);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{}.exe", binary));
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_ordered_like_all() {
        for driver in WebDriver::ALL {
            assert_eq!(driver.spec().driver, driver);
        }
    }

    #[test]
    fn only_firefox_skips_headless() {
        for driver in WebDriver::ALL {
            assert_eq!(driver.spec().supports_headless, driver != WebDriver::Firefox);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Edge".parse::<WebDriver>().unwrap(), WebDriver::Edge);
        assert_eq!(" firefox ".parse::<WebDriver>().unwrap(), WebDriver::Firefox);
    }

    #[test]
    fn unknown_driver_fails_fast() {
        match "opera".parse::<WebDriver>() {
            Err(Error::UnsupportedDriver(name)) => assert_eq!(name, "opera"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn browser_args_follow_registry() {
        let mut options = SaveOptions {
            window_size: Viewport { width: 800, height: 600 },
            ..Default::default()
        };
        let chrome = LaunchSpec::from_options(&options);
        assert_eq!(chrome.browser_args(), vec!["--headless", "--width=800", "--height=600"]);

        options.web_driver = WebDriver::Firefox;
        let firefox = LaunchSpec::from_options(&options);
        assert_eq!(firefox.browser_args(), vec!["--width=800", "--height=600"]);
    }

    #[test]
    fn port_flags() {
        let sep = DriverServer { binary: "x", port_flag: PortFlag::Separate };
        let joined = DriverServer { binary: "x", port_flag: PortFlag::Joined };
        assert_eq!(sep.port_args(4444), vec!["--port", "4444"]);
        assert_eq!(joined.port_args(4444), vec!["--port=4444"]);
    }

    #[cfg(feature = "webdriver")]
    #[test]
    fn webdriver_url_skips_binary_lookup() {
        let spec = LaunchSpec::from_options(&SaveOptions {
            web_driver: WebDriver::Safari,
            webdriver_url: Some("http://127.0.0.1:1".into()),
            ..Default::default()
        });
        assert!(DriverLauncher.check(&spec).is_ok());
    }

    #[cfg(feature = "webdriver")]
    #[test]
    fn missing_driver_path_is_reported() {
        let spec = LaunchSpec::from_options(&SaveOptions {
            web_driver: WebDriver::Firefox,
            driver_path: Some(PathBuf::from("/definitely/not/here/geckodriver")),
            ..Default::default()
        });
        assert!(matches!(
            DriverLauncher.check(&spec),
            Err(Error::MissingCapability { .. })
        ));
    }
}
