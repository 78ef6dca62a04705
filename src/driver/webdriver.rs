//! W3C WebDriver session over HTTP.
//!
//! Either spawns the browser's driver server (geckodriver, safaridriver,
//! msedgedriver) on a free local port or talks to an already running server
//! given by `webdriver_url`. Only the handful of endpoints the export needs
//! are implemented.

use super::{BrowserSession, DriverServer, ElementRect, LaunchSpec};
use crate::{Error, Result};
use base64::Engine as Base64Engine;
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// W3C web element reference key
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Error payload returned by a WebDriver server
#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

enum Reply {
    Value(Value),
    Failed(WireError),
}

/// A driver server process started for one session; killed on drop.
struct DriverService {
    child: Child,
}

impl DriverService {
    fn start(server: &DriverServer, binary: PathBuf, timeout: Duration, client: &Client) -> Result<(Self, String)> {
        let port = free_port()?;
        let child = Command::new(&binary)
            .args(server.port_args(port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::InitializationError(format!("Failed to start {}: {}", binary.display(), e))
            })?;
        let mut service = Self { child };
        let url = format!("http://127.0.0.1:{}", port);

        // Poll /status until the server answers or the process dies
        let started = Instant::now();
        loop {
            if let Some(status) = service.child.try_wait()? {
                return Err(Error::InitializationError(format!(
                    "{} exited during start-up ({})",
                    binary.display(),
                    status
                )));
            }
            match client.get(format!("{}/status", url)).send() {
                Ok(resp) if resp.status().is_success() => break,
                _ if started.elapsed() >= timeout => {
                    return Err(Error::Timeout(timeout.as_millis() as u64));
                }
                _ => std::thread::sleep(Duration::from_millis(100)),
            }
        }
        debug!("{} listening on {}", server.binary, url);
        Ok((service, url))
    }
}

impl Drop for DriverService {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// WebDriver-backed browser session
pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: Option<String>,
    timeout_ms: u64,
    _service: Option<DriverService>,
}

impl WebDriverSession {
    pub fn launch(spec: &LaunchSpec) -> Result<Self> {
        let timeout = Duration::from_millis(spec.timeout_ms);
        // Driver servers listen on loopback
        let client = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))?;

        let (service, base_url) = match &spec.webdriver_url {
            Some(url) => (None, url.trim_end_matches('/').to_string()),
            None => {
                let server = spec.spec().server.ok_or_else(|| {
                    Error::ConfigError(format!("{} has no driver server", spec.driver))
                })?;
                let binary = spec
                    .driver_path
                    .clone()
                    .or_else(|| super::find_on_path(server.binary))
                    .unwrap_or_else(|| PathBuf::from(server.binary));
                let (service, url) = DriverService::start(&server, binary, timeout, &client)?;
                (Some(service), url)
            }
        };

        let mut session = Self {
            client,
            base_url,
            session_id: None,
            timeout_ms: spec.timeout_ms,
            _service: service,
        };

        let created = session
            .command(Method::POST, "/session", Some(new_session_body(spec)))
            .map_err(|e| in_stage(e, |m| Error::InitializationError(format!("Failed to create session: {}", m))))?;
        let id = created
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::WebDriverError(format!("No sessionId in response: {}", created)))?;
        session.session_id = Some(id.to_string());
        debug!("webdriver session {} on {}", id, session.base_url);

        // Most drivers ignore --width/--height, so size the window explicitly
        let rect = json!({ "width": spec.viewport.width, "height": spec.viewport.height });
        if let Err(e) = session.session_command(Method::POST, "/window/rect", Some(rect)) {
            warn!("Failed to set window size: {}", e);
        }

        Ok(session)
    }

    fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Reply> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(self.timeout_ms)
            } else {
                Error::WebDriverError(format!("Request to {} failed: {}", url, e))
            }
        })?;
        let status = response.status();
        let payload: Value = response
            .json()
            .map_err(|e| Error::WebDriverError(format!("Malformed response from {} ({}): {}", url, status, e)))?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);

        if value.get("error").is_some_and(Value::is_string) {
            let wire: WireError = serde_json::from_value(value)
                .map_err(|e| Error::WebDriverError(format!("Malformed error from {}: {}", url, e)))?;
            return Ok(Reply::Failed(wire));
        }
        if !status.is_success() {
            return Err(Error::WebDriverError(format!("{} returned {}", url, status)));
        }
        Ok(Reply::Value(value))
    }

    fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        match self.send(method, path, body)? {
            Reply::Value(v) => Ok(v),
            Reply::Failed(e) => Err(Error::WebDriverError(format!("{}: {}", e.error, e.message))),
        }
    }

    fn session_path(&self, suffix: &str) -> Result<String> {
        let id = self
            .session_id
            .as_deref()
            .ok_or(Error::SessionClosed)?;
        Ok(format!("/session/{}{}", id, suffix))
    }

    fn session_command(&self, method: Method, suffix: &str, body: Option<Value>) -> Result<Value> {
        let path = self.session_path(suffix)?;
        self.command(method, &path, body)
    }
}

// Timeouts, closed sessions and missing elements keep their own variant
fn in_stage(err: Error, stage: impl FnOnce(String) -> Error) -> Error {
    if err.passes_through() {
        err
    } else {
        stage(err.to_string())
    }
}

fn new_session_body(spec: &LaunchSpec) -> Value {
    let entry = spec.spec();
    let mut always_match = json!({ "browserName": entry.browser_name });
    match entry.options_key {
        Some(key) => {
            always_match[key] = json!({ "args": spec.browser_args() });
        }
        None => warn!(
            "{} takes no command-line arguments; ignoring {:?}",
            spec.driver,
            spec.browser_args()
        ),
    }
    json!({ "capabilities": { "alwaysMatch": always_match } })
}

impl BrowserSession for WebDriverSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.session_command(Method::POST, "/url", Some(json!({ "url": url })))
            .map_err(|e| in_stage(e, Error::LoadError))?;
        Ok(())
    }

    fn execute_script(&mut self, script: &str) -> Result<Value> {
        self.session_command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [] })),
        )
        .map_err(|e| in_stage(e, Error::ScriptError))
    }

    fn find_element_rect(&mut self, tag: &str) -> Result<ElementRect> {
        let path = self.session_path("/element")?;
        let body = json!({ "using": "tag name", "value": tag });
        let element = match self.send(Method::POST, &path, Some(body))? {
            Reply::Value(v) => v,
            Reply::Failed(e) if e.error == "no such element" => {
                return Err(Error::ElementNotFound {
                    selector: tag.to_string(),
                })
            }
            Reply::Failed(e) => {
                return Err(Error::WebDriverError(format!("{}: {}", e.error, e.message)))
            }
        };
        let element_id = element
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::WebDriverError(format!("No element reference in {}", element)))?;

        let rect = self.session_command(Method::GET, &format!("/element/{}/rect", element_id), None)?;
        let rect: ElementRect = serde_json::from_value(rect)
            .map_err(|e| Error::WebDriverError(format!("Unexpected element rect: {}", e)))?;
        debug!("element <{}> at {:?}", tag, rect);
        Ok(rect)
    }

    fn screenshot_png(&mut self) -> Result<Vec<u8>> {
        let encoded = self
            .session_command(Method::GET, "/screenshot", None)
            .map_err(|e| in_stage(e, |m| Error::RenderError(format!("Screenshot failed: {}", m))))?;
        let encoded = encoded
            .as_str()
            .ok_or_else(|| Error::RenderError("Screenshot was not a base64 string".into()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::RenderError(format!("Screenshot was not valid base64: {}", e)))
    }

    fn close(&mut self) -> Result<()> {
        if self.session_id.is_none() {
            return Ok(());
        }
        let result = self.session_command(Method::DELETE, "", None).map(|_| ());
        self.session_id = None;
        result
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to delete WebDriver session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::PortFlag;
    use crate::{SaveOptions, Viewport, WebDriver};

    fn spec(driver: WebDriver) -> LaunchSpec {
        LaunchSpec::from_options(&SaveOptions {
            web_driver: driver,
            window_size: Viewport { width: 300, height: 200 },
            ..Default::default()
        })
    }

    #[test]
    fn firefox_capabilities_omit_headless() {
        let body = new_session_body(&spec(WebDriver::Firefox));
        let caps = &body["capabilities"]["alwaysMatch"];
        assert_eq!(caps["browserName"], "firefox");
        assert_eq!(caps["moz:firefoxOptions"]["args"], json!(["--width=300", "--height=200"]));
    }

    #[test]
    fn edge_capabilities_include_headless() {
        let body = new_session_body(&spec(WebDriver::Edge));
        let caps = &body["capabilities"]["alwaysMatch"];
        assert_eq!(caps["browserName"], "MicrosoftEdge");
        assert_eq!(
            caps["ms:edgeOptions"]["args"],
            json!(["--headless", "--width=300", "--height=200"])
        );
    }

    #[test]
    fn safari_capabilities_have_no_vendor_options() {
        let body = new_session_body(&spec(WebDriver::Safari));
        let caps = body["capabilities"]["alwaysMatch"].as_object().unwrap();
        assert_eq!(caps.len(), 1);
    }

    fn closed_session() -> WebDriverSession {
        WebDriverSession {
            client: Client::new(),
            base_url: "http://127.0.0.1:1".into(),
            session_id: None,
            timeout_ms: 100,
            _service: None,
        }
    }

    #[test]
    fn closed_session_reports_session_closed() {
        let mut session = closed_session();
        assert!(matches!(session.navigate("file:///t.html"), Err(Error::SessionClosed)));
        assert!(matches!(session.execute_script("1"), Err(Error::SessionClosed)));
        assert!(matches!(session.screenshot_png(), Err(Error::SessionClosed)));
        assert!(session.close().is_ok());
    }

    #[test]
    fn in_stage_keeps_timeouts() {
        assert!(matches!(in_stage(Error::Timeout(300), Error::LoadError), Error::Timeout(300)));
        assert!(matches!(
            in_stage(Error::WebDriverError("boom".into()), Error::LoadError),
            Error::LoadError(m) if m.contains("boom")
        ));
    }

    #[cfg(unix)]
    #[test]
    fn driver_that_exits_early_fails_fast() {
        let server = DriverServer {
            binary: "false",
            port_flag: PortFlag::Separate,
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(1))
            .no_proxy()
            .build()
            .unwrap();

        let started = Instant::now();
        let err = DriverService::start(&server, PathBuf::from("/bin/false"), Duration::from_secs(20), &client)
            .err()
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        match err {
            Error::InitializationError(msg) => assert!(msg.contains("exited during start-up"), "{}", msg),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn service_kills_and_reaps_child_on_drop() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let proc_dir = PathBuf::from(format!("/proc/{}", child.id()));
        let service = DriverService { child };
        assert!(proc_dir.exists());

        drop(service);
        assert!(!proc_dir.exists());
    }

    #[test]
    fn free_port_is_nonzero() {
        assert_ne!(free_port().unwrap(), 0);
    }
}
