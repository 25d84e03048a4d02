//! Minimal Chrome DevTools Protocol driver.
//!
//! Chrome is started with `--remote-debugging-port` (or an already running
//! instance on that port is reused). Every command discovers the first page
//! target via `GET /json`, opens a WebSocket to it, sends one JSON-RPC message,
//! waits for the response with the matching id and closes the socket.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::config::BrowserConfig;
use crate::error::{AppError, Result};

/// Timeout for a single CDP round trip.
const CDP_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for requests to the DevTools HTTP endpoint.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// How long Chrome gets to open its debugging port.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(15);

/// Interval between polls while waiting on page conditions.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Largest CDP response accepted (5 MB).
const MAX_CDP_RESPONSE_BYTES: usize = 5 * 1024 * 1024;

/// How to find an element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A CSS selector.
    Css(String),
    /// The first `<button>` whose visible text contains the given text, ignoring case.
    ButtonText(String),
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Self::Css(selector.to_string())
    }

    pub fn button(text: &str) -> Self {
        Self::ButtonText(text.to_string())
    }

    /// JavaScript expression evaluating to the element or `null`.
    pub fn js(&self) -> String {
        match self {
            Locator::Css(selector) => {
                format!("document.querySelector({})", js_string(selector))
            }
            Locator::ButtonText(text) => format!(
                "(Array.from(document.querySelectorAll('button')).find(b => (b.innerText || '').trim().toLowerCase().includes({})) || null)",
                js_string(&text.to_lowercase())
            ),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "{selector}"),
            Locator::ButtonText(text) => write!(f, "button:has-text('{text}')"),
        }
    }
}

/// Encode a Rust string as a JavaScript string literal.
fn js_string(s: &str) -> String {
    // JSON string literals are valid JavaScript string literals.
    Value::String(s.to_string()).to_string()
}

/// A Chrome instance driven over the DevTools protocol.
pub struct CdpBrowser {
    client: reqwest::Client,
    debug_port: u16,
    next_message_id: AtomicU64,
    child: Mutex<Option<Child>>,
}

impl CdpBrowser {
    /// Attach to Chrome on the configured port, launching it first if nothing is listening.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;

        let browser = Self {
            client,
            debug_port: config.debug_port,
            next_message_id: AtomicU64::new(1),
            child: Mutex::new(None),
        };

        if browser.is_devtools_reachable().await {
            tracing::info!(port = config.debug_port, "Reusing running Chrome instance");
            return Ok(browser);
        }

        let child = spawn_chrome(config).await?;
        *browser.child.lock().await = Some(child);
        browser.wait_until_reachable().await?;

        Ok(browser)
    }

    fn devtools_base_url(&self) -> String {
        format!("http://localhost:{}", self.debug_port)
    }

    fn next_id(&self) -> u64 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn is_devtools_reachable(&self) -> bool {
        let url = format!("{}/json/version", self.devtools_base_url());
        self.client.get(&url).send().await.is_ok()
    }

    async fn wait_until_reachable(&self) -> Result<()> {
        let deadline = tokio::time::Instant::now() + STARTUP_TIMEOUT;
        loop {
            if self.is_devtools_reachable().await {
                tracing::info!("Chrome DevTools endpoint is reachable");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AppError::Timeout {
                    seconds: STARTUP_TIMEOUT.as_secs(),
                    reason: "Chrome did not open its debugging port".to_string(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// WebSocket debugger URL of the first page target.
    async fn page_ws_url(&self) -> Result<String> {
        let url = format!("{}/json", self.devtools_base_url());
        let targets: Vec<Value> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Automation(format!("failed to list DevTools targets: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::Automation(format!("failed to parse target list: {e}")))?;

        targets
            .iter()
            .find(|t| t.get("type").and_then(Value::as_str) == Some("page"))
            .and_then(|t| t.get("webSocketDebuggerUrl"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::Automation("no page target available in Chrome".to_string()))
    }

    /// Send one CDP command and return its `result` object.
    pub async fn command(&self, method: &str, params: Value) -> Result<Value> {
        let ws_url = self.page_ws_url().await?;
        let msg_id = self.next_id();

        tracing::debug!(method = method, msg_id = msg_id, "Sending CDP command");

        let (ws_stream, _response) = tokio::time::timeout(CDP_TIMEOUT, connect_async(&ws_url))
            .await
            .map_err(|_| AppError::Timeout {
                seconds: CDP_TIMEOUT.as_secs(),
                reason: format!("WebSocket connection to `{ws_url}`"),
            })??;

        let (mut sink, mut stream) = ws_stream.split();

        let payload = json!({ "id": msg_id, "method": method, "params": params });
        sink.send(Message::Text(payload.to_string().into())).await?;

        let result = tokio::time::timeout(CDP_TIMEOUT, async {
            while let Some(msg) = stream.next().await {
                match msg? {
                    Message::Text(text) => {
                        if text.len() > MAX_CDP_RESPONSE_BYTES {
                            return Err(AppError::Automation(format!(
                                "CDP response too large: {} bytes",
                                text.len()
                            )));
                        }
                        let response: Value = serde_json::from_str(&text)?;
                        if response.get("id").and_then(Value::as_u64) == Some(msg_id) {
                            return cdp_result(response);
                        }
                        // Events and other replies; keep reading.
                    }
                    Message::Close(_) => {
                        return Err(AppError::Automation(
                            "WebSocket closed before the CDP response arrived".to_string(),
                        ));
                    }
                    _ => {}
                }
            }
            Err(AppError::Automation(
                "WebSocket stream ended without a CDP response".to_string(),
            ))
        })
        .await
        .map_err(|_| AppError::Timeout {
            seconds: CDP_TIMEOUT.as_secs(),
            reason: format!("waiting for CDP response to `{method}`"),
        })?;

        let _ = sink.send(Message::Close(None)).await;

        result
    }

    /// Navigate and wait for the document to finish loading.
    pub async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        tracing::debug!(url = url, "Navigating");
        let result = self.command("Page.navigate", json!({ "url": url })).await?;

        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(AppError::Automation(format!(
                "navigation to {url} failed: {error}"
            )));
        }

        self.wait_until("document.readyState === 'complete'", timeout, "page load")
            .await
    }

    /// Evaluate a JavaScript expression and return its value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        runtime_value(result)
    }

    pub async fn current_url(&self) -> Result<String> {
        let value = self.evaluate("window.location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Poll a boolean expression until it is true or `timeout` passes.
    ///
    /// Evaluation errors count as "not yet": while a page navigates, the
    /// execution context is torn down and Chrome rejects evaluations until the
    /// new document exists. The last such error is reported on timeout.
    pub async fn wait_until(&self, expression: &str, timeout: Duration, what: &str) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut last_error: Option<AppError> = None;
        loop {
            match self.evaluate(expression).await {
                Ok(value) if value.as_bool() == Some(true) => return Ok(()),
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(what = what, error = %e, "Poll failed; retrying");
                    last_error = Some(e);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                let reason = match last_error {
                    Some(e) => format!("waiting for {what} (last error: {e})"),
                    None => format!("waiting for {what}"),
                };
                return Err(AppError::Timeout {
                    seconds: timeout.as_secs(),
                    reason,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        let expression = format!("({}) !== null", locator.js());
        self.wait_until(&expression, timeout, &locator.to_string())
            .await
    }

    pub async fn click(&self, locator: &Locator) -> Result<()> {
        let expression = format!(
            "(() => {{ const el = {}; if (!el) return false; el.scrollIntoView({{block: 'center'}}); el.click(); return true; }})()",
            locator.js()
        );
        self.expect_found(&expression, locator).await
    }

    /// Wait for an element, then click it.
    pub async fn wait_and_click(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        self.wait_for(locator, timeout).await?;
        self.click(locator).await
    }

    /// Replace the content of an input, textarea or contenteditable element.
    pub async fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        let expression = format!(
            "(() => {{ const el = {el}; if (!el) return false; el.focus(); \
if (el.isContentEditable) {{ el.innerText = {text}; }} \
else {{ const setter = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value').set; setter.call(el, {text}); }} \
el.dispatchEvent(new Event('input', {{bubbles: true}})); \
el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }})()",
            el = locator.js(),
            text = js_string(text),
        );
        self.expect_found(&expression, locator).await
    }

    async fn expect_found(&self, expression: &str, locator: &Locator) -> Result<()> {
        match self.evaluate(expression).await?.as_bool() {
            Some(true) => Ok(()),
            _ => Err(AppError::Automation(format!("element not found: {locator}"))),
        }
    }

    /// Terminate Chrome if this driver launched it.
    pub async fn close(&self) -> Result<()> {
        if let Some(mut child) = self.child.lock().await.take() {
            tracing::info!("Stopping Chrome");
            child.kill().await?;
        }
        Ok(())
    }
}

async fn spawn_chrome(config: &BrowserConfig) -> Result<Child> {
    let chrome_path = find_chrome_path(config.chrome_path.as_deref())?;

    tokio::fs::create_dir_all(&config.profile_dir).await?;

    tracing::info!(
        chrome_path = %chrome_path,
        port = config.debug_port,
        headless = config.headless,
        "Launching Chrome with remote debugging"
    );

    let mut cmd = Command::new(&chrome_path);
    cmd.arg(format!("--remote-debugging-port={}", config.debug_port))
        .arg(format!("--user-data-dir={}", config.profile_dir.display()))
        .arg(format!("--user-agent={}", config.user_agent))
        .arg("--no-first-run")
        .arg("--no-default-browser-check");
    if config.headless {
        cmd.arg("--headless=new");
    }
    cmd.arg("about:blank")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true);

    cmd.spawn().map_err(|e| {
        AppError::Automation(format!("failed to launch Chrome at `{chrome_path}`: {e}"))
    })
}

fn find_chrome_path(configured: Option<&str>) -> Result<String> {
    if let Some(path) = configured {
        return Ok(path.to_string());
    }

    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else {
        &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ]
    };

    candidates
        .iter()
        .find(|candidate| Path::new(candidate).exists() || on_path(candidate))
        .map(|candidate| candidate.to_string())
        .ok_or_else(|| {
            AppError::Automation(
                "could not find Chrome/Chromium; set browser.chrome_path".to_string(),
            )
        })
}

fn on_path(binary: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file()))
        .unwrap_or(false)
}

/// Unwrap a CDP reply into its `result`, surfacing protocol errors.
fn cdp_result(response: Value) -> Result<Value> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown CDP error");
        return Err(AppError::Automation(format!("CDP error: {message}")));
    }
    Ok(response.get("result").cloned().unwrap_or_else(|| json!({})))
}

/// Extract the value of a `Runtime.evaluate` result, surfacing script exceptions.
fn runtime_value(result: Value) -> Result<Value> {
    if let Some(details) = result.get("exceptionDetails") {
        let text = details
            .pointer("/exception/description")
            .or_else(|| details.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("script threw");
        return Err(AppError::Automation(format!("JavaScript error: {text}")));
    }
    Ok(result
        .pointer("/result/value")
        .cloned()
        .unwrap_or(Value::Null))
}
