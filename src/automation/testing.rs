//! A scripted stand-in for Chrome's DevTools endpoint.
//!
//! Serves `GET /json/version` and `GET /json` over plain HTTP and answers
//! `Page.navigate` / `Runtime.evaluate` on a separate WebSocket listener,
//! driving a tiny page model instead of a real browser.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::config::BrowserConfig;

pub const FEED_URL: &str = "https://www.linkedin.com/feed/";

/// What the fake page contains and how it reacts.
#[derive(Debug, Default)]
pub struct FakePage {
    pub url: String,
    /// Present elements: CSS selectors, or lower-cased button texts.
    pub elements: HashSet<String>,
    /// The browser profile already holds a LinkedIn session.
    pub signed_in: bool,
    /// Clicking the login form's submit button lands on the feed.
    pub accept_login: bool,
    /// Number of feed checks that fail as if the page were mid-navigation.
    pub feed_errors: usize,
    /// Every navigation fails with a network error.
    pub fail_navigation: bool,
    /// Hrefs returned by the profile-link collector.
    pub links: Vec<String>,
    /// CDP methods received, in order.
    pub methods: Vec<String>,
}

impl FakePage {
    pub fn with_elements(elements: &[&str]) -> Self {
        Self {
            url: "about:blank".to_string(),
            elements: elements.iter().map(|e| e.to_string()).collect(),
            ..Self::default()
        }
    }

    fn handle(&mut self, request: &Value) -> Value {
        let id = request["id"].clone();
        let method = request["method"].as_str().unwrap_or_default();
        self.methods.push(method.to_string());

        match method {
            "Page.navigate" => {
                if self.fail_navigation {
                    return json!({
                        "id": id,
                        "result": {"frameId": "F", "errorText": "net::ERR_CONNECTION_RESET"}
                    });
                }
                let url = request["params"]["url"].as_str().unwrap_or_default();
                self.url = if self.signed_in && url.contains("/login") {
                    FEED_URL.to_string()
                } else {
                    url.to_string()
                };
                json!({"id": id, "result": {"frameId": "F"}})
            }
            "Runtime.evaluate" => {
                let expression = request["params"]["expression"].as_str().unwrap_or_default();
                match self.evaluate(expression) {
                    Ok(value) => json!({"id": id, "result": {"result": {"value": value}}}),
                    Err(message) => json!({"id": id, "error": {"code": -32000, "message": message}}),
                }
            }
            _ => json!({"id": id, "result": {}}),
        }
    }

    fn evaluate(&mut self, expression: &str) -> Result<Value, String> {
        if expression.contains("document.readyState") {
            return Ok(Value::Bool(true));
        }
        if expression.contains("includes('/feed')") {
            if self.feed_errors > 0 {
                self.feed_errors -= 1;
                return Err("Execution context was destroyed.".to_string());
            }
            return Ok(Value::Bool(self.url.contains("/feed")));
        }
        if expression == "window.location.href" {
            return Ok(Value::String(self.url.clone()));
        }
        if expression.contains("a[href*=") {
            return Ok(json!(self.links));
        }

        let found = self
            .elements
            .iter()
            .any(|element| expression.contains(&format!("\"{element}\"")));
        if found
            && self.accept_login
            && expression.contains("el.click()")
            && expression.contains("button[type='submit']")
        {
            self.url = FEED_URL.to_string();
            self.signed_in = true;
        }
        Ok(Value::Bool(found))
    }
}

/// A running fake endpoint. Its listeners stop when it is dropped.
pub struct FakeDevTools {
    pub port: u16,
    pub page: Arc<Mutex<FakePage>>,
    tasks: Vec<JoinHandle<()>>,
}

impl FakeDevTools {
    pub async fn start(page: FakePage) -> Self {
        let http = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ws = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = http.local_addr().unwrap().port();
        let ws_url = format!(
            "ws://127.0.0.1:{}/devtools/page/1",
            ws.local_addr().unwrap().port()
        );
        let page = Arc::new(Mutex::new(page));

        let http_task = tokio::spawn(async move {
            while let Ok((stream, _)) = http.accept().await {
                tokio::spawn(serve_http(stream, ws_url.clone()));
            }
        });

        let ws_page = page.clone();
        let ws_task = tokio::spawn(async move {
            while let Ok((stream, _)) = ws.accept().await {
                tokio::spawn(serve_ws(stream, ws_page.clone()));
            }
        });

        Self {
            port,
            page,
            tasks: vec![http_task, ws_task],
        }
    }

    /// Browser settings pointing at this endpoint, with one-second waits.
    pub fn browser_config(&self) -> BrowserConfig {
        BrowserConfig {
            debug_port: self.port,
            login_timeout_secs: 1,
            action_timeout_secs: 1,
            ..BrowserConfig::default()
        }
    }

    pub fn methods(&self) -> Vec<String> {
        self.page.lock().unwrap().methods.clone()
    }
}

impl Drop for FakeDevTools {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn serve_http(mut stream: TcpStream, ws_url: String) {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    let head = String::from_utf8_lossy(&request);
    let path = head.split_whitespace().nth(1).unwrap_or("/");
    let body = if path.starts_with("/json/version") {
        json!({"Browser": "FakeChrome/1.0"})
    } else {
        json!([{"type": "page", "webSocketDebuggerUrl": ws_url}])
    }
    .to_string();

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn serve_ws(stream: TcpStream, page: Arc<Mutex<FakePage>>) {
    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let reply = page.lock().unwrap().handle(&request);
        if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
            return;
        }
    }
}
