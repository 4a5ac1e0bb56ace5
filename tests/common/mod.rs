#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use mcp_bridge::config::{Timeout, Upstream};

pub const TOOLS_SSE: &str =
    "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{\"tools\":[]}}\n\n";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub session_id: Option<String>,
    pub api_key: Option<String>,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
    pub delay: Duration,
}

impl Canned {
    pub fn json(body: Value) -> Self {
        Self {
            status: 200,
            headers: vec![("content-type", "application/json".to_string())],
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn sse(body: &str) -> Self {
        Self {
            status: 200,
            headers: vec![("content-type", "text/event-stream".to_string())],
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_session(mut self, token: String) -> Self {
        self.headers.push(("mcp-session-id", token));
        self
    }
}

pub type Calls = Arc<Mutex<Vec<Recorded>>>;

/// Minimal HTTP/1.1 remote: one request per connection, canned reply.
pub async fn spawn_remote<F>(handler: F) -> (String, Calls)
where
    F: Fn(&Recorded) -> Canned + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/mcp", listener.local_addr().unwrap());
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let recorded = calls.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let handler = handler.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let Ok((headers, body)) = read_request(&mut stream).await else {
                    return;
                };
                let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                let call = Recorded {
                    method: body["method"].as_str().unwrap_or_default().to_string(),
                    session_id: headers.get("mcp-session-id").cloned(),
                    api_key: headers.get("x-api-key").cloned(),
                    body,
                };
                recorded.lock().unwrap().push(call.clone());

                let canned = handler(&call);
                tokio::time::sleep(canned.delay).await;
                let _ = write_response(&mut stream, &canned).await;
            });
        }
    });

    (url, calls)
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<(HashMap<String, String>, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let headers: HashMap<String, String> = head
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let len = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + len {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = buf.len().min(header_end + len);
    Ok((headers, buf[header_end..end].to_vec()))
}

async fn write_response(stream: &mut TcpStream, canned: &Canned) -> std::io::Result<()> {
    let mut head = format!("HTTP/1.1 {} Canned\r\n", canned.status);
    for (name, value) in &canned.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str(&format!(
        "content-length: {}\r\nconnection: close\r\n\r\n",
        canned.body.len()
    ));
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(canned.body.as_bytes()).await?;
    stream.shutdown().await
}

/// Issues `sess-1`, `sess-2`, ... on each initialize; tools calls answer in SSE.
pub fn session_issuing_remote() -> impl Fn(&Recorded) -> Canned + Send + Sync + 'static {
    let issued = AtomicUsize::new(0);
    move |call| match call.method.as_str() {
        "initialize" => {
            let n = issued.fetch_add(1, Ordering::SeqCst) + 1;
            Canned::json(json!({"jsonrpc": "2.0", "id": call.body["id"], "result": {}}))
                .with_session(format!("sess-{n}"))
        }
        "tools/list" => Canned::sse(TOOLS_SSE),
        "broken" => Canned {
            status: 500,
            headers: vec![("content-type", "application/json".to_string())],
            body: json!({"message": "boom"}).to_string(),
            delay: Duration::ZERO,
        },
        _ => Canned::json(json!({"jsonrpc": "2.0", "id": call.body["id"], "result": {"ok": true}})),
    }
}

pub fn upstream_config(url: &str) -> Upstream {
    Upstream {
        url: url.to_string(),
        timeout: Timeout {
            request: 1,
            stream: 1,
        },
        headers: HashMap::from([("x-api-key".to_string(), "secret".to_string())]),
    }
}
