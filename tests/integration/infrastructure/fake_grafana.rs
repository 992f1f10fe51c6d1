use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::debug;

/// A request as the fake server saw it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub authorized: bool,
}

/// Org the fake stores datasources in. Not the main org, so a client that
/// ignores the create reply sends the wrong `orgId` on update.
pub const FAKE_ORG_ID: u64 = 2;

#[derive(Debug)]
struct GrafanaState {
    user: String,
    password: String,
    /// Authorization header matching `user`/`password`.
    expected_auth: String,
    next_id: u64,
    datasources: BTreeMap<u64, Value>,
    requests: Vec<SeenRequest>,
}

/// In-process stand-in for the handful of Grafana endpoints the harness uses.
///
/// Every connection serves exactly one request and is closed afterwards.
pub struct FakeGrafana {
    addr: SocketAddr,
    state: Arc<Mutex<GrafanaState>>,
    server: JoinHandle<()>,
}

impl FakeGrafana {
    pub async fn start(user: &str, password: &str) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind fake Grafana listener")?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(GrafanaState {
            user: user.to_string(),
            password: password.to_string(),
            expected_auth: basic_auth_header(user, password)?,
            next_id: 1,
            datasources: BTreeMap::new(),
            requests: Vec::new(),
        }));

        let shared = state.clone();
        let server = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = shared.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve(stream, state).await {
                        debug!("fake grafana connection failed: {:#}", e);
                    }
                });
            }
        });

        Ok(Self { addr, state, server })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn password(&self) -> String {
        self.state.lock().unwrap().password.clone()
    }

    pub fn datasource_count(&self) -> usize {
        self.state.lock().unwrap().datasources.len()
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// `METHOD path` of every request, in arrival order.
    pub fn request_lines(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }
}

impl Drop for FakeGrafana {
    fn drop(&mut self) {
        self.server.abort();
    }
}

struct Request {
    method: String,
    path: String,
    authorization: Option<String>,
    body: Vec<u8>,
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<GrafanaState>>) -> Result<()> {
    let request = read_request(&mut stream).await?;
    let (status, body) = respond(&request, &state)?;

    let reason = match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        409 => "Conflict",
        _ => "Bad Request",
    };
    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn read_request(stream: &mut TcpStream) -> Result<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await?;
        anyhow::ensure!(n > 0, "connection closed before the request headers ended");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().context("empty request")?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().context("missing method")?.to_string();
    let path = parts.next().context("missing path")?.to_string();

    let mut content_length = 0;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse()?,
                "authorization" => authorization = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        anyhow::ensure!(n > 0, "connection closed before the request body ended");
        body.extend_from_slice(&chunk[..n]);
    }

    Ok(Request {
        method,
        path,
        authorization,
        body,
    })
}

/// The header reqwest sends for these credentials.
fn basic_auth_header(user: &str, password: &str) -> Result<String> {
    let request = reqwest::Client::new()
        .get("http://127.0.0.1/")
        .basic_auth(user, Some(password))
        .build()?;
    let header = request
        .headers()
        .get(reqwest::header::AUTHORIZATION)
        .context("reqwest did not set an Authorization header")?;
    Ok(header.to_str()?.to_string())
}

fn respond(request: &Request, state: &Mutex<GrafanaState>) -> Result<(u16, Value)> {
    let mut state = state.lock().unwrap();
    let authorized = request.authorization.as_deref() == Some(state.expected_auth.as_str());

    state.requests.push(SeenRequest {
        method: request.method.clone(),
        path: request.path.clone(),
        authorized,
    });

    if request.path == "/api/health" {
        return Ok((200, json!({"database": "ok"})));
    }
    if !authorized {
        return Ok((401, json!({"message": "Unauthorized"})));
    }

    let body: Value = if request.body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&request.body)?
    };

    let reply = match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/api/admin/settings") => (200, json!({"server": {"http_port": "3000"}})),
        ("GET", "/api/admin/stats") => (200, json!({"users": 1, "datasources": state.datasources.len()})),
        ("POST", "/api/datasources") => {
            let name = body["name"].as_str().unwrap_or_default();
            if name.is_empty() {
                (400, json!({"message": "Name is required"}))
            } else if state.datasources.values().any(|ds| ds["name"] == name) {
                (409, json!({"message": "Data source with same name already exists"}))
            } else {
                let id = state.next_id;
                state.next_id += 1;
                state.datasources.insert(id, body.clone());
                (
                    200,
                    json!({
                        "id": id,
                        "message": "Datasource added",
                        "name": name,
                        "datasource": {"id": id, "orgId": FAKE_ORG_ID, "name": name},
                    }),
                )
            }
        }
        ("PUT", "/api/user/password") => {
            if body["oldPassword"] != state.password.as_str() {
                (401, json!({"message": "Invalid old password"}))
            } else if body["newPassword"] != body["confirmNew"] {
                (400, json!({"message": "New passwords do not match"}))
            } else {
                let new_password = body["newPassword"].as_str().unwrap_or_default().to_string();
                state.expected_auth = basic_auth_header(&state.user, &new_password)?;
                state.password = new_password;
                (200, json!({"message": "User password changed"}))
            }
        }
        (method, path) => match datasource_id(path) {
            Some(id) if !state.datasources.contains_key(&id) => {
                (404, json!({"message": "Data source not found"}))
            }
            Some(_) if method == "PUT" && body["orgId"] != FAKE_ORG_ID => {
                (400, json!({"message": "Datasource belongs to another organization"}))
            }
            Some(id) if method == "PUT" => {
                state.datasources.insert(id, body);
                (200, json!({"message": "Datasource updated"}))
            }
            Some(id) if method == "DELETE" => {
                state.datasources.remove(&id);
                (200, json!({"message": "Data source deleted"}))
            }
            _ => (404, json!({"message": "Not found"})),
        },
    };
    Ok(reply)
}

fn datasource_id(path: &str) -> Option<u64> {
    path.strip_prefix("/api/datasources/")?.parse().ok()
}
