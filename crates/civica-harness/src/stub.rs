//! Minimal HTTP/1.1 stub upstream.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU32, Ordering},
};

use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

/// A stub HTTP server answering every request with one fixed response,
/// recording how many requests arrived and the body of the last one.
pub struct StubServer {
    /// Base URL, `http://127.0.0.1:<port>`
    pub url: String,
    /// Host part, for allow-list configuration
    pub host: String,
    hits: Arc<AtomicU32>,
    last_body: Arc<Mutex<Vec<u8>>>,
}

impl StubServer {
    /// Bind an ephemeral port and serve `status`/`body` forever.
    pub async fn start(status: u16, body: impl Into<String>) -> std::io::Result<Self> {
        let body = body.into();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let hits = Arc::new(AtomicU32::new(0));
        let last_body = Arc::new(Mutex::new(Vec::new()));

        let hits_task = Arc::clone(&hits);
        let body_task = Arc::clone(&last_body);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let hits = Arc::clone(&hits_task);
                let last_body = Arc::clone(&body_task);
                let body = body.clone();
                tokio::spawn(async move {
                    handle_connection(stream, status, &body, &hits, &last_body).await;
                });
            }
        });

        Ok(Self { url: format!("http://{addr}"), host: addr.ip().to_string(), hits, last_body })
    }

    /// Requests served so far.
    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }

    /// Body of the most recent request.
    pub fn last_body(&self) -> Vec<u8> {
        self.last_body.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Full URL for `path` (leading slash expected).
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.url)
    }
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    status: u16,
    body: &str,
    hits: &AtomicU32,
    last_body: &Mutex<Vec<u8>>,
) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];

    let (header_end, content_length) = loop {
        let Ok(n) = stream.read(&mut tmp).await else { return };
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buf[..pos]).to_string();
            let length = headers
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            break (pos + 4, length);
        }
    };

    while buf.len() < header_end + content_length {
        let Ok(n) = stream.read(&mut tmp).await else { return };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
    }

    hits.fetch_add(1, Ordering::SeqCst);
    *last_body.lock().unwrap_or_else(PoisonError::into_inner) = buf[header_end..].to_vec();

    let response = format!(
        "HTTP/1.1 {status} OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
