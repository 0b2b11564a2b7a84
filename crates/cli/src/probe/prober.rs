use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{PingCode, PingOutcome};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use super::pool::KeepAlivePool;

/// Upper bound for draining a response body after its status has been read.
const DRAIN_LIMIT: Duration = Duration::from_secs(30);

/// Everything needed to fire one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub url: String,
    pub model: String,
    pub credential: Option<String>,
    pub timeout: Duration,
}

/// One request/response cycle, always settled with a classified outcome.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &ProbeTarget) -> PingOutcome;

    /// Releases pooled connections. Called once when probing is over.
    async fn shutdown(&self) {}
}

/// HTTP prober measuring time to response headers over pooled connections.
#[derive(Default)]
pub struct HttpProber {
    pool: KeepAlivePool,
}

impl HttpProber {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, target: &ProbeTarget) -> PingOutcome {
        let started = Instant::now();
        let client = match self.pool.client_for(&target.url).await {
            Ok(client) => client,
            Err(e) => {
                return PingOutcome::new(PingCode::Error, 0).with_diagnostic(e.to_string());
            }
        };

        let body = serde_json::json!({
            "model": target.model,
            "messages": [{ "role": "user", "content": "hi" }],
            "max_tokens": 1,
        });
        let mut request = client
            .post(&target.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if let Some(key) = &target.credential {
            request = request.bearer_auth(key);
        }

        // Whichever of response, error or deadline lands first settles the probe;
        // dropping the losing future aborts the request and its socket.
        match tokio::time::timeout(target.timeout, request.send()).await {
            Ok(Ok(response)) => {
                let elapsed = elapsed_ms(started);
                let status = response.status().as_u16();
                tokio::spawn(async move {
                    let _ = tokio::time::timeout(DRAIN_LIMIT, response.bytes()).await;
                });
                PingOutcome::new(PingCode::Http(status), elapsed)
            }
            Ok(Err(e)) => {
                let tag = error_tag(&e);
                debug!(url=%target.url, error=%e, "probe transport error");
                PingOutcome::new(PingCode::Error, elapsed_ms(started)).with_diagnostic(tag)
            }
            Err(_) => PingOutcome::new(PingCode::Timeout, elapsed_ms(started)),
        }
    }

    async fn shutdown(&self) {
        let closed = self.pool.destroy().await;
        debug!(origins = closed, "keep-alive pool destroyed");
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
}

/// Short machine-readable reason for a transport failure.
fn error_tag(err: &reqwest::Error) -> String {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return format!("{:?}", io.kind());
        }
        source = inner.source();
    }
    if err.is_connect() {
        "connect".into()
    } else if err.is_timeout() {
        "timeout".into()
    } else if err.is_body() || err.is_decode() {
        "body".into()
    } else if err.is_request() {
        "request".into()
    } else {
        "other".into()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    fn target(url: String, timeout_ms: u64) -> ProbeTarget {
        ProbeTarget {
            url,
            model: "m".into(),
            credential: None,
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Reads one request (headers plus Content-Length body). False on EOF.
    async fn read_request(sock: &mut TcpStream) -> bool {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    return true;
                }
            }
            match sock.read(&mut chunk).await {
                Ok(0) | Err(_) => return false,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
    }

    /// Answers every request on every connection with `status`.
    async fn scripted_server(status: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    while read_request(&mut sock).await {
                        let reply = format!(
                            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: 2\r\n\r\n{{}}"
                        );
                        if sock.write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        (format!("http://{addr}/v1/chat/completions"), accepted)
    }

    #[tokio::test]
    async fn silent_server_settles_as_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });

        let prober = HttpProber::new();
        let started = Instant::now();
        let outcome = prober
            .probe(&target(format!("http://{addr}/v1/chat/completions"), 300))
            .await;
        assert_eq!(outcome.code, PingCode::Timeout);
        assert_eq!(outcome.code.to_string(), "000");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn status_is_reported_verbatim() {
        let (url, _) = scripted_server("401 Unauthorized").await;
        let outcome = HttpProber::new().probe(&target(url, 2000)).await;
        assert_eq!(outcome.code, PingCode::Http(401));
        assert_eq!(outcome.code.to_string(), "401");
    }

    #[tokio::test]
    async fn refused_connection_is_an_error_outcome() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = HttpProber::new()
            .probe(&target(format!("http://{addr}/"), 2000))
            .await;
        assert_eq!(outcome.code, PingCode::Error);
        assert!(outcome.diagnostic.is_some());
    }

    #[tokio::test]
    async fn sequential_probes_reuse_the_socket() {
        let (url, accepted) = scripted_server("200 OK").await;
        let prober = HttpProber::new();
        for _ in 0..3 {
            let outcome = prober.probe(&target(url.clone(), 2000)).await;
            assert_eq!(outcome.code, PingCode::Http(200));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        assert_eq!(prober.pool.destroy().await, 1);
    }

    #[tokio::test]
    async fn bad_url_is_an_error_outcome() {
        let outcome = HttpProber::new().probe(&target("::nope".into(), 100)).await;
        assert_eq!(outcome.code, PingCode::Error);
    }
}
