//! Shared test helpers for creating CogFetcher instances in tests.

use crate::config::Config;
use crate::error::{Error, Result, TransformError};
use crate::fetcher::CogFetcher;
use crate::progress::ProgressFeed;
use crate::transform::Transformer;
use crate::types::{ResourceInfo, ResourceState};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One step of a scripted conversion
#[derive(Clone, Debug)]
pub(crate) enum Step {
    /// Append text to the progress feed
    Print(&'static str),
    /// Block the worker thread
    Sleep(Duration),
    /// Fail with this reason
    Fail(&'static str),
    /// Write the output file with these bytes
    Write(&'static [u8]),
}

/// In-process conversion that replays a fixed script
pub(crate) struct ScriptedTransformer {
    steps: Vec<Step>,
}

impl ScriptedTransformer {
    pub(crate) fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self { steps })
    }

    /// Prints progress, then copies input to output
    pub(crate) fn succeeding() -> Arc<Self> {
        Self::new(vec![
            Step::Print("Reading input: 40%\n"),
            Step::Sleep(Duration::from_millis(30)),
            Step::Print("Writing output: 100%\n"),
        ])
    }
}

impl Transformer for ScriptedTransformer {
    fn transform(&self, input: &Path, output: &Path, feed: &ProgressFeed) -> Result<()> {
        let mut wrote_output = false;
        for step in &self.steps {
            match step {
                Step::Print(text) => feed.append(text),
                Step::Sleep(duration) => std::thread::sleep(*duration),
                Step::Fail(reason) => {
                    return Err(Error::Transform(TransformError::Failed {
                        reason: reason.to_string(),
                    }));
                }
                Step::Write(bytes) => {
                    std::fs::write(output, bytes)?;
                    wrote_output = true;
                }
            }
        }

        if !wrote_output {
            std::fs::copy(input, output)?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Config rooted in `root` with short intervals and small chunks
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = root.join("status.db");
    config.storage.data_dir = root.join("data");
    config.storage.staging_dir = Some(root.join("staging"));
    config.transfer.chunk_size_bytes = 64 * 1024;
    config.transfer.probe_timeout = Duration::from_secs(5);
    config.transfer.transfer_timeout = Duration::from_secs(30);
    config.transform.monitor_interval = Duration::from_millis(10);
    config.jobs.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Helper to create a test CogFetcher with a scripted conversion.
/// Returns the fetcher and the tempdir (which must be kept alive).
pub(crate) async fn create_test_fetcher(
    transformer: Arc<dyn Transformer>,
) -> (CogFetcher, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let fetcher = CogFetcher::with_transformer(config, transformer)
        .await
        .unwrap();
    (fetcher, temp_dir)
}

/// Serve `body` at `route` for both HEAD and GET
pub(crate) async fn serve_file(server: &MockServer, route: &str, body: Vec<u8>) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Serve a file that declares `declared` bytes but stops sending after `sent`
///
/// Returns the base URL; any path is served. HEAD answers normally. GET sends
/// the headers and the first `sent` bytes, then holds the connection open.
pub(crate) async fn serve_stalling_file(declared: usize, sent: usize) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    declared
                );
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                if request.starts_with(b"GET") {
                    let _ = socket.write_all(&payload(sent)).await;
                    let _ = socket.flush().await;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            });
        }
    });

    format!("http://{}", addr)
}

/// Deterministic payload of `len` bytes
pub(crate) fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Poll the status until the resource reaches a terminal state
pub(crate) async fn wait_for_terminal(fetcher: &CogFetcher, url: &str) -> ResourceInfo {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let info = fetcher.status(url).await.unwrap();
        if info.state.is_terminal() && !fetcher.has_active_job(url) {
            return info;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "{url} stuck in {}",
            info.state
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Whether `later` never goes backwards from `earlier` along the lifecycle
pub(crate) fn is_forward(earlier: ResourceState, later: ResourceState) -> bool {
    fn rank(state: ResourceState) -> u8 {
        match state {
            ResourceState::Downloading => 0,
            ResourceState::Downloaded => 1,
            ResourceState::Processing => 2,
            ResourceState::Ready | ResourceState::Error => 3,
        }
    }
    earlier == later || (rank(later) > rank(earlier) && !earlier.is_terminal())
}
