//! Fixtures: scratch configuration, a mock remote source and scripted conversions

use cogfetch::{CogFetcher, Config, ProgressFeed, Transformer};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config rooted in a scratch directory with small chunks and a fast monitor
pub fn scratch_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = root.join("status.db");
    config.storage.data_dir = root.join("data");
    config.storage.staging_dir = Some(root.join("staging"));
    config.transfer.chunk_size_bytes = 256 * 1024;
    config.transform.monitor_interval = Duration::from_millis(20);
    config.jobs.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Create a fetcher with the given conversion, backed by a fresh scratch directory
pub async fn create_fetcher(transformer: Arc<dyn Transformer>) -> (Arc<CogFetcher>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let fetcher = CogFetcher::with_transformer(scratch_config(temp_dir.path()), transformer)
        .await
        .unwrap();
    (Arc::new(fetcher), temp_dir)
}

/// Deterministic raster stand-in of `len` bytes
pub fn raster_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

/// Serve `body` for HEAD and GET at `route`, optionally slowing the GET down
pub async fn mount_raster(server: &MockServer, route: &str, body: Vec<u8>, delay: Option<Duration>) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(server)
        .await;

    let mut get = ResponseTemplate::new(200).set_body_bytes(body);
    if let Some(delay) = delay {
        get = get.set_delay(delay);
    }
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(get)
        .mount(server)
        .await;
}

/// Conversion that reports progress in steps, then copies the input
///
/// With `fail_after` set it stops after that many reports and fails.
pub struct SteppedConversion {
    pub percents: Vec<&'static str>,
    pub pause: Duration,
    pub fail_after: Option<usize>,
}

impl SteppedConversion {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            percents: vec!["25%", "50%", "75%", "100%"],
            pause: Duration::from_millis(40),
            fail_after: None,
        })
    }

    pub fn failing_at_40() -> Arc<Self> {
        Arc::new(Self {
            percents: vec!["Reading input: 40%"],
            pause: Duration::from_millis(60),
            fail_after: Some(1),
        })
    }
}

impl Transformer for SteppedConversion {
    fn transform(&self, input: &Path, output: &Path, feed: &ProgressFeed) -> cogfetch::Result<()> {
        for (reported, percent) in self.percents.iter().enumerate() {
            if self.fail_after == Some(reported) {
                break;
            }
            feed.append(&format!("{}\n", percent));
            std::thread::sleep(self.pause);
        }

        if self.fail_after.is_some() {
            return Err(cogfetch::Error::Transform(cogfetch::TransformError::Failed {
                reason: "conversion rejected the input".to_string(),
            }));
        }

        std::fs::copy(input, output)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stepped"
    }
}
