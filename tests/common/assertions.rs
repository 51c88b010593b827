//! Waiting helpers and assertions for end-to-end tests

use cogfetch::{CogFetcher, Event, ResourceInfo, ResourceState};
use std::time::Duration;

/// Poll the status until the resource is terminal and its job has exited
pub async fn wait_for_terminal(fetcher: &CogFetcher, url: &str, timeout: Duration) -> ResourceInfo {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let info = fetcher.status(url).await.unwrap();
        if info.state.is_terminal() && !fetcher.has_active_job(url) {
            return info;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "{} still {} after {:?}",
            url,
            info.state,
            timeout
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll the status until the resource reaches `state`
pub async fn wait_for_state(
    fetcher: &CogFetcher,
    url: &str,
    state: ResourceState,
    timeout: Duration,
) -> ResourceInfo {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let info = fetcher.status(url).await.unwrap();
        if info.state == state {
            return info;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "{} never reached {} (last {})",
            url,
            state,
            info.state
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Drain events already delivered to `events`
pub fn drain(events: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

/// Assert successive samples never move a record backwards
pub fn assert_monotonic(samples: &[ResourceInfo]) {
    for pair in samples.windows(2) {
        let (before, after) = (&pair[0], &pair[1]);
        assert!(
            after.downloaded_bytes >= before.downloaded_bytes,
            "downloaded_bytes went backwards"
        );
        assert!(
            after.download_fraction >= before.download_fraction,
            "download_fraction went backwards"
        );
        if let (Some(a), Some(b)) = (before.convert_fraction, after.convert_fraction) {
            assert!(b >= a, "convert_fraction went backwards");
        }
        if before.state.is_terminal() {
            assert_eq!(before.state, after.state, "terminal state changed");
        }
    }
}
