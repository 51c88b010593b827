//! Progress feed parser

use regex::Regex;
use std::sync::LazyLock;

// Integer or decimal number immediately followed by a percent sign
static PERCENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").ok());

/// Extract the most recent percentage in a progress feed as a fraction in [0, 1]
///
/// Every `<number>%` substring in `text` is a candidate; the last one wins since
/// the feed is append-only. Values above 100% clamp to 1.0. Returns `None` when
/// the text holds no percentage yet.
///
/// # Examples
///
/// ```
/// use cogfetch::progress::parse_progress;
///
/// assert_eq!(parse_progress("...\nProcessing: 37.5%\nProcessing: 82%\n"), Some(0.82));
/// assert_eq!(parse_progress("Reading input"), None);
/// ```
pub fn parse_progress(text: &str) -> Option<f64> {
    let pattern = PERCENT.as_ref()?;
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .last()
        .map(|percent| (percent / 100.0).clamp(0.0, 1.0))
}

/// Whether a parsed fraction signals completion
pub fn is_complete(fraction: f64) -> bool {
    fraction >= 1.0
}
