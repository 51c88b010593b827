//! Path and URL helpers

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Derive the artifact path for a source URL
///
/// The URL path (without its leading slash) is appended to `data_dir`, so
/// `https://host/maps/sheet.tif` lands at `<data_dir>/maps/sheet.tif`. The result
/// is absolute. Only `http` and `https` URLs with a non-empty file name are accepted,
/// and no segment may step outside `data_dir`.
///
/// # Examples
///
/// ```
/// use cogfetch::utils::destination_for_url;
/// use std::path::Path;
///
/// let path = destination_for_url(Path::new("/srv/data"), "https://example.com/maps/a.tif").unwrap();
/// assert_eq!(path, Path::new("/srv/data/maps/a.tif"));
/// ```
pub fn destination_for_url(data_dir: &Path, url: &str) -> Result<PathBuf> {
    let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            url,
            parsed.scheme()
        )));
    }

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.collect())
        .unwrap_or_default();

    if segments.last().is_none_or(|last| last.is_empty()) {
        return Err(Error::InvalidUrl(format!("{}: no file name in path", url)));
    }

    let mut relative = PathBuf::new();
    for segment in segments.iter().filter(|s| !s.is_empty()) {
        let decoded = urlencoding::decode(segment)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;

        if decoded.contains('/') || decoded.contains('\\') {
            return Err(Error::InvalidUrl(format!(
                "{}: encoded separator in path segment",
                url
            )));
        }

        let piece = Path::new(decoded.as_ref());
        if !matches!(
            piece.components().collect::<Vec<_>>().as_slice(),
            [Component::Normal(_)]
        ) {
            return Err(Error::InvalidUrl(format!(
                "{}: path escapes the data directory",
                url
            )));
        }
        relative.push(piece);
    }

    let root = std::path::absolute(data_dir)?;
    Ok(root.join(relative))
}

/// Build the XYZ tile endpoint for a finished artifact
///
/// The artifact is referenced as a `file://` URL in the `url` query parameter.
pub fn tile_endpoint(base_url: &str, path_template: &str, local_path: &str) -> String {
    let source = format!("file://{}", local_path);
    format!(
        "{}{}?url={}",
        base_url.trim_end_matches('/'),
        path_template,
        urlencoding::encode(&source)
    )
}
