//! Conversion trait

use crate::progress::ProgressFeed;
use std::path::Path;

/// Blocking conversion of a staged file into the final artifact
///
/// `transform` is called on a blocking worker thread. It must write the artifact
/// to `output` and may append free-text progress (e.g. `Writing: 42%`) to `feed`
/// at any time; the job samples the feed while the call runs.
///
/// # Examples
///
/// ```
/// use cogfetch::progress::ProgressFeed;
/// use cogfetch::transform::Transformer;
/// use std::path::Path;
///
/// struct CopyTransformer;
///
/// impl Transformer for CopyTransformer {
///     fn transform(&self, input: &Path, output: &Path, feed: &ProgressFeed) -> cogfetch::Result<()> {
///         std::fs::copy(input, output)?;
///         feed.append("copy: 100%\n");
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "copy"
///     }
/// }
/// ```
pub trait Transformer: Send + Sync {
    /// Convert `input` into `output`, reporting progress into `feed`
    fn transform(&self, input: &Path, output: &Path, feed: &ProgressFeed) -> crate::Result<()>;

    /// Name of this implementation
    fn name(&self) -> &'static str;
}
