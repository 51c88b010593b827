//! Stand-in transformer when no conversion program is available

use super::traits::Transformer;
use crate::error::{Error, TransformError};
use crate::progress::ProgressFeed;
use std::path::Path;

/// Transformer that always fails with [`TransformError::Unavailable`]
///
/// Registration and transfer keep working, so operators see the failure reason
/// on the affected records rather than the service refusing to start.
pub struct UnavailableTransformer {
    reason: String,
}

impl UnavailableTransformer {
    /// Create with the reason reported on every failed conversion
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Transformer for UnavailableTransformer {
    fn transform(&self, _input: &Path, _output: &Path, _feed: &ProgressFeed) -> crate::Result<()> {
        Err(Error::Transform(TransformError::Unavailable(
            self.reason.clone(),
        )))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_fails_with_reason() {
        let transformer = UnavailableTransformer::new("rio not found");
        let result = transformer.transform(
            Path::new("/tmp/in.tif"),
            Path::new("/tmp/out.tif"),
            &ProgressFeed::new(),
        );

        match result {
            Err(Error::Transform(TransformError::Unavailable(reason))) => {
                assert_eq!(reason, "rio not found")
            }
            other => panic!("expected unavailable, got {other:?}"),
        }
    }
}
