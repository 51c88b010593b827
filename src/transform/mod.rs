//! Conversion of a staged payload into the final artifact
//!
//! The core abstraction is the [`Transformer`] trait: a blocking call that reads
//! the staged file, writes the artifact and reports progress as free text into a
//! [`ProgressFeed`](crate::progress::ProgressFeed). Implementations:
//!
//! - [`CliTransformer`]: runs an external program (by default `rio cogeo create`)
//! - [`UnavailableTransformer`]: stand-in when no program is configured or found
//!
//! Jobs run the call on the blocking thread pool, so implementations may block freely.

mod cli;
mod traits;
mod unavailable;

pub use cli::CliTransformer;
pub use traits::Transformer;
pub use unavailable::UnavailableTransformer;

use crate::config::TransformConfig;
use std::sync::Arc;

/// Pick the conversion implementation for a configuration
///
/// An explicit `transform_program` always wins. Otherwise the default program is
/// looked up in PATH when `search_path` is set. Without either, jobs fail at the
/// conversion step with a clear reason instead of the service refusing to start.
pub fn select_transformer(config: &TransformConfig) -> Arc<dyn Transformer> {
    if let Some(program) = &config.transform_program {
        tracing::info!(program = %program.display(), "Using configured conversion program");
        return Arc::new(CliTransformer::new(
            program.clone(),
            config.transform_args.clone(),
        ));
    }

    if config.search_path {
        if let Some(transformer) = CliTransformer::from_path(config.transform_args.clone()) {
            tracing::info!(program = %transformer.program().display(), "Found conversion program in PATH");
            return Arc::new(transformer);
        }
    }

    tracing::warn!(
        program = cli::DEFAULT_PROGRAM,
        "No conversion program available, conversions will fail"
    );
    Arc::new(UnavailableTransformer::new(format!(
        "'{}' not configured and not found in PATH",
        cli::DEFAULT_PROGRAM
    )))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn explicit_program_is_used_as_is() {
        let config = TransformConfig {
            transform_program: Some(PathBuf::from("/opt/bin/convert-cog")),
            ..TransformConfig::default()
        };

        let transformer = select_transformer(&config);
        assert_eq!(transformer.name(), "cli");
    }

    #[test]
    fn without_program_or_path_search_conversion_is_unavailable() {
        let config = TransformConfig {
            transform_program: None,
            search_path: false,
            ..TransformConfig::default()
        };

        let transformer = select_transformer(&config);
        assert_eq!(transformer.name(), "unavailable");
    }
}
