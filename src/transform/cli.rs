//! CLI-based transformer using an external conversion program

use super::traits::Transformer;
use crate::error::{Error, TransformError};
use crate::progress::ProgressFeed;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Program looked up in PATH when none is configured
pub(crate) const DEFAULT_PROGRAM: &str = "rio";

/// Characters of program output quoted in a failure reason
const FAILURE_TAIL_CHARS: usize = 500;

/// CLI-based transformer
///
/// Runs `program` with an argument template in which `{input}` and `{output}`
/// are replaced by the staged file and the artifact path. Both stdout and stderr
/// are streamed into the progress feed as they arrive, so progress bars printed
/// by the program become visible to the monitor while it runs.
///
/// # Examples
///
/// ```no_run
/// use cogfetch::progress::ProgressFeed;
/// use cogfetch::transform::{CliTransformer, Transformer};
/// use std::path::{Path, PathBuf};
///
/// let transformer = CliTransformer::new(
///     PathBuf::from("/usr/bin/rio"),
///     vec!["cogeo".into(), "create".into(), "{input}".into(), "{output}".into()],
/// );
/// let feed = ProgressFeed::new();
/// transformer.transform(Path::new("/tmp/in.tif"), Path::new("/srv/data/out.tif"), &feed)?;
/// # Ok::<(), cogfetch::Error>(())
/// ```
pub struct CliTransformer {
    program: PathBuf,
    args: Vec<String>,
}

impl CliTransformer {
    /// Create a transformer with an explicit program path and argument template
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Attempt to find the default program in PATH
    ///
    /// Uses the `which` crate. Returns `None` if the binary is not found.
    pub fn from_path(args: Vec<String>) -> Option<Self> {
        Self::find_in_path(DEFAULT_PROGRAM, args)
    }

    /// Look up `name` in PATH
    pub(crate) fn find_in_path(name: &str, args: Vec<String>) -> Option<Self> {
        which::which(name).ok().map(|program| Self::new(program, args))
    }

    /// Program this transformer runs
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn render_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }
}

impl Transformer for CliTransformer {
    fn transform(&self, input: &Path, output: &Path, feed: &ProgressFeed) -> crate::Result<()> {
        let args = self.render_args(input, output);
        tracing::debug!(program = %self.program.display(), ?args, "Starting conversion");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    Error::Transform(TransformError::Unavailable(format!(
                        "{}: {}",
                        self.program.display(),
                        e
                    )))
                } else {
                    Error::Transform(TransformError::Failed {
                        reason: format!("failed to start {}: {}", self.program.display(), e),
                    })
                }
            })?;

        let stdout_pump = child.stdout.take().map(|mut stdout| {
            let mut sink = feed.clone();
            std::thread::spawn(move || io::copy(&mut stdout, &mut sink))
        });

        if let Some(mut stderr) = child.stderr.take() {
            let mut sink = feed.clone();
            if let Err(e) = io::copy(&mut stderr, &mut sink) {
                tracing::warn!(error = %e, "Lost part of conversion stderr");
            }
        }

        if let Some(pump) = stdout_pump {
            match pump.join() {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Lost part of conversion stdout"),
                Err(_) => tracing::warn!("Conversion stdout reader panicked"),
            }
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(Error::Transform(TransformError::Failed {
                reason: format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    status,
                    feed.tail(FAILURE_TAIL_CHARS).trim()
                ),
            }));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}
