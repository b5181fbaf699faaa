//! Source resolution
//!
//! A source-id is opaque to the relay. Resolving it to a URL the video
//! backend can open is delegated to a [`SourceResolver`].

use std::ffi::OsString;
use std::process::Command;

use crate::error::BackendError;

/// Turns an opaque source reference into a playable URL
pub trait SourceResolver: Send + Sync + 'static {
    /// Resolve `source_id`, blocking until done
    fn resolve(&self, source_id: &str) -> Result<String, BackendError>;
}

impl<F> SourceResolver for F
where
    F: Fn(&str) -> Result<String, BackendError> + Send + Sync + 'static,
{
    fn resolve(&self, source_id: &str) -> Result<String, BackendError> {
        self(source_id)
    }
}

/// Resolver that shells out to an external program
///
/// The source-id is appended as the final argument. The program must exit
/// successfully and print the playable URL as the last non-empty line of
/// its standard output.
///
/// # Example
/// ```no_run
/// use frame_relay::backend::{CommandResolver, SourceResolver};
///
/// let resolver = CommandResolver::new("yt-dlp").args(["-g", "-f", "best[ext=m3u8]/best"]);
/// let url = resolver.resolve("https://www.youtube.com/watch?v=XDThHUawq6E")?;
/// # Ok::<(), frame_relay::error::BackendError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CommandResolver {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandResolver {
    /// Create a resolver running `program`
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add a fixed argument placed before the source-id
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several fixed arguments placed before the source-id
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl SourceResolver for CommandResolver {
    fn resolve(&self, source_id: &str) -> Result<String, BackendError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(source_id)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Resolve(format!(
                "{} exited with {}: {}",
                self.program.to_string_lossy(),
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_url(&stdout)
    }
}

/// Pick the URL out of resolver output
fn parse_url(output: &str) -> Result<String, BackendError> {
    let line = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or_else(|| BackendError::Resolve("resolver produced no output".into()))?;

    if !line.starts_with("http") {
        return Err(BackendError::Resolve(format!(
            "resolver output is not a URL: {}",
            line
        )));
    }

    Ok(line.to_string())
}
