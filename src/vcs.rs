//! Recording library changes in version control.
//!
//! The library root is usually a git repository (often a submodule of the
//! board project). [`GitCli`] drives the `git` executable; tests substitute
//! their own [`VersionControl`] implementation.

use std::path::PathBuf;
use std::process::{Command, Output};

use tracing::{debug, info};

use crate::error::VcsError;

/// Commit message used after initialising the library skeleton.
pub const INIT_COMMIT_MESSAGE: &str = "Initialize component libraries";

/// Default commit message for an import.
#[must_use]
pub fn import_commit_message(archive_name: &str) -> String {
    format!("Add components from {archive_name}")
}

/// Operations needed to record a change.
pub trait VersionControl {
    /// Stages every change in the working tree, including deletions.
    ///
    /// # Errors
    ///
    /// Returns an error if the client fails.
    fn stage_all(&mut self) -> Result<(), VcsError>;

    /// True if the index differs from the last commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the client fails.
    fn has_staged_changes(&mut self) -> Result<bool, VcsError>;

    /// Commits the staged changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the client fails.
    fn commit(&mut self, message: &str) -> Result<(), VcsError>;

    /// Pushes the current branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the client fails.
    fn push(&mut self) -> Result<(), VcsError>;
}

/// What [`record_changes`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recorded {
    /// A commit was created.
    pub committed: bool,
    /// The branch was pushed.
    pub pushed: bool,
}

/// Stages and commits, then pushes if asked.
///
/// A clean index skips the commit; the push still runs so earlier local
/// commits reach the remote. Stops at the first failing step. Files already
/// written are never touched.
///
/// # Errors
///
/// Returns the first client failure.
pub fn record_changes(
    vcs: &mut dyn VersionControl,
    message: &str,
    push: bool,
) -> Result<Recorded, VcsError> {
    let mut recorded = Recorded::default();

    vcs.stage_all()?;
    if vcs.has_staged_changes()? {
        vcs.commit(message)?;
        recorded.committed = true;
    } else {
        info!("Nothing to commit");
    }
    if push {
        vcs.push()?;
        recorded.pushed = true;
    }
    Ok(recorded)
}

/// Runs the `git` command line client in a working directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
    workdir: PathBuf,
    remote: Option<String>,
}

impl GitCli {
    /// Creates a client running `binary` inside `workdir`.
    pub fn new(binary: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            workdir: workdir.into(),
            remote: None,
        }
    }

    /// Pushes to `remote` instead of the branch's upstream.
    #[must_use]
    pub fn with_remote(mut self, remote: Option<String>) -> Self {
        self.remote = remote;
        self
    }

    fn spawn(&self, args: &[&str]) -> Result<Output, VcsError> {
        debug!(program = %self.binary, ?args, dir = %self.workdir.display(), "Running version control");
        Command::new(&self.binary)
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|source| VcsError::Spawn {
                program: self.binary.clone(),
                source,
            })
    }

    fn run(&self, operation: &str, args: &[&str]) -> Result<Output, VcsError> {
        let output = self.spawn(args)?;
        if output.status.success() {
            return Ok(output);
        }
        Err(failure(operation, &output))
    }
}

impl VersionControl for GitCli {
    fn stage_all(&mut self) -> Result<(), VcsError> {
        self.run("stage", &["add", "-A"])?;
        Ok(())
    }

    fn has_staged_changes(&mut self) -> Result<bool, VcsError> {
        // --quiet exits 1 when there are differences.
        let output = self.spawn(&["diff", "--cached", "--quiet"])?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(failure("diff", &output)),
        }
    }

    fn commit(&mut self, message: &str) -> Result<(), VcsError> {
        self.run("commit", &["commit", "-m", message])?;
        info!(message, "Committed library changes");
        Ok(())
    }

    fn push(&mut self) -> Result<(), VcsError> {
        let mut args = vec!["push"];
        if let Some(remote) = &self.remote {
            args.push(remote.as_str());
            args.push("HEAD");
        }
        self.run("push", &args)?;
        info!("Pushed library changes");
        Ok(())
    }
}

fn failure(operation: &str, output: &Output) -> VcsError {
    VcsError::Failed {
        operation: operation.to_string(),
        status: output.status.to_string(),
        output: client_output(output),
    }
}

/// The client's error output, falling back to stdout when stderr is empty.
fn client_output(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).trim_end().to_string()
    } else {
        stderr.trim_end().to_string()
    }
}
