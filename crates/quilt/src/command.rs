//! External filter commands
//!
//! Translators and compactors can be backed by a program that reads source on
//! stdin and writes the result on stdout.

use std::{
    env,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
};

use anyhow::{Context, Result, bail};
use log::debug;
use serde::{Deserialize, Serialize};

/// Program plus arguments. `{path}` inside an argument is replaced with the
/// path of the file being processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CommandSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>, args: &[&str]) -> Self {
        Self {
            command: command.into(),
            args: args.iter().map(|arg| (*arg).to_owned()).collect(),
        }
    }

    /// Locate the program, either as a path or on `PATH`
    pub fn locate(&self) -> Option<PathBuf> {
        let program = Path::new(&self.command);
        if program.components().count() > 1 {
            return program.is_file().then(|| program.to_path_buf());
        }
        let paths = env::var_os("PATH")?;
        env::split_paths(&paths)
            .flat_map(|dir| candidates(&dir, &self.command))
            .find(|candidate| candidate.is_file())
    }

    /// Pipe `input` through the program and return its stdout
    pub fn run(&self, input: &str, path: Option<&Path>) -> Result<String> {
        let args = self.args.iter().map(|arg| match path {
            Some(path) => arg.replace("{path}", &path.to_string_lossy()),
            None => arg.clone(),
        });
        debug!("Running {} {:?}", self.command, self.args);

        let mut child = Command::new(&self.command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start `{}`", self.command))?;

        let mut stdin = child
            .stdin
            .take()
            .context("child process has no stdin handle")?;

        // Feed stdin from a separate thread so a chatty child cannot fill its
        // stdout pipe while we are still writing
        let output = thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(input.as_bytes()));
            let output = child.wait_with_output();
            let written = writer
                .join()
                .map_err(|_| anyhow::anyhow!("stdin writer panicked"))?;
            // A child that exits without draining stdin is judged by its status
            match written {
                Err(err) if err.kind() != std::io::ErrorKind::BrokenPipe => {
                    return Err(anyhow::Error::new(err).context("failed to write to stdin"));
                }
                _ => {}
            }
            output.context("failed to wait for child process")
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout)
            .with_context(|| format!("`{}` produced non-UTF-8 output", self.command))
    }
}

#[cfg(windows)]
fn candidates(dir: &Path, command: &str) -> Vec<PathBuf> {
    ["", ".exe", ".cmd", ".bat"]
        .iter()
        .map(|suffix| dir.join(format!("{command}{suffix}")))
        .collect()
}

#[cfg(not(windows))]
fn candidates(dir: &Path, command: &str) -> Vec<PathBuf> {
    vec![dir.join(command)]
}
