// src/publish/cvmfs.rs

//! `cvmfs_server` as the publication service

use super::{PublicationService, ServiceError, ServiceResult, TagEntry};
use crate::error::{Error, Result};
use std::ffi::OsStr;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread;
use tracing::debug;

/// Runs `cvmfs_server` subcommands against a stratum 0 repository
#[derive(Debug, Clone)]
pub struct CvmfsServer {
    program: PathBuf,
}

impl CvmfsServer {
    /// Resolve `program` (a name looked up in `PATH`, or a path)
    pub fn locate(program: &str) -> Result<Self> {
        let program = which::which(program).map_err(|e| {
            Error::Config(format!(
                "cannot find the publication service program '{}': {}",
                program, e
            ))
        })?;
        debug!("Using publication service program {}", program.display());
        Ok(Self { program })
    }

    /// Use `program` as is, without looking it up
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        debug!("Running {:?}", cmd);
        cmd
    }

    fn run(&self, operation: &'static str, repo: &str, args: &[&str]) -> ServiceResult<Output> {
        let output = self
            .command(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ServiceError::new(operation, repo, format!("failed to run: {}", e)))?;
        check_status(operation, repo, output)
    }
}

fn check_status(operation: &'static str, repo: &str, output: Output) -> ServiceResult<Output> {
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        debug!("[{}] {}", operation, line);
    }

    if output.status.success() {
        return Ok(output);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let code = output
        .status
        .code()
        .map_or_else(|| "a signal".to_string(), |c| format!("exit code {}", c));
    Err(ServiceError::new(
        operation,
        repo,
        format!("terminated with {}: {}", code, stderr.trim()),
    ))
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

impl PublicationService for CvmfsServer {
    fn begin_transaction(&mut self, repo: &str) -> ServiceResult<()> {
        self.run("transaction", repo, &["transaction", repo])?;
        Ok(())
    }

    fn ingest(
        &mut self,
        repo: &str,
        stream: &mut dyn Read,
        base_dir: &str,
        tag_message: &str,
    ) -> ServiceResult<()> {
        let mut child = self
            .command(["ingest", "-t", "-", "-b", base_dir, "-m", tag_message, repo])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ServiceError::new("ingest", repo, format!("failed to run: {}", e)))?;

        // Drain both pipes while the tar stream is fed in, so a chatty
        // ingest cannot block on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let copied = match child.stdin.take() {
            Some(mut stdin) => io::copy(stream, &mut stdin).map(|_| ()),
            None => Ok(()),
        };

        let status = child
            .wait()
            .map_err(|e| ServiceError::new("ingest", repo, format!("failed to wait: {}", e)))?;
        let output = Output {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        };

        let output = check_status("ingest", repo, output)?;
        copied.map_err(|e| {
            ServiceError::new("ingest", repo, format!("failed to stream the tarball: {}", e))
        })?;
        debug!("Ingest finished ({} bytes of diagnostics)", output.stderr.len());
        Ok(())
    }

    fn publish(&mut self, repo: &str, message: &str) -> ServiceResult<()> {
        self.run("publish", repo, &["publish", "-m", message, repo])?;
        Ok(())
    }

    fn abort(&mut self, repo: &str) -> ServiceResult<()> {
        self.run("abort", repo, &["abort", "-f", repo])?;
        Ok(())
    }

    fn list_tags(&mut self, repo: &str) -> ServiceResult<Vec<TagEntry>> {
        let output = self.run("tag listing", repo, &["tag", "-l", "-x", repo])?;
        Ok(parse_tag_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    fn add_tag(&mut self, repo: &str, name: &str, message: &str) -> ServiceResult<()> {
        self.run("tag", repo, &["tag", "-a", name, "-m", message, repo])?;
        Ok(())
    }
}

/// Parse the machine-readable tag listing of `cvmfs_server tag -l -x`
///
/// Each line reads `<name> <hash> <size> <revision> <timestamp> <channel> <description...>`.
/// Lines without a numeric revision or timestamp are kept with 0 in its place.
pub fn parse_tag_listing(listing: &str) -> Vec<TagEntry> {
    listing
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let name = fields.first()?;
            Some(TagEntry {
                name: name.to_string(),
                revision: fields.get(3).and_then(|r| r.parse().ok()).unwrap_or(0),
                timestamp: fields.get(4).and_then(|t| t.parse().ok()).unwrap_or(0),
                description: fields.get(6..).map(|d| d.join(" ")).unwrap_or_default(),
            })
        })
        .collect()
}
