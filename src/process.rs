use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;

use crate::error::InstallerError;

const TAIL_LINES: usize = 15;

/// Real executables on Windows; everything else may be a `.cmd` shim or a shell builtin.
const WINDOWS_NATIVE: &[&str] = &["msiexec", "cmd"];

/// npm and friends are `.cmd` shims on Windows, so they go through `cmd /C`.
pub fn new_command(program: &str) -> Command {
    if cfg!(windows) && !WINDOWS_NATIVE.contains(&program) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", program]);
        cmd
    } else {
        Command::new(program)
    }
}

pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(|a| a.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs a command to completion with its output captured.
pub fn run_captured(program: &str, args: &[String], dir: &Path) -> Result<()> {
    let line = command_line(program, args);
    log::debug!("Running `{line}` in {}", dir.display());

    let output = new_command(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to run `{line}`"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let text = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).into_owned()
        } else {
            stderr.into_owned()
        };
        return Err(InstallerError::CommandFailed {
            command: line,
            code: output.status.code(),
            output: tail(&text, TAIL_LINES),
        }
        .into());
    }

    Ok(())
}

/// Runs a command attached to the terminal (sudo may need to prompt).
pub fn run_inherited(program: &str, args: &[String], dir: &Path) -> Result<()> {
    let line = command_line(program, args);
    log::debug!("Running `{line}` attached to the terminal");

    let status = new_command(program)
        .args(args)
        .current_dir(dir)
        .status()
        .with_context(|| format!("Failed to run `{line}`"))?;

    if !status.success() {
        return Err(InstallerError::CommandFailed {
            command: line,
            code: status.code(),
            output: String::new(),
        }
        .into());
    }

    Ok(())
}

/// Runs a command and hands every non-empty output line (stdout and stderr
/// merged) to `on_line` on the calling thread.
pub fn run_streamed<F>(program: &str, args: &[String], dir: &Path, mut on_line: F) -> Result<()>
where
    F: FnMut(&str),
{
    let line = command_line(program, args);
    log::debug!("Streaming `{line}` in {}", dir.display());

    let mut child = new_command(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to run `{line}`"))?;

    let (tx, rx) = mpsc::channel::<String>();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, tx.clone()));
    }
    drop(tx);

    // Ends once both pipes are closed.
    for text in rx {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            on_line(trimmed);
        }
    }

    for reader in readers {
        let _ = reader.join();
    }

    let status = child
        .wait()
        .with_context(|| format!("Failed to wait for `{line}`"))?;

    if !status.success() {
        return Err(InstallerError::CommandFailed {
            command: line,
            code: status.code(),
            output: String::new(),
        }
        .into());
    }

    Ok(())
}

fn spawn_reader<R>(pipe: R, tx: mpsc::Sender<String>) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for chunk in reader.split(b'\n') {
            let Ok(bytes) = chunk else { break };
            if tx.send(String::from_utf8_lossy(&bytes).into_owned()).is_err() {
                break;
            }
        }
    })
}

/// Last `n` non-empty lines, skipping the version/banner noise at the top.
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
