use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Stdio;

use crate::config::InstallerConfig;
use crate::platform::Platform;
use crate::process::new_command;

/// A program plus arguments, tried in order until one starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchAttempt {
    pub program: String,
    pub args: Vec<String>,
    /// Judge the attempt by its exit status instead of by the spawn alone.
    /// `start` runs inside `cmd /C`, which always spawns.
    pub wait: bool,
}

impl LaunchAttempt {
    fn detached(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            wait: false,
        }
    }
}

pub fn launch_attempts(platform: &Platform, config: &InstallerConfig, home: &Path) -> Vec<LaunchAttempt> {
    match platform {
        Platform::MacOs => vec![LaunchAttempt::detached(
            "open",
            vec![config.installed_app_path().display().to_string()],
        )],
        Platform::Windows => vec![LaunchAttempt {
            program: "start".to_string(),
            args: vec![String::new(), config.product().to_string()],
            wait: true,
        }],
        Platform::Linux => {
            let mut attempts = vec![LaunchAttempt::detached(config.linux_binary.clone(), Vec::new())];
            let appimage = config.appimage_install_path(home);
            if appimage.is_file() {
                attempts.push(LaunchAttempt::detached(appimage.display().to_string(), Vec::new()));
            }
            attempts
        }
        Platform::Other(_) => Vec::new(),
    }
}

fn try_attempt(attempt: &LaunchAttempt) -> bool {
    let mut cmd = new_command(&attempt.program);
    cmd.args(&attempt.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    if attempt.wait {
        match cmd.status() {
            Ok(status) if status.success() => true,
            Ok(status) => {
                log::debug!("{} exited with {status}", attempt.program);
                false
            }
            Err(e) => {
                log::debug!("{} could not start: {e}", attempt.program);
                false
            }
        }
    } else {
        match cmd.spawn() {
            Ok(_) => true,
            Err(e) => {
                log::debug!("{} could not start: {e}", attempt.program);
                false
            }
        }
    }
}

/// Starts the installed app without waiting for the app itself.
pub fn launch(platform: &Platform, config: &InstallerConfig, home: &Path) -> Result<()> {
    for attempt in launch_attempts(platform, config, home) {
        if try_attempt(&attempt) {
            log::debug!("Launched via {}", attempt.program);
            return Ok(());
        }
    }
    bail!("Could not launch {}", config.product());
}

/// Hands a file to the desktop shell, like double-clicking it.
pub fn open_path(platform: &Platform, path: &Path) -> Result<()> {
    let target = path.display().to_string();
    let (program, args) = match platform {
        Platform::Windows => ("start", vec![String::new(), target]),
        Platform::MacOs => ("open", vec![target]),
        _ => ("xdg-open", vec![target]),
    };
    new_command(program)
        .args(&args)
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(())
}

/// "You can now" lines shown after a successful install.
pub fn completion_hints(platform: &Platform, product: &str) -> Vec<String> {
    match platform {
        Platform::MacOs => vec![
            "Launch from Applications folder".to_string(),
            format!("Search with Spotlight (⌘+Space, type '{product}')"),
            "Add to Dock for quick access".to_string(),
        ],
        Platform::Windows => vec![
            "Launch from Start Menu".to_string(),
            format!("Search for '{product}' in Windows Search"),
            "Use Desktop shortcut (if created)".to_string(),
        ],
        _ => vec!["Check your applications menu or run from terminal".to_string()],
    }
}
