use std::fmt;
use std::path::PathBuf;

/// Failures the front-ends react to differently (dialogs, hints, exit text).
/// Everything else travels as a plain `anyhow::Error`.
#[derive(Debug)]
pub enum InstallerError {
    ToolsMissing(Vec<String>),
    ProjectNotFound(PathBuf),
    ArtifactNotFound(String),
    UnsupportedPlatform(String),
    CommandFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },
}

impl fmt::Display for InstallerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToolsMissing(names) => {
                write!(f, "Missing required tools: {}", names.join(", "))
            }
            Self::ProjectNotFound(path) => {
                write!(f, "{} directory not found!", path.display())
            }
            Self::ArtifactNotFound(what) => write!(f, "{what}"),
            Self::UnsupportedPlatform(os) => write!(f, "Unsupported platform: {os}"),
            Self::CommandFailed {
                command,
                code,
                output,
            } => {
                match code {
                    Some(c) => write!(f, "`{command}` failed with exit code {c}")?,
                    None => write!(f, "`{command}` was terminated by a signal")?,
                }
                if !output.is_empty() {
                    write!(f, ":\n{output}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for InstallerError {}
