pub mod artifact;
pub mod config;
pub mod error;
pub mod install;
pub mod launch;
pub mod pipeline;
pub mod platform;
pub mod prereq;
pub mod process;

use std::path::{Path, PathBuf};

/// Finds the directory that contains the project folder: the working
/// directory first, then around the executable.
pub fn find_base_dir(project_dir: &Path, cwd: &Path, exe_dir: &Path) -> Option<PathBuf> {
    if project_dir.is_absolute() {
        return project_dir.parent().map(|p| p.to_path_buf());
    }

    let candidates = [
        cwd.to_path_buf(),
        exe_dir.to_path_buf(),
        exe_dir.join(".."),
        // target/release/ layout: go up two levels to the repo root
        exe_dir.join("../.."),
    ];

    candidates
        .into_iter()
        .find(|base| base.join(project_dir).is_dir())
}

pub fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn home_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
