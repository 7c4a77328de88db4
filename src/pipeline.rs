use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::artifact;
use crate::config::InstallerConfig;
use crate::error::InstallerError;
use crate::install::{self, InstallOutcome, MsiAction, Runners};
use crate::platform::Platform;
use crate::prereq;
use crate::process;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Prerequisites,
    ProjectStructure,
    Dependencies,
    Build,
    Install,
    Done,
}

impl Step {
    /// Progress bar value (0-100) when the step starts.
    pub fn progress(self) -> u8 {
        match self {
            Self::Prerequisites => 10,
            Self::ProjectStructure => 20,
            Self::Dependencies => 30,
            Self::Build => 50,
            Self::Install => 80,
            Self::Done => 100,
        }
    }

    pub fn status(self) -> &'static str {
        match self {
            Self::Prerequisites => "Checking prerequisites...",
            Self::ProjectStructure => "Checking project structure...",
            Self::Dependencies => "Installing dependencies...",
            Self::Build => "Building application...",
            Self::Install => "Installing application...",
            Self::Done => "✅ Installation complete!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warn,
    Error,
    /// A line of build output.
    Output,
}

/// Where the front-ends receive progress. The terminal prints, the GUI
/// forwards to its event loop.
pub trait Reporter {
    fn step(&mut self, step: Step);
    fn log(&mut self, level: Level, message: &str);
    fn confirm(&mut self, question: &str) -> bool;
}

pub struct Installer {
    pub config: InstallerConfig,
    pub platform: Platform,
    /// Directory the project directory is resolved against.
    pub base_dir: PathBuf,
    pub home_dir: PathBuf,
    pub msi_action: MsiAction,
    pub stream_build: bool,
    pub probe: fn(&str) -> bool,
    pub runners: Runners,
}

impl Installer {
    pub fn new(config: InstallerConfig, base_dir: PathBuf, home_dir: PathBuf) -> Self {
        Self {
            config,
            platform: Platform::current(),
            base_dir,
            home_dir,
            msi_action: MsiAction::Interactive,
            stream_build: false,
            probe: prereq::probe,
            runners: Runners::default(),
        }
    }

    pub fn project_dir(&self) -> PathBuf {
        self.base_dir.join(&self.config.project_dir)
    }

    /// Runs every step in order and stops at the first failure.
    /// Nothing is retried or rolled back.
    pub fn run(&mut self, reporter: &mut dyn Reporter) -> Result<InstallOutcome> {
        let project_dir = self.project_dir();

        reporter.step(Step::Prerequisites);
        self.check_prerequisites(reporter)?;

        reporter.step(Step::ProjectStructure);
        if !project_dir.is_dir() {
            return Err(InstallerError::ProjectNotFound(project_dir).into());
        }
        reporter.log(Level::Success, "✅ Project structure found");
        self.config.apply_tauri_product_name(&project_dir);

        reporter.step(Step::Dependencies);
        reporter.log(Level::Info, "📦 Installing npm dependencies...");
        let (program, args) = split_command(&self.config.install_command)?;
        process::run_captured(program, args, &project_dir)?;
        reporter.log(Level::Success, "✅ Dependencies installed successfully");

        reporter.step(Step::Build);
        self.build(reporter, &project_dir)?;

        reporter.step(Step::Install);
        reporter.log(Level::Info, &format!("📱 Installing for {}...", self.platform));
        let found = artifact::locate(&self.platform, &self.config, &project_dir)?;
        reporter.log(
            Level::Success,
            &format!("💿 Found {}: {}", found.kind(), found.path().display()),
        );
        let outcome = install::install_artifact(
            &found,
            &self.config,
            &self.home_dir,
            self.msi_action,
            &self.runners,
            |question| reporter.confirm(question),
        )?;
        reporter.log(Level::Success, &format!("✅ {}", outcome.describe()));

        reporter.step(Step::Done);
        Ok(outcome)
    }

    fn check_prerequisites(&self, reporter: &mut dyn Reporter) -> Result<()> {
        reporter.log(Level::Info, "🔍 Checking prerequisites...");
        let report = prereq::check_with(&self.config.tools, self.probe);

        for tool in &self.config.tools {
            if report.missing.contains(tool) {
                reporter.log(Level::Error, &format!("  ❌ {} not found", tool.name));
            } else {
                reporter.log(Level::Success, &format!("  ✅ {} found", tool.name));
            }
        }

        if !report.is_ok() {
            let hints = report.install_hints();
            if !hints.is_empty() {
                reporter.log(Level::Warn, "Please install:");
                for hint in &hints {
                    reporter.log(Level::Warn, hint);
                }
            }
            return Err(InstallerError::ToolsMissing(report.missing_names()).into());
        }

        reporter.log(Level::Success, "✅ All prerequisites found!");
        Ok(())
    }

    fn build(&self, reporter: &mut dyn Reporter, project_dir: &Path) -> Result<()> {
        reporter.log(Level::Info, &format!("🔨 Building {}...", self.config.product()));
        reporter.log(Level::Warn, "This may take several minutes...");

        let (program, args) = split_command(&self.config.build_command)?;
        if self.stream_build {
            process::run_streamed(program, args, project_dir, |line| {
                reporter.log(Level::Output, &format!("  {line}"))
            })?;
        } else {
            process::run_captured(program, args, project_dir)?;
        }

        reporter.log(Level::Success, "✅ Build completed successfully");
        Ok(())
    }
}

fn split_command(command: &[String]) -> Result<(&str, &[String])> {
    match command.split_first() {
        Some((program, args)) => Ok((program.as_str(), args)),
        None => bail!("Empty command in installer config"),
    }
}
