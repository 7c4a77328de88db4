use clap::Parser;
use log::LevelFilter;
use simplelog::{Config, SimpleLogger};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use installer_lib::config;
use installer_lib::error::InstallerError;
use installer_lib::install::{InstallOutcome, MsiAction};
use installer_lib::launch;
use installer_lib::pipeline::{Installer, Level, Reporter, Step};

#[derive(Parser)]
#[command(
    name = "grain-install",
    about = "Build Film Grain Generator and install it for this platform"
)]
struct Cli {
    /// Project directory (default: ./film-grain-generator)
    #[arg(short, long)]
    project_dir: Option<PathBuf>,

    /// Installer config file (default: installer.toml or config/installer.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Answer yes to every prompt
    #[arg(short, long)]
    yes: bool,

    /// Do not offer to launch the app at the end
    #[arg(long)]
    skip_launch: bool,

    /// Stream build output and turn on debug logging; -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ANSI colors; plain text on Windows consoles.
struct Colors;

impl Colors {
    const RED: &'static str = if cfg!(windows) { "" } else { "\x1b[0;31m" };
    const GREEN: &'static str = if cfg!(windows) { "" } else { "\x1b[0;32m" };
    const YELLOW: &'static str = if cfg!(windows) { "" } else { "\x1b[1;33m" };
    const BLUE: &'static str = if cfg!(windows) { "" } else { "\x1b[0;34m" };
    const CYAN: &'static str = if cfg!(windows) { "" } else { "\x1b[0;36m" };
    const NC: &'static str = if cfg!(windows) { "" } else { "\x1b[0m" };
}

fn print_colored(message: &str, color: &str) {
    println!("{color}{message}{}", Colors::NC);
}

fn ask(question: &str) -> bool {
    ask_from(question, &mut io::stdin().lock(), &mut io::stdout())
}

/// Anything but y/yes is a no, including a closed stdin.
fn ask_from<R: BufRead, W: Write>(question: &str, input: &mut R, out: &mut W) -> bool {
    let _ = write!(out, "{}{question} (y/n): {}", Colors::YELLOW, Colors::NC);
    let _ = out.flush();
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(0) => {
            // EOF: end the prompt line ourselves.
            let _ = writeln!(out);
            false
        }
        Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

struct TerminalReporter {
    yes: bool,
}

impl Reporter for TerminalReporter {
    fn step(&mut self, step: Step) {
        log::debug!("[{}%] {}", step.progress(), step.status());
    }

    fn log(&mut self, level: Level, message: &str) {
        match level {
            Level::Info => print_colored(message, Colors::BLUE),
            Level::Success => print_colored(message, Colors::GREEN),
            Level::Warn => print_colored(message, Colors::YELLOW),
            Level::Error => print_colored(message, Colors::RED),
            Level::Output => println!("{message}"),
        }
    }

    fn confirm(&mut self, question: &str) -> bool {
        self.yes || ask(question)
    }
}

fn print_header() {
    println!();
    print_colored(
        "🎬 Film Grain Generator - Cross-Platform Build & Install",
        Colors::CYAN,
    );
    print_colored(&"=".repeat(60), Colors::CYAN);
    println!();
}

/// Ctrl-C exits with status 1 instead of the default signal exit.
fn spawn_interrupt_handler() {
    std::thread::spawn(|| {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                log::warn!("Ctrl-C handler unavailable: {e}");
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                print_colored("\n\n❌ Installation cancelled by user.", Colors::YELLOW);
                std::process::exit(1);
            }
        });
    });
}

fn report_failure(err: &anyhow::Error) {
    print_colored(&format!("❌ {err}"), Colors::RED);
    match err.downcast_ref::<InstallerError>() {
        Some(InstallerError::ToolsMissing(_)) => print_colored(
            "Please install the missing tools and try again.",
            Colors::YELLOW,
        ),
        Some(InstallerError::ProjectNotFound(_)) => print_colored(
            "Please run this installer from the project root directory.",
            Colors::YELLOW,
        ),
        Some(InstallerError::UnsupportedPlatform(_)) => print_colored(
            "This installer supports macOS, Windows and Linux only.",
            Colors::YELLOW,
        ),
        _ => print_colored("❌ Installation failed!", Colors::RED),
    }
}

fn show_completion_info(
    installer: &Installer,
    outcome: &InstallOutcome,
    reporter: &mut TerminalReporter,
    skip_launch: bool,
) {
    let product = installer.config.product();

    println!();
    print_colored("🎉 Installation Complete!", Colors::GREEN);
    print_colored(&"=".repeat(30), Colors::GREEN);
    print_colored(&outcome.describe(), Colors::BLUE);
    println!();

    print_colored("🚀 You can now:", Colors::YELLOW);
    for hint in launch::completion_hints(&installer.platform, product) {
        println!("   • {hint}");
    }

    println!();
    print_colored("📊 App Features:", Colors::BLUE);
    println!("   • 40+ realistic film stocks with authentic characteristics");
    println!("   • Multi-threaded grain rendering");
    println!("   • Density slider (10K-50K grains)");
    println!("   • Professional export (up to 2048x2048 PNG)");
    println!("   • Film-specific colors, shapes, and clustering");
    println!();

    // Nothing is installed yet when the MSI was only started or left in place.
    let installed = matches!(
        outcome,
        InstallOutcome::Copied(_) | InstallOutcome::PackageInstalled(_)
    );
    if installed
        && !skip_launch
        && reporter.confirm(&format!("Would you like to launch {product} now?"))
    {
        print_colored(&format!("🚀 Launching {product}..."), Colors::BLUE);
        if let Err(e) = launch::launch(&installer.platform, &installer.config, &installer.home_dir) {
            print_colored(&format!("❌ Failed to launch app: {e}"), Colors::RED);
        }
    }

    print_colored("✨ Enjoy creating authentic film grain overlays!", Colors::GREEN);
}

fn main() {
    let cli = Cli::parse();

    let _ = SimpleLogger::init(log_level(cli.verbose), Config::default());

    spawn_interrupt_handler();
    print_header();

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut config = match config::resolve_config(cli.config.as_deref(), &cwd) {
        Ok(c) => c,
        Err(e) => {
            print_colored(&format!("❌ {e:#}"), Colors::RED);
            std::process::exit(1);
        }
    };
    if let Some(dir) = cli.project_dir {
        config.project_dir = dir;
    }

    let base_dir = installer_lib::find_base_dir(&config.project_dir, &cwd, &installer_lib::exe_dir())
        .unwrap_or(cwd);
    log::debug!("Project base directory: {}", base_dir.display());

    let mut installer = Installer::new(config, base_dir, installer_lib::home_dir());
    installer.msi_action = MsiAction::Interactive;
    installer.stream_build = cli.verbose > 0;

    if !installer.platform.is_supported() {
        log::warn!("Running on unsupported platform {}", installer.platform);
    }

    print_colored(
        &format!("📁 Project directory: {}", installer.project_dir().display()),
        Colors::BLUE,
    );

    let mut reporter = TerminalReporter { yes: cli.yes };
    match installer.run(&mut reporter) {
        Ok(outcome) => show_completion_info(&installer, &outcome, &mut reporter, cli.skip_launch),
        Err(e) => {
            report_failure(&e);
            std::process::exit(1);
        }
    }
}
