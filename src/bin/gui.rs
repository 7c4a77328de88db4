use eframe::egui;
use log::LevelFilter;
use rfd::{MessageButtons, MessageDialog, MessageDialogResult, MessageLevel};
use simplelog::{Config, SimpleLogger};
use std::path::PathBuf;
use std::sync::mpsc;

use installer_lib::config::{self, InstallerConfig};
use installer_lib::error::InstallerError;
use installer_lib::install::{InstallOutcome, MsiAction};
use installer_lib::pipeline::{Installer, Level, Reporter, Step};
use installer_lib::platform::Platform;
use installer_lib::{launch, prereq};

const DESCRIPTION: &str = "Professional film grain generator with 40+ authentic film stocks.
Creates realistic grain overlays based on actual film characteristics.

This installer will:
• Check system requirements
• Install dependencies automatically
• Build and install the application";

// --- Messages from the install thread ---

enum InstallerMessage {
    Step(Step),
    Log(Level, String),
    Finished {
        outcome: InstallOutcome,
        config: InstallerConfig,
    },
    Failed(anyhow::Error),
}

struct ChannelReporter {
    tx: mpsc::Sender<InstallerMessage>,
    ctx: egui::Context,
}

impl ChannelReporter {
    fn send(&self, msg: InstallerMessage) {
        let _ = self.tx.send(msg);
        self.ctx.request_repaint();
    }
}

impl Reporter for ChannelReporter {
    fn step(&mut self, step: Step) {
        self.send(InstallerMessage::Step(step));
    }

    fn log(&mut self, level: Level, message: &str) {
        log::info!("{message}");
        self.send(InstallerMessage::Log(level, message.to_string()));
    }

    // MSIs run with /quiet here, so there is nobody to ask.
    fn confirm(&mut self, question: &str) -> bool {
        self.log(Level::Info, &format!("{question} yes"));
        true
    }
}

// --- App State ---

struct InstallerApp {
    platform: Platform,
    config: InstallerConfig,
    config_error: Option<String>,
    base_dir: PathBuf,
    home_dir: PathBuf,

    progress: f32,
    status: String,
    log_lines: Vec<(Level, String)>,

    installing: bool,
    finished: bool,
    rx: Option<mpsc::Receiver<InstallerMessage>>,
}

impl InstallerApp {
    fn new() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let exe_dir = installer_lib::exe_dir();

        // Double-clicked installers start with an arbitrary working directory.
        let config_base = match config::find_config_file(&cwd) {
            Some(_) => cwd.clone(),
            None => exe_dir.clone(),
        };
        let (config, config_error) = match config::resolve_config(None, &config_base) {
            Ok(c) => (c, None),
            Err(e) => (
                InstallerConfig::default(),
                Some(format!("Failed to load installer.toml: {e:#}")),
            ),
        };

        let base_dir = installer_lib::find_base_dir(&config.project_dir, &cwd, &exe_dir)
            .unwrap_or(cwd);

        let mut app = Self {
            platform: Platform::current(),
            config,
            config_error,
            base_dir,
            home_dir: installer_lib::home_dir(),
            progress: 0.0,
            status: "Ready to install".to_string(),
            log_lines: Vec::new(),
            installing: false,
            finished: false,
            rx: None,
        };

        app.push_log(Level::Info, "🎬 Film Grain Generator Installer Ready".to_string());
        app.push_log(Level::Info, format!("Platform: {}", app.platform));
        app.push_log(Level::Info, "Click 'Install' to begin...".to_string());
        app
    }

    fn push_log(&mut self, level: Level, message: String) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.log_lines.push((level, format!("[{stamp}] {message}")));
    }

    fn start_installation(&mut self, ctx: &egui::Context) {
        let mut installer = Installer::new(
            self.config.clone(),
            self.base_dir.clone(),
            self.home_dir.clone(),
        );
        installer.platform = self.platform.clone();
        installer.msi_action = MsiAction::Quiet;
        installer.stream_build = true;

        let (tx, rx) = mpsc::channel();
        self.rx = Some(rx);
        self.installing = true;

        let ctx = ctx.clone();

        std::thread::spawn(move || {
            let mut reporter = ChannelReporter {
                tx: tx.clone(),
                ctx: ctx.clone(),
            };

            let msg = match installer.run(&mut reporter) {
                Ok(outcome) => InstallerMessage::Finished {
                    outcome,
                    config: installer.config,
                },
                Err(e) => InstallerMessage::Failed(e),
            };

            let _ = tx.send(msg);
            ctx.request_repaint();
        });
    }

    fn drain_messages(&mut self) {
        let Some(rx) = self.rx.take() else { return };
        let mut keep = true;

        while let Ok(msg) = rx.try_recv() {
            match msg {
                InstallerMessage::Step(step) => {
                    self.progress = f32::from(step.progress()) / 100.0;
                    self.status = step.status().to_string();
                }
                InstallerMessage::Log(level, line) => self.push_log(level, line),
                InstallerMessage::Finished { outcome, config } => {
                    self.push_log(
                        Level::Success,
                        "🎉 Installation completed successfully!".to_string(),
                    );
                    self.installing = false;
                    self.finished = true;
                    keep = false;
                    self.config = config;
                    self.show_completion_dialog(&outcome);
                }
                InstallerMessage::Failed(err) => {
                    self.push_log(Level::Error, format!("❌ Installation failed: {err}"));
                    self.status = "❌ Installation failed".to_string();
                    self.installing = false;
                    self.finished = true;
                    keep = false;
                    self.show_error_dialog(&err);
                }
            }
        }

        if keep {
            self.rx = Some(rx);
        }
    }

    fn show_error_dialog(&self, err: &anyhow::Error) {
        let (title, description) = match err.downcast_ref::<InstallerError>() {
            Some(InstallerError::ToolsMissing(names)) => {
                let mut text = format!("{err}\n\n");
                let hints = prereq::hints_for(&self.config.tools, names);
                if !hints.is_empty() {
                    text.push_str("Please install:\n");
                    text.push_str(&hints.join("\n"));
                }
                ("Missing Prerequisites", text)
            }
            Some(InstallerError::ProjectNotFound(_)) => (
                "Project Not Found",
                format!(
                    "{err}\n\nPlease make sure this installer is in the same folder as the {} directory.",
                    self.config.project_dir.display()
                ),
            ),
            _ => ("Installation Error", format!("Installation failed:\n{err}")),
        };

        MessageDialog::new()
            .set_level(MessageLevel::Error)
            .set_title(title)
            .set_description(description)
            .set_buttons(MessageButtons::Ok)
            .show();
    }

    fn show_completion_dialog(&mut self, outcome: &InstallOutcome) {
        let product = self.config.product().to_string();
        let mut message = format!("🎉 {product} has been installed successfully!\n\n");
        message.push_str("You can now:\n");
        for hint in launch::completion_hints(&self.platform, &product) {
            message.push_str(&format!("• {hint}\n"));
        }

        let can_launch = !matches!(
            outcome,
            InstallOutcome::InstallerLaunched(_) | InstallOutcome::InstallerReady(_)
        );
        if !can_launch {
            MessageDialog::new()
                .set_title("Installation Complete")
                .set_description(format!("{message}\n{}", outcome.describe()))
                .set_buttons(MessageButtons::Ok)
                .show();
            return;
        }

        message.push_str("\nWould you like to launch the app now?");
        let answer = MessageDialog::new()
            .set_title("Installation Complete")
            .set_description(message)
            .set_buttons(MessageButtons::YesNo)
            .show();

        if answer == MessageDialogResult::Yes {
            match launch::launch(&self.platform, &self.config, &self.home_dir) {
                Ok(()) => self.push_log(Level::Success, format!("🚀 Launched {product}!")),
                Err(e) => self.push_log(Level::Error, format!("❌ Failed to launch app: {e}")),
            }
        }
    }
}

fn level_color(level: Level) -> egui::Color32 {
    match level {
        Level::Success => egui::Color32::GREEN,
        Level::Warn => egui::Color32::YELLOW,
        Level::Error => egui::Color32::RED,
        Level::Info | Level::Output => egui::Color32::LIGHT_GRAY,
    }
}

impl eframe::App for InstallerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_messages();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading(egui::RichText::new("🎬 Film Grain Generator").size(24.0).strong());
            });
            ui.add_space(8.0);

            ui.label(DESCRIPTION);
            ui.add_space(8.0);

            ui.monospace(format!(
                "Platform: {} ({})\nInstaller: v{}",
                self.platform,
                std::env::consts::ARCH,
                env!("CARGO_PKG_VERSION")
            ));
            ui.add_space(8.0);

            if let Some(err) = &self.config_error {
                ui.colored_label(egui::Color32::RED, err);
                ui.add_space(4.0);
            }

            ui.add(egui::ProgressBar::new(self.progress).show_percentage());
            ui.vertical_centered(|ui| {
                ui.label(self.status.as_str());
            });
            ui.add_space(4.0);

            // --- Installation log ---
            ui.group(|ui| {
                ui.label("Installation Log");
                egui::ScrollArea::vertical()
                    .max_height(180.0)
                    .auto_shrink([false, false])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for (level, line) in &self.log_lines {
                            ui.colored_label(level_color(*level), egui::RichText::new(line).monospace());
                        }
                    });
            });

            ui.add_space(8.0);

            // --- Buttons ---
            ui.horizontal(|ui| {
                let can_install = !self.installing && !self.finished;
                if ui
                    .add_enabled(can_install, egui::Button::new("🚀 Install Film Grain Generator"))
                    .clicked()
                {
                    self.push_log(Level::Info, "Starting installation...".to_string());
                    self.start_installation(ctx);
                }

                let close_label = if self.installing || self.finished { "Close" } else { "Cancel" };
                if ui.button(close_label).clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }

                if self.installing {
                    ui.spinner();
                }
            });
        });
    }
}

fn main() -> eframe::Result {
    let _ = SimpleLogger::init(LevelFilter::Info, Config::default());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("🎬 Film Grain Generator Installer")
            .with_inner_size([600.0, 500.0])
            .with_resizable(false),
        centered: true,
        ..Default::default()
    };

    eframe::run_native(
        "Film Grain Generator Installer",
        options,
        Box::new(|_cc| Ok(Box::new(InstallerApp::new()))),
    )
}
