use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::prereq::Tool;

pub const DEFAULT_PRODUCT_NAME: &str = "Film Grain Generator";

/// Installer settings. Every field is optional in `installer.toml`; missing
/// fields keep the values that match the stock Tauri project layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    pub product_name: Option<String>,
    pub project_dir: PathBuf,
    /// Bundler output, relative to the project directory.
    pub bundle_dir: PathBuf,
    pub tools: Vec<Tool>,
    pub install_command: Vec<String>,
    pub build_command: Vec<String>,
    pub macos_install_dir: PathBuf,
    /// Directory under $HOME that receives the AppImage.
    pub appimage_dir: String,
    /// Executable name tried first when launching on Linux (deb installs).
    pub linux_binary: String,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            product_name: None,
            project_dir: PathBuf::from("film-grain-generator"),
            bundle_dir: PathBuf::from("src-tauri/target/release/bundle"),
            tools: Tool::defaults(),
            install_command: vec!["npm".into(), "install".into()],
            build_command: vec!["npm".into(), "run".into(), "tauri".into(), "build".into()],
            macos_install_dir: PathBuf::from("/Applications"),
            appimage_dir: "Applications".to_string(),
            linux_binary: "film-grain-generator".to_string(),
        }
    }
}

impl InstallerConfig {
    pub fn product(&self) -> &str {
        self.product_name.as_deref().unwrap_or(DEFAULT_PRODUCT_NAME)
    }

    /// Takes the product name from the Tauri config unless one was set explicitly.
    pub fn apply_tauri_product_name(&mut self, project_dir: &Path) {
        if self.product_name.is_some() {
            return;
        }
        if let Some(name) = read_product_name(project_dir) {
            log::debug!("Product name from tauri.conf.json: {name}");
            self.product_name = Some(name);
        }
    }

    pub fn bundle_root(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.bundle_dir)
    }

    pub fn app_bundle_path(&self, project_dir: &Path) -> PathBuf {
        self.bundle_root(project_dir)
            .join("macos")
            .join(format!("{}.app", self.product()))
    }

    pub fn msi_dir(&self, project_dir: &Path) -> PathBuf {
        self.bundle_root(project_dir).join("msi")
    }

    pub fn msi_pattern(&self) -> String {
        format!("{}_*.msi", self.product())
    }

    pub fn appimage_dir_in_bundle(&self, project_dir: &Path) -> PathBuf {
        self.bundle_root(project_dir).join("appimage")
    }

    pub fn deb_dir(&self, project_dir: &Path) -> PathBuf {
        self.bundle_root(project_dir).join("deb")
    }

    pub fn installed_app_path(&self) -> PathBuf {
        self.macos_install_dir.join(format!("{}.app", self.product()))
    }

    pub fn appimage_install_path(&self, home: &Path) -> PathBuf {
        home.join(&self.appimage_dir)
            .join(format!("{}.AppImage", self.product()))
    }
}

pub fn load_config(path: &Path) -> Result<InstallerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let config: InstallerConfig =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

/// An explicit path must load. Otherwise `installer.toml` and
/// `config/installer.toml` under `base` are tried before falling back to defaults.
pub fn resolve_config(explicit: Option<&Path>, base: &Path) -> Result<InstallerConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }

    match find_config_file(base) {
        Some(path) => {
            log::debug!("Using config {}", path.display());
            load_config(&path)
        }
        None => {
            log::debug!("No installer.toml found, using defaults");
            Ok(InstallerConfig::default())
        }
    }
}

pub fn find_config_file(base: &Path) -> Option<PathBuf> {
    let candidates = [
        base.join("installer.toml"),
        base.join("config").join("installer.toml"),
    ];
    candidates.into_iter().find(|path| path.is_file())
}

/// Reads `productName` from `src-tauri/tauri.conf.json`.
/// Tauri v2 keeps it at the top level, v1 under `package`.
pub fn read_product_name(project_dir: &Path) -> Option<String> {
    let path = project_dir.join("src-tauri").join("tauri.conf.json");
    let content = std::fs::read_to_string(&path).ok()?;
    let json: Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Ignoring unparsable {}: {e}", path.display());
            return None;
        }
    };

    json["productName"]
        .as_str()
        .or_else(|| json["package"]["productName"].as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
}
