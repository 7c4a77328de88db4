use serde::Deserialize;
use std::process::Stdio;

use crate::process::new_command;

/// An executable that must be on PATH before building.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tool {
    pub command: String,
    pub name: String,
    #[serde(default)]
    pub hint: Option<String>,
}

impl Tool {
    pub fn new(command: &str, name: &str, hint: Option<&str>) -> Self {
        Self {
            command: command.to_string(),
            name: name.to_string(),
            hint: hint.map(|h| h.to_string()),
        }
    }

    pub fn defaults() -> Vec<Tool> {
        vec![
            Tool::new("node", "Node.js", Some("https://nodejs.org")),
            Tool::new("npm", "npm", None),
            Tool::new("cargo", "Rust/Cargo", Some("https://rustup.rs")),
        ]
    }
}

#[derive(Debug, Default)]
pub struct PrereqReport {
    pub found: Vec<Tool>,
    pub missing: Vec<Tool>,
}

impl PrereqReport {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn missing_names(&self) -> Vec<String> {
        self.missing.iter().map(|t| t.name.clone()).collect()
    }

    /// "• Node.js from https://nodejs.org" for each missing tool that has a hint.
    pub fn install_hints(&self) -> Vec<String> {
        self.missing.iter().filter_map(hint_line).collect()
    }
}

fn hint_line(tool: &Tool) -> Option<String> {
    tool.hint.as_ref().map(|h| format!("• {} from {h}", tool.name))
}

/// Hint lines for the tools named in `names` (as carried by `ToolsMissing`).
pub fn hints_for(tools: &[Tool], names: &[String]) -> Vec<String> {
    tools
        .iter()
        .filter(|t| names.contains(&t.name))
        .filter_map(hint_line)
        .collect()
}

/// True when `<command> --version` starts and exits successfully.
pub fn probe(command: &str) -> bool {
    let status = new_command(command)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(s) => {
            log::debug!("{command} --version -> {s}");
            s.success()
        }
        Err(e) => {
            log::debug!("{command} --version could not start: {e}");
            false
        }
    }
}

pub fn check_with<F>(tools: &[Tool], mut probe_fn: F) -> PrereqReport
where
    F: FnMut(&str) -> bool,
{
    let mut report = PrereqReport::default();
    for tool in tools {
        if probe_fn(&tool.command) {
            report.found.push(tool.clone());
        } else {
            report.missing.push(tool.clone());
        }
    }
    report
}

pub fn check_prerequisites(tools: &[Tool]) -> PrereqReport {
    check_with(tools, probe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_found() {
        let report = check_with(&Tool::defaults(), |_| true);
        assert!(report.is_ok());
        assert_eq!(report.found.len(), 3);
    }

    #[test]
    fn test_missing_cargo_fails() {
        let report = check_with(&Tool::defaults(), |cmd| cmd != "cargo");
        assert!(!report.is_ok());
        assert_eq!(report.missing_names(), vec!["Rust/Cargo"]);
        assert_eq!(report.install_hints(), vec!["• Rust/Cargo from https://rustup.rs"]);
    }

    #[test]
    fn test_missing_npm_has_no_hint() {
        let report = check_with(&Tool::defaults(), |cmd| cmd != "npm");
        assert_eq!(report.missing_names(), vec!["npm"]);
        assert!(report.install_hints().is_empty());
    }

    #[test]
    fn test_hints_for_names() {
        let names = vec!["Node.js".to_string(), "npm".to_string()];
        assert_eq!(
            hints_for(&Tool::defaults(), &names),
            vec!["• Node.js from https://nodejs.org"]
        );
    }

    #[test]
    fn test_probe_absent_executable() {
        assert!(!probe("grain-installer-no-such-tool-4711"));
    }

    #[test]
    fn test_check_prerequisites_absent_executable() {
        let tools = vec![Tool::new("grain-installer-no-such-tool-4711", "Ghost", None)];
        let report = check_prerequisites(&tools);
        assert_eq!(report.missing_names(), vec!["Ghost"]);
    }
}
