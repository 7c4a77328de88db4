use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::InstallerConfig;
use crate::error::InstallerError;
use crate::platform::Platform;

/// A bundler output ready to be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    AppBundle(PathBuf),
    Msi(PathBuf),
    AppImage(PathBuf),
    Deb(PathBuf),
}

impl Artifact {
    pub fn path(&self) -> &Path {
        match self {
            Self::AppBundle(p) | Self::Msi(p) | Self::AppImage(p) | Self::Deb(p) => p,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::AppBundle(_) => "app bundle",
            Self::Msi(_) => "MSI installer",
            Self::AppImage(_) => "AppImage",
            Self::Deb(_) => "Debian package",
        }
    }
}

/// File-name glob (`*`, `?`) to an anchored regex. Everything else is literal.
pub fn pattern_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).with_context(|| format!("Invalid file pattern: {pattern}"))
}

/// Regular files directly under `dir` whose name matches `pattern`, sorted by name.
/// A missing directory yields no matches.
pub fn find_matching(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        log::debug!("{} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let re = pattern_to_regex(pattern)?;
    let mut matches = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Could not list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if re.is_match(name) {
                matches.push(entry.into_path());
            }
        }
    }

    log::debug!(
        "{} match(es) for {pattern} in {}",
        matches.len(),
        dir.display()
    );
    Ok(matches)
}

/// Finds the bundler output for `platform` under `project_dir`.
pub fn locate(platform: &Platform, config: &InstallerConfig, project_dir: &Path) -> Result<Artifact> {
    match platform {
        Platform::MacOs => {
            let app = config.app_bundle_path(project_dir);
            if app.is_dir() {
                Ok(Artifact::AppBundle(app))
            } else {
                Err(InstallerError::ArtifactNotFound(format!(
                    "Built app not found at: {}",
                    app.display()
                ))
                .into())
            }
        }
        Platform::Windows => {
            let dir = config.msi_dir(project_dir);
            let pattern = config.msi_pattern();
            match find_matching(&dir, &pattern)?.into_iter().next() {
                Some(msi) => Ok(Artifact::Msi(msi)),
                None => Err(InstallerError::ArtifactNotFound(format!(
                    "MSI installer not found matching: {}",
                    dir.join(&pattern).display()
                ))
                .into()),
            }
        }
        Platform::Linux => {
            let appimages = find_matching(&config.appimage_dir_in_bundle(project_dir), "*.AppImage")?;
            if let Some(appimage) = appimages.into_iter().next() {
                return Ok(Artifact::AppImage(appimage));
            }
            let debs = find_matching(&config.deb_dir(project_dir), "*.deb")?;
            match debs.into_iter().next() {
                Some(deb) => Ok(Artifact::Deb(deb)),
                None => Err(InstallerError::ArtifactNotFound(
                    "No Linux installer found (AppImage or deb)".to_string(),
                )
                .into()),
            }
        }
        Platform::Other(os) => Err(InstallerError::UnsupportedPlatform(os.clone()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_pattern_is_literal_except_wildcards() {
        let re = pattern_to_regex("Film Grain Generator_*.msi").unwrap();
        assert!(re.is_match("Film Grain Generator_0.1.0_x64_en-US.msi"));
        assert!(!re.is_match("Film Grain Generator-0.1.0.msi"));
        assert!(!re.is_match("Film Grain Generator_0.1.0.msi.bak"));

        let dot = pattern_to_regex("a.b").unwrap();
        assert!(!dot.is_match("axb"));

        let q = pattern_to_regex("v?.deb").unwrap();
        assert!(q.is_match("v1.deb"));
        assert!(!q.is_match("v10.deb"));
    }

    #[test]
    fn test_find_matching_sorted_files_only() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b_2.deb"));
        touch(&dir.path().join("a_1.deb"));
        touch(&dir.path().join("notes.txt"));
        fs::create_dir(dir.path().join("dir.deb")).unwrap();

        let found = find_matching(dir.path(), "*.deb").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a_1.deb", "b_2.deb"]);
    }

    #[test]
    fn test_find_matching_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_matching(&dir.path().join("absent"), "*").unwrap().is_empty());
    }

    #[test]
    fn test_locate_macos_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let config = InstallerConfig::default();

        let err = locate(&Platform::MacOs, &config, dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallerError>(),
            Some(InstallerError::ArtifactNotFound(_))
        ));

        let app = config.app_bundle_path(dir.path());
        touch(&app.join("Contents/Info.plist"));
        assert_eq!(
            locate(&Platform::MacOs, &config, dir.path()).unwrap(),
            Artifact::AppBundle(app)
        );
    }

    #[test]
    fn test_locate_windows_first_msi() {
        let dir = tempfile::tempdir().unwrap();
        let config = InstallerConfig::default();
        let msi_dir = config.msi_dir(dir.path());
        touch(&msi_dir.join("Film Grain Generator_0.2.0_x64_en-US.msi"));
        touch(&msi_dir.join("Film Grain Generator_0.1.0_x64_en-US.msi"));
        touch(&msi_dir.join("Other_0.1.0.msi"));

        let found = locate(&Platform::Windows, &config, dir.path()).unwrap();
        assert_eq!(
            found,
            Artifact::Msi(msi_dir.join("Film Grain Generator_0.1.0_x64_en-US.msi"))
        );
    }

    #[test]
    fn test_locate_windows_missing_reports_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let err = locate(&Platform::Windows, &InstallerConfig::default(), dir.path()).unwrap_err();
        assert!(err.to_string().contains("Film Grain Generator_*.msi"));
    }

    #[test]
    fn test_locate_linux_prefers_appimage() {
        let dir = tempfile::tempdir().unwrap();
        let config = InstallerConfig::default();
        let deb = config.deb_dir(dir.path()).join("film-grain-generator_0.1.0_amd64.deb");
        touch(&deb);
        assert_eq!(
            locate(&Platform::Linux, &config, dir.path()).unwrap(),
            Artifact::Deb(deb)
        );

        let appimage = config
            .appimage_dir_in_bundle(dir.path())
            .join("film-grain-generator_0.1.0_amd64.AppImage");
        touch(&appimage);
        assert_eq!(
            locate(&Platform::Linux, &config, dir.path()).unwrap(),
            Artifact::AppImage(appimage)
        );
    }

    #[test]
    fn test_locate_linux_nothing_built() {
        let dir = tempfile::tempdir().unwrap();
        let err = locate(&Platform::Linux, &InstallerConfig::default(), dir.path()).unwrap_err();
        assert_eq!(err.to_string(), "No Linux installer found (AppImage or deb)");
    }

    #[test]
    fn test_locate_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let err = locate(
            &Platform::Other("freebsd".into()),
            &InstallerConfig::default(),
            dir.path(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Unsupported platform: freebsd");
    }
}
