use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::artifact::Artifact;
use crate::config::InstallerConfig;
use crate::launch::open_path;
use crate::platform::Platform;
use crate::process::{run_captured, run_inherited};

/// How an MSI is handed over on Windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsiAction {
    /// `msiexec /i <msi> /quiet`, opening the MSI if that fails.
    Quiet,
    /// Ask first; open the MSI on yes, leave it in place on no.
    Interactive,
}

pub type RunFn = fn(&str, &[String], &Path) -> Result<()>;
pub type OpenFn = fn(&Platform, &Path) -> Result<()>;

/// The external commands the install actions go through.
#[derive(Clone, Copy)]
pub struct Runners {
    /// Output captured (msiexec).
    pub captured: RunFn,
    /// Attached to the terminal (sudo dpkg).
    pub inherited: RunFn,
    /// Hands a file to the desktop shell.
    pub open: OpenFn,
}

impl Default for Runners {
    fn default() -> Self {
        Self {
            captured: run_captured,
            inherited: run_inherited,
            open: open_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Copied(PathBuf),
    InstallerLaunched(PathBuf),
    InstallerReady(PathBuf),
    PackageInstalled(PathBuf),
}

impl InstallOutcome {
    pub fn describe(&self) -> String {
        match self {
            Self::Copied(dest) => format!("Installed to: {}", dest.display()),
            Self::InstallerLaunched(msi) => format!("Installer started: {}", msi.display()),
            Self::InstallerReady(msi) => format!("Installer ready at: {}", msi.display()),
            Self::PackageInstalled(deb) => format!("Package installed: {}", deb.display()),
        }
    }
}

/// Recursive copy keeping the relative layout. Symlinks are recreated on unix.
pub fn copy_dir_all(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("Could not read {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .context("Walked outside of the source directory")?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Could not create {}", target.display()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!("Could not copy {} to {}", entry.path().display(), target.display())
            })?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    let link = fs::read_link(src).with_context(|| format!("Could not read link {}", src.display()))?;
    std::os::unix::fs::symlink(&link, target)
        .with_context(|| format!("Could not create link {}", target.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    fs::copy(src, target)
        .map(|_| ())
        .with_context(|| format!("Could not copy {} to {}", src.display(), target.display()))
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Could not set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

fn remove_existing(path: &Path) -> Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("Could not inspect {}", path.display()));
        }
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
    .with_context(|| format!("Could not remove existing {}", path.display()))?;
    Ok(true)
}

/// Replaces `dest` with a fresh copy of the `.app` bundle.
pub fn install_app_bundle(src: &Path, dest: &Path) -> Result<PathBuf> {
    if remove_existing(dest)? {
        log::info!("Removed existing installation at {}", dest.display());
    }
    copy_dir_all(src, dest)?;
    set_executable(dest)?;
    Ok(dest.to_path_buf())
}

pub fn install_appimage(src: &Path, dest: &Path) -> Result<PathBuf> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Could not create {}", parent.display()))?;
    }
    fs::copy(src, dest)
        .with_context(|| format!("Could not copy {} to {}", src.display(), dest.display()))?;
    set_executable(dest)?;
    Ok(dest.to_path_buf())
}

pub fn install_deb(deb: &Path, run: RunFn) -> Result<()> {
    let dir = deb.parent().unwrap_or_else(|| Path::new("."));
    let args = vec![
        "dpkg".to_string(),
        "-i".to_string(),
        deb.display().to_string(),
    ];
    run("sudo", &args, dir).context("Debian package installation failed")
}

pub fn install_msi<F>(
    msi: &Path,
    action: MsiAction,
    runners: &Runners,
    mut confirm: F,
) -> Result<InstallOutcome>
where
    F: FnMut(&str) -> bool,
{
    let msi = std::path::absolute(msi).unwrap_or_else(|_| msi.to_path_buf());

    match action {
        MsiAction::Quiet => {
            let dir = msi.parent().unwrap_or_else(|| Path::new("."));
            let args = vec!["/i".to_string(), msi.display().to_string(), "/quiet".to_string()];
            match (runners.captured)("msiexec", &args, dir) {
                Ok(()) => Ok(InstallOutcome::PackageInstalled(msi)),
                Err(e) => {
                    log::warn!("msiexec failed ({e}), opening the installer instead");
                    (runners.open)(&Platform::Windows, &msi)?;
                    Ok(InstallOutcome::InstallerLaunched(msi))
                }
            }
        }
        MsiAction::Interactive => {
            if confirm("Would you like to run the installer now?") {
                (runners.open)(&Platform::Windows, &msi)?;
                Ok(InstallOutcome::InstallerLaunched(msi))
            } else {
                Ok(InstallOutcome::InstallerReady(msi))
            }
        }
    }
}

/// Performs the platform install action for a located artifact.
pub fn install_artifact<F>(
    artifact: &Artifact,
    config: &InstallerConfig,
    home: &Path,
    msi_action: MsiAction,
    runners: &Runners,
    confirm: F,
) -> Result<InstallOutcome>
where
    F: FnMut(&str) -> bool,
{
    match artifact {
        Artifact::AppBundle(src) => {
            install_app_bundle(src, &config.installed_app_path()).map(InstallOutcome::Copied)
        }
        Artifact::Msi(msi) => install_msi(msi, msi_action, runners, confirm),
        Artifact::AppImage(src) => {
            install_appimage(src, &config.appimage_install_path(home)).map(InstallOutcome::Copied)
        }
        Artifact::Deb(deb) => {
            install_deb(deb, runners.inherited)?;
            Ok(InstallOutcome::PackageInstalled(deb.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallerError;
    use std::cell::RefCell;

    thread_local! {
        static CALLS: RefCell<Vec<(String, Vec<String>)>> = const { RefCell::new(Vec::new()) };
    }

    fn record(program: &str, args: &[String]) {
        CALLS.with(|c| c.borrow_mut().push((program.to_string(), args.to_vec())));
    }

    fn calls() -> Vec<(String, Vec<String>)> {
        CALLS.with(|c| c.borrow().clone())
    }

    fn run_ok(program: &str, args: &[String], _dir: &Path) -> Result<()> {
        record(program, args);
        Ok(())
    }

    fn run_fails(program: &str, args: &[String], _dir: &Path) -> Result<()> {
        record(program, args);
        Err(InstallerError::CommandFailed {
            command: program.to_string(),
            code: Some(1603),
            output: String::new(),
        }
        .into())
    }

    fn open_ok(_platform: &Platform, path: &Path) -> Result<()> {
        record("open", &[path.display().to_string()]);
        Ok(())
    }

    fn fake_runners(run: RunFn) -> Runners {
        Runners {
            captured: run,
            inherited: run,
            open: open_ok,
        }
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fake_bundle(root: &Path) -> PathBuf {
        let app = root.join("build/Film Grain Generator.app");
        write(&app.join("Contents/Info.plist"), "<plist/>");
        write(&app.join("Contents/MacOS/film-grain-generator"), "bin-v2");
        app
    }

    #[test]
    fn test_copy_dir_all_keeps_layout() {
        let dir = tempfile::tempdir().unwrap();
        let src = fake_bundle(dir.path());
        let dest = dir.path().join("copy");

        copy_dir_all(&src, &dest).unwrap();
        assert_eq!(
            fs::read_to_string(dest.join("Contents/MacOS/film-grain-generator")).unwrap(),
            "bin-v2"
        );
        assert!(dest.join("Contents/Info.plist").is_file());
    }

    #[test]
    fn test_existing_install_fully_removed() {
        let dir = tempfile::tempdir().unwrap();
        let src = fake_bundle(dir.path());
        let dest = dir.path().join("Applications/Film Grain Generator.app");
        write(&dest.join("Contents/MacOS/film-grain-generator"), "bin-v1");
        write(&dest.join("Contents/Resources/stale.icns"), "old");

        let installed = install_app_bundle(&src, &dest).unwrap();
        assert_eq!(installed, dest);
        assert!(!dest.join("Contents/Resources/stale.icns").exists());
        assert_eq!(
            fs::read_to_string(dest.join("Contents/MacOS/film-grain-generator")).unwrap(),
            "bin-v2"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_bundle_symlinks_and_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let src = fake_bundle(dir.path());
        std::os::unix::fs::symlink("MacOS/film-grain-generator", src.join("Contents/current"))
            .unwrap();
        let dest = dir.path().join("Applications/Film Grain Generator.app");

        install_app_bundle(&src, &dest).unwrap();
        assert_eq!(
            fs::read_link(dest.join("Contents/current")).unwrap(),
            PathBuf::from("MacOS/film-grain-generator")
        );
        let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }

    #[test]
    fn test_install_appimage_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("bundle/film-grain-generator_0.1.0_amd64.AppImage");
        write(&src, "appimage");
        let home = dir.path().join("home");
        let config = InstallerConfig::default();

        let outcome = install_artifact(
            &Artifact::AppImage(src),
            &config,
            &home,
            MsiAction::Quiet,
            &Runners::default(),
            |_| false,
        )
        .unwrap();

        let dest = home.join("Applications/Film Grain Generator.AppImage");
        assert_eq!(outcome, InstallOutcome::Copied(dest.clone()));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "appimage");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&dest).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o755);
        }
    }

    #[test]
    fn test_interactive_msi_declined_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        let msi = dir.path().join("Film Grain Generator_0.1.0_x64_en-US.msi");
        write(&msi, "msi");

        let mut asked = Vec::new();
        let outcome = install_msi(&msi, MsiAction::Interactive, &Runners::default(), |q| {
            asked.push(q.to_string());
            false
        })
        .unwrap();

        assert_eq!(asked, vec!["Would you like to run the installer now?"]);
        match outcome {
            InstallOutcome::InstallerReady(path) => {
                assert!(path.is_absolute());
                assert!(path.ends_with("Film Grain Generator_0.1.0_x64_en-US.msi"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_outcome_describe() {
        let outcome = InstallOutcome::InstallerReady(PathBuf::from("/tmp/x.msi"));
        assert_eq!(outcome.describe(), "Installer ready at: /tmp/x.msi");
    }

    #[test]
    fn test_quiet_msi_installs_with_msiexec() {
        let dir = tempfile::tempdir().unwrap();
        let msi = dir.path().join("Film Grain Generator_0.1.0_x64_en-US.msi");
        write(&msi, "msi");

        let outcome =
            install_msi(&msi, MsiAction::Quiet, &fake_runners(run_ok), |_| panic!("no prompt"))
                .unwrap();

        assert_eq!(outcome, InstallOutcome::PackageInstalled(msi.clone()));
        assert_eq!(
            calls(),
            vec![(
                "msiexec".to_string(),
                vec!["/i".to_string(), msi.display().to_string(), "/quiet".to_string()]
            )]
        );
    }

    #[test]
    fn test_quiet_msi_failure_opens_installer() {
        let dir = tempfile::tempdir().unwrap();
        let msi = dir.path().join("Film Grain Generator_0.1.0_x64_en-US.msi");
        write(&msi, "msi");

        let outcome =
            install_msi(&msi, MsiAction::Quiet, &fake_runners(run_fails), |_| panic!("no prompt"))
                .unwrap();

        assert_eq!(outcome, InstallOutcome::InstallerLaunched(msi.clone()));
        let calls = calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "msiexec");
        assert_eq!(calls[1], ("open".to_string(), vec![msi.display().to_string()]));
    }

    #[test]
    fn test_deb_goes_through_sudo_dpkg() {
        let dir = tempfile::tempdir().unwrap();
        let deb = dir.path().join("film-grain-generator_0.1.0_amd64.deb");
        write(&deb, "deb");

        let outcome = install_artifact(
            &Artifact::Deb(deb.clone()),
            &InstallerConfig::default(),
            dir.path(),
            MsiAction::Quiet,
            &fake_runners(run_ok),
            |_| false,
        )
        .unwrap();

        assert_eq!(outcome, InstallOutcome::PackageInstalled(deb.clone()));
        assert_eq!(
            calls(),
            vec![(
                "sudo".to_string(),
                vec!["dpkg".to_string(), "-i".to_string(), deb.display().to_string()]
            )]
        );
    }

    #[test]
    fn test_deb_failure_is_command_failed() {
        let dir = tempfile::tempdir().unwrap();
        let deb = dir.path().join("film-grain-generator_0.1.0_amd64.deb");

        let err = install_deb(&deb, run_fails).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InstallerError>(),
            Some(InstallerError::CommandFailed { code: Some(1603), .. })
        ));
        assert_eq!(calls().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_existing_propagates_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain-file");
        write(&file, "x");

        assert!(!remove_existing(&dir.path().join("absent")).unwrap());
        // A path below a regular file fails with ENOTDIR, not NotFound.
        assert!(remove_existing(&file.join("Film Grain Generator.app")).is_err());
        assert!(file.exists());
    }
}
