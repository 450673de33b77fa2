//! In-place replacement of an installation's control tree.
//!
//! The initiating `dx` fetches the new tree and plans the update, then re-launches a copy of
//! its own executable (placed outside the installation) as a detached process that performs
//! the destructive steps. The initiator never waits for it.

use crate::config::Manifest;
use crate::error::{DxError, Result};
use crate::fetch::{copy_tree, SourceFetcher};
use crate::locator::{Installation, COMMANDS_DIR, MANIFEST_FILE};
use crate::platform::platform;
use crate::resolver::command_files;
use chrono::{DateTime, Local};
use clap::Parser;
use fs_err as fs;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Hidden first argument that switches `dx` into the background update procedure.
pub const APPLY_UPDATE_ARG: &str = "__dx-apply-update";

const UPDATER_BIN: &str = "dx-updater";

/// Everything the background procedure needs, passed on its command line.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = APPLY_UPDATE_ARG, about = "internal: apply a fetched dx update")]
pub struct UpdatePlan {
    /// Control directory being replaced.
    #[arg(long)]
    pub control: PathBuf,
    /// Fetched control tree.
    #[arg(long)]
    pub fetched: PathBuf,
    /// Where the pre-update snapshot goes.
    #[arg(long)]
    pub backup: PathBuf,
    /// Holding area for preserved subdirectories while the tree is overwritten.
    #[arg(long)]
    pub staging: PathBuf,
    /// Temporary root holding the fetch and the updater copy; removed last.
    #[arg(long)]
    pub scratch: PathBuf,
    #[arg(long)]
    pub preserve: Vec<String>,
}

impl UpdatePlan {
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--control".into(),
            self.control.clone().into(),
            "--fetched".into(),
            self.fetched.clone().into(),
            "--backup".into(),
            self.backup.clone().into(),
            "--staging".into(),
            self.staging.clone().into(),
            "--scratch".into(),
            self.scratch.clone().into(),
        ];
        for p in &self.preserve {
            args.push("--preserve".into());
            args.push(p.into());
        }
        args
    }

    pub fn log_path(&self) -> PathBuf {
        let mut name = self
            .backup
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from(".dx-backup"));
        name.push(".log");
        self.backup.with_file_name(name)
    }
}

/// First `<root>/<prefix><stamp>[-N]` such that neither it nor its log exists.
fn unique_sibling(root: &Path, prefix: &str, now: DateTime<Local>) -> PathBuf {
    let stamp = now.format("%Y%m%d%H%M%S").to_string();
    let taken = |p: &Path| {
        let mut log = p.as_os_str().to_os_string();
        log.push(".log");
        p.exists() || Path::new(&log).exists()
    };
    let mut candidate = root.join(format!("{prefix}{stamp}"));
    let mut n = 1;
    while taken(&candidate) {
        candidate = root.join(format!("{prefix}{stamp}-{n}"));
        n += 1;
    }
    candidate
}

fn valid_preserve_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Fetches the latest control tree and plans the update. Nothing in the installation is
/// touched; on error the fetched tree is discarded.
pub fn prepare_update(
    fetcher: &dyn SourceFetcher,
    inst: &Installation,
    source_override: Option<&str>,
) -> Result<UpdatePlan> {
    let manifest = inst.manifest()?;
    let source = source_override.unwrap_or(&manifest.source);

    let scratch = TempDir::new()?;
    let fetched = scratch.path().join("source");
    let revision = fetcher.fetch(source, &fetched)?;
    let fetched_manifest_path = fetched.join(MANIFEST_FILE);
    if !fetched_manifest_path.is_file() {
        return Err(DxError::invalid_source(source, format!("no {MANIFEST_FILE} at the top level")));
    }
    match (manifest.semver(), Manifest::load(&fetched_manifest_path).ok().and_then(|m| m.semver())) {
        (Some(installed), Some(latest)) if latest < installed => {
            tracing::warn!(%installed, %latest, "fetched version is older than the installed one")
        }
        (Some(installed), Some(latest)) => tracing::info!(%installed, %latest, "updating"),
        _ => tracing::info!(%revision, "updating to fetched revision"),
    }

    let preserve: Vec<String> = manifest
        .preserve
        .iter()
        .filter(|p| {
            let ok = valid_preserve_name(p);
            if !ok {
                tracing::warn!(name = %p, "ignoring invalid preserve entry");
            }
            ok
        })
        .cloned()
        .collect();

    let now = Local::now();
    let plan = UpdatePlan {
        control: inst.control_dir(),
        fetched,
        backup: unique_sibling(inst.root(), ".dx-backup-", now),
        staging: unique_sibling(inst.root(), ".dx-preserve-", now),
        scratch: scratch.keep(),
        preserve,
    };
    tracing::debug!(?plan, "update planned");
    Ok(plan)
}

/// Starts the background procedure and returns without waiting for it.
pub fn launch(plan: &UpdatePlan) -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    launch_from(&exe, plan)
}

/// Runs a copy of `exe` placed in the plan's scratch directory. On failure the scratch
/// directory and the log are removed again.
fn launch_from(exe: &Path, plan: &UpdatePlan) -> Result<PathBuf> {
    let log_path = plan.log_path();
    let spawned = (|| -> Result<std::process::Child> {
        let updater = plan.scratch.join(platform().final_binary_name(UPDATER_BIN));
        fs::copy(exe, &updater)?;
        platform().make_executable(&updater)?;

        let log = std::fs::File::create(&log_path)?;
        let mut cmd = Command::new(&updater);
        cmd.arg(APPLY_UPDATE_ARG)
            .args(plan.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log));
        platform().detach(&mut cmd);
        cmd.spawn()
            .map_err(|e| DxError::Io(std::io::Error::new(e.kind(), format!("starting {}: {e}", updater.display()))))
    })();
    match spawned {
        Ok(child) => {
            tracing::debug!(pid = child.id(), "background updater started");
            Ok(log_path)
        }
        Err(e) => {
            let _ = fs::remove_dir_all(&plan.scratch);
            if log_path.exists() {
                let _ = fs::remove_file(&log_path);
            }
            Err(e)
        }
    }
}

/// Writes the fetched manifest's version while keeping the installed `source` and `preserve`.
fn carry_manifest_settings(installed: &Manifest, plan: &UpdatePlan) -> Result<()> {
    let path = plan.control.join(MANIFEST_FILE);
    let fetched = Manifest::load(&plan.fetched.join(MANIFEST_FILE))?;
    let merged = Manifest {
        version: fetched.version,
        source: installed.source.clone(),
        preserve: installed.preserve.clone(),
    };
    merged.save(&path)
}

fn move_dir(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    copy_tree(from, to)?;
    fs::remove_dir_all(from)?;
    Ok(())
}

fn step(what: &str, res: Result<()>) {
    match res {
        Ok(()) => tracing::info!("{what}: done"),
        Err(e) => tracing::error!(error = %e, "{what}: failed, continuing"),
    }
}

/// The background procedure. Only the backup may abort it; every later step logs and
/// carries on, leaving the snapshot as the recovery path.
pub fn apply_update(plan: &UpdatePlan) -> Result<()> {
    tracing::info!(control = %plan.control.display(), backup = %plan.backup.display(), "applying update");
    if let Err(e) = copy_tree(&plan.control, &plan.backup) {
        tracing::error!(error = %e, "backup failed; installation left untouched");
        let _ = fs::remove_dir_all(&plan.scratch);
        return Err(e);
    }

    // Read from the snapshot so the live copy can be overwritten freely.
    let installed = Manifest::load(&plan.backup.join(MANIFEST_FILE));

    let mut staged = Vec::new();
    for name in &plan.preserve {
        let live = plan.control.join(name);
        if !live.exists() {
            continue;
        }
        let held = plan.staging.join(name);
        match move_dir(&live, &held) {
            Ok(()) => staged.push(name),
            Err(e) => tracing::error!(%name, error = %e, "could not set aside preserved directory"),
        }
    }

    step("overwrite control tree", copy_tree(&plan.fetched, &plan.control));
    match &installed {
        Ok(installed) => step("keep manifest settings", carry_manifest_settings(installed, plan)),
        Err(e) => tracing::error!(error = %e, "installed manifest unreadable; using the fetched one as is"),
    }

    for name in staged {
        let live = plan.control.join(name);
        let held = plan.staging.join(name);
        step(&format!("restore {name}"), (|| -> Result<()> {
            if live.exists() {
                fs::remove_dir_all(&live)?;
            }
            move_dir(&held, &live)
        })());
    }
    if plan.staging.exists() {
        step("remove staging", fs::remove_dir_all(&plan.staging).map_err(DxError::from));
    }

    step("restore executable bits", (|| -> Result<()> {
        for file in command_files(&plan.control.join(COMMANDS_DIR))? {
            platform().make_executable(&file)?;
        }
        Ok(())
    })());

    tracing::info!(backup = %plan.backup.display(), "update finished; backup kept for manual recovery");
    // Last: drop the fetched tree and the updater copy this process runs from.
    step("remove scratch", fs::remove_dir_all(&plan.scratch).map_err(DxError::from));
    Ok(())
}
