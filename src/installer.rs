use crate::config::{RcFile, INSTALL_COMMANDS_SECTION};
use crate::error::{DxError, Result};
use crate::fetch::SourceFetcher;
use crate::locator::{Installation, COMMANDS_DIR};
use crate::metadata::{self, Provenance};
use crate::platform::platform;
use crate::resolver::command_files;
use fs_err as fs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Fetches `source`, copies its `commands/` files into `inst` and stamps their provenance.
/// Returns the number of files installed.
pub fn install_from_source(fetcher: &dyn SourceFetcher, inst: &Installation, source: &str) -> Result<usize> {
    // Dropped on every return path, which removes the fetched tree.
    let scratch = TempDir::new()?;
    let checkout = scratch.path().join("source");
    let revision = fetcher.fetch(source, &checkout)?;
    tracing::debug!(%source, %revision, "fetched command source");

    let src_commands = checkout.join(COMMANDS_DIR);
    if !src_commands.is_dir() {
        return Err(DxError::invalid_source(source, "no commands/ directory"));
    }
    let files = text_files(&command_files(&src_commands)?)?;
    reject_duplicate_names(source, &files)?;

    let dest_dir = inst.commands_dir();
    fs::create_dir_all(&dest_dir)?;
    let provenance = Provenance {
        source_location: source.to_string(),
        revision_id: revision,
    };
    for file in &files {
        let Some(file_name) = file.file_name() else { continue };
        let target = dest_dir.join(file_name);
        fs::copy(file, &target)?;
        metadata::inject_file(&target, &provenance)?;
        platform().make_executable(&target)?;
        tracing::debug!(target = %target.display(), "installed command file");
    }
    Ok(files.len())
}

/// Drops files that are not UTF-8 text. They cannot carry a header, so they are not commands.
fn text_files(files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::with_capacity(files.len());
    for file in files {
        if std::str::from_utf8(&fs::read(file)?).is_ok() {
            out.push(file.clone());
        } else {
            tracing::warn!(path = %file.display(), "skipping non-text file in source");
        }
    }
    Ok(out)
}

fn reject_duplicate_names(source: &str, files: &[PathBuf]) -> Result<()> {
    let mut seen: HashMap<String, &PathBuf> = HashMap::new();
    for file in files {
        // Headerless files get a header named after their stem on install.
        let name = match metadata::extract(file)? {
            Some(record) => record.name,
            None => file
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
        };
        if let Some(first) = seen.insert(name.clone(), file) {
            return Err(DxError::invalid_source(
                source,
                format!(
                    "command '{}' is declared by both {} and {}",
                    name,
                    first.file_name().unwrap_or_default().to_string_lossy(),
                    file.file_name().unwrap_or_default().to_string_lossy()
                ),
            ));
        }
    }
    Ok(())
}

/// Per-source results of a batch install.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub installed: Vec<(String, usize)>,
    pub failed: Vec<(String, DxError)>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.installed.len() + self.failed.len()
    }

    /// `Some(BatchPartialFailure)` when any source failed.
    pub fn partial_failure(&self) -> Option<DxError> {
        (!self.failed.is_empty()).then(|| DxError::BatchPartialFailure {
            failed: self.failed.len(),
            total: self.total(),
        })
    }

    /// Fails only when no source could be installed at all.
    pub fn into_result(self) -> Result<Self> {
        if self.installed.is_empty() && !self.failed.is_empty() {
            return Err(DxError::BatchPartialFailure {
                failed: self.failed.len(),
                total: self.total(),
            });
        }
        Ok(self)
    }
}

/// Sources listed under `[install-commands]` in the installation's `.dxrc`.
pub fn batch_sources(inst: &Installation) -> Result<Vec<String>> {
    let rc_path = inst.rc_path();
    let rc = RcFile::load(&rc_path)?;
    let sources: Vec<String> = rc
        .section(INSTALL_COMMANDS_SECTION)
        .into_iter()
        .map(|line| resolve_source(inst.root(), line))
        .collect();
    if sources.is_empty() {
        return Err(DxError::Config(format!(
            "no sources listed under [{INSTALL_COMMANDS_SECTION}] in {}",
            rc_path.display()
        )));
    }
    Ok(sources)
}

/// Anchors a relative filesystem path at `root`. URLs and `host:path` references pass through.
fn resolve_source(root: &Path, source: &str) -> String {
    if source.contains("://") || Path::new(source).is_absolute() {
        return source.to_string();
    }
    let scp_like = match (source.find(':'), source.find('/')) {
        (Some(colon), Some(slash)) => colon < slash,
        (Some(_), None) => true,
        _ => false,
    };
    if scp_like {
        return source.to_string();
    }
    root.join(source).to_string_lossy().to_string()
}

/// Installs `sources` in order. A failing source is logged and skipped.
pub fn install_sources(fetcher: &dyn SourceFetcher, inst: &Installation, sources: &[String]) -> Result<BatchReport> {
    let mut report = BatchReport::default();
    for source in sources.iter().cloned() {
        match install_from_source(fetcher, inst, &source) {
            Ok(count) => {
                println!("Installed {count} command(s) from {source}");
                report.installed.push((source, count));
            }
            Err(e) => {
                tracing::error!(%source, error = %e, "install failed; continuing with next source");
                eprintln!("error: {e}");
                report.failed.push((source, e));
            }
        }
    }
    report.into_result()
}
