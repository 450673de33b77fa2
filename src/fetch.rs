use crate::error::{DxError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

/// Something that can materialize a source reference into a local directory.
pub trait SourceFetcher {
    /// Fetches `source` into `dest` (which must not exist yet) and returns the revision id of
    /// the fetched snapshot.
    fn fetch(&self, source: &str, dest: &Path) -> Result<String>;
}

/// Fetches with `git clone --depth 1`.
pub struct GitFetcher {
    git: PathBuf,
}

impl GitFetcher {
    /// Fails with `MissingRequiredTool` when git is not on PATH.
    pub fn new() -> Result<Self> {
        let git = which::which("git").map_err(|_| DxError::MissingRequiredTool("git".into()))?;
        Ok(Self { git })
    }

    fn spinner(&self, source: &str) -> Option<ProgressBar> {
        if std::env::var_os("DX_NO_SPINNER").is_some() || !std::io::stderr().is_terminal() {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Fetching {source}"));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

impl SourceFetcher for GitFetcher {
    fn fetch(&self, source: &str, dest: &Path) -> Result<String> {
        let pb = self.spinner(source);
        tracing::debug!(%source, dest = %dest.display(), "git clone");
        let output = Command::new(&self.git)
            .args(["clone", "--depth", "1", "--quiet", source])
            .arg(dest)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| DxError::fetch(source, e.to_string()))?;
        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DxError::fetch(source, stderr.trim().to_string()));
        }
        let rev = Command::new(&self.git)
            .arg("-C")
            .arg(dest)
            .args(["rev-parse", "HEAD"])
            .output()
            .map_err(|e| DxError::fetch(source, e.to_string()))?;
        if !rev.status.success() {
            return Err(DxError::fetch(source, "could not resolve fetched revision"));
        }
        Ok(String::from_utf8_lossy(&rev.stdout).trim().to_string())
    }
}

/// Recursively copies `from` into `to`, skipping `.git`. Existing files are overwritten.
pub fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    use fs_err as fs;
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        let target = to.join(entry.file_name());
        let ty = entry.file_type()?;
        if ty.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else if ty.is_file() {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use std::collections::HashMap;

    /// Serves source references from local directories; unknown references fail to fetch.
    #[derive(Default)]
    pub struct DirFetcher {
        pub sources: HashMap<String, (PathBuf, String)>,
    }

    impl DirFetcher {
        pub fn with(mut self, source: &str, dir: &Path, rev: &str) -> Self {
            self.sources
                .insert(source.to_string(), (dir.to_path_buf(), rev.to_string()));
            self
        }
    }

    impl SourceFetcher for DirFetcher {
        fn fetch(&self, source: &str, dest: &Path) -> Result<String> {
            let Some((dir, rev)) = self.sources.get(source) else {
                return Err(DxError::fetch(source, "repository not found"));
            };
            copy_tree(dir, dest)?;
            Ok(rev.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_tree_skips_git_and_overwrites() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join(".git")).unwrap();
        std::fs::create_dir_all(src.join("commands")).unwrap();
        std::fs::write(src.join(".git/HEAD"), "ref").unwrap();
        std::fs::write(src.join("commands/a"), "new").unwrap();
        let dst = tmp.path().join("dst");
        std::fs::create_dir_all(dst.join("commands")).unwrap();
        std::fs::write(dst.join("commands/a"), "old").unwrap();
        std::fs::write(dst.join("keep"), "k").unwrap();

        copy_tree(&src, &dst).unwrap();
        assert_eq!(std::fs::read_to_string(dst.join("commands/a")).unwrap(), "new");
        assert!(dst.join("keep").exists());
        assert!(!dst.join(".git").exists());
    }
}
