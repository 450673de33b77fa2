use crate::config::{Manifest, RC_FILE};
use crate::error::Result;
use fs_err as fs;
use std::path::{Path, PathBuf};

pub const CONTROL_DIR: &str = ".dx";
pub const MANIFEST_FILE: &str = "dx.toml";
pub const COMMANDS_DIR: &str = "commands";

/// A directory hosting a `.dx` control tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    root: PathBuf,
}

impl Installation {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn control_dir(&self) -> PathBuf {
        self.root.join(CONTROL_DIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.control_dir().join(MANIFEST_FILE)
    }

    pub fn commands_dir(&self) -> PathBuf {
        self.control_dir().join(COMMANDS_DIR)
    }

    pub fn rc_path(&self) -> PathBuf {
        self.root.join(RC_FILE)
    }

    pub fn is_installation(dir: &Path) -> bool {
        dir.join(CONTROL_DIR).join(MANIFEST_FILE).is_file()
    }

    pub fn manifest(&self) -> Result<Manifest> {
        Manifest::load(&self.manifest_path())
    }

    /// Creates a fresh installation in `root` with a default manifest.
    pub fn init(root: &Path) -> Result<Self> {
        let inst = Self::at(root);
        fs::create_dir_all(inst.commands_dir())?;
        if !inst.manifest_path().exists() {
            Manifest::default().save(&inst.manifest_path())?;
        }
        tracing::info!(root = %root.display(), "initialized installation");
        Ok(inst)
    }
}

/// Every ancestor of `start` (itself included) that hosts an installation, nearest first.
///
/// An empty result means there is no installation anywhere up to the filesystem root.
pub fn locate(start: &Path) -> Vec<Installation> {
    let mut found = Vec::new();
    let mut dir = start.to_path_buf();
    loop {
        if Installation::is_installation(&dir) {
            tracing::debug!(root = %dir.display(), "found installation");
            found.push(Installation::at(dir.clone()));
        }
        if !dir.pop() {
            break;
        }
    }
    found
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    pub fn make_installation(root: &Path) -> Installation {
        Installation::init(root).unwrap()
    }

    pub fn write_command(inst: &Installation, file: &str, name: &str, description: &str) -> PathBuf {
        let path = inst.commands_dir().join(file);
        std::fs::write(
            &path,
            format!("#!/bin/sh\n# dx-meta-begin\n# name {name}\n# description {description}\n# dx-meta-end\necho {name}\n"),
        )
        .unwrap();
        path
    }
}
