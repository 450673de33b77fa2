use crate::error::{DxError, Result};
use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upstream the self-updater pulls control files from when the manifest names none.
pub const DEFAULT_UPDATE_SOURCE: &str = "https://github.com/dx-cli/dx.git";

pub const RC_FILE: &str = ".dxrc";
pub const INSTALL_COMMANDS_SECTION: &str = "install-commands";

/// Installation manifest stored at `.dx/dx.toml`. Its presence marks an installation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Manifest {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,
    /// Control-directory subdirectories that survive a self-update untouched.
    #[serde(default = "default_preserve")]
    pub preserve: Vec<String>,
}

fn default_source() -> String {
    DEFAULT_UPDATE_SOURCE.to_string()
}

fn default_preserve() -> Vec<String> {
    vec!["commands".to_string()]
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            source: default_source(),
            preserve: default_preserve(),
        }
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::parse(&data).map_err(|e| DxError::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(data: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(data)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_str =
            toml::to_string_pretty(self).map_err(|e| DxError::Config(format!("serializing manifest: {e}")))?;
        fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn semver(&self) -> Option<semver::Version> {
        self.version
            .as_deref()
            .and_then(|v| semver::Version::parse(v.trim().trim_start_matches('v')).ok())
    }
}

/// Line-oriented `.dxrc`: `[section]` headers followed by free-form lines.
#[derive(Debug, Default, Clone)]
pub struct RcFile {
    sections: Vec<(String, Vec<String>)>,
}

impl RcFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DxError::Config(format!("{} not found", path.display())));
        }
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn parse(data: &str) -> Self {
        let mut sections: Vec<(String, Vec<String>)> = Vec::new();
        for raw in data.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                sections.push((name.trim().to_string(), Vec::new()));
                continue;
            }
            // Lines before the first section header belong to no section.
            if let Some((_, body)) = sections.last_mut() {
                body.push(line.to_string());
            }
        }
        Self { sections }
    }

    /// All lines of every section called `name`, in file order.
    pub fn section(&self, name: &str) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|(n, _)| n == name)
            .flat_map(|(_, body)| body.iter().map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rc_only_reads_install_commands_section() {
        let rc = RcFile::parse(
            "stray-line\n[other]\nhttps://nope.git\n\n[install-commands]\n# comment\nhttps://a.git\n\n  ../local/cmds  \n; also comment\n[tail]\nx\n",
        );
        assert_eq!(rc.section(INSTALL_COMMANDS_SECTION), vec!["https://a.git", "../local/cmds"]);
        assert_eq!(rc.section("other"), vec!["https://nope.git"]);
        assert!(rc.section("missing").is_empty());
    }

    #[test]
    fn repeated_sections_concatenate() {
        let rc = RcFile::parse("[install-commands]\na\n[x]\n[install-commands]\nb\n");
        assert_eq!(rc.section(INSTALL_COMMANDS_SECTION), vec!["a", "b"]);
    }

    #[test]
    fn missing_rc_is_a_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = RcFile::load(&dir.path().join(RC_FILE)).unwrap_err();
        assert!(matches!(err, DxError::Config(_)));
    }

    #[test]
    fn manifest_defaults() {
        let m = Manifest::parse("").unwrap();
        assert_eq!(m.source, DEFAULT_UPDATE_SOURCE);
        assert_eq!(m.preserve, vec!["commands"]);
        assert!(m.version.is_none());
        let m = Manifest::parse("version = \"v1.2.3\"\npreserve = [\"commands\", \"local\"]\n").unwrap();
        assert_eq!(m.semver(), Some(semver::Version::new(1, 2, 3)));
        assert_eq!(m.preserve.len(), 2);
    }

    #[test]
    fn manifest_round_trips_through_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dx.toml");
        let m = Manifest::default();
        m.save(&path).unwrap();
        assert_eq!(Manifest::load(&path).unwrap(), m);
    }
}
