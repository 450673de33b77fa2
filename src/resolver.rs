use crate::error::{DxError, Result};
use crate::locator::{self, Installation};
use crate::metadata::{self, CommandRecord};
use fs_err as fs;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A command record together with the file and installation it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCommand {
    pub record: CommandRecord,
    pub path: PathBuf,
    pub installation: PathBuf,
}

/// Name to winning command. Iteration order is lexicographic by name.
pub type CommandTable = BTreeMap<String, ResolvedCommand>;

/// Command files of one installation, sorted by file name.
pub fn command_files(commands_dir: &Path) -> Result<Vec<PathBuf>> {
    if !commands_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(commands_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Records exposed by a single installation. A name declared twice goes to the file that
/// sorts last.
pub fn installation_commands(inst: &Installation) -> Result<BTreeMap<String, ResolvedCommand>> {
    let mut out = BTreeMap::new();
    for path in command_files(&inst.commands_dir())? {
        let record = match metadata::extract(&path) {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(path = %path.display(), "not a command file");
                continue;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable command file skipped");
                continue;
            }
        };
        let name = record.name.clone();
        let resolved = ResolvedCommand {
            record,
            path,
            installation: inst.root().to_path_buf(),
        };
        if let Some(prev) = out.insert(name.clone(), resolved) {
            tracing::warn!(
                command = %name,
                shadowed = %prev.path.display(),
                "command declared twice in one installation"
            );
        }
    }
    Ok(out)
}

/// Merges installations given nearest first: the first installation defining a name wins.
pub fn resolve_table(installations: &[Installation]) -> Result<CommandTable> {
    let mut table = CommandTable::new();
    for inst in installations {
        for (name, cmd) in installation_commands(inst)? {
            table.entry(name).or_insert(cmd);
        }
    }
    Ok(table)
}

/// Located installations plus their merged command table for one working directory.
#[derive(Debug, Clone)]
pub struct Stack {
    pub cwd: PathBuf,
    pub installations: Vec<Installation>,
    pub table: CommandTable,
}

impl Stack {
    pub fn discover(cwd: &Path) -> Result<Self> {
        let installations = locator::locate(cwd);
        let table = resolve_table(&installations)?;
        Ok(Self {
            cwd: cwd.to_path_buf(),
            installations,
            table,
        })
    }

    /// Nearest installation, or `NoInstallationFound` when the stack is empty.
    pub fn nearest(&self) -> Result<&Installation> {
        self.installations
            .first()
            .ok_or_else(|| DxError::NoInstallationFound(self.cwd.clone()))
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedCommand> {
        self.table.get(name)
    }
}
