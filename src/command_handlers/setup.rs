use crate::platform::platform;
use anyhow::{Context, Result};
use fs_err as fs;
use std::path::{Path, PathBuf};

// Marker line identifying our block inside a shell profile.
const PROFILE_MARKER: &str = "# dx global launcher";

/// Copies the running executable into the global bin dir and makes sure shell profiles put
/// that directory on PATH.
pub fn install_globally() -> Result<()> {
    let p = platform();
    let bin_dir = p
        .global_bin_dir()
        .context("cannot determine a global bin directory for this user")?;
    let exe = std::env::current_exe().context("locating the running dx executable")?;
    let target = bin_dir.join(p.final_binary_name("dx"));
    fs::create_dir_all(&bin_dir)?;
    if exe != target {
        fs::copy(&exe, &target)?;
    }
    p.make_executable(&target)?;
    println!("Installed dx launcher at {}", target.display());

    let snippet = format!("{PROFILE_MARKER}\n{}", p.path_export(&bin_dir));
    let mut wrote_any = false;
    if let Some(home) = p.home_dir() {
        for (path, create_ok) in profile_candidates(&home) {
            if path.exists() || create_ok {
                append_if_missing(&path, &snippet)?;
                println!("Ensured dx is on PATH in {}", path.display());
                wrote_any = true;
            }
        }
    }
    if !wrote_any {
        println!("Could not locate a shell profile to update automatically. Add manually:\n\n{snippet}\n");
    } else {
        println!("Open a new shell or source your profile to pick up dx.");
    }
    Ok(())
}

/// Profile files to update, with whether they may be created when absent.
fn profile_candidates(home: &Path) -> Vec<(PathBuf, bool)> {
    if cfg!(windows) {
        return vec![(home.join(".bashrc"), false)];
    }
    vec![
        (home.join(".bashrc"), true),
        (home.join(".zshrc"), true),
        (home.join(".profile"), false),
        (home.join(".config/fish/config.fish"), false),
    ]
}

fn append_if_missing(path: &Path, snippet: &str) -> Result<()> {
    use std::io::Write;
    let existing = if path.exists() {
        fs::read_to_string(path)?
    } else {
        String::new()
    };
    if existing.contains(PROFILE_MARKER) {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = fs::OpenOptions::new().create(true).append(true).open(path)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        f.write_all(b"\n")?;
    }
    f.write_all(b"\n")?;
    f.write_all(snippet.as_bytes())?;
    f.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_is_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let rc = tmp.path().join(".bashrc");
        std::fs::write(&rc, "alias ll='ls -l'").unwrap();
        let snippet = format!("{PROFILE_MARKER}\nexport PATH=\"/x:$PATH\"");
        append_if_missing(&rc, &snippet).unwrap();
        append_if_missing(&rc, &snippet).unwrap();
        let text = std::fs::read_to_string(&rc).unwrap();
        assert_eq!(text.matches(PROFILE_MARKER).count(), 1);
        assert!(text.starts_with("alias ll='ls -l'\n\n# dx global launcher\n"));
    }

    #[test]
    fn creates_missing_profile() {
        let tmp = tempfile::TempDir::new().unwrap();
        let rc = tmp.path().join(".zshrc");
        append_if_missing(&rc, PROFILE_MARKER).unwrap();
        assert_eq!(std::fs::read_to_string(&rc).unwrap(), format!("\n{PROFILE_MARKER}\n"));
    }
}
