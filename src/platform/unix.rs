use crate::error::Result;
use crate::platform::PlatformOps;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

pub static UNIX_PLATFORM: Unix = Unix;

pub struct Unix;

impl PlatformOps for Unix {
    fn home_dir(&self) -> Option<PathBuf> {
        std::env::var_os("HOME").map(PathBuf::from).or_else(dirs::home_dir)
    }
    fn global_bin_dir(&self) -> Option<PathBuf> {
        dirs::data_local_dir()
            .or_else(|| self.home_dir().map(|h| h.join(".local").join("share")))
            .map(|d| d.join("dx").join("bin"))
    }
    fn final_binary_name(&self, base: &str) -> String {
        base.to_string()
    }
    fn make_executable(&self, path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs_err::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o755);
        fs_err::set_permissions(path, perms)?;
        Ok(())
    }
    fn detach(&self, cmd: &mut Command) {
        use std::os::unix::process::CommandExt;
        // New session: no controlling terminal, so neither Ctrl-C nor the terminal's SIGHUP
        // reaches it.
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }
    fn exit_code(&self, status: ExitStatus) -> i32 {
        use std::os::unix::process::ExitStatusExt;
        match (status.code(), status.signal()) {
            (Some(code), _) => code,
            (None, Some(sig)) => 128 + sig,
            (None, None) => 1,
        }
    }
    fn path_export(&self, dir: &Path) -> String {
        format!("export PATH=\"{}:$PATH\"", dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_exit_maps_to_128_plus_signal() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(UNIX_PLATFORM.exit_code(ExitStatus::from_raw(3 << 8)), 3);
        assert_eq!(UNIX_PLATFORM.exit_code(ExitStatus::from_raw(9)), 137);
    }

    #[test]
    fn make_executable_sets_exec_bits() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("cmd");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        UNIX_PLATFORM.make_executable(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn detached_child_runs_in_its_own_session() {
        let mut cmd = Command::new("/bin/sh");
        cmd.args(["-c", "cut -d' ' -f6 /proc/$$/stat"]);
        UNIX_PLATFORM.detach(&mut cmd);
        let out = cmd.output().unwrap();
        assert!(out.status.success());
        let child_sid: i32 = String::from_utf8_lossy(&out.stdout).trim().parse().unwrap();
        let own_sid = unsafe { libc::getsid(0) };
        assert_ne!(child_sid, own_sid);
    }
}
