pub fn platform() -> &'static dyn PlatformOps {
    &ConcretePlatform
}

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

pub trait PlatformOps: Sync + Send {
    fn home_dir(&self) -> Option<PathBuf>;
    /// Where `.install-globally` places the launcher.
    fn global_bin_dir(&self) -> Option<PathBuf>;
    fn final_binary_name(&self, base: &str) -> String;
    fn make_executable(&self, path: &Path) -> Result<()>;
    /// Configures `cmd` so the spawned process outlives this one.
    fn detach(&self, cmd: &mut Command);
    /// Exit code to forward for a finished child.
    fn exit_code(&self, status: ExitStatus) -> i32;
    /// Shell snippet that puts `dir` on PATH.
    fn path_export(&self, dir: &Path) -> String;
}

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::UNIX_PLATFORM as ConcretePlatform;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::WINDOWS_PLATFORM as ConcretePlatform;
