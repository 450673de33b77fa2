use crate::error::Result;
use crate::platform::PlatformOps;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

pub static WINDOWS_PLATFORM: Windows = Windows;

pub struct Windows;

const DETACHED_PROCESS: u32 = 0x0000_0008;
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

impl PlatformOps for Windows {
    fn home_dir(&self) -> Option<PathBuf> { std::env::var_os("USERPROFILE").map(PathBuf::from) }
    fn global_bin_dir(&self) -> Option<PathBuf> { dirs::data_local_dir().map(|d| d.join("dx").join("bin")) }
    fn final_binary_name(&self, base: &str) -> String { if base.ends_with(".exe") { base.to_string() } else { format!("{base}.exe") } }
    fn make_executable(&self, _path: &Path) -> Result<()> { Ok(()) }
    fn detach(&self, cmd: &mut Command) {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }
    fn exit_code(&self, status: ExitStatus) -> i32 { status.code().unwrap_or(1) }
    fn path_export(&self, dir: &Path) -> String { format!("$Env:PATH = \"{};\" + $Env:PATH", dir.display()) }
}
