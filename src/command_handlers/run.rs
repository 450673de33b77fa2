use crate::error::{DxError, Result};
use crate::platform::platform;
use crate::resolver::ResolvedCommand;
use std::process::Command;

/// Exported to every command: root of the installation that provided it.
pub const ROOT_ENV: &str = "DX_ROOT";

/// Fails on the first `requires` entry that is not on PATH.
pub fn check_requirements(cmd: &ResolvedCommand) -> Result<()> {
    for tool in &cmd.record.requires {
        if which::which(tool).is_err() {
            return Err(DxError::MissingRequiredTool(tool.clone()));
        }
    }
    Ok(())
}

/// Runs the command's file as a child process with `args` verbatim and returns the exit code
/// to forward.
pub fn run_command(cmd: &ResolvedCommand, args: &[String]) -> Result<i32> {
    check_requirements(cmd)?;
    tracing::debug!(command = %cmd.record.name, path = %cmd.path.display(), ?args, "running");
    let status = Command::new(&cmd.path)
        .args(args)
        .env(ROOT_ENV, &cmd.installation)
        .status()
        .map_err(|e| {
            DxError::Io(std::io::Error::new(
                e.kind(),
                format!("running {}: {e}", cmd.path.display()),
            ))
        })?;
    Ok(platform().exit_code(status))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::locator::testutil::{make_installation, write_command};
    use crate::resolver::Stack;

    #[test]
    fn forwards_args_and_exit_code() {
        let tmp = tempfile::TempDir::new().unwrap();
        let inst = make_installation(tmp.path());
        let out = tmp.path().join("out.txt");
        let path = inst.commands_dir().join("echo-args");
        std::fs::write(
            &path,
            format!(
                "#!/bin/sh\n# dx-meta-begin\n# name echo-args\n# dx-meta-end\nprintf '%s|' \"$@\" \"$DX_ROOT\" > '{}'\nexit 7\n",
                out.display()
            ),
        )
        .unwrap();
        platform().make_executable(&path).unwrap();
        let stack = Stack::discover(tmp.path()).unwrap();

        let code = run_command(stack.get("echo-args").unwrap(), &["--flag".into(), "two words".into()]).unwrap();
        assert_eq!(code, 7);
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            format!("--flag|two words|{}|", tmp.path().display())
        );
    }

    #[test]
    fn missing_requirement_blocks_the_run() {
        let tmp = tempfile::TempDir::new().unwrap();
        let inst = make_installation(tmp.path());
        let path = write_command(&inst, "needy", "needy", "Needs things");
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, text.replace("# dx-meta-end", "# requires dx-no-such-tool-xyz\n# dx-meta-end")).unwrap();
        let stack = Stack::discover(tmp.path()).unwrap();
        let err = run_command(stack.get("needy").unwrap(), &[]).unwrap_err();
        assert!(matches!(err, DxError::MissingRequiredTool(t) if t == "dx-no-such-tool-xyz"));
    }
}
