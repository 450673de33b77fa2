use crate::command_handlers::help::render_help;
use crate::command_handlers::{run, setup, Metacommand, METACOMMAND_MARKER};
use crate::error::DxError;
use crate::fetch::GitFetcher;
use crate::installer;
use crate::locator::Installation;
use crate::resolver::{ResolvedCommand, Stack};
use crate::self_update;
use crate::suggest::suggest;
use anyhow::Result;

/// What a requested name resolves to.
#[derive(Debug)]
pub enum DispatchState<'a> {
    ShowingHelp,
    RunningMetacommand(Metacommand),
    RunningSubcommand(&'a ResolvedCommand),
    Failed {
        error: DxError,
        suggestion: Option<String>,
    },
}

/// Every name a suggestion may point at: stacked commands and marked metacommands.
fn known_names(stack: &Stack) -> Vec<String> {
    stack
        .table
        .keys()
        .cloned()
        .chain(Metacommand::ALL.iter().map(|m| m.display_name()))
        .collect()
}

fn failed(stack: &Stack, requested: &str, error: DxError) -> DispatchState<'static> {
    let known = known_names(stack);
    let suggestion = suggest(requested, known.iter().map(String::as_str)).map(str::to_string);
    DispatchState::Failed { error, suggestion }
}

pub fn resolve_name<'a>(stack: &'a Stack, name: Option<&str>) -> DispatchState<'a> {
    let name = match name {
        None | Some("") | Some("help") => return DispatchState::ShowingHelp,
        Some(n) => n,
    };
    if let Some(meta) = name.strip_prefix(METACOMMAND_MARKER) {
        return match Metacommand::from_name(meta) {
            Some(m) => DispatchState::RunningMetacommand(m),
            None => failed(stack, name, DxError::UnknownMetacommand(meta.to_string())),
        };
    }
    match stack.get(name) {
        Some(cmd) => DispatchState::RunningSubcommand(cmd),
        None => failed(stack, name, DxError::UnknownCommand(name.to_string())),
    }
}

/// Resolves and runs `argv[0]` with the remaining arguments. Returns the process exit code.
pub fn dispatch(stack: &Stack, argv: &[String], verbose: bool) -> Result<i32> {
    let (name, args) = match argv.split_first() {
        Some((name, rest)) => (Some(name.as_str()), rest),
        None => (None, &[][..]),
    };
    match resolve_name(stack, name) {
        DispatchState::ShowingHelp => {
            print!("{}", render_help(stack, verbose));
            Ok(0)
        }
        DispatchState::RunningMetacommand(meta) => {
            if args.len() > meta.max_args() {
                let usage = format!("dx {} {}", meta.display_name(), meta.usage());
                return Ok(fail_with_help(stack, &DxError::Usage(usage.trim_end().to_string()), None, verbose));
            }
            run_metacommand(stack, meta, args.first().map(String::as_str))?;
            Ok(0)
        }
        DispatchState::RunningSubcommand(cmd) => Ok(run::run_command(cmd, args)?),
        DispatchState::Failed { error, suggestion } => {
            Ok(fail_with_help(stack, &error, suggestion.as_deref(), verbose))
        }
    }
}

fn fail_with_help(stack: &Stack, error: &DxError, suggestion: Option<&str>, verbose: bool) -> i32 {
    eprintln!("error: {error}");
    if let Some(s) = suggestion {
        eprintln!("did you mean '{s}'?");
    }
    if error.shows_help() {
        eprintln!();
        eprint!("{}", render_help(stack, verbose));
    }
    1
}

fn run_metacommand(stack: &Stack, meta: Metacommand, arg: Option<&str>) -> Result<()> {
    match meta {
        Metacommand::InstallCommands => install_commands(stack, arg),
        Metacommand::InstallGlobally => setup::install_globally(),
        Metacommand::Update => {
            let inst = stack.nearest()?;
            let fetcher = GitFetcher::new()?;
            let plan = self_update::prepare_update(&fetcher, inst, arg)?;
            let log = self_update::launch(&plan)?;
            println!("Update started in the background for {}", inst.root().display());
            println!("Backup of the current files: {}", plan.backup.display());
            println!("Progress is logged to {}", log.display());
            Ok(())
        }
    }
}

fn install_commands(stack: &Stack, source: Option<&str>) -> Result<()> {
    let target = match stack.nearest() {
        Ok(inst) => inst.clone(),
        Err(_) => Installation::at(&stack.cwd),
    };
    let fetcher = GitFetcher::new()?;
    // Read the batch list first so a missing .dxrc leaves no new installation behind.
    let batch = match source {
        Some(_) => Vec::new(),
        None => installer::batch_sources(&target)?,
    };
    if !Installation::is_installation(target.root()) {
        Installation::init(target.root())?;
        println!("Initialized a new dx installation in {}", target.root().display());
    }
    match source {
        Some(src) => {
            let count = installer::install_from_source(&fetcher, &target, src)?;
            println!("Installed {count} command(s) from {src}");
        }
        None => {
            let report = installer::install_sources(&fetcher, &target, &batch)?;
            if let Some(warning) = report.partial_failure() {
                eprintln!("warning: {warning}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::testutil::{make_installation, write_command};

    fn stack_with(names: &[&str]) -> (tempfile::TempDir, Stack) {
        let tmp = tempfile::TempDir::new().unwrap();
        let inst = make_installation(tmp.path());
        for n in names {
            write_command(&inst, n, n, "desc");
        }
        let stack = Stack::discover(tmp.path()).unwrap();
        (tmp, stack)
    }

    #[test]
    fn help_for_empty_and_help() {
        let (_tmp, stack) = stack_with(&[]);
        assert!(matches!(resolve_name(&stack, None), DispatchState::ShowingHelp));
        assert!(matches!(resolve_name(&stack, Some("help")), DispatchState::ShowingHelp));
    }

    #[test]
    fn metacommands_resolve_by_marker() {
        let (_tmp, stack) = stack_with(&["update"]);
        assert!(matches!(
            resolve_name(&stack, Some(".update")),
            DispatchState::RunningMetacommand(Metacommand::Update)
        ));
        // Without the marker the stacked command of the same name is used.
        assert!(matches!(
            resolve_name(&stack, Some("update")),
            DispatchState::RunningSubcommand(c) if c.record.name == "update"
        ));
    }

    #[test]
    fn unknown_metacommand_suggests() {
        let (_tmp, stack) = stack_with(&["build"]);
        match resolve_name(&stack, Some(".isntall-commands")) {
            DispatchState::Failed { error, suggestion } => {
                assert!(matches!(error, DxError::UnknownMetacommand(m) if m == "isntall-commands"));
                assert_eq!(suggestion.as_deref(), Some(".install-commands"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_command_suggests_metacommand_or_nothing() {
        let (_tmp, stack) = stack_with(&["build"]);
        match resolve_name(&stack, Some("isntall-commands")) {
            DispatchState::Failed { error, suggestion } => {
                assert!(matches!(error, DxError::UnknownCommand(_)));
                assert_eq!(suggestion.as_deref(), Some(".install-commands"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match resolve_name(&stack, Some("qqqqqqqq")) {
            DispatchState::Failed { suggestion, .. } => assert!(suggestion.is_none()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_names_exit_one() {
        let (_tmp, stack) = stack_with(&["build"]);
        assert_eq!(dispatch(&stack, &["nope".into()], false).unwrap(), 1);
        assert_eq!(dispatch(&stack, &[".nope".into()], false).unwrap(), 1);
        assert_eq!(dispatch(&stack, &[], false).unwrap(), 0);
    }

    #[test]
    fn extra_metacommand_args_are_a_usage_error() {
        let (_tmp, stack) = stack_with(&[]);
        let argv: Vec<String> = vec![".install-globally".into(), "extra".into()];
        assert_eq!(dispatch(&stack, &argv, false).unwrap(), 1);
    }

    #[test]
    fn update_without_installation_is_not_found() {
        let tmp = tempfile::TempDir::new().unwrap();
        let stack = Stack {
            cwd: tmp.path().to_path_buf(),
            installations: Vec::new(),
            table: Default::default(),
        };
        let err = run_metacommand(&stack, Metacommand::Update, None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DxError>(),
            Some(DxError::NoInstallationFound(_))
        ));
    }
}
