use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(
    version,
    name = "dx",
    about = "dx: run project commands, with nested directories inheriting and overriding their parents' commands",
    after_help = "Run `dx help` (or `dx` alone) to list the commands available here."
)]
pub struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). DX_LOG overrides.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Command name followed by the arguments forwarded to it verbatim.
    /// Metacommands start with '.': .install-commands [source], .install-globally, .update [source]
    #[arg(value_name = "COMMAND [ARGS]", trailing_var_arg = true, allow_hyphen_values = true)]
    pub argv: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_after_the_name_is_forwarded() {
        let cli = Cli::parse_from(["dx", "-v", "build", "--release", "-v", "x"]);
        assert_eq!(cli.verbose, 1);
        assert_eq!(cli.argv, vec!["build", "--release", "-v", "x"]);
    }

    #[test]
    fn no_arguments_is_valid() {
        let cli = Cli::parse_from(["dx"]);
        assert!(cli.argv.is_empty());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn metacommand_names_pass_through() {
        let cli = Cli::parse_from(["dx", ".install-commands", "https://x/cmds.git"]);
        assert_eq!(cli.argv, vec![".install-commands", "https://x/cmds.git"]);
    }
}
