use crate::command_handlers::Metacommand;
use crate::resolver::Stack;
use std::fmt::Write;

/// Help listing: stacked commands and metacommands, each sorted, one shared name column.
pub fn render_help(stack: &Stack, verbose: bool) -> String {
    let metas: Vec<(String, &str)> = Metacommand::ALL
        .iter()
        .map(|m| (m.display_name(), m.description()))
        .collect();
    let width = stack
        .table
        .keys()
        .map(|n| n.chars().count())
        .chain(metas.iter().map(|(n, _)| n.chars().count()))
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    let _ = writeln!(out, "Usage: dx <command> [args...]");
    let _ = writeln!(out);
    let _ = writeln!(out, "Commands:");
    if stack.installations.is_empty() {
        let _ = writeln!(
            out,
            "  (no dx installation here; `dx .install-commands <source>` creates one)"
        );
    } else if stack.table.is_empty() {
        let _ = writeln!(out, "  (none installed)");
    }
    // BTreeMap iteration is already sorted by name.
    for (name, cmd) in &stack.table {
        let line = format!("  {name:<width$}  {}", cmd.record.description);
        if verbose {
            let _ = writeln!(out, "{}  ({})", line.trim_end(), cmd.installation.display());
        } else {
            let _ = writeln!(out, "{}", line.trim_end());
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Metacommands:");
    for (name, description) in &metas {
        let _ = writeln!(out, "  {name:<width$}  {description}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::testutil::{make_installation, write_command};

    #[test]
    fn columns_align_across_both_sections() {
        let tmp = tempfile::TempDir::new().unwrap();
        let inst = make_installation(tmp.path());
        write_command(&inst, "zeta", "zeta", "Last");
        write_command(&inst, "alpha", "alpha", "First");
        let stack = Stack::discover(tmp.path()).unwrap();

        let help = render_help(&stack, false);
        let width = ".install-commands".len();
        assert!(help.contains(&format!("  {:<width$}  First\n", "alpha")));
        assert!(help.contains(&format!("  {:<width$}  Put", ".install-globally")));
        assert!(help.find("alpha").unwrap() < help.find("zeta").unwrap());
        assert!(help.find(".install-commands").unwrap() < help.find(".update").unwrap());
    }

    #[test]
    fn long_command_names_widen_the_column() {
        let tmp = tempfile::TempDir::new().unwrap();
        let inst = make_installation(tmp.path());
        let long = "a-really-long-command-name";
        write_command(&inst, long, long, "Long");
        let stack = Stack::discover(tmp.path()).unwrap();
        let help = render_help(&stack, false);
        assert!(help.contains(&format!("  {:<w$}  Put", ".install-globally", w = long.len())));
    }

    #[test]
    fn empty_stack_gets_a_hint() {
        let stack = Stack {
            cwd: "/nowhere".into(),
            installations: Vec::new(),
            table: Default::default(),
        };
        let help = render_help(&stack, false);
        assert!(help.contains("no dx installation here"));
        assert!(help.contains(".update"));
    }

    #[test]
    fn verbose_shows_owning_installation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let inst = make_installation(tmp.path());
        write_command(&inst, "b", "b", "Bee");
        let stack = Stack::discover(tmp.path()).unwrap();
        let help = render_help(&stack, true);
        assert!(help.contains(&format!("({})", tmp.path().display())));
    }
}
