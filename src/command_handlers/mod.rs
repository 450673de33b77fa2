pub mod dispatch;
pub mod help;
pub mod run;
pub mod setup;

/// Prefix that separates built-in metacommands from stacked commands.
pub const METACOMMAND_MARKER: char = '.';

/// Built-in administrative operations. Never stacked or overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Metacommand {
    InstallCommands,
    InstallGlobally,
    Update,
}

impl Metacommand {
    pub const ALL: [Metacommand; 3] = [
        Metacommand::InstallCommands,
        Metacommand::InstallGlobally,
        Metacommand::Update,
    ];

    /// Name without the marker.
    pub fn name(self) -> &'static str {
        match self {
            Metacommand::InstallCommands => "install-commands",
            Metacommand::InstallGlobally => "install-globally",
            Metacommand::Update => "update",
        }
    }

    pub fn display_name(self) -> String {
        format!("{METACOMMAND_MARKER}{}", self.name())
    }

    pub fn usage(self) -> &'static str {
        match self {
            Metacommand::InstallCommands => "[source]",
            Metacommand::InstallGlobally => "",
            Metacommand::Update => "[source]",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Metacommand::InstallCommands => "Install commands from a git source, or every source in .dxrc",
            Metacommand::InstallGlobally => "Put the dx launcher on your PATH",
            Metacommand::Update => "Update this installation's dx files in the background",
        }
    }

    pub fn max_args(self) -> usize {
        match self {
            Metacommand::InstallCommands | Metacommand::Update => 1,
            Metacommand::InstallGlobally => 0,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}
