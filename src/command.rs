/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Children that cannot find their program exit with [`NOT_FOUND`].
pub type ExitCode = i32;

/// Exit code of a child whose program could not be located or executed.
pub const NOT_FOUND: ExitCode = 127;

/// Classification of a pipeline stage, decided from its first token before launch.
///
/// Everything that is not a recognized builtin name is [`CommandKind::External`] and
/// gets resolved through the search path when the stage is spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    External,
    /// `quit`: terminates the shell immediately.
    Quit,
    /// `cd [dir]`
    ChangeDirectory,
    /// `barrier`: waits for every job that was active when it started.
    Barrier,
    Help,
    Jobs,
    /// `fg [id]`
    Foreground,
    /// `bg [id]`
    Background,
}

impl CommandKind {
    /// Every builtin kind, in the order `help` lists them.
    pub const BUILTINS: [CommandKind; 7] = [
        CommandKind::Barrier,
        CommandKind::Background,
        CommandKind::ChangeDirectory,
        CommandKind::Foreground,
        CommandKind::Help,
        CommandKind::Jobs,
        CommandKind::Quit,
    ];

    /// Classify a stage by its first token. An empty name is external
    /// (and will fail to resolve in the child).
    pub fn classify(name: &str) -> Self {
        match name {
            "quit" => CommandKind::Quit,
            "cd" => CommandKind::ChangeDirectory,
            "barrier" => CommandKind::Barrier,
            "help" => CommandKind::Help,
            "jobs" => CommandKind::Jobs,
            "fg" => CommandKind::Foreground,
            "bg" => CommandKind::Background,
            _ => CommandKind::External,
        }
    }

    pub fn is_builtin(self) -> bool {
        self != CommandKind::External
    }

    /// The name a user types to invoke this builtin.
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::External => "",
            CommandKind::Quit => "quit",
            CommandKind::ChangeDirectory => "cd",
            CommandKind::Barrier => "barrier",
            CommandKind::Help => "help",
            CommandKind::Jobs => "jobs",
            CommandKind::Foreground => "fg",
            CommandKind::Background => "bg",
        }
    }
}
