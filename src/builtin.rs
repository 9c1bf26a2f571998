use crate::command::{CommandKind, ExitCode, NOT_FOUND};
use crate::job::JobId;
use crate::shell::Shell;
use anyhow::{Context, Result, bail};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in the shell process, as one stage of the job `current`.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd" or "barrier".
    fn name() -> &'static str;

    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, shell: &mut Shell, current: JobId, stdout: &mut dyn Write) -> Result<ExitCode>;
}

fn invoke<T: BuiltinCommand>(
    shell: &mut Shell,
    current: JobId,
    argv: &[String],
    stdout: &mut dyn Write,
) -> ExitCode {
    let args: Vec<&str> = argv.iter().skip(1).map(String::as_str).collect();
    match T::from_args(&[T::name()], &args) {
        Ok(cmd) => match cmd.execute(shell, current, stdout) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("jobshell: {e:#}");
                1
            }
        },
        Err(EarlyExit { output, status }) => match status {
            Ok(()) => {
                let _ = writeln!(stdout, "{output}");
                0
            }
            Err(()) => {
                eprintln!("{output}");
                1
            }
        },
    }
}

/// Execute the builtin `kind` with its full argument vector (`argv[0]` is the name).
pub(crate) fn run(
    shell: &mut Shell,
    current: JobId,
    kind: CommandKind,
    argv: &[String],
    stdout: &mut dyn Write,
) -> ExitCode {
    match kind {
        CommandKind::Quit => invoke::<Quit>(shell, current, argv, stdout),
        CommandKind::ChangeDirectory => invoke::<Cd>(shell, current, argv, stdout),
        CommandKind::Barrier => invoke::<Barrier>(shell, current, argv, stdout),
        CommandKind::Help => invoke::<Help>(shell, current, argv, stdout),
        CommandKind::Jobs => invoke::<Jobs>(shell, current, argv, stdout),
        CommandKind::Foreground => invoke::<Fg>(shell, current, argv, stdout),
        CommandKind::Background => invoke::<Bg>(shell, current, argv, stdout),
        CommandKind::External => NOT_FOUND,
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, shell: &mut Shell, _current: JobId, _stdout: &mut dyn Write) -> Result<ExitCode> {
        let env = &mut shell.env;
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match env.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => bail!("cd: no target and HOME not set"),
            },
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: {}", canonical.display()))?;
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Exit the shell immediately, without waiting for running jobs.
pub struct Quit {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

impl BuiltinCommand for Quit {
    fn name() -> &'static str {
        "quit"
    }

    fn execute(self, _shell: &mut Shell, _current: JobId, stdout: &mut dyn Write) -> Result<ExitCode> {
        let _ = stdout.flush();
        std::process::exit(0)
    }
}

#[derive(FromArgs)]
/// Wait until every other job that is active now has finished or stopped.
pub struct Barrier {}

impl BuiltinCommand for Barrier {
    fn name() -> &'static str {
        "barrier"
    }

    fn execute(self, shell: &mut Shell, current: JobId, stdout: &mut dyn Write) -> Result<ExitCode> {
        shell.barrier(Some(current), stdout)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List the builtin commands.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(self, _shell: &mut Shell, _current: JobId, stdout: &mut dyn Write) -> Result<ExitCode> {
        writeln!(stdout, "builtin commands:")?;
        for kind in CommandKind::BUILTINS {
            writeln!(stdout, "  {:<8} {}", kind.name(), describe(kind))?;
        }
        writeln!(
            stdout,
            "pipelines: cmd [<in] [>out] | cmd ... [&]; `<cmd> --help` for builtin options"
        )?;
        Ok(0)
    }
}

fn describe(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::Barrier => "wait for all active jobs",
        CommandKind::Background => "continue a stopped job in the background",
        CommandKind::ChangeDirectory => "change the working directory",
        CommandKind::Foreground => "continue a job in the foreground",
        CommandKind::Help => "show this list",
        CommandKind::Jobs => "list active jobs",
        CommandKind::Quit => "exit the shell",
        CommandKind::External => "",
    }
}

#[derive(FromArgs)]
/// Print the status table of every active job.
pub struct Jobs {}

impl BuiltinCommand for Jobs {
    fn name() -> &'static str {
        "jobs"
    }

    fn execute(self, shell: &mut Shell, current: JobId, stdout: &mut dyn Write) -> Result<ExitCode> {
        for job in shell.jobs().iter().filter(|job| job.id != current) {
            writeln!(stdout, "{job}")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Continue a job in the foreground and wait for it.
pub struct Fg {
    #[argh(positional)]
    /// job id; defaults to the most recent job.
    pub id: Option<JobId>,
}

impl BuiltinCommand for Fg {
    fn name() -> &'static str {
        "fg"
    }

    fn execute(self, shell: &mut Shell, current: JobId, _stdout: &mut dyn Write) -> Result<ExitCode> {
        let id = target_job(shell, current, self.id, Self::name())?;
        shell.continue_job(id, true)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Continue a stopped job in the background.
pub struct Bg {
    #[argh(positional)]
    /// job id; defaults to the most recent job.
    pub id: Option<JobId>,
}

impl BuiltinCommand for Bg {
    fn name() -> &'static str {
        "bg"
    }

    fn execute(self, shell: &mut Shell, current: JobId, _stdout: &mut dyn Write) -> Result<ExitCode> {
        let id = target_job(shell, current, self.id, Self::name())?;
        shell.continue_job(id, false)?;
        Ok(0)
    }
}

/// The job `fg`/`bg` act on: the one named, or the highest id other than `current`.
fn target_job(shell: &Shell, current: JobId, id: Option<JobId>, name: &str) -> Result<JobId> {
    match id {
        Some(id) if id != current && shell.jobs().lookup(id).is_some() => Ok(id),
        Some(id) => bail!("{name}: {id}: no such job"),
        None => shell
            .jobs()
            .ids()
            .into_iter()
            .filter(|&id| id != current)
            .max()
            .with_context(|| format!("{name}: no current job")),
    }
}
