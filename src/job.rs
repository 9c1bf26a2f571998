//! Job and process records.
//!
//! A [`Job`] exclusively owns the ordered sequence of [`Process`] records of one
//! pipeline. Removing a job from the table drops the whole sequence at once.

use crate::command::CommandKind;
use nix::sys::termios::Termios;
use nix::unistd::Pid;
use std::fmt;
use std::path::PathBuf;

/// Small integer identifying an active job; 1-based, reused once freed.
pub type JobId = usize;

/// Lifecycle of one process record.
///
/// `Done` and `Terminated` are terminal: no transition leaves them.
/// `Suspended` and `Continued` are reversible; `Continued` counts as running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Suspended,
    Continued,
    Done,
    Terminated,
}

impl ProcessStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessStatus::Done | ProcessStatus::Terminated)
    }

    /// Running or continued: still expected to report a status change.
    pub fn is_active(self) -> bool {
        matches!(self, ProcessStatus::Running | ProcessStatus::Continued)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            ProcessStatus::Running => "running",
            ProcessStatus::Suspended => "suspended",
            ProcessStatus::Continued => "continued",
            ProcessStatus::Done => "done",
            ProcessStatus::Terminated => "terminated",
        };
        f.write_str(word)
    }
}

/// How a job (or, at launch time, a single stage) is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Foreground,
    Background,
    /// A stage whose output feeds the next stage. Only used while launching;
    /// a job's own mode is always foreground or background.
    PipelineStage,
}

/// One command invocation within a job.
#[derive(Debug, Clone)]
pub struct Process {
    /// `None` until the process is spawned; builtins never get one.
    pub pid: Option<Pid>,
    /// Text shown in status tables.
    pub command: String,
    pub argv: Vec<String>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub kind: CommandKind,
    pub status: ProcessStatus,
}

impl Process {
    pub fn new(argv: Vec<String>, input: Option<PathBuf>, output: Option<PathBuf>) -> Self {
        let kind = CommandKind::classify(argv.first().map(String::as_str).unwrap_or(""));
        let mut command = argv.join(" ");
        if let Some(path) = &input {
            command.push_str(&format!(" <{}", path.display()));
        }
        if let Some(path) = &output {
            command.push_str(&format!(" >{}", path.display()));
        }
        Self {
            pid: None,
            command,
            argv,
            input,
            output,
            kind,
            status: ProcessStatus::Running,
        }
    }

    pub fn is_spawned(&self) -> bool {
        self.pid.is_some()
    }
}

/// One submitted command line: a pipeline of processes tracked as a unit.
#[derive(Debug, Clone)]
pub struct Job {
    /// Assigned by the job table on insertion; 0 while not in a table.
    pub id: JobId,
    pub command: String,
    /// Process group shared by every spawned stage; set when the first stage is spawned.
    pub pgid: Option<Pid>,
    pub mode: ExecMode,
    pub processes: Vec<Process>,
    /// The user has already been told this job is stopped.
    pub notified: bool,
    /// Terminal modes saved when the job last stopped in the foreground.
    pub tmodes: Option<Termios>,
}

impl Job {
    pub fn new(command: impl Into<String>, processes: Vec<Process>, mode: ExecMode) -> Self {
        Self {
            id: 0,
            command: command.into(),
            pgid: None,
            mode,
            processes,
            notified: false,
            tmodes: None,
        }
    }

    /// Every process has reached `done` or `terminated`.
    pub fn is_completed(&self) -> bool {
        self.processes.iter().all(|p| p.status.is_terminal())
    }

    /// Nothing is left running and at least one process is suspended.
    pub fn is_stopped(&self) -> bool {
        self.outstanding() == 0
            && self
                .processes
                .iter()
                .any(|p| p.status == ProcessStatus::Suspended)
    }

    /// Number of spawned processes that have not yet reported a stop or an exit.
    pub fn outstanding(&self) -> usize {
        self.processes
            .iter()
            .filter(|p| p.is_spawned() && p.status.is_active())
            .count()
    }

    /// Number of stages that were (or will be) spawned as separate processes.
    pub fn external_count(&self) -> usize {
        self.processes
            .iter()
            .filter(|p| !p.kind.is_builtin())
            .count()
    }

    pub fn process_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.processes.iter_mut().find(|p| p.pid == Some(pid))
    }

    pub fn owns(&self, pid: Pid) -> bool {
        self.processes.iter().any(|p| p.pid == Some(pid))
    }

    /// Mark suspended processes as continued before the group gets SIGCONT.
    pub fn mark_continued(&mut self) {
        for process in &mut self.processes {
            if process.status == ProcessStatus::Suspended {
                process.status = ProcessStatus::Continued;
            }
        }
        self.notified = false;
    }
}

/// Status table: `[id]` then one `pid<TAB>status<TAB>command` line per process,
/// with ` |` marking that the next line is the following pipeline stage.
impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = format!("[{}] ", self.id);
        let indent = " ".repeat(prefix.len());
        for (index, process) in self.processes.iter().enumerate() {
            if index == 0 {
                f.write_str(&prefix)?;
            } else {
                writeln!(f, " |")?;
                f.write_str(&indent)?;
            }
            match process.pid {
                Some(pid) => write!(f, "{pid}")?,
                None => f.write_str("-")?,
            }
            write!(f, "\t{}\t{}", process.status, process.command)?;
        }
        Ok(())
    }
}
