//! Spawning a job's pipeline.
//!
//! Stages are started left to right. Every spawned stage joins the job's process
//! group, whose id is the pid of the first spawned stage. The parent drops every
//! descriptor it opened for a stage as soon as that stage has been started, so
//! nothing leaks from one iteration of the loop into the next.

use crate::builtin;
use crate::command::{CommandKind, NOT_FOUND};
use crate::error::JobError;
use crate::external::find_command_path;
use crate::job::{ExecMode, JobId, ProcessStatus};
use crate::reconciler::JobOutcome;
use crate::shell::Shell;
use crate::terminal::JOB_CONTROL_SIGNALS;
use nix::fcntl::OFlag;
use nix::libc;
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::unistd::{ForkResult, Pid, close, dup2, execv, fork, getpid, pipe2, setpgid, tcsetpgrp};
use std::ffi::{CString, OsStr};
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Everything a child needs, prepared before `fork` so the child only makes
/// async-signal-safe calls.
struct ChildPlan {
    program: Option<CString>,
    argv: Vec<CString>,
    not_found: Vec<u8>,
    pgid: Option<Pid>,
    take_terminal: bool,
}

impl ChildPlan {
    fn new(search_path: &str, argv: &[String], pgid: Option<Pid>, take_terminal: bool) -> Self {
        let name = argv.first().map(String::as_str).unwrap_or("");
        let c_argv = argv
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .ok();
        let program = c_argv.as_ref().and_then(|_| {
            find_command_path(OsStr::new(search_path), name)
                .and_then(|path| CString::new(path.as_os_str().as_bytes()).ok())
        });
        Self {
            program,
            argv: c_argv.unwrap_or_default(),
            not_found: format!("{name}: command not found\n").into_bytes(),
            pgid,
            take_terminal,
        }
    }
}

/// Launch every stage of job `id`, which must already be in the table, then wait
/// for it (foreground) or announce it (background).
///
/// A missing input file, a failed `pipe` or a failed `fork` removes the job from the
/// table and hands the terminal back to the shell; stages already started are left
/// to normal reconciliation. An output file that cannot be opened is reported and the
/// stage writes to standard output instead, on any stage of the pipeline.
pub fn launch(shell: &mut Shell, id: JobId) -> Result<JobOutcome, JobError> {
    let (mode, stage_count) = {
        let job = shell.jobs.lookup(id).ok_or(JobError::NoSuchJob(id))?;
        (job.mode, job.processes.len())
    };
    let search_path = shell.env.search_path();
    let take_terminal = mode == ExecMode::Foreground && shell.terminal.is_interactive();

    // `None` means the stage inherits the shell's own stdin/stdout.
    let mut input: Option<OwnedFd> = None;

    for index in 0..stage_count {
        let last = index + 1 == stage_count;
        let process = match shell.jobs.lookup(id) {
            Some(job) => job.processes[index].clone(),
            None => return Err(JobError::NoSuchJob(id)),
        };
        let stage_mode = if last { mode } else { ExecMode::PipelineStage };

        if let Some(path) = &process.input {
            match File::open(path) {
                Ok(file) => input = Some(file.into()),
                Err(source) => {
                    let err = JobError::InputRedirect {
                        path: path.clone(),
                        source,
                    };
                    return Err(abort(shell, id, err));
                }
            }
        }

        let (next_input, pipe_output) = if last {
            (None, None)
        } else {
            let (read, write) = pipe2(OFlag::O_CLOEXEC)
                .map_err(|errno| abort(shell, id, JobError::Pipe(errno)))?;
            (Some(read), Some(write))
        };

        let output = match &process.output {
            Some(path) => match open_output(path) {
                Ok(file) => Some(OwnedFd::from(file)),
                Err(err) => {
                    eprintln!("jobshell: {}: {err}", path.display());
                    None
                }
            },
            None => pipe_output,
        };
        debug!(id, index, ?stage_mode, input = ?input, output = ?output, "launching stage");

        if process.kind.is_builtin() {
            run_builtin(shell, id, index, process.kind, &process.argv, output);
        } else {
            let pgid = shell.jobs.lookup(id).and_then(|job| job.pgid);
            let plan = ChildPlan::new(&search_path, &process.argv, pgid, take_terminal);
            let stdin = input.as_ref().map(AsRawFd::as_raw_fd);
            let stdout = output.as_ref().map(AsRawFd::as_raw_fd);

            // Only SigDfl/SigIgn, dup2, close, execv and write run in the child.
            match unsafe { fork() } {
                Ok(ForkResult::Parent { child }) => {
                    let Some(job) = shell.jobs.lookup_mut(id) else {
                        return Err(JobError::NoSuchJob(id));
                    };
                    let first = job.pgid.is_none();
                    let pgid = *job.pgid.get_or_insert(child);
                    // The child does the same; whichever runs first wins.
                    if let Err(errno) = setpgid(child, pgid) {
                        debug!(%child, %pgid, %errno, "setpgid in parent failed");
                    }
                    job.processes[index].pid = Some(child);
                    debug!(id, index, pid = %child, %pgid, "stage spawned");
                    if first && mode == ExecMode::Foreground {
                        if let Err(err) = shell.terminal.give_to(pgid, None) {
                            return Err(abort(shell, id, err));
                        }
                    }
                }
                Ok(ForkResult::Child) => exec_child(&plan, stdin, stdout),
                Err(errno) => return Err(abort(shell, id, JobError::Spawn(errno))),
            }
            // The parent's copy of the stage's output closes here.
            drop(output);
        }

        input = next_input;
    }
    drop(input);

    let job = shell.jobs.lookup(id).ok_or(JobError::NoSuchJob(id))?;
    let pgid = job.pgid;
    if job.is_completed() {
        let job = shell.jobs.remove(id).ok_or(JobError::NoSuchJob(id))?;
        return Ok(JobOutcome::Completed(job));
    }
    match mode {
        ExecMode::Foreground => shell.put_in_foreground(id, false),
        _ => {
            if let Some(pgid) = pgid {
                println!("[{id}] {pgid}");
            }
            info!(id, "job started in background");
            Ok(JobOutcome::Running)
        }
    }
}

/// Drop job `id` after a failed launch step. A foreground job whose group may already
/// hold the terminal gives it back to the shell.
fn abort(shell: &mut Shell, id: JobId, err: JobError) -> JobError {
    if let Some(job) = shell.jobs.remove(id) {
        if job.mode == ExecMode::Foreground && job.pgid.is_some() {
            if let Err(reclaim_err) = shell.terminal.reclaim() {
                warn!(id, error = %reclaim_err, "could not reclaim the terminal");
            }
        }
    }
    info!(id, error = %err, "launch aborted");
    err
}

fn open_output(path: &Path) -> io::Result<File> {
    File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Run a builtin stage in the shell process. Its output goes to the stage's output
/// descriptor, or to the shell's stdout. It ignores its input.
fn run_builtin(
    shell: &mut Shell,
    id: JobId,
    index: usize,
    kind: CommandKind,
    argv: &[String],
    output: Option<OwnedFd>,
) {
    let code = match output {
        Some(fd) => {
            let mut file = File::from(fd);
            let code = builtin::run(shell, id, kind, argv, &mut file);
            let _ = file.flush();
            code
        }
        None => {
            let mut stdout = io::stdout();
            let code = builtin::run(shell, id, kind, argv, &mut stdout);
            let _ = stdout.flush();
            code
        }
    };
    debug!(id, index, builtin = kind.name(), code, "builtin finished");
    if let Some(job) = shell.jobs.lookup_mut(id) {
        job.processes[index].status = ProcessStatus::Done;
    }
}

fn exec_child(plan: &ChildPlan, stdin: Option<RawFd>, stdout: Option<RawFd>) -> ! {
    let pid = getpid();
    let pgid = plan.pgid.unwrap_or(pid);
    let _ = setpgid(pid, pgid);

    if plan.take_terminal {
        reset_signal(Signal::SIGTTOU, SigHandler::SigIgn);
        let _ = tcsetpgrp(io::stdin(), pgid);
    }
    for sig in JOB_CONTROL_SIGNALS {
        reset_signal(sig, SigHandler::SigDfl);
    }
    reset_signal(Signal::SIGTTOU, SigHandler::SigDfl);

    for (fd, target) in [(stdin, libc::STDIN_FILENO), (stdout, libc::STDOUT_FILENO)] {
        if let Some(fd) = fd.filter(|&fd| fd != target) {
            let _ = dup2(fd, target);
            let _ = close(fd);
        }
    }

    if let Some(program) = &plan.program {
        let _ = execv(program, &plan.argv);
    }
    let _ = nix::unistd::write(io::stderr(), &plan.not_found);
    unsafe { libc::_exit(NOT_FOUND) }
}

fn reset_signal(sig: Signal, handler: SigHandler) {
    let _ = unsafe { signal(sig, handler) };
}
