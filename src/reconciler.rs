//! Turning child-status reports from the OS into process and job state.
//!
//! Every raw event, whichever wait produced it, goes through [`apply_event`]. The
//! blocking [`wait_for_job`] only polls one job's process group; [`sweep`] drains
//! whatever is pending for any child without blocking.

use crate::error::JobError;
use crate::job::{Job, JobId, ProcessStatus};
use crate::job_table::JobTable;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::io::Write;
use tracing::{debug, info, warn};

/// One child-status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitEvent {
    NoChange,
    Exited(Pid, i32),
    Signaled(Pid, Signal),
    Stopped(Pid, Signal),
    Continued(Pid),
}

impl WaitEvent {
    pub fn pid(&self) -> Option<Pid> {
        match *self {
            WaitEvent::NoChange => None,
            WaitEvent::Exited(pid, _)
            | WaitEvent::Signaled(pid, _)
            | WaitEvent::Stopped(pid, _)
            | WaitEvent::Continued(pid) => Some(pid),
        }
    }
}

impl From<WaitStatus> for WaitEvent {
    fn from(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Exited(pid, code) => WaitEvent::Exited(pid, code),
            WaitStatus::Signaled(pid, signal, _) => WaitEvent::Signaled(pid, signal),
            WaitStatus::Stopped(pid, signal) => WaitEvent::Stopped(pid, signal),
            WaitStatus::Continued(pid) => WaitEvent::Continued(pid),
            _ => WaitEvent::NoChange,
        }
    }
}

/// Which children a wait looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitScope {
    AnyChild,
    Group(Pid),
}

/// Query the OS for one status change.
///
/// Returns `Ok(None)` when there is no child left in `scope`.
pub fn poll(scope: WaitScope, blocking: bool) -> Result<Option<WaitEvent>, JobError> {
    let target = match scope {
        WaitScope::AnyChild => None,
        WaitScope::Group(pgid) => Some(Pid::from_raw(-pgid.as_raw())),
    };
    let flags = if blocking {
        WaitPidFlag::WUNTRACED
    } else {
        WaitPidFlag::WUNTRACED | WaitPidFlag::WNOHANG | WaitPidFlag::WCONTINUED
    };
    loop {
        match waitpid(target, Some(flags)) {
            Ok(status) => return Ok(Some(status.into())),
            Err(Errno::ECHILD) => return Ok(None),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(JobError::Wait(errno)),
        }
    }
}

/// Next state of a process after `event`. Terminal states absorb everything.
pub fn transition(current: ProcessStatus, event: &WaitEvent) -> ProcessStatus {
    if current.is_terminal() {
        return current;
    }
    match event {
        WaitEvent::NoChange => current,
        WaitEvent::Exited(..) => ProcessStatus::Done,
        WaitEvent::Signaled(..) => ProcessStatus::Terminated,
        WaitEvent::Stopped(..) => ProcessStatus::Suspended,
        WaitEvent::Continued(_) => ProcessStatus::Continued,
    }
}

/// Record `event` on the process that owns its pid.
///
/// Returns the id of the owning job, or `None` when no active job owns the pid
/// (for example a stage of a job that was aborted during launch).
pub fn apply_event(table: &mut JobTable, event: WaitEvent) -> Option<JobId> {
    let pid = event.pid()?;
    let Some(id) = table.get_owning_job_id(pid) else {
        debug!(%pid, ?event, "status report for a pid no job owns");
        return None;
    };
    let job = table.lookup_mut(id)?;
    if let WaitEvent::Continued(_) = event {
        job.notified = false;
    }
    let process = job.process_mut(pid)?;
    process.status = transition(process.status, &event);
    debug!(id, %pid, status = %process.status, "process status updated");

    if let WaitEvent::Signaled(_, signal) = event {
        eprintln!("{pid}: Terminated by signal {signal}.");
    }
    Some(id)
}

/// How a blocking wait on a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// Every process is terminal; the job has been removed from the table.
    Completed(Job),
    /// Nothing is running any more and at least one process is suspended.
    Stopped,
    /// The job was left running in the background.
    Running,
}

/// Block until every spawned process of job `id` has exited or stopped.
///
/// A completed job is evicted from the table. A stopped job stays; its status table
/// is written to `out` unless the user has already been told it stopped.
pub fn wait_for_job(
    table: &mut JobTable,
    id: JobId,
    out: &mut dyn Write,
) -> Result<JobOutcome, JobError> {
    loop {
        let job = table.lookup_mut(id).ok_or(JobError::NoSuchJob(id))?;
        if job.is_completed() {
            let job = table.remove(id).ok_or(JobError::NoSuchJob(id))?;
            info!(id, "job completed");
            return Ok(JobOutcome::Completed(job));
        }
        let Some(pgid) = job.pgid.filter(|_| job.outstanding() > 0) else {
            if !job.notified {
                job.notified = true;
                let _ = writeln!(out, "{job}");
                info!(id, "job stopped");
            }
            return Ok(JobOutcome::Stopped);
        };

        match poll(WaitScope::Group(pgid), true)? {
            Some(event) => {
                apply_event(table, event);
            }
            None => {
                // Nobody left in the group to report; do not wait forever.
                warn!(id, %pgid, "no children left in process group, marking job done");
                if let Some(job) = table.lookup_mut(id) {
                    for process in job.processes.iter_mut().filter(|p| p.status.is_active()) {
                        process.status = ProcessStatus::Done;
                    }
                }
            }
        }
    }
}

/// Drain every pending status change without blocking, then report and evict.
///
/// Returns the jobs evicted because they completed.
pub fn sweep(table: &mut JobTable, out: &mut dyn Write) -> Result<Vec<Job>, JobError> {
    while let Some(event) = poll(WaitScope::AnyChild, false)? {
        if event == WaitEvent::NoChange {
            break;
        }
        apply_event(table, event);
    }
    Ok(collect_finished(table, out))
}

/// Print and evict completed jobs; print newly stopped jobs once.
pub fn collect_finished(table: &mut JobTable, out: &mut dyn Write) -> Vec<Job> {
    let mut finished = Vec::new();
    for id in table.ids() {
        let Some(job) = table.lookup_mut(id) else {
            continue;
        };
        if job.is_completed() {
            if let Some(job) = table.remove(id) {
                let _ = writeln!(out, "{job}");
                info!(id, "job completed");
                finished.push(job);
            }
        } else if job.is_stopped() && !job.notified {
            job.notified = true;
            let _ = writeln!(out, "{job}");
            info!(id, "job stopped");
        }
    }
    finished
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ExecMode, Process};

    fn spawned_job(pids: &[i32]) -> Job {
        let processes = pids
            .iter()
            .map(|&pid| {
                let mut p = Process::new(vec![format!("cmd{pid}")], None, None);
                p.pid = Some(Pid::from_raw(pid));
                p
            })
            .collect();
        let mut job = Job::new("pipeline", processes, ExecMode::Background);
        job.pgid = Some(Pid::from_raw(pids[0]));
        job
    }

    #[test]
    fn test_transitions_follow_state_machine() {
        let pid = Pid::from_raw(10);
        let running = ProcessStatus::Running;
        assert_eq!(
            transition(running, &WaitEvent::Exited(pid, 0)),
            ProcessStatus::Done
        );
        assert_eq!(
            transition(running, &WaitEvent::Exited(pid, 3)),
            ProcessStatus::Done
        );
        assert_eq!(
            transition(running, &WaitEvent::Signaled(pid, Signal::SIGKILL)),
            ProcessStatus::Terminated
        );
        assert_eq!(
            transition(running, &WaitEvent::Stopped(pid, Signal::SIGTSTP)),
            ProcessStatus::Suspended
        );
        assert_eq!(
            transition(ProcessStatus::Suspended, &WaitEvent::Continued(pid)),
            ProcessStatus::Continued
        );
        assert_eq!(
            transition(ProcessStatus::Suspended, &WaitEvent::Signaled(pid, Signal::SIGTERM)),
            ProcessStatus::Terminated
        );
    }

    #[test]
    fn test_terminal_states_absorb_events() {
        let pid = Pid::from_raw(10);
        for terminal in [ProcessStatus::Done, ProcessStatus::Terminated] {
            assert_eq!(transition(terminal, &WaitEvent::Continued(pid)), terminal);
            assert_eq!(
                transition(terminal, &WaitEvent::Stopped(pid, Signal::SIGSTOP)),
                terminal
            );
            assert_eq!(transition(terminal, &WaitEvent::Exited(pid, 0)), terminal);
        }
    }

    #[test]
    fn test_apply_event_updates_owning_process() {
        let mut table = JobTable::with_capacity(4);
        let id = table.insert(spawned_job(&[300, 301])).unwrap();

        let owner = apply_event(&mut table, WaitEvent::Exited(Pid::from_raw(301), 0));
        assert_eq!(owner, Some(id));

        let job = table.lookup(id).unwrap();
        assert_eq!(job.processes[0].status, ProcessStatus::Running);
        assert_eq!(job.processes[1].status, ProcessStatus::Done);
    }

    #[test]
    fn test_apply_event_ignores_unknown_pid_and_no_change() {
        let mut table = JobTable::with_capacity(4);
        table.insert(spawned_job(&[300])).unwrap();

        assert_eq!(
            apply_event(&mut table, WaitEvent::Exited(Pid::from_raw(999), 0)),
            None
        );
        assert_eq!(apply_event(&mut table, WaitEvent::NoChange), None);
        assert_eq!(
            table.lookup(1).unwrap().processes[0].status,
            ProcessStatus::Running
        );
    }

    #[test]
    fn test_collect_finished_evicts_completed_and_frees_id() {
        let mut table = JobTable::with_capacity(4);
        let id = table.insert(spawned_job(&[300, 301])).unwrap();
        let other = table.insert(spawned_job(&[400])).unwrap();

        apply_event(&mut table, WaitEvent::Exited(Pid::from_raw(300), 0));
        let mut out = Vec::new();
        assert!(collect_finished(&mut table, &mut out).is_empty());
        assert!(out.is_empty());

        apply_event(&mut table, WaitEvent::Signaled(Pid::from_raw(301), Signal::SIGTERM));
        let finished = collect_finished(&mut table, &mut out);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].id, id);
        assert!(table.lookup(id).is_none());
        assert!(table.lookup(other).is_some());

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("[1] 300\tdone\tcmd300 |\n"));
        assert!(text.contains("301\tterminated\tcmd301"));

        // the freed id goes back to the pool
        assert_eq!(table.insert(spawned_job(&[500])).unwrap(), id);
    }

    #[test]
    fn test_collect_finished_reports_stopped_job_once() {
        let mut table = JobTable::with_capacity(4);
        let id = table.insert(spawned_job(&[300])).unwrap();
        apply_event(&mut table, WaitEvent::Stopped(Pid::from_raw(300), Signal::SIGTSTP));

        let mut out = Vec::new();
        collect_finished(&mut table, &mut out);
        assert_eq!(String::from_utf8(out).unwrap(), "[1] 300\tsuspended\tcmd300\n");
        assert!(table.lookup(id).unwrap().notified);

        let mut again = Vec::new();
        collect_finished(&mut table, &mut again);
        assert!(again.is_empty());

        // continuing clears the flag but does not complete the job
        apply_event(&mut table, WaitEvent::Continued(Pid::from_raw(300)));
        let job = table.lookup(id).unwrap();
        assert_eq!(job.processes[0].status, ProcessStatus::Continued);
        assert!(!job.notified);
        assert!(!job.is_completed());
    }

    #[test]
    fn test_wait_on_stopped_job_reports_it_once() {
        let mut table = JobTable::with_capacity(4);
        let id = table.insert(spawned_job(&[300, 301])).unwrap();
        apply_event(&mut table, WaitEvent::Stopped(Pid::from_raw(300), Signal::SIGTSTP));
        apply_event(&mut table, WaitEvent::Exited(Pid::from_raw(301), 0));

        let mut out = Vec::new();
        let outcome = wait_for_job(&mut table, id, &mut out).unwrap();
        assert!(matches!(outcome, JobOutcome::Stopped));
        assert!(String::from_utf8(out).unwrap().contains("300\tsuspended\tcmd300"));
        assert!(table.lookup(id).unwrap().notified);

        for _ in 0..2 {
            let mut again = Vec::new();
            let outcome = wait_for_job(&mut table, id, &mut again).unwrap();
            assert!(matches!(outcome, JobOutcome::Stopped));
            assert!(again.is_empty());
        }
        assert!(table.lookup(id).is_some());
    }

    #[test]
    fn test_table_never_keeps_fully_terminal_job_after_collect() {
        let mut table = JobTable::with_capacity(8);
        for base in [100, 200, 300] {
            table.insert(spawned_job(&[base, base + 1])).unwrap();
        }
        for pid in [100, 101, 201, 300, 301] {
            apply_event(&mut table, WaitEvent::Exited(Pid::from_raw(pid), 0));
        }
        collect_finished(&mut table, &mut Vec::new());
        assert!(table.iter().all(|job| !job.is_completed()));
        assert_eq!(table.ids(), vec![2]);
    }
}
