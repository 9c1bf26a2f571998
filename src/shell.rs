//! The shell context: job table, terminal coordinator and environment, passed
//! explicitly to every operation that launches, waits on or continues jobs.

use crate::env::Environment;
use crate::error::JobError;
use crate::job::{Job, JobId};
use crate::job_table::JobTable;
use crate::launcher;
use crate::reconciler::{self, JobOutcome};
use crate::terminal::Terminal;
use nix::sys::signal::{Signal, killpg};
use std::io::{self, Write};
use tracing::debug;

#[derive(Debug)]
pub struct Shell {
    pub(crate) jobs: JobTable,
    pub(crate) terminal: Terminal,
    pub(crate) env: Environment,
}

impl Shell {
    pub fn new(terminal: Terminal, max_jobs: usize) -> Self {
        Self {
            jobs: JobTable::with_capacity(max_jobs),
            terminal,
            env: Environment::new(),
        }
    }

    pub fn jobs(&self) -> &JobTable {
        &self.jobs
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn is_interactive(&self) -> bool {
        self.terminal.is_interactive()
    }

    /// Register `job` and launch it.
    ///
    /// A foreground job is waited for before this returns; a background job is left
    /// running. Fails without spawning anything when the table is full.
    pub fn submit(&mut self, job: Job) -> Result<JobOutcome, JobError> {
        let id = self.jobs.insert(job)?;
        launcher::launch(self, id)
    }

    /// Hand the terminal to job `id`, wait until it completes or stops, then take the
    /// terminal back. With `cont` the job's saved terminal modes are reinstated and its
    /// group is sent SIGCONT first.
    pub fn put_in_foreground(&mut self, id: JobId, cont: bool) -> Result<JobOutcome, JobError> {
        let job = self.jobs.lookup(id).ok_or(JobError::NoSuchJob(id))?;
        let pgid = job.pgid;
        if let Some(pgid) = pgid {
            let tmodes = if cont { job.tmodes.as_ref() } else { None };
            self.terminal.give_to(pgid, tmodes)?;
            if cont {
                killpg(pgid, Signal::SIGCONT).map_err(JobError::Continue)?;
            }
        }

        let outcome = reconciler::wait_for_job(&mut self.jobs, id, &mut io::stdout());

        if pgid.is_some() {
            let tmodes = self.terminal.reclaim()?;
            if let Ok(JobOutcome::Stopped) = outcome {
                if let Some(job) = self.jobs.lookup_mut(id) {
                    job.tmodes = tmodes;
                }
            }
        }
        outcome
    }

    /// Leave job `id` running without the terminal, sending SIGCONT when `cont`.
    pub fn put_in_background(&mut self, id: JobId, cont: bool) -> Result<JobOutcome, JobError> {
        let job = self.jobs.lookup(id).ok_or(JobError::NoSuchJob(id))?;
        if let Some(pgid) = job.pgid.filter(|_| cont) {
            killpg(pgid, Signal::SIGCONT).map_err(JobError::Continue)?;
            debug!(id, %pgid, "job continued in background");
        }
        Ok(JobOutcome::Running)
    }

    /// Resume a stopped (or running) job in the foreground or the background.
    pub fn continue_job(&mut self, id: JobId, foreground: bool) -> Result<JobOutcome, JobError> {
        self.jobs
            .lookup_mut(id)
            .ok_or(JobError::NoSuchJob(id))?
            .mark_continued();
        if foreground {
            self.put_in_foreground(id, true)
        } else {
            self.put_in_background(id, true)
        }
    }

    /// Non-blocking reconciliation; completion and stop notices go to stdout.
    pub fn sweep(&mut self) -> Result<Vec<Job>, JobError> {
        reconciler::sweep(&mut self.jobs, &mut io::stdout())
    }

    /// Block until every job active right now, except `except`, has completed or
    /// stopped. The status table of each job reaped here is written to `out`.
    pub fn barrier(&mut self, except: Option<JobId>, out: &mut dyn Write) -> Result<(), JobError> {
        for id in self.jobs.ids() {
            if Some(id) == except || self.jobs.lookup(id).is_none() {
                continue;
            }
            if let JobOutcome::Completed(job) = reconciler::wait_for_job(&mut self.jobs, id, out)? {
                let _ = writeln!(out, "{job}");
            }
        }
        Ok(())
    }
}
