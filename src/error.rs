use crate::job::JobId;
use nix::errno::Errno;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the job-control core.
///
/// Every variant is local to the one job being launched or waited on; none of them
/// leaves other entries of the job table in an inconsistent state.
#[derive(Debug, Error)]
pub enum JobError {
    /// No free slot in the job table; the job was discarded before anything was spawned.
    #[error("job table is full ({capacity} jobs active)")]
    TableFull { capacity: usize },

    /// A declared input file could not be opened; the job was aborted.
    #[error("{}: {source}", path.display())]
    InputRedirect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pipe: {0}")]
    Pipe(#[source] Errno),

    /// Process creation failed; the remaining stages were not started.
    #[error("fork: {0}")]
    Spawn(#[source] Errno),

    #[error("waitpid: {0}")]
    Wait(#[source] Errno),

    #[error("terminal: {0}")]
    Terminal(#[source] Errno),

    /// The job's process group could not be sent SIGCONT.
    #[error("kill (SIGCONT): {0}")]
    Continue(#[source] Errno),

    #[error("no such job: {0}")]
    NoSuchJob(JobId),
}
