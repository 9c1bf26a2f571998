//! Ownership of the controlling terminal.
//!
//! At most one process group owns the terminal at a time. The shell hands it to a
//! foreground job's group before blocking on that job and takes it back afterwards.
//! When the shell does not run on a terminal every operation here is a no-op.

use crate::error::JobError;
use nix::sys::signal::{SigHandler, Signal, killpg, signal};
use nix::sys::termios::{SetArg, Termios, tcgetattr, tcsetattr};
use nix::unistd::{Pid, getpgrp, getpid, setpgid, tcgetpgrp, tcsetpgrp};
use std::cell::Cell;
use std::io::IsTerminal;
use std::os::fd::AsFd;
use tracing::{debug, warn};

/// Signals the interactive shell ignores for itself and every child restores.
pub(crate) const JOB_CONTROL_SIGNALS: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
];

#[derive(Debug)]
pub struct Terminal {
    interactive: bool,
    shell_pgid: Pid,
    shell_tmodes: Option<Termios>,
    /// Group the terminal was last handed to; tracked even without a terminal.
    foreground: Cell<Pid>,
}

impl Terminal {
    /// Coordinator for a shell that has no controlling terminal (batch mode, tests).
    pub fn detached() -> Self {
        let shell_pgid = getpgrp();
        Self {
            interactive: false,
            shell_pgid,
            shell_tmodes: None,
            foreground: Cell::new(shell_pgid),
        }
    }

    /// Take control of the terminal on standard input, if there is one.
    ///
    /// Waits until the shell runs in the foreground, ignores the interactive stop and
    /// interrupt signals, moves the shell into its own process group, grabs the
    /// terminal and saves its modes.
    pub fn init() -> Result<Self, JobError> {
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            return Ok(Self::detached());
        }

        loop {
            let owner = tcgetpgrp(stdin.as_fd()).map_err(JobError::Terminal)?;
            let pgid = getpgrp();
            if owner == pgid {
                break;
            }
            killpg(pgid, Signal::SIGTTIN).map_err(JobError::Terminal)?;
        }

        for sig in JOB_CONTROL_SIGNALS {
            set_handler(sig, SigHandler::SigIgn);
        }

        let shell_pgid = getpid();
        if getpgrp() != shell_pgid {
            setpgid(shell_pgid, shell_pgid).map_err(JobError::Terminal)?;
        }

        let terminal = Self {
            interactive: true,
            shell_pgid,
            shell_tmodes: None,
            foreground: Cell::new(shell_pgid),
        };
        terminal.assign(shell_pgid)?;
        let shell_tmodes = tcgetattr(stdin.as_fd()).map_err(JobError::Terminal)?;
        debug!(%shell_pgid, "shell owns the terminal");

        Ok(Self {
            shell_tmodes: Some(shell_tmodes),
            ..terminal
        })
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn shell_pgid(&self) -> Pid {
        self.shell_pgid
    }

    /// Process group that currently owns the terminal, as far as the shell knows.
    pub fn foreground_pgid(&self) -> Pid {
        self.foreground.get()
    }

    /// Make `pgid` the terminal's foreground group, reinstating `tmodes` if the job
    /// is being resumed with modes saved from an earlier stop.
    pub fn give_to(&self, pgid: Pid, tmodes: Option<&Termios>) -> Result<(), JobError> {
        if !self.interactive {
            self.foreground.set(pgid);
            return Ok(());
        }
        self.assign(pgid)?;
        if let Some(tmodes) = tmodes {
            tcsetattr(std::io::stdin().as_fd(), SetArg::TCSADRAIN, tmodes)
                .map_err(JobError::Terminal)?;
        }
        debug!(%pgid, "terminal handed to job");
        Ok(())
    }

    /// Take the terminal back for the shell.
    ///
    /// Returns the modes the job left the terminal in, so a stopped job can get them
    /// back when it is resumed, and restores the shell's own modes.
    pub fn reclaim(&self) -> Result<Option<Termios>, JobError> {
        if !self.interactive {
            self.foreground.set(self.shell_pgid);
            return Ok(None);
        }
        self.assign(self.shell_pgid)?;

        let stdin = std::io::stdin();
        let job_tmodes = match tcgetattr(stdin.as_fd()) {
            Ok(tmodes) => Some(tmodes),
            Err(errno) => {
                warn!(%errno, "could not save job terminal modes");
                None
            }
        };
        if let Some(shell_tmodes) = &self.shell_tmodes {
            tcsetattr(stdin.as_fd(), SetArg::TCSADRAIN, shell_tmodes)
                .map_err(JobError::Terminal)?;
        }
        debug!(shell_pgid = %self.shell_pgid, "terminal reclaimed");
        Ok(job_tmodes)
    }

    /// `tcsetpgrp` with SIGTTOU ignored, so that a shell that is not the current owner
    /// does not stop itself while reassigning the terminal.
    fn assign(&self, pgid: Pid) -> Result<(), JobError> {
        set_handler(Signal::SIGTTOU, SigHandler::SigIgn);
        let result = tcsetpgrp(std::io::stdin().as_fd(), pgid);
        set_handler(Signal::SIGTTOU, SigHandler::SigDfl);
        result.map_err(JobError::Terminal)?;
        self.foreground.set(pgid);
        Ok(())
    }
}

fn set_handler(sig: Signal, handler: SigHandler) {
    // Only SigIgn/SigDfl are installed, never a Rust function.
    if let Err(errno) = unsafe { signal(sig, handler) } {
        warn!(%sig, %errno, "could not change signal disposition");
    }
}
