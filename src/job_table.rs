use crate::error::JobError;
use crate::job::{Job, JobId};
use nix::unistd::Pid;
use tracing::debug;

/// Default number of simultaneously active jobs.
pub const DEFAULT_CAPACITY: usize = 16;

/// Fixed-capacity registry of active jobs.
///
/// Slot `i` holds job id `i + 1`. A new job takes the lowest free slot, so ids are
/// reused as soon as a job is removed and must not be remembered across waits.
#[derive(Debug)]
pub struct JobTable {
    slots: Vec<Option<Job>>,
}

impl JobTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `job` in the lowest free slot and return its id.
    ///
    /// When every slot is taken the job is dropped and [`JobError::TableFull`] is returned.
    pub fn insert(&mut self, mut job: Job) -> Result<JobId, JobError> {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            return Err(JobError::TableFull {
                capacity: self.capacity(),
            });
        };
        let id = index + 1;
        job.id = id;
        debug!(id, command = %job.command, "job inserted");
        self.slots[index] = Some(job);
        Ok(id)
    }

    /// Free the slot of `id`, handing back the job and its processes. No-op when empty.
    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        let job = self.slot_mut(id)?.take();
        if job.is_some() {
            debug!(id, "job removed");
        }
        job
    }

    pub fn lookup(&self, id: JobId) -> Option<&Job> {
        id.checked_sub(1)
            .and_then(|index| self.slots.get(index))
            .and_then(Option::as_ref)
    }

    pub fn lookup_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.slot_mut(id)?.as_mut()
    }

    /// Linear scan for the job whose chain contains `pid`.
    pub fn get_owning_job_id(&self, pid: Pid) -> Option<JobId> {
        self.iter().find(|job| job.owns(pid)).map(|job| job.id)
    }

    /// Ids of the active jobs in slot order, as a snapshot.
    pub fn ids(&self) -> Vec<JobId> {
        self.iter().map(|job| job.id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.slots.iter().flatten()
    }

    fn slot_mut(&mut self, id: JobId) -> Option<&mut Option<Job>> {
        id.checked_sub(1).and_then(|index| self.slots.get_mut(index))
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
