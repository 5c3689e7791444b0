//! Admin job executor (THE CORE §4.10): `Queued -> Running -> {Finished,
//! Failed, Stopped}`, fanning out one task per storage host and aggregating
//! their terminal states. Grounded on the original's `AdminJobProcessor` /
//! `JobManager` (dispatch + `checkJobExist` dedup) and `RebuildJobExecutor`
//! (per-host task fan-out, aggregate-to-Finished-only-when-all-tasks-done).

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobCommand {
    RebuildTagIndex,
    RebuildEdgeIndex,
    Compact,
    Flush,
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Finished,
    Failed,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Running,
    Finished,
    Failed,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub host: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone)]
pub struct JobDescription {
    pub id: u64,
    pub cmd: JobCommand,
    pub params: Vec<String>,
    pub status: JobStatus,
    pub tasks: Vec<Task>,
}

impl JobDescription {
    /// A job is `Finished` only once every task is `Finished` (never
    /// vacuously true for a job with no tasks yet assigned).
    fn recompute_status(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        if self.tasks.iter().any(|t| t.status == TaskStatus::Stopped) {
            self.status = JobStatus::Stopped;
        } else if self.tasks.iter().any(|t| t.status == TaskStatus::Failed) {
            self.status = JobStatus::Failed;
        } else if self.tasks.iter().all(|t| t.status == TaskStatus::Finished) {
            self.status = JobStatus::Finished;
        } else {
            self.status = JobStatus::Running;
        }
    }
}

/// Coordinates admin jobs across the storage hosts known to a space.
/// Matches the teacher's choice of `RwLock`-guarded registries for state
/// that's read far more than written (`codec::schema::SchemaRegistry`,
/// `graph::space::SpaceManager`).
pub struct JobManager {
    next_id: AtomicU64,
    jobs: RwLock<HashMap<u64, JobDescription>>,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl JobManager {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1), jobs: RwLock::new(HashMap::new()) }
    }

    /// `addJob` with the original's `checkJobExist` dedup: a job with
    /// `ignore_existing` set reuses a currently-running job with the same
    /// command and parameters instead of starting a second one.
    pub fn add_job(&self, cmd: JobCommand, params: Vec<String>, hosts: &[String], ignore_existing: bool) -> u64 {
        if ignore_existing {
            let jobs = self.jobs.read().unwrap();
            if let Some(existing) = jobs.values().find(|j| {
                j.cmd == cmd && j.params == params && matches!(j.status, JobStatus::Queued | JobStatus::Running)
            }) {
                return existing.id;
            }
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let tasks = hosts.iter().map(|h| Task { host: h.clone(), status: TaskStatus::Queued }).collect();
        let job = JobDescription { id, cmd, params, status: JobStatus::Queued, tasks };
        self.jobs.write().unwrap().insert(id, job);
        id
    }

    pub fn show_job(&self, id: u64) -> Result<JobDescription> {
        self.jobs
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::SchemaNotFound(format!("job {id}")))
    }

    pub fn show_jobs(&self) -> Vec<JobDescription> {
        let mut jobs: Vec<_> = self.jobs.read().unwrap().values().cloned().collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    /// Reports one host's task as having reached a terminal (or running)
    /// state and recomputes the job's aggregate status.
    pub fn report_task(&self, id: u64, host: &str, status: TaskStatus) -> Result<()> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&id).ok_or_else(|| Error::SchemaNotFound(format!("job {id}")))?;
        if let Some(task) = job.tasks.iter_mut().find(|t| t.host == host) {
            task.status = status;
        }
        if job.status == JobStatus::Queued {
            job.status = JobStatus::Running;
        }
        job.recompute_status();
        Ok(())
    }

    /// `Stop` fans out a stop-task RPC to every storage host currently
    /// running a task for this job (spec.md §4.10); here that fan-out is
    /// represented as marking every non-terminal task `Stopped` and letting
    /// the caller actually notify those hosts out of band.
    pub fn stop_job(&self, id: u64) -> Result<Vec<String>> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&id).ok_or_else(|| Error::SchemaNotFound(format!("job {id}")))?;
        let mut notified = Vec::new();
        for task in &mut job.tasks {
            if matches!(task.status, TaskStatus::Queued | TaskStatus::Running) {
                task.status = TaskStatus::Stopped;
                notified.push(task.host.clone());
            }
        }
        job.status = JobStatus::Stopped;
        Ok(notified)
    }
}

pub type SharedJobManager = Arc<JobManager>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_finishes_only_when_every_task_finishes() {
        let mgr = JobManager::new();
        let id = mgr.add_job(JobCommand::RebuildTagIndex, vec!["t".into()], &["h1".into(), "h2".into()], false);
        assert_eq!(mgr.show_job(id).unwrap().status, JobStatus::Queued);

        mgr.report_task(id, "h1", TaskStatus::Finished).unwrap();
        assert_eq!(mgr.show_job(id).unwrap().status, JobStatus::Running);

        mgr.report_task(id, "h2", TaskStatus::Finished).unwrap();
        assert_eq!(mgr.show_job(id).unwrap().status, JobStatus::Finished);
    }

    #[test]
    fn any_failed_task_fails_the_job() {
        let mgr = JobManager::new();
        let id = mgr.add_job(JobCommand::Stats, vec![], &["h1".into(), "h2".into()], false);
        mgr.report_task(id, "h1", TaskStatus::Finished).unwrap();
        mgr.report_task(id, "h2", TaskStatus::Failed).unwrap();
        assert_eq!(mgr.show_job(id).unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn ignore_existing_dedups_by_command_and_params() {
        let mgr = JobManager::new();
        let id1 = mgr.add_job(JobCommand::Compact, vec!["spc".into()], &["h1".into()], true);
        let id2 = mgr.add_job(JobCommand::Compact, vec!["spc".into()], &["h1".into()], true);
        assert_eq!(id1, id2);
    }

    #[test]
    fn stop_marks_non_terminal_tasks_stopped() {
        let mgr = JobManager::new();
        let id = mgr.add_job(JobCommand::RebuildEdgeIndex, vec![], &["h1".into(), "h2".into()], false);
        mgr.report_task(id, "h1", TaskStatus::Finished).unwrap();
        let notified = mgr.stop_job(id).unwrap();
        assert_eq!(notified, vec!["h2".to_string()]);
        assert_eq!(mgr.show_job(id).unwrap().status, JobStatus::Stopped);
    }
}
