//! Admin-side state machines (THE CORE §4.10): the job executor that drives
//! `rebuild-index`/`compact`/`flush`/`stats` to completion across storage
//! hosts, and the log monitor that reacts to log-disk pressure.

pub mod job;
pub mod log_monitor;

pub use job::{JobCommand, JobDescription, JobManager, JobStatus, SharedJobManager, Task, TaskStatus};
pub use log_monitor::{LogMonitor, LogMonitorConfig, MinLogLevel};
