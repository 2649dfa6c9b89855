//! Process management: one task table, one run queue, no threads.

pub mod task_table;
pub mod task;
pub mod wait;
pub mod scheduler;
pub mod fork;
pub mod signal;
pub mod exec;

pub use task::{Pid, PID_NONE, Task, TaskState, FileTable};
pub use scheduler::{current_pid, sched_exit, sched_schedule, sched_kill, sched_waitpid, sched_enqueue, with_task, list_pids};
pub use exec::{spawn, find_app, EmbeddedApp};
