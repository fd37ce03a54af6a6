//! # Parallel task dispatcher
//! * runs independent tasks on OS threads (a rayon pool), each with its own
//!   deterministic seed
//! * periodic status reports: the dispatcher asks every running task for a
//!   snapshot through its [`StatusSlot`](crate::stats::StatusSlot) and hands
//!   the aggregated [`FullStatusReport`] to a serialised callback
//! * cooperative cancellation through a shared flag, honoured by the walks at
//!   sweep boundaries

use rayon::prelude::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::stats::{StatusSlot, WorkerStatusReport};

/// # Why a task did not produce a result
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TaskErrors {
    /// the task was cancelled through the interrupt flag
    Interrupted,
    /// the task failed; the message describes the cause
    Failed(String),
}

impl fmt::Display for TaskErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskErrors::Interrupted => write!(f, "Interrupted: task cancelled"),
            TaskErrors::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for TaskErrors {}

/// # Result slot of one task
#[derive(Debug, Clone)]
pub enum TaskOutcome<R> {
    /// the task ran to completion
    Finished(R),
    /// the task was cancelled before completing
    Interrupted,
    /// the task aborted with an error
    Failed(String),
}

impl<R> TaskOutcome<R> {
    /// the result, if the task finished
    pub fn finished(&self) -> Option<&R> {
        match self {
            TaskOutcome::Finished(r) => Some(r),
            _ => None,
        }
    }
}

/// # Everything the dispatcher hands back after the runs
#[derive(Debug)]
pub struct TaskDispatchOutcome<R> {
    /// one outcome per task, in task order
    pub outcomes: Vec<TaskOutcome<R>>,
    /// wall-clock time spent running the tasks
    pub elapsed: Duration,
}

impl<R> TaskDispatchOutcome<R> {
    /// number of tasks that ran to completion
    pub fn num_finished(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TaskOutcome::Finished(_)))
            .count()
    }
}

/// Possible errors of the dispatcher
#[derive(Debug)]
pub enum MultiProcErrors<R> {
    /// the host signalled interruption; the partial outcomes are carried
    /// along so a partial report can still be produced
    TasksInterrupted(TaskDispatchOutcome<R>),
}

impl<R> fmt::Display for MultiProcErrors<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultiProcErrors::TasksInterrupted(_) => {
                write!(f, "Interrupted: tasks cancelled by the host")
            }
        }
    }
}

impl<R: fmt::Debug> std::error::Error for MultiProcErrors<R> {}

/// # Aggregated status of all running tasks
#[derive(Debug, Clone)]
pub struct FullStatusReport {
    /// tasks that have finished so far
    pub num_completed: usize,
    /// total number of tasks
    pub num_total_runs: usize,
    /// wall-clock time since the dispatcher started
    pub elapsed: Duration,
    /// overall fraction of work done, averaged over all tasks
    pub total_fraction_done: f64,
    /// latest per-worker snapshots; `None` for idle/finished workers
    pub workers: Vec<Option<WorkerStatusReport>>,
}

impl FullStatusReport {
    /// # Render the report for humans
    /// * one line (or two, with the histogram bar) per running worker plus a
    ///   global summary line
    pub fn human_report(&self) -> String {
        let mut s = format!(
            "*** {:.2}% done; {}/{} runs completed; elapsed {:.1}s\n",
            self.total_fraction_done * 100.0,
            self.num_completed,
            self.num_total_runs,
            self.elapsed.as_secs_f64(),
        );
        for (i, worker) in self.workers.iter().enumerate() {
            match worker {
                Some(report) => s.push_str(&format!("#{:>3}: {}\n", i, report.msg)),
                None => s.push_str(&format!("#{:>3}: <idle>\n", i)),
            }
        }
        s
    }
}

/// # Options of [`run_parallel_tasks`]
#[derive(Debug, Clone, Default)]
pub struct TaskDispatchOptions {
    /// size of the worker thread pool; `None` uses the rayon default
    pub num_threads: Option<usize>,
    /// how often status reports are produced; `None` disables them
    pub status_report_interval: Option<Duration>,
    /// cooperative cancellation flag shared with the host
    pub interrupt: Option<Arc<AtomicBool>>,
}

/// # Run `num_tasks` independent tasks in parallel
/// * `task_fn(task_idx, status_slot, interrupt)` runs on a worker thread; the
///   shared context captured by the closure must be read-only
/// * the `status_callback` is invoked from a single monitor thread only, so
///   host callbacks are serialised
/// * returns `Err(TasksInterrupted)` carrying the partial outcomes when the
///   interrupt flag was raised; individual task failures only abort their own
///   task and are reported in their outcome slot
pub fn run_parallel_tasks<R, Task, Status>(
    num_tasks: usize,
    options: TaskDispatchOptions,
    task_fn: Task,
    status_callback: Status,
) -> Result<TaskDispatchOutcome<R>, MultiProcErrors<R>>
where
    R: Send,
    Task: Fn(usize, Arc<StatusSlot>, Arc<AtomicBool>) -> Result<R, TaskErrors> + Sync,
    Status: FnMut(&FullStatusReport) + Send,
{
    let interrupt = options
        .interrupt
        .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
    let slots: Vec<Arc<StatusSlot>> = (0..num_tasks).map(|_| Arc::new(StatusSlot::new())).collect();
    let num_completed = Arc::new(AtomicUsize::new(0));
    let monitor_stop = Arc::new(AtomicBool::new(false));
    let status_callback = Mutex::new(status_callback);

    let start = Instant::now();
    info!(num_tasks, "dispatching random-walk tasks");

    let outcomes: Vec<TaskOutcome<R>> = std::thread::scope(|scope| {
        if let Some(interval) = options.status_report_interval {
            let slots = &slots;
            let num_completed = Arc::clone(&num_completed);
            let monitor_stop = Arc::clone(&monitor_stop);
            let status_callback = &status_callback;
            scope.spawn(move || {
                for slot in slots.iter() {
                    slot.request();
                }
                loop {
                    std::thread::sleep(interval);
                    if monitor_stop.load(Ordering::Relaxed) {
                        break;
                    }
                    let workers: Vec<Option<WorkerStatusReport>> =
                        slots.iter().map(|s| s.latest()).collect();
                    let completed = num_completed.load(Ordering::Relaxed);
                    let running_fraction: f64 = workers
                        .iter()
                        .flatten()
                        .map(|w| w.fraction_done)
                        .sum();
                    let report = FullStatusReport {
                        num_completed: completed,
                        num_total_runs: num_tasks,
                        elapsed: start.elapsed(),
                        total_fraction_done: ((completed as f64 + running_fraction)
                            / num_tasks as f64)
                            .min(1.0),
                        workers,
                    };
                    let mut callback = status_callback.lock().expect("status callback poisoned");
                    (*callback)(&report);
                    drop(callback);
                    for slot in slots.iter() {
                        slot.request();
                    }
                }
            });
        }

        let run_all = || {
            (0..num_tasks)
                .into_par_iter()
                .map(|task_idx| {
                    if interrupt.load(Ordering::Relaxed) {
                        return TaskOutcome::Interrupted;
                    }
                    debug!(task_idx, "task starting");
                    let outcome = match task_fn(
                        task_idx,
                        Arc::clone(&slots[task_idx]),
                        Arc::clone(&interrupt),
                    ) {
                        Ok(result) => {
                            num_completed.fetch_add(1, Ordering::Relaxed);
                            TaskOutcome::Finished(result)
                        }
                        Err(TaskErrors::Interrupted) => TaskOutcome::Interrupted,
                        Err(TaskErrors::Failed(msg)) => {
                            debug!(task_idx, error = %msg, "task failed");
                            TaskOutcome::Failed(msg)
                        }
                    };
                    slots[task_idx].clear();
                    outcome
                })
                .collect()
        };

        let outcomes = match options.num_threads {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .expect("could not build worker thread pool")
                .install(run_all),
            None => run_all(),
        };

        monitor_stop.store(true, Ordering::Relaxed);
        outcomes
    });

    let outcome = TaskDispatchOutcome {
        outcomes,
        elapsed: start.elapsed(),
    };
    info!(
        num_finished = outcome.num_finished(),
        elapsed_s = outcome.elapsed.as_secs_f64(),
        "task dispatch finished"
    );

    if interrupt.load(Ordering::Relaxed) {
        return Err(MultiProcErrors::TasksInterrupted(outcome));
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_all_tasks_and_collects_in_order() {
        let result = run_parallel_tasks(
            8,
            TaskDispatchOptions::default(),
            |task_idx, _slot, _interrupt| Ok(task_idx * 10),
            |_report| {},
        )
        .unwrap();
        assert_eq!(result.num_finished(), 8);
        for (i, outcome) in result.outcomes.iter().enumerate() {
            assert_eq!(outcome.finished(), Some(&(i * 10)));
        }
    }

    #[test]
    fn failures_only_abort_their_own_task() {
        let result = run_parallel_tasks(
            4,
            TaskDispatchOptions::default(),
            |task_idx, _slot, _interrupt| {
                if task_idx == 2 {
                    Err(TaskErrors::Failed("InvalidInput: boom".to_string()))
                } else {
                    Ok(task_idx)
                }
            },
            |_report| {},
        )
        .unwrap();
        assert_eq!(result.num_finished(), 3);
        assert!(matches!(&result.outcomes[2], TaskOutcome::Failed(msg) if msg.contains("boom")));
    }

    #[test]
    fn pre_raised_interrupt_cancels_everything() {
        let flag = Arc::new(AtomicBool::new(true));
        let err = run_parallel_tasks(
            3,
            TaskDispatchOptions {
                interrupt: Some(flag),
                ..Default::default()
            },
            |task_idx, _slot, _interrupt| Ok(task_idx),
            |_report| {},
        )
        .map(|_| ())
        .unwrap_err();
        let MultiProcErrors::TasksInterrupted(outcome) = err;
        assert_eq!(outcome.num_finished(), 0);
        assert!(outcome
            .outcomes
            .iter()
            .all(|o| matches!(o, TaskOutcome::Interrupted)));
    }
}
