use std::sync::mpsc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::warn;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Where a scheduled task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMode {
    /// Handed back to the host's main thread through a [`MainThreadQueue`].
    Sync,
    /// Run on a worker thread.
    Async,
}

pub trait TaskHandle: Send + Sync {
    /// Prevents the task from running if it has not started yet.
    fn cancel(&self);
}

pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, mode: TaskMode, task: Task) -> Box<dyn TaskHandle>;
}

impl TaskHandle for tokio::task::AbortHandle {
    fn cancel(&self) {
        self.abort();
    }
}

/// Drained by the host on its main thread.
pub struct MainThreadQueue {
    tasks: mpsc::Receiver<Task>,
}

impl MainThreadQueue {
    /// Runs every task that is ready, returning how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.tasks.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Waits up to `timeout` for a task, then runs everything that is ready.
    pub fn run_pending_timeout(&self, timeout: Duration) -> usize {
        match self.tasks.recv_timeout(timeout) {
            Ok(task) => {
                task();
                1 + self.run_pending()
            }
            Err(_) => 0,
        }
    }
}

pub struct TokioScheduler {
    runtime: Handle,
    main_thread: mpsc::Sender<Task>,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> (TokioScheduler, MainThreadQueue) {
        let (main_thread, tasks) = mpsc::channel();
        (
            TokioScheduler {
                runtime,
                main_thread,
            },
            MainThreadQueue { tasks },
        )
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, mode: TaskMode, task: Task) -> Box<dyn TaskHandle> {
        let handle = match mode {
            TaskMode::Async => self.runtime.spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if let Err(err) = tokio::task::spawn_blocking(task).await {
                    warn!("Scheduled task failed: {}", err);
                }
            }),
            TaskMode::Sync => {
                let main_thread = self.main_thread.clone();
                self.runtime.spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    if main_thread.send(task).is_err() {
                        warn!("Main thread queue closed, dropping scheduled task");
                    }
                })
            }
        };
        Box::new(handle.abort_handle())
    }
}
