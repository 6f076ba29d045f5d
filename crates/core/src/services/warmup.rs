use super::scheduler::{Scheduler, TaskHandle, TaskMode};
use super::{clamp_delay, SubjectId, SubjectRef};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::debug;

/// Work that runs once a warmup completes.
pub trait WarmupTask: Send {
    fn run(self: Box<Self>);

    /// Called instead of [`WarmupTask::run`] when the warmup is cancelled,
    /// superseded, or the subject went offline.
    ///
    /// Runs while the warmup lock is held and must not call back into the
    /// [`WarmupService`].
    fn on_cancel(self: Box<Self>) {}
}

struct PendingWarmup {
    id: u64,
    handle: Box<dyn TaskHandle>,
    task: Box<dyn WarmupTask>,
}

impl PendingWarmup {
    fn cancel(self) {
        self.handle.cancel();
        self.task.on_cancel();
    }
}

struct WarmupState {
    scheduler: Arc<dyn Scheduler>,
    next_id: AtomicU64,
    pending: Mutex<FxHashMap<SubjectId, PendingWarmup>>,
}

impl WarmupState {
    fn fire(&self, subject: &SubjectRef, id: u64) {
        let warmup = {
            let mut pending = self.pending.lock().unwrap();
            match pending.get(&subject.id()) {
                Some(warmup) if warmup.id == id => pending.remove(&subject.id()),
                _ => None,
            }
        };

        // Cancelled or superseded while the timer was running.
        let Some(warmup) = warmup else {
            return;
        };

        if subject.is_online() {
            warmup.task.run();
        } else {
            debug!("Dropping warmup for {}, who is no longer online", subject.name());
            warmup.task.on_cancel();
        }
    }
}

/// Tracks at most one delayed task per subject.
pub struct WarmupService {
    state: Arc<WarmupState>,
}

impl WarmupService {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            state: Arc::new(WarmupState {
                scheduler,
                next_id: AtomicU64::new(0),
                pending: Mutex::new(FxHashMap::default()),
            }),
        }
    }

    /// Schedules `task` to run after `duration`, cancelling any warmup the
    /// subject already has pending.
    pub fn schedule_after(
        &self,
        subject: &SubjectRef,
        duration: Duration,
        task: Box<dyn WarmupTask>,
        mode: TaskMode,
    ) {
        let mut pending = self.state.pending.lock().unwrap();
        if let Some(previous) = pending.remove(&subject.id()) {
            debug!("Replacing pending warmup of {}", subject.name());
            previous.cancel();
        }

        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        let state: Weak<WarmupState> = Arc::downgrade(&self.state);
        let target = Arc::clone(subject);
        let handle = self.state.scheduler.schedule(
            clamp_delay(duration),
            mode,
            Box::new(move || {
                if let Some(state) = state.upgrade() {
                    state.fire(&target, id);
                }
            }),
        );

        pending.insert(subject.id(), PendingWarmup { id, handle, task });
    }

    /// Cancels the subject's pending warmup. Returns whether one existed.
    pub fn cancel(&self, subject: SubjectId) -> bool {
        let mut pending = self.state.pending.lock().unwrap();
        match pending.remove(&subject) {
            Some(warmup) => {
                warmup.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, subject: SubjectId) -> bool {
        self.state.pending.lock().unwrap().contains_key(&subject)
    }

    pub fn pending_count(&self) -> usize {
        self.state.pending.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Subject;
    use crate::services::scheduler::Task;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct QueuedScheduler {
        tasks: Mutex<Vec<(Arc<AtomicBool>, Task)>>,
    }

    struct Flag(Arc<AtomicBool>);

    impl TaskHandle for Flag {
        fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    impl QueuedScheduler {
        fn run_all(&self) {
            let tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
            for (cancelled, task) in tasks {
                if !cancelled.load(Ordering::SeqCst) {
                    task();
                }
            }
        }
    }

    impl Scheduler for QueuedScheduler {
        fn schedule(&self, _: Duration, _: TaskMode, task: Task) -> Box<dyn TaskHandle> {
            let cancelled = Arc::new(AtomicBool::new(false));
            self.tasks.lock().unwrap().push((cancelled.clone(), task));
            Box::new(Flag(cancelled))
        }
    }

    /// Starts every task at once on its own thread.
    #[derive(Default)]
    struct ThreadScheduler {
        workers: Mutex<Vec<std::thread::JoinHandle<()>>>,
    }

    impl ThreadScheduler {
        fn join_all(&self) {
            let workers = std::mem::take(&mut *self.workers.lock().unwrap());
            for worker in workers {
                worker.join().unwrap();
            }
        }
    }

    impl Scheduler for ThreadScheduler {
        fn schedule(&self, _: Duration, _: TaskMode, task: Task) -> Box<dyn TaskHandle> {
            let cancelled = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&cancelled);
            let worker = std::thread::spawn(move || {
                if !flag.load(Ordering::SeqCst) {
                    task();
                }
            });
            self.workers.lock().unwrap().push(worker);
            Box::new(Flag(cancelled))
        }
    }

    struct Player {
        online: AtomicBool,
    }

    impl Subject for Player {
        fn id(&self) -> SubjectId {
            SubjectId::Player(7)
        }

        fn name(&self) -> &str {
            "bob"
        }

        fn is_online(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }

        fn send_message(&self, _: &str) {}
    }

    #[derive(Clone, Default)]
    struct Counters {
        ran: Arc<AtomicU64>,
        cancelled: Arc<AtomicU64>,
    }

    impl WarmupTask for Counters {
        fn run(self: Box<Self>) {
            self.ran.fetch_add(1, Ordering::SeqCst);
        }

        fn on_cancel(self: Box<Self>) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn setup() -> (Arc<QueuedScheduler>, WarmupService, SubjectRef) {
        let scheduler = Arc::new(QueuedScheduler::default());
        let service = WarmupService::new(scheduler.clone());
        let player: SubjectRef = Arc::new(Player {
            online: AtomicBool::new(true),
        });
        (scheduler, service, player)
    }

    #[test]
    fn completed_warmup_runs_once() {
        let (scheduler, warmups, player) = setup();
        let counters = Counters::default();
        warmups.schedule_after(
            &player,
            Duration::from_secs(5),
            Box::new(counters.clone()),
            TaskMode::Sync,
        );
        assert!(warmups.is_pending(player.id()));

        scheduler.run_all();
        assert_eq!(counters.ran.load(Ordering::SeqCst), 1);
        assert!(!warmups.is_pending(player.id()));
        assert!(!warmups.cancel(player.id()));
    }

    #[test]
    fn cancel_is_idempotent() {
        let (scheduler, warmups, player) = setup();
        let counters = Counters::default();
        warmups.schedule_after(
            &player,
            Duration::from_secs(5),
            Box::new(counters.clone()),
            TaskMode::Sync,
        );

        assert!(warmups.cancel(player.id()));
        assert!(!warmups.cancel(player.id()));
        scheduler.run_all();
        assert_eq!(counters.ran.load(Ordering::SeqCst), 0);
        assert_eq!(counters.cancelled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn second_warmup_supersedes_first() {
        let (scheduler, warmups, player) = setup();
        let first = Counters::default();
        let second = Counters::default();
        warmups.schedule_after(&player, Duration::from_secs(5), Box::new(first.clone()), TaskMode::Sync);
        warmups.schedule_after(&player, Duration::from_secs(5), Box::new(second.clone()), TaskMode::Sync);

        assert_eq!(first.cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(warmups.pending_count(), 1);

        scheduler.run_all();
        assert_eq!(first.ran.load(Ordering::SeqCst), 0);
        assert_eq!(second.ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn offline_subject_is_skipped() {
        let scheduler = Arc::new(QueuedScheduler::default());
        let warmups = WarmupService::new(scheduler.clone());
        let player = Arc::new(Player {
            online: AtomicBool::new(true),
        });
        let subject: SubjectRef = player.clone();
        let counters = Counters::default();
        warmups.schedule_after(&subject, Duration::from_secs(5), Box::new(counters.clone()), TaskMode::Sync);

        player.online.store(false, Ordering::SeqCst);
        scheduler.run_all();
        assert_eq!(counters.ran.load(Ordering::SeqCst), 0);
        assert!(!warmups.is_pending(subject.id()));
    }

    #[test]
    fn firing_and_cancelling_race_to_one_outcome() {
        let scheduler = Arc::new(ThreadScheduler::default());
        let warmups = Arc::new(WarmupService::new(scheduler.clone()));
        let player: SubjectRef = Arc::new(Player {
            online: AtomicBool::new(true),
        });

        for _ in 0..500 {
            let counters = Counters::default();
            warmups.schedule_after(&player, Duration::ZERO, Box::new(counters.clone()), TaskMode::Async);

            let canceller = {
                let warmups = Arc::clone(&warmups);
                let subject = player.id();
                std::thread::spawn(move || warmups.cancel(subject))
            };
            let cancelled = canceller.join().unwrap();
            scheduler.join_all();

            let ran = counters.ran.load(Ordering::SeqCst);
            assert_eq!(ran + u64::from(cancelled), 1);
            assert_eq!(counters.cancelled.load(Ordering::SeqCst), u64::from(cancelled));
            assert!(!warmups.is_pending(player.id()));
        }
    }

    #[test]
    fn concurrent_schedules_leave_one_warmup_per_subject() {
        let scheduler = Arc::new(QueuedScheduler::default());
        let warmups = Arc::new(WarmupService::new(scheduler.clone()));
        let player: SubjectRef = Arc::new(Player {
            online: AtomicBool::new(true),
        });
        let counters = Counters::default();

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let warmups = Arc::clone(&warmups);
                let player = Arc::clone(&player);
                let counters = counters.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        warmups.schedule_after(
                            &player,
                            Duration::from_secs(5),
                            Box::new(counters.clone()),
                            TaskMode::Sync,
                        );
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(warmups.pending_count(), 1);
        assert_eq!(counters.cancelled.load(Ordering::SeqCst), 8 * 50 - 1);
        scheduler.run_all();
        assert_eq!(counters.ran.load(Ordering::SeqCst), 1);
    }
}
