//! In-memory collaborators for exercising the command framework without a
//! game server.

use crate::commands::{AfkTracker, Completions, SubjectLookup};
use crate::config::CoreConfig;
use crate::messages::MessageBundle;
use crate::services::scheduler::{Scheduler, Task, TaskHandle, TaskMode};
use crate::services::{Clock, Economy, Permissions, Services, Subject, SubjectId, SubjectRef};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub struct TestSubject {
    id: SubjectId,
    name: String,
    online: AtomicBool,
    messages: Mutex<Vec<String>>,
}

impl TestSubject {
    fn new(id: SubjectId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            online: AtomicBool::new(true),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Takes every message received so far.
    pub fn take_messages(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock().unwrap())
    }
}

impl Subject for TestSubject {
    fn id(&self) -> SubjectId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn send_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }

    fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap();
        *offset = offset.saturating_add(by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }
}

struct ScheduledTask {
    due: Duration,
    mode: TaskMode,
    cancelled: Arc<AtomicBool>,
    task: Task,
}

struct CancelFlag(Arc<AtomicBool>);

impl TaskHandle for CancelFlag {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Runs tasks on the calling thread when [`ManualClock`] time passes.
/// Both task modes run inline.
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    tasks: Mutex<Vec<ScheduledTask>>,
    async_runs: AtomicUsize,
}

impl ManualScheduler {
    fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            tasks: Mutex::new(Vec::new()),
            async_runs: AtomicUsize::new(0),
        }
    }

    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|task| !task.cancelled.load(Ordering::SeqCst))
            .count()
    }

    /// How many tasks have run in [`TaskMode::Async`].
    pub fn async_runs(&self) -> usize {
        self.async_runs.load(Ordering::SeqCst)
    }

    fn run_due(&self) -> usize {
        let mut ran = 0;
        loop {
            let now = self.clock.elapsed();
            let due = {
                let mut tasks = self.tasks.lock().unwrap();
                tasks.retain(|task| !task.cancelled.load(Ordering::SeqCst));
                let index = tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, task)| task.due <= now)
                    .min_by_key(|(_, task)| task.due)
                    .map(|(index, _)| index);
                index.map(|index| tasks.remove(index))
            };
            let Some(scheduled) = due else {
                return ran;
            };
            if scheduled.cancelled.load(Ordering::SeqCst) {
                continue;
            }
            if scheduled.mode == TaskMode::Async {
                self.async_runs.fetch_add(1, Ordering::SeqCst);
            }
            (scheduled.task)();
            ran += 1;
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, mode: TaskMode, task: Task) -> Box<dyn TaskHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.tasks.lock().unwrap().push(ScheduledTask {
            due: self.clock.elapsed().saturating_add(delay),
            mode,
            cancelled: Arc::clone(&cancelled),
            task,
        });
        Box::new(CancelFlag(cancelled))
    }
}

/// Permissions, levels and options held in maps. The console has every
/// permission; players start with none and level 0.
#[derive(Default)]
pub struct MemoryPermissions {
    granted: Mutex<FxHashSet<(SubjectId, String)>>,
    levels: Mutex<FxHashMap<SubjectId, i32>>,
    options: Mutex<FxHashMap<(SubjectId, String), String>>,
    broken: AtomicBool,
}

impl MemoryPermissions {
    pub fn grant(&self, subject: SubjectId, permission: &str) {
        self.granted
            .lock()
            .unwrap()
            .insert((subject, permission.to_string()));
    }

    pub fn revoke(&self, subject: SubjectId, permission: &str) {
        self.granted
            .lock()
            .unwrap()
            .remove(&(subject, permission.to_string()));
    }

    pub fn set_level(&self, subject: SubjectId, level: i32) {
        self.levels.lock().unwrap().insert(subject, level);
    }

    pub fn set_option(&self, subject: SubjectId, key: &str, value: &str) {
        self.options
            .lock()
            .unwrap()
            .insert((subject, key.to_string()), value.to_string());
    }

    /// Makes every lookup fail until switched back.
    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            anyhow::bail!("permission backend unavailable");
        }
        Ok(())
    }
}

impl Permissions for MemoryPermissions {
    fn has_permission(&self, subject: &dyn Subject, node: &str) -> anyhow::Result<bool> {
        self.check()?;
        if !subject.is_player() {
            return Ok(true);
        }
        Ok(self
            .granted
            .lock()
            .unwrap()
            .contains(&(subject.id(), node.to_string())))
    }

    fn level(&self, subject: &dyn Subject) -> anyhow::Result<i32> {
        self.check()?;
        Ok(self
            .levels
            .lock()
            .unwrap()
            .get(&subject.id())
            .copied()
            .unwrap_or(0))
    }

    fn option(&self, subject: &dyn Subject, key: &str) -> Option<String> {
        self.options
            .lock()
            .unwrap()
            .get(&(subject.id(), key.to_string()))
            .cloned()
    }
}

#[derive(Default)]
pub struct MemoryEconomy {
    balances: Mutex<FxHashMap<SubjectId, f64>>,
    charges: AtomicUsize,
    refunds: AtomicUsize,
    offline: AtomicBool,
}

impl MemoryEconomy {
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    pub fn set_balance(&self, subject: SubjectId, balance: f64) {
        self.balances.lock().unwrap().insert(subject, balance);
    }

    pub fn balance(&self, subject: SubjectId) -> f64 {
        self.balances
            .lock()
            .unwrap()
            .get(&subject)
            .copied()
            .unwrap_or(0.0)
    }

    /// Successful charges so far.
    pub fn charges(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }

    pub fn refunds(&self) -> usize {
        self.refunds.load(Ordering::SeqCst)
    }
}

impl Economy for MemoryEconomy {
    fn is_available(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }

    fn charge(&self, subject: &dyn Subject, amount: f64) -> anyhow::Result<bool> {
        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(subject.id()).or_insert(0.0);
        if *balance < amount {
            return Ok(false);
        }
        *balance -= amount;
        self.charges.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    fn refund(&self, subject: &dyn Subject, amount: f64) -> anyhow::Result<()> {
        *self
            .balances
            .lock()
            .unwrap()
            .entry(subject.id())
            .or_insert(0.0) += amount;
        self.refunds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAfk {
    away: Mutex<FxHashSet<SubjectId>>,
}

impl MemoryAfk {
    pub fn set_afk(&self, subject: SubjectId, afk: bool) {
        let mut away = self.away.lock().unwrap();
        if afk {
            away.insert(subject);
        } else {
            away.remove(&subject);
        }
    }
}

impl AfkTracker for MemoryAfk {
    fn is_afk(&self, subject: SubjectId) -> bool {
        self.away.lock().unwrap().contains(&subject)
    }
}

#[derive(Default)]
struct SubjectDirectory {
    subjects: Mutex<Vec<Arc<TestSubject>>>,
}

impl SubjectDirectory {
    fn get_or_create(&self, name: &str, id: impl FnOnce(usize) -> SubjectId) -> Arc<TestSubject> {
        let mut subjects = self.subjects.lock().unwrap();
        if let Some(existing) = subjects.iter().find(|subject| subject.name == name) {
            return Arc::clone(existing);
        }
        let subject = Arc::new(TestSubject::new(id(subjects.len()), name));
        subjects.push(Arc::clone(&subject));
        subject
    }

    fn by_id(&self, id: SubjectId) -> Option<Arc<TestSubject>> {
        self.subjects
            .lock()
            .unwrap()
            .iter()
            .find(|subject| subject.id == id)
            .cloned()
    }
}

impl SubjectLookup for SubjectDirectory {
    fn find(&self, name: &str) -> Option<SubjectRef> {
        self.subjects
            .lock()
            .unwrap()
            .iter()
            .find(|subject| subject.is_player() && subject.is_online() && subject.name.eq_ignore_ascii_case(name))
            .map(|subject| Arc::clone(subject) as SubjectRef)
    }

    fn online_names(&self) -> Completions<'_> {
        Box::new(
            (0usize..)
                .map_while(|index| self.subjects.lock().unwrap().get(index).cloned())
                .filter(|subject| subject.is_player() && subject.is_online())
                .map(|subject| subject.name.clone()),
        )
    }
}

/// A full [`Services`] wired to in-memory collaborators, plus handles to
/// drive and inspect them.
pub struct TestServices {
    pub services: Services,
    pub clock: Arc<ManualClock>,
    pub scheduler: Arc<ManualScheduler>,
    pub permissions: Arc<MemoryPermissions>,
    pub economy: Arc<MemoryEconomy>,
    pub afk: Arc<MemoryAfk>,
    directory: Arc<SubjectDirectory>,
}

impl TestServices {
    pub fn new() -> Self {
        Self::with_config(CoreConfig::default())
    }

    pub fn with_config(config: CoreConfig) -> Self {
        Self::build(config, MessageBundle::default())
    }

    pub fn with_messages(messages: MessageBundle) -> Self {
        Self::build(CoreConfig::default(), messages)
    }

    fn build(config: CoreConfig, messages: MessageBundle) -> Self {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Arc::new(ManualScheduler::new(Arc::clone(&clock)));
        let permissions = Arc::new(MemoryPermissions::default());
        let economy = Arc::new(MemoryEconomy::default());
        let services = Services::new(
            permissions.clone(),
            Arc::new(messages),
            scheduler.clone(),
            clock.clone(),
            Arc::new(config),
        )
        .with_economy(economy.clone());

        Self {
            services,
            clock,
            scheduler,
            permissions,
            economy,
            afk: Arc::new(MemoryAfk::default()),
            directory: Arc::new(SubjectDirectory::default()),
        }
    }

    /// The player called `name`, created on first use.
    pub fn player(&self, name: &str) -> SubjectRef {
        self.directory
            .get_or_create(name, |index| SubjectId::Player(index as u128 + 1))
    }

    pub fn console(&self) -> SubjectRef {
        self.directory.get_or_create("Console", |_| SubjectId::Console)
    }

    pub fn subject(&self, subject: &SubjectRef) -> Arc<TestSubject> {
        self.directory
            .by_id(subject.id())
            .expect("subject was not created by this harness")
    }

    /// Takes the messages `subject` received since the last call.
    pub fn messages(&self, subject: &SubjectRef) -> Vec<String> {
        self.subject(subject).take_messages()
    }

    pub fn lookup(&self) -> Arc<dyn SubjectLookup> {
        self.directory.clone()
    }

    pub fn grant(&self, subject: &SubjectRef, permission: &str) {
        self.permissions.grant(subject.id(), permission);
    }

    /// Moves the clock forward and runs every task that became due.
    pub fn advance(&self, by: Duration) -> usize {
        self.clock.advance(by);
        self.scheduler.run_due()
    }

    /// Runs tasks that are already due, such as async hand-offs.
    pub fn run_pending(&self) -> usize {
        self.advance(Duration::ZERO)
    }
}

impl Default for TestServices {
    fn default() -> Self {
        Self::new()
    }
}
