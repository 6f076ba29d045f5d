pub mod cooldown;
pub mod scheduler;
pub mod warmup;

use crate::config::CoreConfig;
use cooldown::CooldownService;
use nucleus_utils::HyphenatedUUID;
use scheduler::Scheduler;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;
use warmup::WarmupService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubjectId {
    Console,
    Player(u128),
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectId::Console => f.write_str("console"),
            SubjectId::Player(uuid) => write!(f, "{}", HyphenatedUUID(*uuid)),
        }
    }
}

/// Anything that can run a command: a player or the console.
pub trait Subject: Send + Sync {
    fn id(&self) -> SubjectId;

    fn name(&self) -> &str;

    fn is_player(&self) -> bool {
        matches!(self.id(), SubjectId::Player(_))
    }

    fn is_online(&self) -> bool {
        true
    }

    fn send_message(&self, message: &str);
}

pub type SubjectRef = Arc<dyn Subject>;

pub trait Permissions: Send + Sync {
    fn has_permission(&self, subject: &dyn Subject, node: &str) -> anyhow::Result<bool>;

    /// The numeric permission level used to decide who may act on whom.
    fn level(&self, subject: &dyn Subject) -> anyhow::Result<i32>;

    /// A per-subject option such as `nucleus.home.cooldown`.
    fn option(&self, _subject: &dyn Subject, _key: &str) -> Option<String> {
        None
    }
}

pub trait Economy: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    /// Withdraws `amount`. `Ok(false)` means the subject could not afford it.
    fn charge(&self, subject: &dyn Subject, amount: f64) -> anyhow::Result<bool>;

    fn refund(&self, subject: &dyn Subject, amount: f64) -> anyhow::Result<()>;

    fn format_amount(&self, amount: f64) -> String {
        format!("{amount:.2}")
    }
}

pub trait Messages: Send + Sync {
    fn format(&self, key: &str, args: &[String]) -> String;
}

/// The longest cooldown or warmup that is tracked. Longer delays are clamped
/// so expiry times always fit in an [`Instant`].
pub const MAX_DELAY: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

pub fn clamp_delay(delay: Duration) -> Duration {
    delay.min(MAX_DELAY)
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// The collaborators handed to the framework.
///
/// Failures reported by the permission or economy collaborators are logged
/// and treated as a denial.
#[derive(Clone)]
pub struct Services {
    permissions: Arc<dyn Permissions>,
    economy: Option<Arc<dyn Economy>>,
    messages: Arc<dyn Messages>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    cooldowns: Arc<CooldownService>,
    warmups: Arc<WarmupService>,
    config: Arc<CoreConfig>,
}

impl Services {
    pub fn new(
        permissions: Arc<dyn Permissions>,
        messages: Arc<dyn Messages>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
        config: Arc<CoreConfig>,
    ) -> Self {
        let cooldowns = Arc::new(CooldownService::new(Arc::clone(&clock)));
        let warmups = Arc::new(WarmupService::new(Arc::clone(&scheduler)));
        Self {
            permissions,
            economy: None,
            messages,
            scheduler,
            clock,
            cooldowns,
            warmups,
            config,
        }
    }

    pub fn with_economy(mut self, economy: Arc<dyn Economy>) -> Self {
        self.economy = Some(economy);
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn cooldowns(&self) -> &CooldownService {
        &self.cooldowns
    }

    pub fn warmups(&self) -> &WarmupService {
        &self.warmups
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// The economy, if one is installed and currently usable.
    pub fn economy(&self) -> Option<&dyn Economy> {
        self.economy
            .as_deref()
            .filter(|economy| economy.is_available())
    }

    pub fn message(&self, key: &str, args: &[String]) -> String {
        self.messages.format(key, args)
    }

    pub fn has_permission(&self, subject: &dyn Subject, node: &str) -> bool {
        match self.permissions.has_permission(subject, node) {
            Ok(allowed) => allowed,
            Err(err) => {
                warn!(
                    "Permission check for {} on '{}' failed: {:#}",
                    subject.name(),
                    node,
                    err
                );
                false
            }
        }
    }

    pub fn permission_level(&self, subject: &dyn Subject) -> Option<i32> {
        match self.permissions.level(subject) {
            Ok(level) => Some(level),
            Err(err) => {
                warn!(
                    "Could not resolve permission level of {}: {:#}",
                    subject.name(),
                    err
                );
                None
            }
        }
    }

    pub fn permission_option(&self, subject: &dyn Subject, key: &str) -> Option<String> {
        self.permissions.option(subject, key)
    }
}
