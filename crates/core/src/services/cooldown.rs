use super::{clamp_delay, Clock, SubjectId};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::warn;

type CooldownKey = (String, SubjectId);

/// Remembers when each (command key, subject) pair may run again.
///
/// Expired entries are evicted on every access, so an entry is never
/// observable once its expiry has passed.
pub struct CooldownService {
    clock: Arc<dyn Clock>,
    cooldowns: Mutex<FxHashMap<CooldownKey, Instant>>,
}

impl CooldownService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            cooldowns: Mutex::new(FxHashMap::default()),
        }
    }

    fn clean_up(&self, now: Instant) -> MutexGuard<'_, FxHashMap<CooldownKey, Instant>> {
        let mut cooldowns = self.cooldowns.lock().unwrap();
        cooldowns.retain(|_, expiry| *expiry > now);
        cooldowns
    }

    pub fn has_cooldown(&self, key: &str, subject: SubjectId) -> bool {
        let now = self.clock.now();
        self.clean_up(now)
            .contains_key(&(key.to_string(), subject))
    }

    /// Time left before `subject` may run `key` again.
    pub fn get_cooldown(&self, key: &str, subject: SubjectId) -> Option<Duration> {
        let now = self.clock.now();
        self.clean_up(now)
            .get(&(key.to_string(), subject))
            .map(|expiry| expiry.saturating_duration_since(now))
    }

    /// Starts a cooldown. A zero duration clears it, and durations beyond
    /// [`MAX_DELAY`](super::MAX_DELAY) are clamped.
    pub fn set_cooldown(&self, key: &str, subject: SubjectId, duration: Duration) {
        let now = self.clock.now();
        let expiry = if duration.is_zero() {
            None
        } else {
            match now.checked_add(clamp_delay(duration)) {
                Some(expiry) => Some(expiry),
                None => {
                    warn!("Ignoring cooldown of {:?} for {} on {}", duration, subject, key);
                    return;
                }
            }
        };

        let mut cooldowns = self.clean_up(now);
        match expiry {
            Some(expiry) => cooldowns.insert((key.to_string(), subject), expiry),
            None => cooldowns.remove(&(key.to_string(), subject)),
        };
    }

    pub fn clear_cooldown(&self, key: &str, subject: SubjectId) {
        let now = self.clock.now();
        self.clean_up(now).remove(&(key.to_string(), subject));
    }

    pub fn active_cooldowns(&self) -> usize {
        let now = self.clock.now();
        self.clean_up(now).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StepClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl StepClock {
        fn advance(&self, by: Duration) {
            *self.offset.lock().unwrap() += by;
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock().unwrap()
        }
    }

    fn service() -> (Arc<StepClock>, CooldownService) {
        let clock = Arc::new(StepClock {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        });
        let service = CooldownService::new(clock.clone());
        (clock, service)
    }

    const ALICE: SubjectId = SubjectId::Player(1);
    const BOB: SubjectId = SubjectId::Player(2);

    #[test]
    fn cooldown_expires_after_duration() {
        let (clock, cooldowns) = service();
        cooldowns.set_cooldown("kick", ALICE, Duration::from_secs(10));

        clock.advance(Duration::from_secs(4));
        assert!(cooldowns.has_cooldown("kick", ALICE));
        assert_eq!(
            cooldowns.get_cooldown("kick", ALICE),
            Some(Duration::from_secs(6))
        );

        clock.advance(Duration::from_secs(6));
        assert!(!cooldowns.has_cooldown("kick", ALICE));
        assert_eq!(cooldowns.get_cooldown("kick", ALICE), None);
        assert_eq!(cooldowns.active_cooldowns(), 0);
    }

    #[test]
    fn cooldowns_are_per_subject_and_key() {
        let (_, cooldowns) = service();
        cooldowns.set_cooldown("kick", ALICE, Duration::from_secs(10));

        assert!(!cooldowns.has_cooldown("kick", BOB));
        assert!(!cooldowns.has_cooldown("home", ALICE));
    }

    #[test]
    fn clearing_and_zero_duration_remove_entry() {
        let (_, cooldowns) = service();
        cooldowns.set_cooldown("kick", ALICE, Duration::from_secs(10));
        cooldowns.clear_cooldown("kick", ALICE);
        assert!(!cooldowns.has_cooldown("kick", ALICE));

        cooldowns.set_cooldown("kick", BOB, Duration::from_secs(10));
        cooldowns.set_cooldown("kick", BOB, Duration::ZERO);
        assert!(!cooldowns.has_cooldown("kick", BOB));
    }

    #[test]
    fn oversized_cooldowns_are_clamped() {
        let (clock, cooldowns) = service();
        cooldowns.set_cooldown("kick", ALICE, Duration::MAX);
        assert_eq!(
            cooldowns.get_cooldown("kick", ALICE),
            Some(crate::services::MAX_DELAY)
        );

        // The map stays usable for everyone else afterwards.
        cooldowns.set_cooldown("kick", BOB, Duration::from_secs(5));
        clock.advance(Duration::from_secs(5));
        assert!(!cooldowns.has_cooldown("kick", BOB));
        assert!(cooldowns.has_cooldown("kick", ALICE));
    }

    #[test]
    fn concurrent_updates_keep_the_map_consistent() {
        let (_, cooldowns) = service();
        let cooldowns = Arc::new(cooldowns);

        let workers: Vec<_> = (0..8u128)
            .map(|worker| {
                let cooldowns = Arc::clone(&cooldowns);
                std::thread::spawn(move || {
                    let subject = SubjectId::Player(worker);
                    for round in 0..500 {
                        cooldowns.set_cooldown("kick", subject, Duration::from_secs(10));
                        assert!(cooldowns.has_cooldown("kick", subject));
                        if round % 2 == 0 {
                            cooldowns.clear_cooldown("kick", subject);
                            assert!(!cooldowns.has_cooldown("kick", subject));
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        // Every worker ends on an odd round, which leaves its cooldown set.
        assert_eq!(cooldowns.active_cooldowns(), 8);
    }
}
