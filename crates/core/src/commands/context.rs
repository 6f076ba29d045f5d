use super::argument_set::ArgumentSet;
use super::modifier::ModifierSettings;
use crate::commands::error::{CommandResult, RuntimeError};
use crate::services::{Services, Subject, SubjectRef};
use std::time::Duration;

/// The state of one command invocation. It travels with the command
/// through warmups and onto worker threads.
pub struct ExecutionContext {
    source: SubjectRef,
    services: Services,
    command: String,
    arguments: ArgumentSet,
    cooldown: Duration,
    warmup: Duration,
    cost: f64,
    charged: Option<f64>,
    cause: Vec<String>,
}

impl ExecutionContext {
    pub(super) fn new(
        source: SubjectRef,
        services: Services,
        command: String,
        settings: &ModifierSettings,
    ) -> Self {
        let cause = vec![format!("{}:{}", source.id(), source.name())];
        Self {
            source,
            services,
            command,
            arguments: ArgumentSet::empty(),
            cooldown: settings.cooldown,
            warmup: settings.warmup,
            cost: settings.cost,
            charged: None,
            cause,
        }
    }

    pub fn source(&self) -> &SubjectRef {
        &self.source
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// The full command path, e.g. `home clear`.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &ArgumentSet {
        &self.arguments
    }

    pub(super) fn parse_parts(&mut self) -> (&SubjectRef, &Services, &mut ArgumentSet) {
        (&self.source, &self.services, &mut self.arguments)
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.cooldown = cooldown;
    }

    pub fn warmup(&self) -> Duration {
        self.warmup
    }

    pub fn set_warmup(&mut self, warmup: Duration) {
        self.warmup = warmup;
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn set_cost(&mut self, cost: f64) {
        self.cost = cost;
    }

    /// The amount actually withdrawn, if any.
    pub fn charged(&self) -> Option<f64> {
        self.charged
    }

    pub(crate) fn record_charge(&mut self, amount: f64) {
        self.charged = Some(amount);
    }

    pub(crate) fn take_charge(&mut self) -> Option<f64> {
        self.charged.take()
    }

    pub fn cause(&self) -> &[String] {
        &self.cause
    }

    pub fn push_cause(&mut self, cause: impl Into<String>) {
        self.cause.push(cause.into());
    }

    pub fn message(&self, key: &str, args: &[String]) -> String {
        self.services.message(key, args)
    }

    pub fn reply(&self, message: &str) {
        self.source.send_message(message);
    }

    pub fn reply_key(&self, key: &str, args: &[String]) {
        self.reply(&self.message(key, args));
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.services.has_permission(self.source.as_ref(), permission)
    }

    pub fn require_permission(&self, permission: &str) -> CommandResult<()> {
        if !self.has_permission(permission) {
            return Err(RuntimeError::PermissionDenied {
                permission: permission.to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn require_player(&self) -> CommandResult<&SubjectRef> {
        if !self.source.is_player() {
            return Err(RuntimeError::PlayerOnly.into());
        }
        Ok(&self.source)
    }

    /// Whether the source outranks `target`. With `same_level`, an equal
    /// level is enough. The console always outranks players, and a subject
    /// may always target itself. An unresolvable level counts as "no".
    pub fn is_permission_level_okay(&self, target: &dyn Subject, same_level: bool) -> bool {
        if !self.source.is_player() || self.source.id() == target.id() {
            return true;
        }
        let (Some(actor), Some(actee)) = (
            self.services.permission_level(self.source.as_ref()),
            self.services.permission_level(target),
        ) else {
            return false;
        };
        if same_level {
            actor >= actee
        } else {
            actor > actee
        }
    }
}
